//! Event lifecycle tracker: the main loop that drives an [`Oracle`] through a run.
//!
//! Harness time starts at zero after burn-in. The loop advances the oracle to
//! the next stop (report tick, sample tick, event trigger, accept-log drain or
//! run end) and handles everything due at that instant in a fixed order:
//! events fire, then the gate-conditioned sample is taken, then goodness is
//! evaluated, then the accept log is drained.

use crate::actions::ActionRecorder;
use crate::config::{EventConfig, HarnessConfig};
use crate::error::{ConfigError, HarnessError};
use crate::event::{EventOutcome, EventSnapshot, HazardEvent, schedule};
use crate::fidelity::{bit_error_rate, mean_abs_diff};
use crate::gate::HazardGate;
use crate::motif::{BASE_ALPHABET, MotifClassifier, MotifFamily, MotifFrame, record_transitions};
use crate::oracle::{EpSnapshot, MoveCounts, MoveIndex, Oracle, PerturbSpec};
use crate::region::{MaskPair, RegionMask};
use crate::scope::{FamilyMap, MaskKind, Scope, ScopeMap};
use crate::summary::{
    EpRates, MoveRates, ReportRecord, RunResult, RunSummary, SparseMarker, VocabSummary,
};
use crate::window::{EdgeEp, EpDelta, SampleObservation, WindowSpec};
use repairlab_stats::{
    CountMap, DEFAULT_SMOOTHING, SummaryStat, TransitionTable, VocabStats, coarse_ep_smoothed,
    mean, percentile, shannon_entropy, symmetry_gap, vocab_stats,
};
use tracing::{debug, info, warn};

/// Runs hazard events against one oracle and collects their statistics.
///
/// The tracker owns its oracle; one tracker is one independent run.
#[derive(Debug)]
pub struct EventTracker<O> {
    config: HarnessConfig,
    oracle: O,
    moves: MoveIndex,
    masks: MaskPair,
    gate: HazardGate,
    classifier: MotifClassifier,
}

impl<O: Oracle> EventTracker<O> {
    /// Validate `config` against `oracle` and build masks, gate and classifier.
    pub fn new(config: HarnessConfig, oracle: O) -> Result<Self, HarnessError> {
        config.validate()?;
        if config.event.target_layer >= oracle.meta_layers() {
            return Err(ConfigError::Invalid(
                "event.target_layer must name an oracle meta layer",
            )
            .into());
        }
        let moves = MoveIndex::resolve(&oracle.move_labels())?;
        let masks = MaskPair::build(oracle.grid_size(), &config.region, config.outside_seed());
        let gate = HazardGate::new(&config.gate, config.region.index, config.region.span);
        let classifier = MotifClassifier::for_oracle(&config.motif, &oracle);
        debug!(
            grid = oracle.grid_size(),
            meta_layers = oracle.meta_layers(),
            hazard_cells = masks.hazard.population(),
            outside_cells = masks.outside.population(),
            "tracker ready"
        );
        Ok(Self {
            config,
            oracle,
            moves,
            masks,
            gate,
            classifier,
        })
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub fn masks(&self) -> &MaskPair {
        &self.masks
    }

    #[must_use]
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    #[must_use]
    pub fn into_oracle(self) -> O {
        self.oracle
    }

    /// Execute the full run: burn-in, scheduled events, sampling and reporting.
    pub fn run(&mut self) -> Result<RunResult, HarnessError> {
        let config = &self.config;
        let oracle = &mut self.oracle;
        let seed = config.run.seed;
        let steps = config.run.steps;

        if config.run.burn_in > 0 {
            oracle.step(config.run.burn_in);
        }
        let origin = oracle.time();
        let mut actions =
            ActionRecorder::attach(config, oracle, self.moves, self.masks.clone(), origin)?;
        let ep_origin = EpSnapshot::capture(oracle, &self.moves);
        let moves_origin = MoveCounts::capture(oracle, &self.moves);

        let mut events: Vec<HazardEvent> =
            schedule(config.event.event_every, config.event.deadline, steps)
                .into_iter()
                .enumerate()
                .map(|(id, t)| HazardEvent::new(id, t, config.region.index, config.event.deadline))
                .collect();
        info!(seed, steps, events = events.len(), origin, "run started");

        let mut sampler =
            Sampler::new(config, &self.masks, &self.classifier, self.gate, self.moves);
        let mut reporter = Reporter::new(
            config,
            &self.masks.hazard,
            oracle.grid_size(),
            oracle.level_max(),
        );

        let report_every = config.run.report_every;
        let sample_every = config.gate.check_every;
        let drain_every = config.motif.chunk_steps;
        let mut next_report = report_every;
        let mut next_sample = sample_every;
        let mut next_drain = drain_every;
        let mut next_event = 0usize;
        let mut last_event: Option<u64> = None;
        let mut t = 0u64;

        while t < steps {
            let event_at = events.get(next_event).map_or(u64::MAX, |e| e.trigger_time);
            let drain_at = if actions.is_some() { next_drain } else { u64::MAX };
            let next = next_report
                .min(next_sample)
                .min(event_at)
                .min(drain_at)
                .min(steps);
            if next > t {
                oracle.step(next - t);
                t = next;
            }

            while let Some(event) = events.get_mut(next_event)
                && event.trigger_time <= t
            {
                oracle.perturb(&PerturbSpec {
                    layer: config.event.target_layer,
                    region: (&config.region).into(),
                    frac: config.event.corrupt_frac,
                    mode: config.event.perturb_mode,
                    seed: config.perturb_seed(event.trigger_time),
                });
                event.fire(snapshot(oracle, &self.moves, t));
                last_event = Some(event.trigger_time);
                debug!(seed, event = event.id, t, "hazard event fired");
                next_event += 1;
            }

            if t == next_sample {
                sampler.sample(t, oracle, &mut events)?;
                next_sample += sample_every;
            }

            if t == next_report {
                reporter.report(t, oracle, &self.moves, last_event, &mut events, seed);
                next_report += report_every;
            }

            if let Some(recorder) = actions.as_mut()
                && (t == next_drain || t == steps)
            {
                let drained = recorder.drain(oracle, t)?;
                debug!(t, drained, "accept log drained");
                if t == next_drain {
                    next_drain += drain_every;
                }
            }
        }

        let end = snapshot(oracle, &self.moves, steps);
        for event in &mut events {
            if event.force_miss(end) {
                info!(seed, event = event.id, "hazard event still pending at run end; missed");
            }
            event.close_run(&end.ep);
        }

        let summary = summarize(
            config,
            &self.classifier,
            &sampler,
            &reporter,
            &events,
            end.ep.delta_since(&ep_origin),
            end.moves.delta_since(&moves_origin),
        );
        info!(
            seed,
            events = summary.events,
            missed = summary.missed,
            miss_frac = summary.miss_frac,
            uptime_tail = summary.uptime_tail,
            gate_samples = summary.gate_samples,
            "run finished"
        );
        for marker in &summary.markers {
            warn!(seed, marker = marker.name(), "{marker}");
        }

        Ok(RunResult {
            summary,
            events,
            counts: sampler.counts,
            transitions: sampler.transitions,
            edge_ep: sampler.edge_ep,
            actions: actions.map(ActionRecorder::finish),
            reports: reporter.records,
        })
    }
}

fn snapshot<O: Oracle + ?Sized>(oracle: &O, moves: &MoveIndex, t: u64) -> EventSnapshot {
    EventSnapshot {
        time: t,
        ep: EpSnapshot::capture(oracle, moves),
        moves: MoveCounts::capture(oracle, moves),
        clock: oracle.clock_state(),
    }
}

/// Gate-conditioned motif sampling and its run-level accumulators.
struct Sampler<'a> {
    masks: &'a MaskPair,
    classifier: &'a MotifClassifier,
    gate: HazardGate,
    moves: MoveIndex,
    windows: WindowSpec,
    top_n: usize,

    prev: Option<(MotifFrame, EpSnapshot)>,
    gate_open: bool,
    gate_samples: u64,

    vocab: ScopeMap<Vec<VocabStats>>,
    change_fracs: ScopeMap<Vec<f64>>,
    counts: ScopeMap<CountMap>,
    transitions: ScopeMap<TransitionTable>,
    depth: FamilyMap<Vec<CountMap>>,
    edge_ep: FamilyMap<EdgeEp>,
    ep_per_change: FamilyMap<Vec<f64>>,
}

impl<'a> Sampler<'a> {
    fn new(
        config: &HarnessConfig,
        masks: &'a MaskPair,
        classifier: &'a MotifClassifier,
        gate: HazardGate,
        moves: MoveIndex,
    ) -> Self {
        let layers = classifier.meta_layers();
        Self {
            masks,
            classifier,
            gate,
            moves,
            windows: WindowSpec {
                pre: config.pre_window(),
                deadline: config.event.deadline,
                tail: config.event.tail_window,
            },
            top_n: config.motif.top_n,
            prev: None,
            gate_open: false,
            gate_samples: 0,
            vocab: ScopeMap::default(),
            change_fracs: ScopeMap::default(),
            counts: ScopeMap::default(),
            transitions: ScopeMap::default(),
            depth: FamilyMap::from_fn(|_| vec![CountMap::new(); layers]),
            edge_ep: FamilyMap::default(),
            ep_per_change: FamilyMap::default(),
        }
    }

    fn sample<O: Oracle + ?Sized>(
        &mut self,
        t: u64,
        oracle: &O,
        events: &mut [HazardEvent],
    ) -> Result<(), HarnessError> {
        if !self.gate.is_open(oracle.clock_state()) {
            // no transition may span a closed gate
            self.prev = None;
            self.gate_open = false;
            return Ok(());
        }
        let frame = self.classifier.classify(oracle)?;
        let ep = EpSnapshot::capture(oracle, &self.moves);
        self.gate_samples += 1;

        let mut obs = SampleObservation::default();
        for scope in Scope::ALL {
            let counts = frame.counts(scope.family, self.masks.get(scope.mask));
            self.vocab
                .get_mut(scope)
                .push(vocab_stats(&counts, self.top_n));
            self.counts.get_mut(scope).merge(&counts);
            *obs.counts.get_mut(scope) = counts;
        }
        for family in [MotifFamily::Base, MotifFamily::Operator] {
            for (interface, pooled) in self.depth.get_mut(family).iter_mut().enumerate() {
                pooled.merge(&frame.interface_counts(family, interface, &self.masks.hazard));
            }
        }

        if self.gate_open
            && let Some((prev_frame, prev_ep)) = &self.prev
        {
            for scope in Scope::ALL {
                let stats = record_transitions(
                    prev_frame.family(scope.family),
                    frame.family(scope.family),
                    self.masks.get(scope.mask),
                    obs.transitions.get_mut(scope),
                );
                *obs.changes.get_mut(scope) = stats;
                self.change_fracs.get_mut(scope).push(stats.fraction());
                self.transitions
                    .get_mut(scope)
                    .merge(obs.transitions.get(scope));
            }

            let delta = ep.delta_since(prev_ep);
            obs.ep = EpDelta {
                total: delta.total,
                repair: delta.repair,
                operator: delta.operator,
            };

            let base_changed = obs.changes.base_hazard.changed;
            let op_changed = obs.changes.operator_hazard.changed;
            self.ep_per_change.base.push(if base_changed > 0 {
                delta.total / base_changed as f64
            } else {
                0.0
            });
            self.ep_per_change.operator.push(if op_changed > 0 {
                delta.operator / op_changed as f64
            } else {
                0.0
            });
            self.edge_ep
                .base
                .attribute(&obs.transitions.base_hazard, obs.ep);
            self.edge_ep
                .operator
                .attribute(&obs.transitions.operator_hazard, obs.ep);
        }

        for event in events.iter_mut() {
            if let Some(kind) = self.windows.classify(t, event.trigger_time) {
                event.windows.get_mut(kind).absorb(&obs);
            }
        }

        self.prev = Some((frame, ep));
        self.gate_open = true;
        Ok(())
    }
}

/// Goodness evaluation on report ticks.
struct Reporter<'a> {
    hazard: &'a RegionMask,
    grid: usize,
    level_max: u32,
    event: EventConfig,
    baseline: Vec<f64>,
    floor: Option<f64>,
    records: Vec<ReportRecord>,
}

impl<'a> Reporter<'a> {
    fn new(config: &HarnessConfig, hazard: &'a RegionMask, grid: usize, level_max: u32) -> Self {
        Self {
            hazard,
            grid,
            level_max,
            event: config.event.clone(),
            baseline: Vec::new(),
            floor: None,
            records: Vec::new(),
        }
    }

    /// Subtract the mean pre-event error once the first event has fired.
    ///
    /// Ticks before the first event feed the baseline and are reported raw.
    /// The floor assumes the steady-state error is stable before perturbation.
    fn adjust(&mut self, t: u64, err: f64) -> f64 {
        if !self.event.subtract_error_floor {
            return err;
        }
        if t < self.event.event_every {
            self.baseline.push(err);
            return err;
        }
        let floor = *self.floor.get_or_insert_with(|| mean(&self.baseline));
        (err - floor).max(0.0)
    }

    fn report<O: Oracle + ?Sized>(
        &mut self,
        t: u64,
        oracle: &O,
        moves: &MoveIndex,
        last_event: Option<u64>,
        events: &mut [HazardEvent],
        seed: u64,
    ) {
        let layer = self.event.target_layer;
        let upper = oracle.layer_field(layer);
        let lower = if layer == 0 {
            oracle.reference_field()
        } else {
            oracle.layer_field(layer - 1)
        };
        let sdiff = mean_abs_diff(lower, upper, self.hazard);
        let raw = bit_error_rate(lower, upper, self.grid, self.level_max, self.hazard);
        let err = self.adjust(t, raw);
        let good = sdiff <= self.event.sdiff_good && err <= self.event.err_good;
        self.records.push(ReportRecord {
            t,
            err,
            sdiff,
            good,
            since_event: last_event.map(|e| t - e),
        });

        for event in events.iter_mut() {
            match event.observe(t, good, || snapshot(oracle, moves, t)) {
                Some(EventOutcome::Recovered { elapsed }) => {
                    info!(seed, event = event.id, elapsed, "hazard event recovered");
                }
                Some(EventOutcome::Missed) => {
                    info!(seed, event = event.id, t, sdiff, err, "hazard event missed");
                }
                _ => {}
            }
        }
    }
}

fn summarize(
    config: &HarnessConfig,
    classifier: &MotifClassifier,
    sampler: &Sampler<'_>,
    reporter: &Reporter<'_>,
    events: &[HazardEvent],
    ep: EpSnapshot,
    moves: MoveCounts,
) -> RunSummary {
    let steps = config.run.steps;
    let per_step = |x: f64| if steps > 0 { x / steps as f64 } else { 0.0 };

    let missed = events.iter().filter(|e| e.outcome.is_missed()).count();
    let recoveries: Vec<f64> = events
        .iter()
        .filter_map(|e| e.outcome.recovery_elapsed())
        .map(|r| r as f64)
        .collect();

    let records = &reporter.records;
    let tail_start = steps.saturating_sub(config.event.tail_window);
    let grace = config.event.grace_window();
    let tail: Vec<&ReportRecord> = records
        .iter()
        .filter(|r| r.t >= tail_start && r.since_event.is_none_or(|s| s >= grace))
        .collect();
    let fraction_good = |rs: &[&ReportRecord]| {
        if rs.is_empty() {
            0.0
        } else {
            rs.iter().filter(|r| r.good).count() as f64 / rs.len() as f64
        }
    };
    let all: Vec<&ReportRecord> = records.iter().collect();
    let errs: Vec<f64> = records.iter().map(|r| r.err).collect();

    let recovery_samples: Vec<f64> = events
        .iter()
        .map(|e| e.windows.recovery.samples as f64)
        .collect();
    let recovery_samples_mean = mean(&recovery_samples);

    let vocab = sampler.vocab.map(|scope, samples| {
        let pick = |f: fn(&VocabStats) -> f64| {
            SummaryStat::of(&samples.iter().map(f).collect::<Vec<_>>())
        };
        VocabSummary {
            entropy: pick(|s| s.entropy),
            effective_vocab: pick(|s| s.effective_vocab),
            top_mass: pick(|s| s.top_mass),
            change_frac: SummaryStat::of(sampler.change_fracs.get(scope)),
        }
    });
    let unique = sampler.counts.map(|_, counts| counts.len());
    let hazard_transitions =
        |family| sampler.transitions.get(Scope::new(family, MaskKind::Hazard));

    let markers = SparseMarker::detect(
        sampler.gate_samples,
        events.len(),
        recovery_samples_mean,
        unique.operator_hazard,
    );

    RunSummary {
        seed: config.run.seed,
        steps,
        op_bins: config.motif.op_bins.code(),
        base_alphabet: BASE_ALPHABET,
        operator_alphabet: classifier.operator_alphabet(),
        events: events.len(),
        missed,
        miss_frac: if events.is_empty() {
            0.0
        } else {
            missed as f64 / events.len() as f64
        },
        recovery_mean: (!recoveries.is_empty()).then(|| mean(&recoveries)),
        recovery_p95: (!recoveries.is_empty()).then(|| percentile(&recoveries, 0.95)),
        recovery_max: events
            .iter()
            .filter_map(|e| e.outcome.recovery_elapsed())
            .max(),
        uptime: fraction_good(&all),
        uptime_tail: fraction_good(&tail),
        err_tail_mean: mean(&tail.iter().map(|r| r.err).collect::<Vec<_>>()),
        sdiff_tail_mean: mean(&tail.iter().map(|r| r.sdiff).collect::<Vec<_>>()),
        err_p95: percentile(&errs, 0.95),
        err_end: records.last().map_or(0.0, |r| r.err),
        sdiff_end: records.last().map_or(0.0, |r| r.sdiff),
        error_floor: reporter.floor,
        ep_rates: EpRates {
            total: per_step(ep.total),
            repair: per_step(ep.repair),
            operator: per_step(ep.operator),
            clock: per_step(ep.clock),
            other: per_step(ep.other()),
        },
        move_rates: MoveRates {
            repair: per_step(moves.repair_meta as f64),
            operator: per_step(moves.operator as f64),
            clock: per_step(moves.clock as f64),
            total: per_step(moves.total as f64),
        },
        gate_samples: sampler.gate_samples,
        recovery_samples_mean,
        vocab,
        unique,
        symmetry_gap: FamilyMap::from_fn(|f| symmetry_gap(hazard_transitions(f))),
        coarse_ep: FamilyMap::from_fn(|f| {
            coarse_ep_smoothed(hazard_transitions(f), DEFAULT_SMOOTHING)
        }),
        ep_per_change: FamilyMap::from_fn(|f| SummaryStat::of(sampler.ep_per_change.get(f))),
        depth_entropy: FamilyMap::from_fn(|f| {
            sampler.depth.get(f).iter().map(shannon_entropy).collect()
        }),
        markers,
    }
}
