//! Experiment presets: base configuration, seed list and named conditions.

use anyhow::{Context, Result, bail};
use repairlab_core::{HarnessConfig, Override, apply_overrides, apply_patch};
use repairlab_oracle::LatticeConfig;
use repairlab_report::AggregateConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Override paths with this prefix target the oracle instead of the harness.
pub const ORACLE_PREFIX: &str = "oracle.";

const DEFAULT_SEED_COUNT: u64 = 30;

/// One experimental condition: JSON patches applied on top of the preset's base configs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSpec {
    pub name: String,
    pub harness: Map<String, Value>,
    pub oracle: Map<String, Value>,
}

impl ConditionSpec {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub harness: HarnessConfig,
    pub oracle: LatticeConfig,
    /// Explicit seed list; when empty, seeds `1..=seed_count` are used.
    pub seeds: Vec<u64>,
    pub seed_count: Option<u64>,
    pub conditions: Vec<ConditionSpec>,
    pub aggregate: AggregateConfig,
}

/// Fully resolved configuration of one condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCondition {
    pub name: String,
    pub harness: HarnessConfig,
    pub oracle: LatticeConfig,
}

impl Preset {
    /// Read a JSON preset; errors name the offending field path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read preset {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid preset {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let de = &mut serde_json::Deserializer::from_str(text);
        let preset: Self = serde_path_to_error::deserialize(de)
            .map_err(|e| anyhow::anyhow!("{} at {}", e.inner(), e.path()))?;
        Ok(preset)
    }

    /// Apply `--set` overrides to the base configs. Paths under `oracle.` go to
    /// the lattice config; everything else goes to the harness config.
    pub fn with_overrides(mut self, overrides: &[Override]) -> Result<Self> {
        let (oracle, harness): (Vec<Override>, Vec<Override>) = overrides
            .iter()
            .cloned()
            .partition(|o| o.path.starts_with(ORACLE_PREFIX));
        let oracle: Vec<Override> = oracle
            .into_iter()
            .map(|o| Override::new(&o.path[ORACLE_PREFIX.len()..], o.value))
            .collect();
        if !harness.is_empty() {
            self.harness = apply_overrides(&self.harness, &harness)
                .context("failed to apply harness overrides")?;
        }
        if !oracle.is_empty() {
            self.oracle = apply_overrides(&self.oracle, &oracle)
                .context("failed to apply oracle overrides")?;
        }
        Ok(self)
    }

    /// Seeds to run, in ascending order of appearance.
    #[must_use]
    pub fn seed_list(&self) -> Vec<u64> {
        if self.seeds.is_empty() {
            (1..=self.seed_count.unwrap_or(DEFAULT_SEED_COUNT)).collect()
        } else {
            self.seeds.clone()
        }
    }

    /// Resolve and validate every condition. A preset without conditions
    /// yields a single `baseline` condition.
    pub fn resolve(&self) -> Result<Vec<ResolvedCondition>> {
        let specs = if self.conditions.is_empty() {
            vec![ConditionSpec::named("baseline")]
        } else {
            self.conditions.clone()
        };
        let mut resolved = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.name.is_empty() {
                bail!("every condition needs a name");
            }
            if resolved
                .iter()
                .any(|r: &ResolvedCondition| r.name == spec.name)
            {
                bail!("duplicate condition name '{}'", spec.name);
            }
            let harness: HarnessConfig =
                apply_patch(&self.harness, &Value::Object(spec.harness.clone()))
                    .with_context(|| format!("condition '{}': harness patch", spec.name))?;
            let oracle: LatticeConfig = apply_patch(&self.oracle, &Value::Object(spec.oracle))
                .with_context(|| format!("condition '{}': oracle patch", spec.name))?;
            harness
                .validate()
                .with_context(|| format!("condition '{}': harness config", spec.name))?;
            oracle
                .validate()
                .with_context(|| format!("condition '{}': oracle config", spec.name))?;
            resolved.push(ResolvedCondition {
                name: spec.name,
                harness,
                oracle,
            });
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESET: &str = r#"{
        "harness": {"run": {"steps": 120000}, "event": {"deadline": 20000}},
        "oracle": {"grid_size": 16},
        "seeds": [3, 1],
        "conditions": [
            {"name": "repair"},
            {"name": "frozen", "oracle": {"repair": false}},
            {"name": "axis", "harness": {"motif": {"op_bins": "axis"}}}
        ]
    }"#;

    #[test]
    fn conditions_patch_the_base_configs() {
        let preset = Preset::from_json(PRESET).expect("preset");
        let resolved = preset.resolve().expect("resolve");
        assert_eq!(resolved.len(), 3);
        assert!(resolved[0].oracle.repair);
        assert!(!resolved[1].oracle.repair);
        assert_eq!(resolved[1].harness.event.deadline, 20_000);
        assert_eq!(
            resolved[2].harness.motif.op_bins,
            repairlab_core::OpBinsMode::Axis
        );
        assert_eq!(preset.seed_list(), vec![3, 1]);
    }

    #[test]
    fn overrides_route_by_prefix() {
        let overrides = [
            Override::parse("event.corrupt_frac=0.3").expect("override"),
            Override::parse("oracle.level_max=3").expect("override"),
        ];
        let preset = Preset::default()
            .with_overrides(&overrides)
            .expect("overrides");
        assert!((preset.harness.event.corrupt_frac - 0.3).abs() < 1e-12);
        assert_eq!(preset.oracle.level_max, 3);
    }

    #[test]
    fn unknown_override_path_is_rejected() {
        let overrides = [Override::parse("event.nonsense=1").expect("override")];
        assert!(Preset::default().with_overrides(&overrides).is_err());
    }

    #[test]
    fn bad_field_types_name_their_path() {
        let err = Preset::from_json(r#"{"harness": {"run": {"steps": "many"}}}"#)
            .expect_err("type error");
        assert!(err.to_string().contains("harness.run.steps"));
    }

    #[test]
    fn default_preset_has_one_baseline_condition() {
        let preset = Preset {
            seed_count: Some(4),
            ..Preset::default()
        };
        let resolved = preset.resolve().expect("resolve");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "baseline");
        assert_eq!(preset.seed_list(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn duplicate_condition_names_are_rejected() {
        let preset = Preset {
            conditions: vec![ConditionSpec::named("a"), ConditionSpec::named("a")],
            ..Preset::default()
        };
        assert!(preset.resolve().is_err());
    }
}
