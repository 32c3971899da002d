use repairlab_core::{AcceptLog, AcceptLogEntry};

/// Bounded, mask-filtered buffer of accepted moves.
#[derive(Debug, Clone, Default)]
pub struct BoundedAcceptLog {
    entries: Vec<AcceptLogEntry>,
    mask: u32,
    capacity: usize,
    overflowed: bool,
}

impl BoundedAcceptLog {
    /// Start logging moves whose id bit is set in `mask`. A zero mask disables logging.
    pub fn configure(&mut self, mask: u32, capacity: usize) {
        self.mask = mask;
        self.capacity = capacity;
        self.entries.clear();
        self.entries.reserve(capacity.min(1 << 16));
        self.overflowed = false;
    }

    #[must_use]
    pub fn accepts(&self, move_id: usize) -> bool {
        move_id < 32 && self.mask & (1 << move_id) != 0
    }

    /// Append `entry` if its move is enabled; entries beyond capacity are dropped
    /// and flag the overflow.
    pub fn push(&mut self, entry: AcceptLogEntry) {
        if !self.accepts(entry.move_id()) {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.overflowed = true;
            return;
        }
        self.entries.push(entry);
    }
}

impl AcceptLog for BoundedAcceptLog {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn read(&self) -> Vec<AcceptLogEntry> {
        self.entries.clone()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.overflowed = false;
    }

    fn overflowed(&self) -> bool {
        self.overflowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(move_id: u8) -> AcceptLogEntry {
        AcceptLogEntry {
            time: 1,
            cell: 0,
            meta: AcceptLogEntry::pack_meta(move_id, 0, 0, 0),
            ep: 0.0,
        }
    }

    #[test]
    fn mask_filters_moves() {
        let mut log = BoundedAcceptLog::default();
        log.configure(1 << 3, 8);
        log.push(entry(1));
        log.push(entry(3));
        assert_eq!(log.len(), 1);
        assert_eq!(log.read()[0].move_id(), 3);
    }

    #[test]
    fn overflow_is_sticky_until_clear() {
        let mut log = BoundedAcceptLog::default();
        log.configure(1, 2);
        for _ in 0..3 {
            log.push(entry(0));
        }
        assert_eq!(log.len(), 2);
        assert!(log.overflowed());
        log.clear();
        assert!(!log.overflowed());
        assert!(log.is_empty());
    }
}
