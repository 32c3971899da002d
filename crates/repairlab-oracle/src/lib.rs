//! Reference oracle for the repairlab harness.

pub mod accept_log;
pub mod lattice;

pub use accept_log::BoundedAcceptLog;
pub use lattice::{LABEL_NOISE, LatticeConfig, LatticeError, LatticeOracle, Stencil};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: LatticeConfig =
            serde_json::from_str(r#"{"grid_size": 8, "stencil": "full", "repair": false}"#)
                .expect("config");
        assert_eq!(config.grid_size, 8);
        assert_eq!(config.stencil, Stencil::Full);
        assert!(!config.repair);
        assert_eq!(config.level_max, LatticeConfig::default().level_max);
        assert!(config.validate().is_ok());
    }
}
