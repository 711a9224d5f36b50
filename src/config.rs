use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.detection.interval_ms < 0.0 {
            bail!("detection.interval_ms must not be negative");
        }
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            bail!("detection.confidence_threshold must be within [0, 1]");
        }
        if self.detection.allowed_classes.is_empty() {
            bail!("detection.allowed_classes must name at least one class");
        }
        // Speed needs an oldest and a newest sample.
        if self.speed.history_capacity < 2 {
            bail!("speed.history_capacity must be at least 2");
        }
        if self.lanes.cluster_min_samples == 0 {
            bail!("lanes.cluster_min_samples must be at least 1");
        }
        if self.lanes.blur_kernel <= 0 || self.lanes.blur_kernel % 2 == 0 {
            bail!("lanes.blur_kernel must be a positive odd number");
        }
        if self.video.display_width <= 0 {
            bail!("video.display_width must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VehicleClass;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "detection:\n  interval_ms: 500\n  allowed_classes: [car, truck]\nvideo:\n  headless: true"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.detection.interval_ms, 500.0);
        assert_eq!(
            config.detection.allowed_classes,
            vec![VehicleClass::Car, VehicleClass::Truck]
        );
        assert_eq!(config.detection.confidence_threshold, 0.5);
        assert!(config.video.headless);
        assert_eq!(config.video.display_width, 700);
        assert_eq!(config.speed.history_capacity, 5);
        assert_eq!(config.lanes.cluster_eps, 50.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn test_rejects_single_sample_history() {
        let mut config = Config::default();
        config.speed.history_capacity = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_even_blur_kernel() {
        let mut config = Config::default();
        config.lanes.blur_kernel = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.yaml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.detection.interval_ms, 700.0);
        assert_eq!(config.tracker.min_hits_to_confirm, 3);
        assert_eq!(config.video.output_dir, "output");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
