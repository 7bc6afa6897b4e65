use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use lcdeisotope::{DeisotoperParams, ElutionParams, IsotopeTableParams, LCMSParams};

/// The name of the configuration file read from the working directory if present
pub const CONFIG_FILE_NAME: &str = "lcdeisotoper.toml";
pub const ENV_PREFIX: &str = "LCDEISOTOPER_";

/// Every tunable parameter of the processing pipeline
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub deisotoper: DeisotoperParams,
    pub elution: ElutionParams,
    pub lcms: LCMSParams,
    pub isotope_table: IsotopeTableParams,
}

impl ProcessingConfig {
    /// Layer the built-in defaults, the working directory's configuration file, an
    /// explicit configuration file and the environment, from lowest to highest priority.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(ProcessingConfig::default()))
            .merge(Toml::file(CONFIG_FILE_NAME));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file_exact(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(config_file: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(config_file).extract()
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lcdeisotope::CollisionPolicy;

    #[test]
    fn test_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE_NAME,
                r#"
                [deisotoper]
                max_charge = 4
                intensity_floor = 50.0

                [lcms]
                collision_policy = "merge-sum"
                "#,
            )?;
            jail.set_env("LCDEISOTOPER_ELUTION__MAX_SCAN_GAP", "3");
            jail.set_env("LCDEISOTOPER_DEISOTOPER__MAX_CHARGE", "6");

            let config = ProcessingConfig::load(None)?;
            assert_eq!(config.deisotoper.max_charge, 6);
            assert_eq!(config.deisotoper.min_charge, 1);
            assert_eq!(config.deisotoper.intensity_floor, Some(50.0));
            assert_eq!(config.elution.max_scan_gap, 3);
            assert_eq!(config.lcms.collision_policy, CollisionPolicy::MergeSum);
            assert_eq!(config.isotope_table, IsotopeTableParams::default());
            Ok(())
        });
    }

    #[test]
    fn test_missing_config_file() {
        figment::Jail::expect_with(|_jail| {
            assert!(ProcessingConfig::load(Some(Path::new("not_real.toml"))).is_err());
            assert_eq!(ProcessingConfig::load(None)?, ProcessingConfig::default());
            Ok(())
        });
    }
}
