//! Module holding the application configuration read from the YAML configuration file.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::export::ExportParameters;
use crate::refresh::RefreshParameters;
use crate::store::{BackendKind, StorageParameters};

pub const DEFAULT_CONFIG_PATH: &str = "resources/redlined.yml";
pub const DEFAULT_LOG_CONFIG_PATH: &str = "resources/log.yml";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Configuration {
    pub storage: StorageParameters,
    #[serde(default)]
    pub refresh: RefreshParameters,
    #[serde(default)]
    pub export: ExportParameters,
}

impl Configuration {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut configuration_file = File::open(path.as_ref())?;
        let mut configuration_string = String::new();
        configuration_file.read_to_string(&mut configuration_string)?;
        Configuration::from_yaml(&configuration_string)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let configuration = serde_yaml::from_str::<Configuration>(yaml)?;
        configuration.validate()?;
        Ok(configuration)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == BackendKind::Remote {
            let remote = self.storage.remote.as_ref().ok_or_else(|| {
                ConfigError::Invalid(String::from("remote backend selected but no remote parameters specified"))
            })?;
            if remote.url.trim().is_empty() {
                return Err(ConfigError::Invalid(String::from("remote url is empty")));
            }
        }
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from("refresh interval must be at least one second")));
        }
        Ok(())
    }
}
