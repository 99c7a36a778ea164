//! Error taxonomy shared by the storage, view, export and command layers.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
/// A record could not be built from user input or stored data.
pub enum ValidationError {
    /// A required field was absent or empty.
    #[error("missing required field '{0}'")]
    Missing(&'static str),
    /// A field was present but could not be understood.
    #[error("invalid {field}: '{value}'")]
    Invalid { field: &'static str, value: String },
}

#[derive(Error, Debug)]
/// Failures of the record store and its backends.
pub enum StoreError {
    /// Network or HTTP failure talking to the remote service.
    #[error("remote service unavailable: {0}")]
    RemoteUnavailable(String),
    /// The identifier or display position does not address a record anymore.
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("local storage failure: {0}")]
    Local(#[from] std::io::Error),
    #[error("cannot encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    /// Nothing to export or the output format cannot be produced by this build.
    /// This is a user facing state, not a failure of the program.
    #[error("{0}")]
    Unavailable(String),
    #[error("cannot write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot render export: {0}")]
    Render(String),
}

#[derive(Error, Debug)]
#[error("cannot render chart '{chart}': {reason}")]
pub struct ChartError {
    pub chart: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot deserialize the configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
/// Everything a subcommand can fail with.
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error("cannot install the termination handler: {0}")]
    Termination(#[from] ctrlc::Error),
    #[error("{0}")]
    Usage(String),
}
