use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("{key}: no value reported")]
    Absent { key: String },
    #[error("{key}: cannot convert {value:?} to {target}")]
    Unconvertible {
        key: String,
        value: String,
        target: &'static str,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("interval must be at least one second")]
    ZeroInterval,
    #[error("no metric capabilities configured")]
    NoMetrics,
    #[error("no database configured")]
    NoDatabase,
    #[error("no API token configured (set apitoken or ST_INFLUX_APITOKEN)")]
    MissingToken,
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("metrics init error: {0}")]
    Metrics(#[from] prometheus::Error),
}
