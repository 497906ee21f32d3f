//! CLI error type.

use std::fmt;

use mediation::config::ConfigError;
use mediation::logging::LoggingError;
use mediation::mediator::SetupError;
use mediation::WaterfallError;

/// Exit code when every network in the waterfall failed.
pub const EXIT_NO_FILL: i32 = 2;

/// Exit code for unusable command-line arguments.
pub const EXIT_USAGE: i32 = 64;

#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be read or written.
    Config(String),
    /// A command-line argument could not be interpreted.
    InvalidArgument(String),
    /// Mediator could not be assembled.
    Setup(String),
    /// Logging could not be initialized.
    Logging(String),
    /// Async runtime could not be started.
    Runtime(String),
    /// The waterfall produced no ad.
    Waterfall(WaterfallError),
    /// Output could not be rendered.
    Output(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Waterfall(WaterfallError::Exhausted { .. }) => EXIT_NO_FILL,
            CliError::InvalidArgument(_) => EXIT_USAGE,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Setup(msg) => write!(f, "Setup failed: {}", msg),
            CliError::Logging(msg) => write!(f, "Logging setup failed: {}", msg),
            CliError::Runtime(msg) => write!(f, "Failed to start runtime: {}", msg),
            CliError::Waterfall(e) => write!(f, "{}", e),
            CliError::Output(msg) => write!(f, "Failed to render output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<SetupError> for CliError {
    fn from(e: SetupError) -> Self {
        CliError::Setup(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e.to_string())
    }
}

impl From<WaterfallError> for CliError {
    fn from(e: WaterfallError) -> Self {
        CliError::Waterfall(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediation::InsightRecord;

    #[test]
    fn test_exhaustion_exit_code() {
        let err = CliError::from(WaterfallError::Exhausted {
            placement: "p".into(),
            attempts: 2,
            insight: Box::new(InsightRecord::default()),
        });
        assert_eq!(err.exit_code(), EXIT_NO_FILL);
    }

    #[test]
    fn test_other_exit_codes() {
        assert_eq!(CliError::InvalidArgument("x".into()).exit_code(), EXIT_USAGE);
        assert_eq!(
            CliError::from(WaterfallError::EmptyWaterfall("p".into())).exit_code(),
            1
        );
        assert_eq!(CliError::Config("bad".into()).exit_code(), 1);
    }
}
