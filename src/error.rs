use thiserror::Error;

/// Every failure the pipeline can report.
///
/// None of these are retried. They travel to the top of the run, which
/// terminates and prints them.
#[derive(Debug, Error)]
pub enum IotStreamsError {
    /// Malformed run input: time strings, input files, CLI values.
    #[error("Malformed input '{input}': {reason}")]
    UserInput { input: String, reason: String },

    /// Malformed or semantically empty stream configuration.
    #[error("Configuration error in {context}: {message}")]
    Configuration { context: String, message: String },

    /// A network or filesystem operation failed.
    #[error("{operation} failed")]
    Io {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An invariant the pipeline checks itself was violated.
    #[error("Internal invariant violated: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, IotStreamsError>;

impl IotStreamsError {
    pub fn user_input(input: impl Into<String>, reason: impl ToString) -> Self {
        Self::UserInput {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    pub fn configuration(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Configuration {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn io(
        operation: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<oxigraph::store::StorageError> for IotStreamsError {
    fn from(e: oxigraph::store::StorageError) -> Self {
        Self::Internal(format!("in-memory store: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_input_names_the_offending_string() {
        let err = IotStreamsError::user_input("2016-13-40", "input is out of range");
        assert_eq!(
            err.to_string(),
            "Malformed input '2016-13-40': input is out of range"
        );
    }

    #[test]
    fn io_keeps_the_underlying_error_as_source() {
        let cause = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = IotStreamsError::io("reading /tmp/x", cause);
        assert_eq!(err.to_string(), "reading /tmp/x failed");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("gone"));
    }
}
