// Error types for the dali payload engine

use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration unavailable: {0}")]
    ConfigurationUnavailable(String),

    #[error("Could not read and discard the request body: {0}")]
    BodyDiscardFailure(String),

    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    #[error("Could not open zero source {path}: {source}")]
    DeviceOpenFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timing report of {report} bytes does not fit a {budget} byte budget")]
    ReportTooLargeForBudget { report: u64, budget: u64 },

    #[error("Could not send the response header: {0}")]
    HeaderSendFailure(String),

    #[error("Could not send the response body: {0}")]
    BodySendFailure(String),

    #[error("Range not satisfiable for a {length} byte payload")]
    RangeNotSatisfiable { length: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Copyable discriminant of [`Error`], recorded by the request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigurationUnavailable,
    BodyDiscardFailure,
    AllocationFailure,
    DeviceOpenFailure,
    ReportTooLargeForBudget,
    HeaderSendFailure,
    BodySendFailure,
    RangeNotSatisfiable,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigurationUnavailable(_) => ErrorKind::ConfigurationUnavailable,
            Error::BodyDiscardFailure(_) => ErrorKind::BodyDiscardFailure,
            Error::AllocationFailure(_) => ErrorKind::AllocationFailure,
            Error::DeviceOpenFailure { .. } => ErrorKind::DeviceOpenFailure,
            Error::ReportTooLargeForBudget { .. } => ErrorKind::ReportTooLargeForBudget,
            Error::HeaderSendFailure(_) => ErrorKind::HeaderSendFailure,
            Error::BodySendFailure(_) => ErrorKind::BodySendFailure,
            Error::RangeNotSatisfiable { .. } => ErrorKind::RangeNotSatisfiable,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// Every engine failure is a server error; only an unsatisfiable range
    /// is reported as a client error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_failures_are_server_errors() {
        let errors = [
            Error::ConfigurationUnavailable("/".to_string()),
            Error::BodyDiscardFailure("reset".to_string()),
            Error::AllocationFailure("chain".to_string()),
            Error::DeviceOpenFailure {
                path: "/dev/zero".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
            Error::ReportTooLargeForBudget {
                report: 80,
                budget: 10,
            },
            Error::HeaderSendFailure("closed".to_string()),
        ];

        for err in &errors {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(err.is_server_error());
        }
    }

    #[test]
    fn test_range_error_is_client_error() {
        let err = Error::RangeNotSatisfiable { length: 500 };
        assert_eq!(err.status_code(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert!(!err.is_server_error());
        assert_eq!(err.kind(), ErrorKind::RangeNotSatisfiable);
    }

    #[test]
    fn test_report_error_message() {
        let err = Error::ReportTooLargeForBudget {
            report: 80,
            budget: 10,
        };
        assert_eq!(
            err.to_string(),
            "Timing report of 80 bytes does not fit a 10 byte budget"
        );
    }
}
