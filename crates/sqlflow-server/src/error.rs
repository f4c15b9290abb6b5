/// Error is the terminal failure of a single Run request.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request was rejected before any execution began.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The executor reported a failure of the statement.
    #[error("{}", render_run_error(.0))]
    Execution(String),

    /// The request was cancelled, or its deadline elapsed, while results were streaming.
    #[error("{0}")]
    Cancelled(Cancellation),

    /// The executor produced a result sequence which cannot be translated.
    #[error("executor protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Cancellation is the cause of a cancelled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// The client cancelled the request or went away.
    Client,
    /// The request's deadline elapsed.
    Deadline,
}

impl std::fmt::Display for Cancellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Cancellation::Client => "request cancelled by client",
            Cancellation::Deadline => "request deadline exceeded",
        })
    }
}

const RUN_ERROR_PREFIX: &str = "run error: ";

// Render an executor error message as "run error: <message>".
// Messages which already carry the prefix are passed through as-is.
fn render_run_error(message: &str) -> String {
    if message.starts_with(RUN_ERROR_PREFIX) {
        message.to_string()
    } else {
        format!("{RUN_ERROR_PREFIX}{message}")
    }
}

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        let message = err.to_string();

        match err {
            Error::InvalidRequest(_) => tonic::Status::invalid_argument(message),
            Error::Execution(_) => tonic::Status::unknown(message),
            Error::Cancelled(Cancellation::Client) => tonic::Status::cancelled(message),
            Error::Cancelled(Cancellation::Deadline) => tonic::Status::deadline_exceeded(message),
            Error::ProtocolViolation(_) => tonic::Status::internal(message),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                Error::InvalidRequest("statement is empty".to_string()),
                tonic::Code::InvalidArgument,
                "invalid request: statement is empty",
            ),
            (
                Error::Execution("no such table: foo".to_string()),
                tonic::Code::Unknown,
                "run error: no such table: foo",
            ),
            (
                Error::Execution("run error: ERROR ...".to_string()),
                tonic::Code::Unknown,
                "run error: ERROR ...",
            ),
            (
                Error::Cancelled(Cancellation::Client),
                tonic::Code::Cancelled,
                "request cancelled by client",
            ),
            (
                Error::Cancelled(Cancellation::Deadline),
                tonic::Code::DeadlineExceeded,
                "request deadline exceeded",
            ),
            (
                Error::ProtocolViolation("Row before Schema".to_string()),
                tonic::Code::Internal,
                "executor protocol violation: Row before Schema",
            ),
        ];

        for (err, code, message) in cases {
            let status: tonic::Status = err.into();
            assert_eq!(status.code(), code);
            assert_eq!(status.message(), message);
        }
    }
}
