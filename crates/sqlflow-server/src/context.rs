use crate::Cancellation;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Metadata key of the deadline a gRPC client attaches to its request.
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Context is the cancellation scope of a single request.
/// It's done when its token is cancelled, or its deadline (if any) elapses.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Build a Context which is done only upon cancellation of `token`.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Return a Context which is additionally done after `timeout`,
    /// if that's sooner than its current deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Return a Context which is additionally done at `deadline`,
    /// if that's sooner than its current deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this Context, and all tokens derived from it.
    pub fn cancel(&self) {
        self.token.cancel()
    }

    /// Returns the cause of this Context being done,
    /// or None if it's not done yet.
    pub fn err(&self) -> Option<Cancellation> {
        if self.token.is_cancelled() {
            Some(Cancellation::Client)
        } else if matches!(self.deadline, Some(d) if d <= Instant::now()) {
            Some(Cancellation::Deadline)
        } else {
            None
        }
    }

    /// Resolve when this Context is done, with the cause.
    pub async fn done(&self) -> Cancellation {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            _ = self.token.cancelled() => Cancellation::Client,
            _ = deadline => Cancellation::Deadline,
        }
    }
}

/// Parse a gRPC timeout header value, such as "100m" or "5S", into a Duration.
///
/// The value is an ASCII integer of at most eight digits, followed by a unit:
/// `H` hours, `M` minutes, `S` seconds, `m` milliseconds, `u` microseconds,
/// or `n` nanoseconds.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);

    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(n * 60 * 60)),
        "M" => Some(Duration::from_secs(n * 60)),
        "S" => Some(Duration::from_secs(n)),
        "m" => Some(Duration::from_millis(n)),
        "u" => Some(Duration::from_micros(n)),
        "n" => Some(Duration::from_nanos(n)),
        _ => None,
    }
}

/// Extract the client's timeout of a request, if it sent a well-formed one.
pub fn request_timeout(metadata: &tonic::metadata::MetadataMap) -> Option<Duration> {
    let value = metadata.get(GRPC_TIMEOUT_HEADER)?.to_str().ok()?;

    match parse_grpc_timeout(value) {
        Some(timeout) => Some(timeout),
        None => {
            tracing::warn!(value, "ignoring malformed grpc-timeout header");
            None
        }
    }
}
