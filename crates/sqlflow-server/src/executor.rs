use crate::{Database, ResultValue, RESULT_BUFFER};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Executor runs a statement against an (optional) Database, producing an
/// ordered sequence of ResultValues from a concurrent task.
///
/// `execute` never fails directly: a statement which is invalid or fails,
/// as well as a missing or unusable `db`, is reported as a final
/// ResultValue::Error of the returned Producer.
///
/// Implementations must observe `cancel` (directly, or through the
/// ResultSender) and stop promptly once it fires.
pub trait Executor: Send + Sync + 'static {
    fn execute(
        &self,
        statement: &str,
        db: Option<Database>,
        cancel: CancellationToken,
    ) -> Producer;
}

impl<F> Executor for F
where
    F: Fn(&str, Option<Database>, CancellationToken) -> Producer + Send + Sync + 'static,
{
    fn execute(
        &self,
        statement: &str,
        db: Option<Database>,
        cancel: CancellationToken,
    ) -> Producer {
        self(statement, db, cancel)
    }
}

/// Producer is the consuming handle of a running execution.
/// It owns the receiving half of the execution's result channel,
/// which is closed once the producing task has finished.
pub struct Producer {
    pub(crate) rx: mpsc::Receiver<ResultValue>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl Producer {
    /// Spawn `produce` as a concurrent task which sends into a new Producer.
    /// The Producer's channel closes when `produce` resolves.
    pub fn spawn<F, Fut>(cancel: CancellationToken, produce: F) -> Self
    where
        F: FnOnce(ResultSender) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(RESULT_BUFFER);
        let sender = ResultSender {
            tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(produce(sender));

        Self { rx, cancel, task }
    }

    /// Spawn blocking `produce` onto the blocking thread pool,
    /// which sends into a new Producer using ResultSender::blocking_send.
    /// The Producer's channel closes when `produce` returns.
    pub fn spawn_blocking<F>(cancel: CancellationToken, produce: F) -> Self
    where
        F: FnOnce(ResultSender) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(RESULT_BUFFER);
        let sender = ResultSender {
            tx,
            cancel: cancel.clone(),
        };
        let task = tokio::task::spawn_blocking(move || produce(sender));

        Self { rx, cancel, task }
    }

    /// Build a Producer which yields the fixed sequence of `values`.
    pub fn from_values(values: Vec<ResultValue>) -> Self {
        Self::spawn(CancellationToken::new(), move |tx| async move {
            for value in values {
                if !tx.send(value).await {
                    break;
                }
            }
        })
    }

    /// Release this Producer: signal its task to stop, close the result
    /// channel, and wait up to `grace` for the task to exit.
    /// A task which doesn't exit in time is detached.
    pub async fn finish(self, grace: Duration) {
        let Self {
            rx,
            cancel,
            mut task,
        } = self;

        cancel.cancel();
        // Dropping the receiver unblocks a producer waiting on a full channel.
        std::mem::drop(rx);

        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => (),
            Ok(Err(err)) if err.is_panic() => {
                tracing::error!(error = %err, "executor task panicked");
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "executor task was aborted");
            }
            Err(_elapsed) => {
                tracing::warn!(
                    grace = ?grace,
                    "executor task didn't exit after cancellation; detaching it"
                );
            }
        }
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

/// ResultSender is the producing half of a Producer's result channel.
/// The channel closes when the ResultSender is dropped.
pub struct ResultSender {
    tx: mpsc::Sender<ResultValue>,
    cancel: CancellationToken,
}

impl ResultSender {
    /// Send `value` to the consumer, waiting for channel capacity.
    /// Returns false if the execution was cancelled or the consumer has
    /// gone away, in which case the producer should stop.
    pub async fn send(&self, value: ResultValue) -> bool {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => false,
            result = self.tx.send(value) => result.is_ok(),
        }
    }

    /// Send `value` from a blocking context. Semantics match `send`.
    /// This must not be called from within an asynchronous runtime context.
    pub fn blocking_send(&self, value: ResultValue) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.blocking_send(value).is_ok()
    }

    /// Returns true if the producer should stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the producer should stop.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => (),
            _ = self.tx.closed() => (),
        }
    }
}
