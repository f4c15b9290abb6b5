use crate::{context, mux, Context, Database, Error, Executor, RESPONSE_BUFFER};
use proto_grpc::sqlflow::sql_flow_server::SqlFlow;
use proto_sqlflow::sqlflow::{Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Config of a Service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deadline applied to every request, in addition to the client's own.
    pub request_timeout: Option<Duration>,
    /// How long to wait for an executor to stop after its request completes.
    pub producer_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: None,
            producer_grace: Duration::from_secs(5),
        }
    }
}

/// Service dispatches statements to its Executor,
/// and streams their results back to the caller.
#[derive(Clone)]
pub struct Service {
    executor: Arc<dyn Executor>,
    db: Option<Database>,
    config: Config,
}

impl Service {
    /// Build a new Service.
    /// * `executor`: runs each dispatched statement.
    /// * `db`: connection handle passed to the executor, if any.
    /// * `config`: timeouts of the Service.
    pub fn new<E: Executor>(executor: E, db: Option<Database>, config: Config) -> Self {
        Self {
            executor: Arc::new(executor),
            db,
            config,
        }
    }

    /// Build a tonic Server having this Service.
    pub fn build_tonic_server(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder().add_service(self.into_server())
    }

    pub fn into_server(self) -> proto_grpc::sqlflow::sql_flow_server::SqlFlowServer<Self> {
        proto_grpc::sqlflow::sql_flow_server::SqlFlowServer::new(self)
    }

    /// Dispatch `statement` to the Executor and forward its results into `sink`,
    /// until the results are complete, execution fails, or `ctx` is done.
    ///
    /// Responses which were sent into `sink` before a failure remain valid.
    /// The returned Error is not sent into `sink`: that's up to the caller.
    pub async fn dispatch(
        &self,
        statement: &str,
        ctx: &Context,
        sink: &mux::Sink,
    ) -> Result<(), Error> {
        let () = validate(statement)?;

        let mut producer =
            self.executor
                .execute(statement, self.db.clone(), ctx.token().child_token());

        let outcome = mux::forward(&mut producer.rx, sink, ctx).await;
        producer.finish(self.config.producer_grace).await;

        match &outcome {
            Ok(forwarded) => tracing::debug!(forwarded, "statement completed"),
            Err(Error::Execution(message)) => tracing::debug!(%message, "statement failed"),
            Err(err @ Error::ProtocolViolation(_)) => {
                tracing::error!(error = %err, "executor violated its result protocol")
            }
            Err(err) => tracing::debug!(error = %err, "statement did not complete"),
        }
        outcome.map(|_forwarded| ())
    }

    /// Build the Context of a request, having the earlier of the Service's
    /// and the client's deadlines.
    fn request_context(&self, metadata: &tonic::metadata::MetadataMap) -> Context {
        let mut ctx = Context::new(CancellationToken::new());

        if let Some(timeout) = self.config.request_timeout {
            ctx = ctx.with_timeout(timeout);
        }
        if let Some(timeout) = context::request_timeout(metadata) {
            ctx = ctx.with_timeout(timeout);
        }
        ctx
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("db", &self.db)
            .field("config", &self.config)
            .finish()
    }
}

fn validate(statement: &str) -> Result<(), Error> {
    if statement.trim().is_empty() {
        return Err(Error::InvalidRequest("statement is empty".to_string()));
    }
    Ok(())
}

pub type ResponseStream = tokio_stream::wrappers::ReceiverStream<tonic::Result<Response>>;

#[tonic::async_trait]
impl SqlFlow for Service {
    type RunStream = ResponseStream;

    async fn run(
        &self,
        request: tonic::Request<Request>,
    ) -> tonic::Result<tonic::Response<Self::RunStream>> {
        let ctx = self.request_context(request.metadata());
        let Request { sql } = request.into_inner();

        // Reject invalid requests outright, rather than with a failed stream.
        let () = validate(&sql)?;

        let span = tracing::info_span!("run", id = %uuid::Uuid::new_v4());
        span.in_scope(|| {
            tracing::info!(sql = %sql, deadline = ?ctx.deadline(), "started run request")
        });

        let (sink, sink_rx) = tokio::sync::mpsc::channel(RESPONSE_BUFFER);
        let service = self.clone();

        tokio::spawn(
            async move {
                // Stop the executor if this task is dropped without completing.
                let _guard = ctx.token().clone().drop_guard();

                match service.dispatch(&sql, &ctx, &sink).await {
                    Ok(()) => tracing::info!("run request completed"),
                    Err(err) => {
                        tracing::info!(error = %err, "run request failed");
                        // The client may have gone away, in which case this fails.
                        _ = sink.send(Err(err.into())).await;
                    }
                }
            }
            .instrument(span),
        );

        Ok(tonic::Response::new(ResponseStream::new(sink_rx)))
    }
}
