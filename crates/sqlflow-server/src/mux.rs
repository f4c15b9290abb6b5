use crate::{Cancellation, Context, Error, ResultValue};
use proto_sqlflow::sqlflow::Response;
use tokio::sync::mpsc;

/// Sink is the outbound half of a Run response stream.
pub type Sink = mpsc::Sender<tonic::Result<Response>>;

/// Forward ResultValues of `rx` into `sink`, translating each into its
/// outbound Response, until:
///
///  * `rx` closes, which returns the number of forwarded Responses,
///  * an Error value is received, which returns Error::Execution,
///  * a value cannot be translated, which returns Error::ProtocolViolation, or
///  * `ctx` is done or `sink` is closed, which returns Error::Cancelled.
///
/// No further values are read from `rx` once `forward` returns.
/// The caller is responsible for sending a returned Error into `sink`.
pub async fn forward(
    rx: &mut mpsc::Receiver<ResultValue>,
    sink: &Sink,
    ctx: &Context,
) -> Result<usize, Error> {
    let mut translator = Translator::default();
    let mut forwarded = 0;

    loop {
        let value = tokio::select! {
            biased;

            cause = ctx.done() => return Err(Error::Cancelled(cause)),
            _ = sink.closed() => return Err(Error::Cancelled(Cancellation::Client)),
            value = rx.recv() => value,
        };

        let Some(value) = value else {
            return Ok(forwarded);
        };
        tracing::trace!(kind = value.kind(), "forwarding result value");

        let response = translator.translate(value)?;

        tokio::select! {
            biased;

            cause = ctx.done() => return Err(Error::Cancelled(cause)),
            result = sink.send(Ok(response)) => if result.is_err() {
                return Err(Error::Cancelled(Cancellation::Client));
            },
        }
        forwarded += 1;
    }
}

/// Translator maps ResultValues into outbound Responses,
/// tracking the current result-set Schema.
#[derive(Debug, Default)]
pub struct Translator {
    columns: Option<usize>,
}

impl Translator {
    pub fn translate(&mut self, value: ResultValue) -> Result<Response, Error> {
        match value {
            ResultValue::Error(message) => Err(Error::Execution(message)),
            ResultValue::Schema(column_names) => {
                self.columns = Some(column_names.len());
                Ok(Response::head(column_names))
            }
            ResultValue::Row(values) => match self.columns {
                None => Err(Error::ProtocolViolation(
                    "received Row before Schema".to_string(),
                )),
                Some(columns) if columns != values.len() => {
                    Err(Error::ProtocolViolation(format!(
                        "received Row having {} values, but Schema has {columns} columns",
                        values.len()
                    )))
                }
                Some(_) => Ok(Response::row(values.into_iter().map(Into::into).collect())),
            },
            ResultValue::Status(message) | ResultValue::Log(message) => {
                Ok(Response::message(message))
            }
        }
    }
}
