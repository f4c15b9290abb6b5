use anyhow::Context as _;
use futures::StreamExt;
use proto_grpc::sqlflow::sql_flow_client::SqlFlowClient;
use proto_sqlflow::sqlflow::{self, response};
use std::io::Write;
use std::time::Duration;

pub mod classify;
mod context;
mod error;
mod executor;
mod logging;
pub mod mux;
mod result;
pub mod service;
mod sqlite;

pub use context::{parse_grpc_timeout, Context, GRPC_TIMEOUT_HEADER};
pub use error::{Cancellation, Error};
pub use executor::{Executor, Producer, ResultSender};
pub use logging::{init_logging, LogArgs, LogFormat, LogLevel};
pub use result::{ResultValue, Scalar};
pub use service::Service;
pub use sqlite::{Database, SqliteExecutor};

/// RESULT_BUFFER is the capacity of the channel between an executor and the
/// stream multiplexer. A producer which gets this far ahead of its consumer
/// blocks, which bounds the memory held by a slow client.
pub const RESULT_BUFFER: usize = 16;

/// RESPONSE_BUFFER is the capacity of the channel between the stream
/// multiplexer and the outbound gRPC response stream.
pub const RESPONSE_BUFFER: usize = 16;

/// A gateway which executes SQL statements and streams back their results.
#[derive(Debug, clap::Parser)]
#[clap(author, about, version)]
pub struct Cli {
    #[clap(subcommand)]
    pub cmd: Command,

    #[clap(flatten)]
    pub log_args: LogArgs,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Serve the SQLFlow gRPC service until signaled to exit.
    Serve(ServeArgs),
    /// Run a statement against a SQLFlow server, and print its results.
    Run(RunArgs),
}

#[derive(Debug, clap::Args)]
pub struct ServeArgs {
    /// Address on which to listen for requests.
    #[clap(long, default_value = "0.0.0.0", env = "SQLFLOW_HOST")]
    pub host: String,
    /// Port on which to listen for requests.
    #[clap(long, default_value = "50051", env = "SQLFLOW_PORT")]
    pub port: u16,
    /// SQLite database against which statements are run.
    /// Use ":memory:" for a private, in-memory database.
    #[clap(long, default_value = ":memory:", env = "SQLFLOW_DATABASE")]
    pub database: String,
    /// Deadline of each request, in addition to any deadline of the client.
    #[clap(long, value_parser = humantime::parse_duration, env = "SQLFLOW_REQUEST_TIMEOUT")]
    pub request_timeout: Option<Duration>,
    /// Time allowed for an executor to stop after its request completes.
    #[clap(
        long,
        default_value = "5s",
        value_parser = humantime::parse_duration,
        env = "SQLFLOW_PRODUCER_GRACE"
    )]
    pub producer_grace: Duration,
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Endpoint of the SQLFlow server.
    #[clap(long, default_value = "http://127.0.0.1:50051", env = "SQLFLOW_ENDPOINT")]
    pub endpoint: String,
    /// Deadline of the request.
    #[clap(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
    /// How to format results.
    #[clap(long, short, value_enum, default_value_t = OutputType::Table)]
    pub output: OutputType,
    /// Statement to run.
    pub sql: String,
}

#[derive(clap::ValueEnum, Debug, Copy, Clone, PartialEq)]
pub enum OutputType {
    /// Format result-sets as a pretty-printed table.
    Table,
    /// Format output as compact JSON with items separated by newlines.
    Json,
}

/// Serve SQLFlow until SIGINT or SIGTERM, then stop gracefully
/// after in-flight requests complete.
pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let ServeArgs {
        host,
        port,
        database,
        request_timeout,
        producer_grace,
    } = args;

    let db = Database::open(&database)?;
    let service = Service::new(
        SqliteExecutor,
        Some(db),
        service::Config {
            request_timeout,
            producer_grace,
        },
    );

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    let addr = listener.local_addr()?;

    // Gracefully exit on either SIGINT (ctrl-c) or SIGTERM.
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    let signal = async move {
        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => (),
        }
        tracing::info!("caught signal to exit");
    };

    tracing::info!(%addr, %database, ?request_timeout, "serving SQLFlow");

    let () = service
        .build_tonic_server()
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            signal,
        )
        .await?;

    Ok(())
}

/// Run a statement through the SQLFlow server at `args.endpoint`,
/// writing its results to `out`.
pub async fn run_client(args: RunArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let RunArgs {
        endpoint,
        timeout,
        output,
        sql,
    } = args;

    let mut client = SqlFlowClient::connect(endpoint.clone())
        .await
        .with_context(|| format!("failed to connect to {endpoint}"))?;

    let mut request = tonic::Request::new(sqlflow::Request { sql });
    if let Some(timeout) = timeout {
        request.set_timeout(timeout);
    }
    let mut responses = client.run(request).await?.into_inner();

    let mut printer = Printer::new(output);
    while let Some(response) = responses.next().await {
        let response = match response {
            Ok(response) => response,
            Err(status) => {
                printer.flush(out)?;
                anyhow::bail!("{:?}: {}", status.code(), status.message());
            }
        };
        printer.add(response, out)?;
    }
    printer.flush(out)?;

    Ok(())
}

// Printer accumulates result-sets into tables, or writes JSON lines directly.
struct Printer {
    output: OutputType,
    columns: Vec<String>,
    table: Option<comfy_table::Table>,
}

impl Printer {
    fn new(output: OutputType) -> Self {
        Self {
            output,
            columns: Vec::new(),
            table: None,
        }
    }

    fn add(&mut self, response: sqlflow::Response, out: &mut impl Write) -> anyhow::Result<()> {
        let Some(response) = response.response else {
            return Ok(());
        };

        match (self.output, response) {
            (OutputType::Table, response::Response::Head(head)) => {
                self.flush(out)?;
                self.table = Some(new_table(&head.column_names));
            }
            (OutputType::Table, response::Response::Row(row)) => {
                if let Some(table) = &mut self.table {
                    table.add_row(row.data.iter().map(ToString::to_string));
                }
            }
            (OutputType::Table, response::Response::Message(message)) => {
                self.flush(out)?;
                writeln!(out, "{}", message.message)?;
            }
            (OutputType::Json, response::Response::Head(head)) => {
                self.columns = head.column_names;
            }
            (OutputType::Json, response::Response::Row(row)) => {
                let doc: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.data.iter().map(sqlflow::Value::to_json))
                    .collect();
                serde_json::to_writer(&mut *out, &doc)?;
                out.write_all(b"\n")?;
            }
            (OutputType::Json, response::Response::Message(message)) => {
                serde_json::to_writer(&mut *out, &message)?;
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut impl Write) -> anyhow::Result<()> {
        if let Some(table) = self.table.take() {
            for line in table.lines() {
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

fn new_table(headers: &[String]) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .apply_modifier(comfy_table::modifiers::UTF8_SOLID_INNER_BORDERS);

    table.set_header(headers);
    table
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "sqlflow",
            "serve",
            "--port=8080",
            "--database",
            "/tmp/db.sqlite",
            "--request-timeout=1m 30s",
        ]);
        let Command::Serve(args) = cli.cmd else {
            panic!("expected serve")
        };
        assert_eq!(args.port, 8080);
        assert_eq!(args.database, "/tmp/db.sqlite");
        assert_eq!(args.request_timeout, Some(Duration::from_secs(90)));
        assert_eq!(args.producer_grace, Duration::from_secs(5));

        let cli = Cli::parse_from(["sqlflow", "run", "-o", "json", "SELECT 1"]);
        let Command::Run(args) = cli.cmd else {
            panic!("expected run")
        };
        assert_eq!(args.output, OutputType::Json);
        assert_eq!(args.sql, "SELECT 1");
        assert_eq!(args.timeout, None);
    }

    #[test]
    fn test_json_printing() {
        let mut printer = Printer::new(OutputType::Json);
        let mut out = Vec::new();

        for response in [
            sqlflow::Response::head(["X", "Y"]),
            sqlflow::Response::row(vec![1i64.into(), "one".into()]),
            sqlflow::Response::row(vec![sqlflow::Value::null(), 2.5f64.into()]),
            sqlflow::Response::message("done"),
        ] {
            printer.add(response, &mut out).unwrap();
        }
        printer.flush(&mut out).unwrap();

        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r###"
        {"X":1,"Y":"one"}
        {"X":null,"Y":2.5}
        {"message":"done"}
        "###);
    }

    #[test]
    fn test_table_printing() {
        let mut printer = Printer::new(OutputType::Table);
        let mut out = Vec::new();

        for response in [
            sqlflow::Response::head(["X", "Y"]),
            sqlflow::Response::row(vec![1i64.into(), "one".into()]),
            sqlflow::Response::message("done"),
        ] {
            printer.add(response, &mut out).unwrap();
        }
        printer.flush(&mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[1].contains('X') && lines[1].contains('Y'));
        assert!(lines[3].contains('1') && lines[3].contains("one"));
        assert_eq!(lines.last(), Some(&"done"));
    }
}
