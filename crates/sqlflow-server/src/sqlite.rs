use crate::classify::{classify, Classified, Kind};
use crate::{Executor, Producer, ResultSender, ResultValue, Scalar};
use anyhow::Context;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Number of SQLite virtual machine instructions between checks
/// of a running statement's cancellation.
const PROGRESS_INTERVAL: std::os::raw::c_int = 1000;

/// Database is a shared handle to an SQLite connection.
/// Statements hold the connection exclusively while they run.
#[derive(Clone)]
pub struct Database(Arc<Mutex<Connection>>);

impl Database {
    /// Open the SQLite database at `uri`, which may be ":memory:".
    pub fn open(uri: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(uri)
            .with_context(|| format!("failed to open SQLite database {uri:?}"))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self(Arc::new(Mutex::new(conn)))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// SqliteExecutor runs statements against a Database:
///
///  * Queries produce a Schema and a Row for each result-set row.
///  * Other standard statements produce a Status of the rows they affected.
///  * Extended statements are planned as a dry run: their standard SELECT is
///    evaluated, and the would-be job is described through Log lines.
///
/// Any failure produces a final Error.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteExecutor;

impl Executor for SqliteExecutor {
    fn execute(
        &self,
        statement: &str,
        db: Option<Database>,
        cancel: CancellationToken,
    ) -> Producer {
        let statement = statement.to_string();

        Producer::spawn(cancel.clone(), move |tx| async move {
            let Some(db) = db else {
                tx.send(ResultValue::error("no database connection")).await;
                return;
            };

            // Wait for exclusive use of the connection, unless cancelled first.
            let conn = tokio::select! {
                biased;

                _ = tx.cancelled() => {
                    tracing::debug!("statement was cancelled while waiting for the connection");
                    return;
                }
                conn = db.0.clone().lock_owned() => conn,
            };

            let task = tokio::task::spawn_blocking(move || {
                // Interrupt a running statement once it's cancelled,
                // even if it's not producing rows.
                let interrupt = std::panic::AssertUnwindSafe(cancel);
                conn.progress_handler(PROGRESS_INTERVAL, Some(move || interrupt.is_cancelled()));

                run_statement(&conn, &statement, &tx);

                conn.progress_handler(0, None::<fn() -> bool>);
            });

            if let Err(err) = task.await {
                tracing::error!(error = %err, "SQLite statement task failed");
            }
        })
    }
}

fn run_statement(conn: &Connection, statement: &str, tx: &ResultSender) {
    let classified = classify(statement);
    tracing::debug!(kind = ?classified.kind, "executing statement");

    let result = match classified.kind {
        Kind::Query => run_query(conn, classified.standard, tx),
        Kind::Execute => run_execute(conn, classified.standard, tx),
        Kind::Extended => run_extended(conn, &classified, tx),
    };

    if tx.is_cancelled() {
        tracing::debug!("statement was cancelled");
    } else if let Err(err) = result {
        tracing::debug!(error = format!("{err:#}"), "statement failed");
        tx.blocking_send(ResultValue::error(err.to_string()));
    }
}

fn run_query(conn: &Connection, sql: &str, tx: &ResultSender) -> anyhow::Result<()> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    if !tx.blocking_send(ResultValue::Schema(columns)) {
        return Ok(());
    }

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|index| row.get::<_, rusqlite::types::Value>(index).map(Scalar::from))
            .collect::<Result<Vec<_>, _>>()?;

        if !tx.blocking_send(ResultValue::Row(values)) {
            break;
        }
    }
    Ok(())
}

fn run_execute(conn: &Connection, sql: &str, tx: &ResultSender) -> anyhow::Result<()> {
    let affected = conn.execute(sql, [])?;
    tx.blocking_send(ResultValue::status(format!(
        "success; {affected} rows affected"
    )));
    Ok(())
}

fn run_extended(
    conn: &Connection,
    Classified {
        standard, extended, ..
    }: &Classified<'_>,
    tx: &ResultSender,
) -> anyhow::Result<()> {
    let mut clause = extended.split_whitespace();
    let verb = clause.next().unwrap_or_default().to_ascii_uppercase();
    let target = clause.next().unwrap_or_default();

    if standard.is_empty() {
        anyhow::bail!("{verb} requires a preceding SELECT statement");
    }
    if target.is_empty() {
        anyhow::bail!("{verb} is missing its model or target");
    }

    let lines = [
        format!("extended statement: {verb} {target}"),
        format!("standard select: {standard}"),
    ];
    for line in lines {
        if !tx.blocking_send(ResultValue::Log(line)) {
            return Ok(());
        }
    }

    let columns: Vec<String> = conn
        .prepare(standard)?
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM ({standard})"),
        [],
        |row| row.get(0),
    )?;

    let lines = [
        format!(
            "selected {count} rows with columns: {}",
            columns.join(", ")
        ),
        "dry run: the job was planned but not submitted".to_string(),
    ];
    for line in lines {
        if !tx.blocking_send(ResultValue::Log(line)) {
            return Ok(());
        }
    }
    Ok(())
}
