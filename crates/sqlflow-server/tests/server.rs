use futures::StreamExt;
use proto_grpc::sqlflow::sql_flow_client::SqlFlowClient;
use proto_sqlflow::sqlflow::{Request, Response};
use sqlflow_server::{service, Database, Producer, ResultValue, Service, SqliteExecutor};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ERROR_SQL: &str = "ERROR ...";
const QUERY_SQL: &str = "SELECT ...";
const EXECUTE_SQL: &str = "INSERT ...";
const EXTENDED_SQL: &str = "SELECT ... TRAIN ...";
const SLOW_SQL: &str = "SLOW ...";

fn mock_run(sql: &str, _db: Option<Database>, cancel: CancellationToken) -> Producer {
    let sql = sql.to_string();

    Producer::spawn(cancel, move |tx| async move {
        let values = match sql.as_str() {
            ERROR_SQL => vec![ResultValue::error(format!("run error: {sql}"))],
            QUERY_SQL => {
                let mut values = vec![ResultValue::schema(["X", "Y"])];
                values.extend((1..=4i64).map(|n| ResultValue::row([n, n])));
                values
            }
            EXECUTE_SQL => vec![ResultValue::status("success; 0 rows affected")],
            EXTENDED_SQL => (0..4)
                .map(|n| ResultValue::log(format!("log {n}")))
                .collect(),
            SLOW_SQL => {
                tx.send(ResultValue::log("started")).await;
                tx.cancelled().await;
                return;
            }
            _ => Vec::new(),
        };

        for value in values {
            if !tx.send(value).await {
                break;
            }
        }
    })
}

// Serve `service` on an ephemeral port, returning a connected client
// and a sender which stops the server when dropped.
async fn start(
    service: Service,
) -> (
    SqlFlowClient<tonic::transport::Channel>,
    tokio::sync::oneshot::Sender<()>,
) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(
        service.build_tonic_server().serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                _ = stop_rx.await;
            },
        ),
    );

    let client = SqlFlowClient::connect(format!("http://{addr}"))
        .await
        .unwrap();
    (client, stop_tx)
}

async fn run(
    client: &mut SqlFlowClient<tonic::transport::Channel>,
    sql: &str,
) -> (Vec<Response>, Option<tonic::Status>) {
    let mut stream = client
        .run(Request {
            sql: sql.to_string(),
        })
        .await
        .unwrap()
        .into_inner();

    let mut responses = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(response) => responses.push(response),
            Err(status) => return (responses, Some(status)),
        }
    }
    (responses, None)
}

#[tokio::test]
async fn test_sql() {
    let (mut client, _stop) =
        start(Service::new(mock_run, None, service::Config::default())).await;

    let (responses, status) = run(&mut client, ERROR_SQL).await;
    assert!(responses.is_empty());
    let status = status.unwrap();
    assert_eq!(status.code(), tonic::Code::Unknown);
    assert_eq!(status.message(), "run error: ERROR ...");

    let (responses, status) = run(&mut client, QUERY_SQL).await;
    assert!(status.is_none());
    insta::assert_json_snapshot!(responses, @r###"
    [
      {
        "response": {
          "head": {
            "columnNames": [
              "X",
              "Y"
            ]
          }
        }
      },
      {
        "response": {
          "row": {
            "data": [
              {
                "kind": {
                  "int64Value": 1
                }
              },
              {
                "kind": {
                  "int64Value": 1
                }
              }
            ]
          }
        }
      },
      {
        "response": {
          "row": {
            "data": [
              {
                "kind": {
                  "int64Value": 2
                }
              },
              {
                "kind": {
                  "int64Value": 2
                }
              }
            ]
          }
        }
      },
      {
        "response": {
          "row": {
            "data": [
              {
                "kind": {
                  "int64Value": 3
                }
              },
              {
                "kind": {
                  "int64Value": 3
                }
              }
            ]
          }
        }
      },
      {
        "response": {
          "row": {
            "data": [
              {
                "kind": {
                  "int64Value": 4
                }
              },
              {
                "kind": {
                  "int64Value": 4
                }
              }
            ]
          }
        }
      }
    ]
    "###);

    let (responses, status) = run(&mut client, EXECUTE_SQL).await;
    assert!(status.is_none());
    assert_eq!(responses, vec![Response::message("success; 0 rows affected")]);

    let (responses, status) = run(&mut client, EXTENDED_SQL).await;
    assert!(status.is_none());
    assert_eq!(
        responses,
        (0..4)
            .map(|n| Response::message(format!("log {n}")))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_empty_statement_is_invalid() {
    let (mut client, _stop) =
        start(Service::new(mock_run, None, service::Config::default())).await;

    let status = client
        .run(Request { sql: " ".to_string() })
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
}

#[tokio::test]
async fn test_client_deadline() {
    let (mut client, _stop) =
        start(Service::new(mock_run, None, service::Config::default())).await;

    let mut request = tonic::Request::new(Request {
        sql: SLOW_SQL.to_string(),
    });
    request.set_timeout(Duration::from_millis(200));

    let mut stream = client.run(request).await.unwrap().into_inner();

    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        Response::message("started")
    );
    let status = stream.next().await.unwrap().unwrap_err();
    assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
}

#[tokio::test]
async fn test_server_deadline() {
    let (mut client, _stop) = start(Service::new(
        mock_run,
        None,
        service::Config {
            request_timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        },
    ))
    .await;

    let (responses, status) = run(&mut client, SLOW_SQL).await;
    assert_eq!(responses, vec![Response::message("started")]);
    assert_eq!(status.unwrap().code(), tonic::Code::DeadlineExceeded);
}

#[tokio::test]
async fn test_sqlite() {
    let db = Database::open(":memory:").unwrap();
    let (mut client, _stop) = start(Service::new(
        SqliteExecutor,
        Some(db),
        service::Config::default(),
    ))
    .await;

    let (responses, status) =
        run(&mut client, "CREATE TABLE t (name TEXT, n INTEGER)").await;
    assert!(status.is_none());
    assert_eq!(responses, vec![Response::message("success; 0 rows affected")]);

    let (responses, status) =
        run(&mut client, "INSERT INTO t VALUES ('one', 1), ('two', 2)").await;
    assert!(status.is_none());
    assert_eq!(responses, vec![Response::message("success; 2 rows affected")]);

    let (responses, status) = run(&mut client, "SELECT name, n FROM t ORDER BY n").await;
    assert!(status.is_none());
    assert_eq!(
        responses,
        vec![
            Response::head(["name", "n"]),
            Response::row(vec!["one".into(), 1i64.into()]),
            Response::row(vec!["two".into(), 2i64.into()]),
        ]
    );

    let (responses, status) = run(&mut client, "SELECT * FROM missing").await;
    assert!(responses.is_empty());
    let status = status.unwrap();
    assert_eq!(status.code(), tonic::Code::Unknown);
    assert_eq!(status.message(), "run error: no such table: missing");
}

#[tokio::test]
async fn test_dropped_stream_cancels_the_executor() {
    let stopped = std::sync::Arc::new(tokio::sync::Notify::new());

    let stopped_clone = stopped.clone();
    let executor = move |_sql: &str, _db: Option<Database>, cancel: CancellationToken| {
        let stopped = stopped_clone.clone();

        Producer::spawn(cancel.clone(), move |tx| async move {
            let mut n = 0;
            while tx.send(ResultValue::log(format!("log {n}"))).await {
                n += 1;
            }
            cancel.cancelled().await;
            stopped.notify_one();
        })
    };
    let (mut client, _stop) =
        start(Service::new(executor, None, service::Config::default())).await;

    let mut stream = client
        .run(Request {
            sql: EXTENDED_SQL.to_string(),
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        Response::message("log 0")
    );
    std::mem::drop(stream);

    tokio::time::timeout(Duration::from_secs(5), stopped.notified())
        .await
        .expect("the executor is cancelled after the client goes away");
}
