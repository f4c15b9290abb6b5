use prost::Message;
use proto_sqlflow::sqlflow::{self, response, value};

fn ex_rows() -> Vec<sqlflow::Response> {
    vec![
        sqlflow::Response::head(["X", "Y", "Z"]),
        sqlflow::Response::row(vec![
            1i64.into(),
            2.5f64.into(),
            "three".into(),
        ]),
        sqlflow::Response::row(vec![
            sqlflow::Value::null(),
            true.into(),
            vec![0xca, 0xfe].into(),
        ]),
        sqlflow::Response::message("success; 2 rows affected"),
    ]
}

#[test]
fn test_response_wire_round_trip() {
    for response in ex_rows() {
        let encoded = response.encode_to_vec();
        let decoded = sqlflow::Response::decode(encoded.as_slice()).unwrap();
        assert_eq!(decoded, response);
    }
}

#[test]
fn test_response_json() {
    insta::assert_json_snapshot!(ex_rows(), @r###"
    [
      {
        "response": {
          "head": {
            "columnNames": [
              "X",
              "Y",
              "Z"
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
                  "doubleValue": 2.5
                }
              },
              {
                "kind": {
                  "stringValue": "three"
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
                  "nullValue": true
                }
              },
              {
                "kind": {
                  "boolValue": true
                }
              },
              {
                "kind": {
                  "bytesValue": [
                    202,
                    254
                  ]
                }
              }
            ]
          }
        }
      },
      {
        "response": {
          "message": {
            "message": "success; 2 rows affected"
          }
        }
      }
    ]
    "###);
}

#[test]
fn test_value_rendering() {
    let row = match ex_rows().swap_remove(2).response {
        Some(response::Response::Row(row)) => row,
        other => panic!("unexpected {other:?}"),
    };
    let rendered: Vec<String> = row.data.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["NULL", "true", "x'cafe'"]);

    let json: Vec<serde_json::Value> = row.data.iter().map(sqlflow::Value::to_json).collect();
    assert_eq!(json, vec![serde_json::json!(null), serde_json::json!(true), serde_json::json!([202, 254])]);

    assert!(sqlflow::Value { kind: None }.is_null());
    assert!(!sqlflow::Value {
        kind: Some(value::Kind::Int64Value(0))
    }
    .is_null());
}
