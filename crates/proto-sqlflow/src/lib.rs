pub mod sqlflow;

use sqlflow::{response, value};

impl sqlflow::Response {
    /// Build a Response which opens a result-set having `column_names`.
    pub fn head<I, S>(column_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            response: Some(response::Response::Head(sqlflow::Head {
                column_names: column_names.into_iter().map(Into::into).collect(),
            })),
        }
    }

    /// Build a Response holding a single result-set row.
    pub fn row(data: Vec<sqlflow::Value>) -> Self {
        Self {
            response: Some(response::Response::Row(sqlflow::Row { data })),
        }
    }

    /// Build a Response holding a status summary or log line.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            response: Some(response::Response::Message(sqlflow::Message {
                message: message.into(),
            })),
        }
    }
}

impl sqlflow::Value {
    pub fn null() -> Self {
        Self {
            kind: Some(value::Kind::NullValue(true)),
        }
    }

    /// Returns true if this Value is SQL NULL.
    /// An unset `kind` is also treated as NULL.
    pub fn is_null(&self) -> bool {
        matches!(self.kind, None | Some(value::Kind::NullValue(_)))
    }

    /// Map this Value into an equivalent serde_json::Value.
    /// Bytes are mapped into an array of their octets.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;

        match &self.kind {
            None | Some(value::Kind::NullValue(_)) => J::Null,
            Some(value::Kind::BoolValue(b)) => J::Bool(*b),
            Some(value::Kind::Int64Value(i)) => J::from(*i),
            Some(value::Kind::DoubleValue(f)) => J::from(*f),
            Some(value::Kind::StringValue(s)) => J::String(s.clone()),
            Some(value::Kind::BytesValue(b)) => J::from(b.clone()),
        }
    }
}

impl std::fmt::Display for sqlflow::Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            None | Some(value::Kind::NullValue(_)) => f.write_str("NULL"),
            Some(value::Kind::BoolValue(b)) => write!(f, "{b}"),
            Some(value::Kind::Int64Value(i)) => write!(f, "{i}"),
            Some(value::Kind::DoubleValue(d)) => write!(f, "{d}"),
            Some(value::Kind::StringValue(s)) => f.write_str(s),
            Some(value::Kind::BytesValue(b)) => {
                f.write_str("x'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
        }
    }
}

impl From<i64> for sqlflow::Value {
    fn from(v: i64) -> Self {
        Self {
            kind: Some(value::Kind::Int64Value(v)),
        }
    }
}

impl From<f64> for sqlflow::Value {
    fn from(v: f64) -> Self {
        Self {
            kind: Some(value::Kind::DoubleValue(v)),
        }
    }
}

impl From<bool> for sqlflow::Value {
    fn from(v: bool) -> Self {
        Self {
            kind: Some(value::Kind::BoolValue(v)),
        }
    }
}

impl From<String> for sqlflow::Value {
    fn from(v: String) -> Self {
        Self {
            kind: Some(value::Kind::StringValue(v)),
        }
    }
}

impl From<&str> for sqlflow::Value {
    fn from(v: &str) -> Self {
        v.to_string().into()
    }
}

impl From<Vec<u8>> for sqlflow::Value {
    fn from(v: Vec<u8>) -> Self {
        Self {
            kind: Some(value::Kind::BytesValue(v)),
        }
    }
}
