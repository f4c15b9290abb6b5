use proto_sqlflow::sqlflow;

/// ResultValue is a single, typed outcome produced by an Executor while
/// running a statement. A well-formed sequence of ResultValues takes exactly
/// one of the shapes:
///
///  * `[Error]`
///  * `[Schema, Row*]`
///  * `[Status]`
///  * `[Log+]`
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    /// Execution failed. Always the final value of its sequence.
    Error(String),
    /// Names of the columns of a result-set, which precedes its rows.
    Schema(Vec<String>),
    /// A single result-set row, having one Scalar per Schema column.
    Row(Vec<Scalar>),
    /// Success summary of a non-query statement.
    Status(String),
    /// Progress line of an extended statement.
    Log(String),
}

impl ResultValue {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn schema<I, S>(column_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Schema(column_names.into_iter().map(Into::into).collect())
    }

    pub fn row<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self::Row(values.into_iter().map(Into::into).collect())
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status(message.into())
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::Log(message.into())
    }

    /// Short name of this value's variant, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error(_) => "Error",
            Self::Schema(_) => "Schema",
            Self::Row(_) => "Row",
            Self::Status(_) => "Status",
            Self::Log(_) => "Log",
        }
    }
}

/// Scalar is an opaque column value of a result-set Row.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<Scalar> for sqlflow::Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Null => sqlflow::Value::null(),
            Scalar::Bool(b) => b.into(),
            Scalar::Int(i) => i.into(),
            Scalar::Float(f) => f.into(),
            Scalar::Text(s) => s.into(),
            Scalar::Bytes(b) => b.into(),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl From<rusqlite::types::Value> for Scalar {
    fn from(v: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value;

        match v {
            Value::Null => Self::Null,
            Value::Integer(i) => Self::Int(i),
            Value::Real(f) => Self::Float(f),
            Value::Text(s) => Self::Text(s),
            Value::Blob(b) => Self::Bytes(b),
        }
    }
}
