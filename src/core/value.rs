// Literal parameter values and the scan-target capability used by cursors.
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

/// A literal argument, forwarded verbatim to the executor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Integer(i64::from(value))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Blob(value.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A destination for one column of the current row.
///
/// Cursor implementations call `scan_value` once per target with the column
/// value they decoded; the target decides which shapes it accepts.
pub trait Scan {
    fn scan_value(&mut self, value: &Value) -> Result<(), Error>;
}

fn mismatch(expected: &str, got: &Value) -> Error {
    Error::new(ErrorKind::Usage).with_message(format!(
        "cannot scan {} into {expected}",
        got.type_name()
    ))
}

impl Scan for Value {
    fn scan_value(&mut self, value: &Value) -> Result<(), Error> {
        *self = value.clone();
        Ok(())
    }
}

impl Scan for i64 {
    fn scan_value(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Integer(v) => {
                *self = *v;
                Ok(())
            }
            other => Err(mismatch("i64", other)),
        }
    }
}

impl Scan for i32 {
    fn scan_value(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Integer(v) => {
                *self = i32::try_from(*v).map_err(|err| {
                    Error::new(ErrorKind::Usage)
                        .with_message(format!("integer {v} out of range for i32"))
                        .with_source(err)
                })?;
                Ok(())
            }
            other => Err(mismatch("i32", other)),
        }
    }
}

impl Scan for f64 {
    fn scan_value(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Float(v) => {
                *self = *v;
                Ok(())
            }
            other => Err(mismatch("f64", other)),
        }
    }
}

impl Scan for bool {
    fn scan_value(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Integer(v) => {
                *self = *v != 0;
                Ok(())
            }
            other => Err(mismatch("bool", other)),
        }
    }
}

impl Scan for String {
    fn scan_value(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Text(v) => {
                self.clone_from(v);
                Ok(())
            }
            other => Err(mismatch("String", other)),
        }
    }
}

impl Scan for Vec<u8> {
    fn scan_value(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Blob(v) => {
                self.clone_from(v);
                Ok(())
            }
            Value::Text(v) => {
                *self = v.as_bytes().to_vec();
                Ok(())
            }
            other => Err(mismatch("Vec<u8>", other)),
        }
    }
}

impl<T: Scan + Default> Scan for Option<T> {
    fn scan_value(&mut self, value: &Value) -> Result<(), Error> {
        if matches!(value, Value::Null) {
            *self = None;
            return Ok(());
        }
        let mut inner = T::default();
        inner.scan_value(value)?;
        *self = Some(inner);
        Ok(())
    }
}
