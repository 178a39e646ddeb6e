use super::{Result, ShardError};
use serde_json::Value as JsonValue;
use std::fmt;

/// Zero-based virtual shard index in `[0, shard_count)`.
pub type ShardIndex = u32;

/// Routing key accepted by the shard resolver.
///
/// Integers route by absolute value modulo the shard count, text routes
/// through the configured hash strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShardKey {
    Integer(i64),
    Text(String),
}

impl ShardKey {
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_))
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Text(value) => write!(f, "'{}'", value),
        }
    }
}

macro_rules! impl_integer_key {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ShardKey {
                fn from(value: $ty) -> Self {
                    Self::Integer(i64::from(value))
                }
            }
        )*
    };
}

impl_integer_key!(i8, i16, i32, i64, u8, u16, u32);

impl From<&str> for ShardKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ShardKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ShardKey {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl TryFrom<f64> for ShardKey {
    type Error = ShardError;

    fn try_from(value: f64) -> Result<Self> {
        integral_f64(value)
            .map(Self::Integer)
            .ok_or_else(|| ShardError::InvalidKey(format!("{} is not an integer", value)))
    }
}

impl TryFrom<&JsonValue> for ShardKey {
    type Error = ShardError;

    fn try_from(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(text) => Ok(Self::Text(text.clone())),
            JsonValue::Number(number) => match number.as_i64() {
                Some(integer) => Ok(Self::Integer(integer)),
                None => match number.as_f64() {
                    Some(float) => Self::try_from(float),
                    None => Err(ShardError::InvalidKey(format!(
                        "{} is not an integer",
                        number
                    ))),
                },
            },
            other => Err(ShardError::InvalidKey(format!(
                "shard key must be a string or integer, got {}",
                json_type_name(other)
            ))),
        }
    }
}

/// Converts a floating point shard index into an integer index.
///
/// Fractional, NaN and infinite values are rejected.
pub fn shard_index_from_f64(value: f64) -> Result<i64> {
    integral_f64(value).ok_or_else(|| {
        ShardError::InvalidShardIndex(format!("non-integer shard index ({}) is invalid", value))
    })
}

fn integral_f64(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or beyond it does not fit in i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if !value.is_finite() || value.fract() != 0.0 || value >= LIMIT || value < -LIMIT {
        return None;
    }
    Some(value as i64)
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
