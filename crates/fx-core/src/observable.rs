//! Observability trait for inspecting component state.
//!
//! Verification needs to look inside a unit without disturbing it: busy
//! flags, state machine phases, the accumulator. Queries never affect
//! emulation state.

use std::fmt;

/// A dynamically-typed value for state queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Boolean value (busy flags, readiness).
    Bool(bool),
    /// 8-bit unsigned integer (status bytes, command codes).
    U8(u8),
    /// 32-bit unsigned integer (raw register contents).
    U32(u32),
    /// 32-bit signed integer (sign-extended datapath values).
    I32(i32),
    /// String value (state machine phase names).
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U32(v) => write!(f, "{v:#010X}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// A component whose state can be inspected.
///
/// Paths are hierarchical, separated by dots: `busy`, `mac.accumulator`,
/// `cordic.x`. Returns `None` for unrecognised paths.
pub trait Observable {
    /// Query a specific property by path.
    fn query(&self, path: &str) -> Option<Value>;

    /// List all available query paths.
    fn query_paths(&self) -> &'static [&'static str];
}
