//! Shared vocabulary types and the crate error taxonomy.

use crate::record::Kind;

/// A small key/value map attached to every transition.
///
/// Environments report per-step metadata here (time-limit truncation,
/// debugging counters, ...). Keys are kept in insertion order so batched
/// records stay reproducible.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Info {
    entries: Vec<(String, InfoValue)>,
}

impl Info {
    /// Create an empty info map.
    pub fn new() -> Self { Self { entries: Vec::new() } }

    /// Insert or replace a key.
    pub fn insert<K: Into<String>>(&mut self, key: K, value: impl Into<InfoValue>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value.into(),
            None => self.entries.push((key, value.into())),
        }
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Number of entries.
    pub fn len(&self) -> usize { self.entries.len() }
}

/// Value types commonly found in info maps.
#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
}

impl From<bool> for InfoValue { fn from(v: bool) -> Self { InfoValue::Bool(v) } }
impl From<i64> for InfoValue { fn from(v: i64) -> Self { InfoValue::I64(v) } }
impl From<i32> for InfoValue { fn from(v: i32) -> Self { InfoValue::I64(v as i64) } }
impl From<f64> for InfoValue { fn from(v: f64) -> Self { InfoValue::F64(v) } }
impl From<f32> for InfoValue { fn from(v: f32) -> Self { InfoValue::F64(v as f64) } }
impl From<&str> for InfoValue { fn from(v: &str) -> Self { InfoValue::Str(v.to_string()) } }
impl From<String> for InfoValue { fn from(v: String) -> Self { InfoValue::Str(v) } }

/// A frame returned by `Env::render`.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderFrame {
    /// Textual representation (e.g., ASCII art or a debug string).
    Text(String),
    /// Raw pixel buffer in row-major RGB or RGBA format.
    Pixels { width: u32, height: u32, data: Vec<u8> },
}

/// Errors raised by the sparse-record merge and scatter operations.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("field `{key}`: kind changed from {expected} to {found}")]
    KindMismatch { key: String, expected: Kind, found: Kind },
    #[error("field `{key}`: {len} values cannot be scattered through {indices} indices")]
    IndexMismatch { key: String, len: usize, indices: usize },
}

/// Errors raised by the collector. All of these abort the current call;
/// none of them leave partial statistics behind.
#[derive(thiserror::Error, Debug)]
pub enum CollectError {
    #[error("collection target must be positive")]
    EmptyTarget,
    #[error("per-environment episode target has {got} entries for {envs} environments")]
    TargetLength { got: usize, envs: usize },
    #[error("random action sampling cannot be used with an asynchronous environment layer")]
    RandomWithAsync,
    #[error("aggregate reward has {dims} components and no reward metric is configured")]
    NonScalarReward { dims: usize },
    #[error("no replay buffer is configured")]
    NoBuffer,
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Convenience alias for results using `CollectError`.
pub type Result<T> = std::result::Result<T, CollectError>;
