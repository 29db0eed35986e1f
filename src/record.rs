//! Sparse, hierarchical, partially-initialized records.
//!
//! A `Record` holds one column per transition field. Columns start out as
//! placeholders and are only materialized once a concrete value is seen, so
//! environment counts, reward shapes and info key sets never need to be known
//! up front. `select` and `scatter_into` are the two index-aware operations
//! the collector relies on to multiplex asynchronous subsets in and out of the
//! full-width record.

use std::fmt;

use crate::core::{Info, RecordError};

/// The reserved transition fields, in canonical order.
pub const TRANSITION_KEYS: [&str; 8] =
    ["state", "obs", "act", "rew", "done", "info", "obs_next", "policy"];

/// Names the concrete representation behind a column, for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Empty,
    Bool,
    Int,
    Float,
    FloatVec,
    Hidden,
    Info,
    Nested,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Empty => "empty",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::FloatVec => "float-vec",
            Kind::Hidden => "hidden",
            Kind::Info => "info",
            Kind::Nested => "nested",
        };
        f.write_str(name)
    }
}

/// One environment slot's worth of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    FloatVec(Vec<f32>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::FloatVec(_) => Kind::FloatVec,
        }
    }

    /// A zero of the same shape and kind, used as the lazy-materialization
    /// template when a partial column is scattered into a full-width one.
    pub fn zero_like(&self) -> Value {
        match self {
            Value::Bool(_) => Value::Bool(false),
            Value::Int(_) => Value::Int(0),
            Value::Float(_) => Value::Float(0.0),
            Value::FloatVec(v) => Value::FloatVec(vec![0.0; v.len()]),
        }
    }

    /// Number of scalar components, as seen by additive noise.
    pub fn numel(&self) -> usize {
        match self {
            Value::Float(_) => 1,
            Value::FloatVec(v) => v.len(),
            _ => 0,
        }
    }

    /// Add a noise sample component-wise. Non-numeric values are left alone.
    pub fn add_noise(&mut self, noise: &[f32]) {
        match self {
            Value::Float(x) => {
                if let Some(n) = noise.first() {
                    *x += n;
                }
            }
            Value::FloatVec(xs) => {
                for (x, n) in xs.iter_mut().zip(noise) {
                    *x += n;
                }
            }
            _ => {}
        }
    }

    /// Element-wise accumulation, used to sum rewards across an episode.
    /// Mismatched kinds report the offending pair.
    pub fn add_assign(&mut self, other: &Value) -> std::result::Result<(), (Kind, Kind)> {
        match (&mut *self, other) {
            (Value::Int(a), Value::Int(b)) => *a += b,
            (Value::Float(a), Value::Float(b)) => *a += b,
            (Value::FloatVec(a), Value::FloatVec(b)) if a.len() == b.len() => {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
            }
            (a, b) => return Err((a.kind(), b.kind())),
        }
        Ok(())
    }

    /// Flatten to scalar components (used by reward scalarization).
    pub fn to_f32s(&self) -> Vec<f32> {
        match self {
            Value::Bool(b) => vec![if *b { 1.0 } else { 0.0 }],
            Value::Int(i) => vec![*i as f32],
            Value::Float(x) => vec![*x],
            Value::FloatVec(v) => v.clone(),
        }
    }
}

/// The policy's recurrent memory for one environment slot.
///
/// `Empty` means "no hidden state yet" (a fresh slot that has never been
/// stepped), which is distinct from a zero-valued state: `reset` zeroes a
/// concrete representation in place and leaves `Empty` untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Hidden {
    #[default]
    Empty,
    Vector(Vec<f32>),
}

impl Hidden {
    pub fn is_empty(&self) -> bool { matches!(self, Hidden::Empty) }

    /// Reset this slot's memory at an episode boundary.
    pub fn reset(&mut self) {
        if let Hidden::Vector(v) = self {
            v.iter_mut().for_each(|x| *x = 0.0);
        }
    }
}

/// One field of a batched record: a placeholder, or a stacked sequence with
/// one entry per environment position.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Column {
    #[default]
    Empty,
    Values(Vec<Value>),
    Hidden(Vec<Hidden>),
    Infos(Vec<Info>),
    Nested(Record),
}

impl Column {
    pub fn bools(v: Vec<bool>) -> Column {
        Column::Values(v.into_iter().map(Value::Bool).collect())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Column::Empty => Kind::Empty,
            Column::Values(v) => v.first().map_or(Kind::Empty, Value::kind),
            Column::Hidden(_) => Kind::Hidden,
            Column::Infos(_) => Kind::Info,
            Column::Nested(_) => Kind::Nested,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Empty => 0,
            Column::Values(v) => v.len(),
            Column::Hidden(v) => v.len(),
            Column::Infos(v) => v.len(),
            Column::Nested(r) => r.len(),
        }
    }

    /// Whether this field is still a placeholder.
    pub fn is_empty(&self) -> bool {
        match self {
            Column::Empty => true,
            Column::Nested(r) => r.is_empty(),
            c => c.len() == 0,
        }
    }

    fn select(&self, indices: &[usize]) -> Column {
        match self {
            Column::Empty => Column::Empty,
            Column::Values(v) => Column::Values(indices.iter().map(|&i| v[i].clone()).collect()),
            Column::Hidden(v) => Column::Hidden(indices.iter().map(|&i| v[i].clone()).collect()),
            Column::Infos(v) => Column::Infos(indices.iter().map(|&i| v[i].clone()).collect()),
            Column::Nested(r) => Column::Nested(r.select(indices)),
        }
    }
}

/// A string-keyed map of columns, in insertion order.
///
/// Both a single transition (columns of length one) and a batch of N
/// transitions (columns of length N) are records; the collector's working
/// record and the auxiliary `policy` output use the same structure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Column)>,
}

static EMPTY_COLUMN: Column = Column::Empty;

impl Record {
    pub fn new() -> Self { Self { fields: Vec::new() } }

    /// The eight-field transition template, every field a placeholder.
    pub fn transition() -> Self {
        let fields = TRANSITION_KEYS
            .iter()
            .map(|k| ((*k).to_string(), Column::Empty))
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Column> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Column> {
        self.fields.iter_mut().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    /// Like `get`, but missing fields read as placeholders.
    pub fn column(&self, key: &str) -> &Column {
        self.get(key).unwrap_or(&EMPTY_COLUMN)
    }

    /// Insert or replace a field wholesale.
    pub fn set<K: Into<String>>(&mut self, key: K, column: Column) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, c)) => *c = column,
            None => self.fields.push((key, column)),
        }
    }

    fn entry(&mut self, key: &str) -> &mut Column {
        let pos = match self.fields.iter().position(|(k, _)| k == key) {
            Some(pos) => pos,
            None => {
                self.fields.push((key.to_string(), Column::Empty));
                self.fields.len() - 1
            }
        };
        &mut self.fields[pos].1
    }

    /// Whether every field is still a placeholder.
    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, c)| c.is_empty())
    }

    /// Number of environment positions covered (the widest column).
    pub fn len(&self) -> usize {
        self.fields.iter().map(|(_, c)| c.len()).max().unwrap_or(0)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.fields.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Restrict to the given environment positions, preserving per-field
    /// emptiness. Indices must be in range for every materialized column.
    pub fn select(&self, indices: &[usize]) -> Record {
        let fields = self
            .fields
            .iter()
            .map(|(k, c)| (k.clone(), c.select(indices)))
            .collect();
        Record { fields }
    }

    /// A single-position slice, as a record of length-one columns.
    pub fn row(&self, index: usize) -> Record {
        self.select(&[index])
    }

    /// Overwrite-merge: every non-placeholder field of `patch` replaces the
    /// corresponding field here. Placeholder fields in `patch` are ignored.
    pub fn merge(&mut self, patch: Record) {
        for (key, column) in patch.fields {
            if !column.is_empty() {
                self.set(key, column);
            }
        }
    }

    /// Write this record's fields into `target` at the given positions.
    ///
    /// For every non-placeholder field here, a missing or placeholder field
    /// in `target` is first materialized at full width (`size`) using this
    /// record's first element as the shape/kind template; then element `j` is
    /// written to `target[field][indices[j]]`. Placeholder fields here leave
    /// `target` untouched. A field whose kind changed between calls is a
    /// `RecordError`.
    pub fn scatter_into(
        &self,
        target: &mut Record,
        indices: &[usize],
        size: usize,
    ) -> std::result::Result<(), RecordError> {
        for (key, column) in &self.fields {
            if column.is_empty() {
                continue;
            }
            if column.len() != indices.len() && !matches!(column, Column::Nested(_)) {
                return Err(RecordError::IndexMismatch {
                    key: key.clone(),
                    len: column.len(),
                    indices: indices.len(),
                });
            }
            match column {
                Column::Empty => {}
                Column::Values(src) => {
                    let slot = target.entry(key);
                    if slot.is_empty() {
                        *slot = Column::Values(vec![src[0].zero_like(); size]);
                    }
                    match slot {
                        Column::Values(dst) => {
                            for (j, &i) in indices.iter().enumerate() {
                                if dst[i].kind() != src[j].kind() {
                                    return Err(RecordError::KindMismatch {
                                        key: key.clone(),
                                        expected: dst[i].kind(),
                                        found: src[j].kind(),
                                    });
                                }
                                dst[i] = src[j].clone();
                            }
                        }
                        other => {
                            return Err(RecordError::KindMismatch {
                                key: key.clone(),
                                expected: other.kind(),
                                found: src[0].kind(),
                            });
                        }
                    }
                }
                Column::Hidden(src) => {
                    let slot = target.entry(key);
                    if slot.is_empty() {
                        *slot = Column::Hidden(vec![Hidden::Empty; size]);
                    }
                    match slot {
                        Column::Hidden(dst) => {
                            for (j, &i) in indices.iter().enumerate() {
                                dst[i] = src[j].clone();
                            }
                        }
                        other => {
                            return Err(RecordError::KindMismatch {
                                key: key.clone(),
                                expected: other.kind(),
                                found: Kind::Hidden,
                            });
                        }
                    }
                }
                Column::Infos(src) => {
                    let slot = target.entry(key);
                    if slot.is_empty() {
                        *slot = Column::Infos(vec![Info::new(); size]);
                    }
                    match slot {
                        Column::Infos(dst) => {
                            for (j, &i) in indices.iter().enumerate() {
                                dst[i] = src[j].clone();
                            }
                        }
                        other => {
                            return Err(RecordError::KindMismatch {
                                key: key.clone(),
                                expected: other.kind(),
                                found: Kind::Info,
                            });
                        }
                    }
                }
                Column::Nested(src) => {
                    let slot = target.entry(key);
                    if slot.is_empty() && !matches!(slot, Column::Nested(_)) {
                        *slot = Column::Nested(Record::new());
                    }
                    match slot {
                        Column::Nested(dst) => src.scatter_into(dst, indices, size)?,
                        other => {
                            return Err(RecordError::KindMismatch {
                                key: key.clone(),
                                expected: other.kind(),
                                found: Kind::Nested,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Append another record's positions column-wise. Used to stack
    /// transition rows into a batch; `scatter_into` is the checked path, so
    /// a column whose kind drifted is skipped here rather than reported.
    pub fn append(&mut self, other: &Record) {
        for (key, column) in &other.fields {
            if column.is_empty() {
                continue;
            }
            let slot = self.entry(key);
            if slot.is_empty() {
                *slot = column.clone();
                continue;
            }
            match (slot, column) {
                (Column::Values(dst), Column::Values(src)) => dst.extend(src.iter().cloned()),
                (Column::Hidden(dst), Column::Hidden(src)) => dst.extend_from_slice(src),
                (Column::Infos(dst), Column::Infos(src)) => dst.extend(src.iter().cloned()),
                (Column::Nested(dst), Column::Nested(src)) => dst.append(src),
                _ => {}
            }
        }
    }

    /// Stack a sequence of rows into one batched record.
    pub fn stack<'a>(rows: impl IntoIterator<Item = &'a Record>) -> Record {
        let mut out = Record::new();
        for row in rows {
            out.append(row);
        }
        out
    }
}
