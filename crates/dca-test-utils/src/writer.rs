//! In-memory [`Writer`] keyed by slash-separated group paths.

use indexmap::IndexMap;

use dca_core::{Value, WriteError, Writer};

/// Owned copy of a written [`Value`].
#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Integer(i64),
    Scalar(f64),
    Text(String),
    Vector(Vec<f64>),
    Matrix {
        rows: usize,
        cols: usize,
        data: Vec<f64>,
    },
    Array {
        domain: String,
        shape: Vec<usize>,
        data: Vec<f64>,
    },
}

impl From<Value<'_>> for Entry {
    fn from(value: Value<'_>) -> Self {
        match value {
            Value::Integer(v) => Self::Integer(v),
            Value::Scalar(v) => Self::Scalar(v),
            Value::Text(v) => Self::Text(v.to_string()),
            Value::Vector(v) => Self::Vector(v.to_vec()),
            Value::Matrix { rows, cols, data } => Self::Matrix {
                rows,
                cols,
                data: data.to_vec(),
            },
            Value::Array {
                domain,
                shape,
                data,
            } => Self::Array {
                domain: domain.to_string(),
                shape: shape.to_vec(),
                data: data.to_vec(),
            },
        }
    }
}

/// Records every entry under `group/.../name`, in write order.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    groups: Vec<String>,
    entries: IndexMap<String, Entry>,
    /// Names that `execute` refuses.
    pub reject: Vec<String>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` when every opened group was closed.
    pub fn is_balanced(&self) -> bool {
        self.groups.is_empty()
    }

    fn path(&self, name: &str) -> String {
        let mut path = self.groups.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(name);
        path
    }
}

impl Writer for MemoryWriter {
    fn execute(&mut self, name: &str, value: Value<'_>) -> Result<(), WriteError> {
        if self.reject.iter().any(|r| r == name) {
            return Err(WriteError::Rejected {
                name: name.to_string(),
                reason: "rejected by test writer".into(),
            });
        }
        let path = self.path(name);
        self.entries.insert(path, value.into());
        Ok(())
    }

    fn open_group(&mut self, name: &str) -> Result<(), WriteError> {
        self.groups.push(name.to_string());
        Ok(())
    }

    fn close_group(&mut self) -> Result<(), WriteError> {
        self.groups
            .pop()
            .map(drop)
            .ok_or(WriteError::UnbalancedGroup)
    }
}
