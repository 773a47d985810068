use crate::errors::{Result, StorageError};
use crate::utils::id::IdPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type VertexId = u64;
pub type EdgeId = u64;

/// A scalar property value. Only these kinds are ever written to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Boolean(bool),
    Int(i32),
    Long(i64),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Boolean(_) => "boolean",
            PropertyValue::Int(_) => "int",
            PropertyValue::Long(_) => "long",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(i64::from(*v)),
            PropertyValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "{s}"),
            PropertyValue::Boolean(b) => write!(f, "{b}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Long(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

/// Limits a backend enforces on property writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PropertyLimits {
    pub max_string_len: usize,
}

impl Default for PropertyLimits {
    fn default() -> Self {
        Self {
            max_string_len: 32 * 1024,
        }
    }
}

impl PropertyLimits {
    pub fn check(&self, key: &str, value: &PropertyValue) -> Result<()> {
        if key.is_empty() || key.contains('\0') {
            return Err(StorageError::PropertyRejected {
                key: key.to_string(),
                reason: "key is empty or contains NUL".to_string(),
            });
        }
        if let PropertyValue::String(s) = value {
            if s.len() > self.max_string_len {
                return Err(StorageError::PropertyRejected {
                    key: key.to_string(),
                    reason: format!(
                        "string of {} bytes exceeds limit of {}",
                        s.len(),
                        self.max_string_len
                    ),
                });
            }
            if s.contains('\0') {
                return Err(StorageError::PropertyRejected {
                    key: key.to_string(),
                    reason: "string contains NUL".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A stored edge, as returned by read helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub out_vertex: VertexId,
    pub in_vertex: VertexId,
    pub label: String,
}

/// The transactional labeled-property graph consumed by the loader.
///
/// Mutations become durable on [`GraphStore::commit`]; [`GraphStore::rollback`]
/// discards everything since the previous commit.
pub trait GraphStore: Send {
    /// Returns `Some(id)` when a vertex with this id exists.
    fn get_vertex(&mut self, id: VertexId) -> Result<Option<VertexId>>;

    fn add_vertex(&mut self, id: VertexId) -> Result<VertexId>;

    fn add_edge(
        &mut self,
        id: EdgeId,
        out_vertex: VertexId,
        in_vertex: VertexId,
        label: &str,
    ) -> Result<EdgeId>;

    fn set_vertex_property(&mut self, id: VertexId, key: &str, value: PropertyValue)
        -> Result<()>;

    fn set_edge_property(&mut self, id: EdgeId, key: &str, value: PropertyValue) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn id_policy(&self) -> Arc<dyn IdPolicy>;

    fn vertex_property(&mut self, id: VertexId, key: &str) -> Result<Option<PropertyValue>>;

    fn edge_property(&mut self, id: EdgeId, key: &str) -> Result<Option<PropertyValue>>;

    fn out_edges(&mut self, id: VertexId) -> Result<Vec<EdgeRecord>>;

    fn vertex_count(&mut self) -> Result<u64>;

    fn edge_count(&mut self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_reject_oversized_and_nul_values() {
        let limits = PropertyLimits { max_string_len: 4 };
        assert!(limits.check("name", &"abcd".into()).is_ok());
        let err = limits.check("name", &"abcde".into()).unwrap_err();
        assert!(err.is_property_rejection());
        assert!(limits.check("name", &"a\0".into()).is_err());
        assert!(limits.check("", &PropertyValue::Long(1)).is_err());
        assert!(limits.check("count", &PropertyValue::Int(7)).is_ok());
    }

    #[test]
    fn numeric_accessors_widen_ints() {
        assert_eq!(PropertyValue::Int(3).as_i64(), Some(3));
        assert_eq!(PropertyValue::Long(-9).as_i64(), Some(-9));
        assert_eq!(PropertyValue::Boolean(true).as_i64(), None);
        assert_eq!(PropertyValue::from("x").as_str(), Some("x"));
    }
}
