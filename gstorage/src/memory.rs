use crate::errors::{Result, StorageError};
use crate::graph::{EdgeId, EdgeRecord, GraphStore, PropertyLimits, PropertyValue, VertexId};
use crate::utils::id::{IdKind, IdPolicy, TaggedIdPolicy};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
struct VertexEntry {
    properties: BTreeMap<String, PropertyValue>,
    out_edges: Vec<EdgeId>,
}

#[derive(Debug, Clone)]
struct EdgeEntry {
    record: EdgeRecord,
    properties: BTreeMap<String, PropertyValue>,
}

enum Undo {
    RemoveVertex(VertexId),
    RemoveEdge(EdgeId),
    RestoreVertexProperty {
        id: VertexId,
        key: String,
        previous: Option<PropertyValue>,
    },
    RestoreEdgeProperty {
        id: EdgeId,
        key: String,
        previous: Option<PropertyValue>,
    },
}

/// In-process graph with commit/rollback semantics.
///
/// Writes apply to the live maps immediately and are journaled; a rollback
/// replays the journal backwards, a commit forgets it.
pub struct MemoryGraph {
    vertices: HashMap<VertexId, VertexEntry>,
    edges: HashMap<EdgeId, EdgeEntry>,
    journal: Vec<Undo>,
    policy: Arc<dyn IdPolicy>,
    limits: PropertyLimits,
    commits: u64,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::with_policy(Arc::new(TaggedIdPolicy::default()), PropertyLimits::default())
    }

    pub fn with_policy(policy: Arc<dyn IdPolicy>, limits: PropertyLimits) -> Self {
        Self {
            vertices: HashMap::new(),
            edges: HashMap::new(),
            journal: Vec::new(),
            policy,
            limits,
            commits: 0,
        }
    }

    /// Number of commits that carried at least one mutation.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    /// Mutations buffered since the last commit.
    pub fn pending_mutations(&self) -> usize {
        self.journal.len()
    }

    pub fn vertex_properties(&self, id: VertexId) -> Option<&BTreeMap<String, PropertyValue>> {
        self.vertices.get(&id).map(|v| &v.properties)
    }

    /// Vertices whose `key` property equals `value`; a linear scan meant for tests and tooling.
    pub fn find_vertices(&self, key: &str, value: &PropertyValue) -> Vec<VertexId> {
        let mut found: Vec<VertexId> = self
            .vertices
            .iter()
            .filter(|(_, v)| v.properties.get(key) == Some(value))
            .map(|(id, _)| *id)
            .collect();
        found.sort_unstable();
        found
    }

    fn check_id(&self, id: u64, kind: IdKind) -> Result<()> {
        if self.policy.is_valid(id, kind) {
            Ok(())
        } else {
            Err(StorageError::InvalidId {
                id,
                kind: kind.as_str(),
            })
        }
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for MemoryGraph {
    fn get_vertex(&mut self, id: VertexId) -> Result<Option<VertexId>> {
        Ok(self.vertices.contains_key(&id).then_some(id))
    }

    fn add_vertex(&mut self, id: VertexId) -> Result<VertexId> {
        self.check_id(id, IdKind::Vertex)?;
        if self.vertices.contains_key(&id) {
            return Err(StorageError::DuplicateElement(format!("vertex {id}")));
        }
        self.vertices.insert(id, VertexEntry::default());
        self.journal.push(Undo::RemoveVertex(id));
        Ok(id)
    }

    fn add_edge(
        &mut self,
        id: EdgeId,
        out_vertex: VertexId,
        in_vertex: VertexId,
        label: &str,
    ) -> Result<EdgeId> {
        self.check_id(id, IdKind::Relation)?;
        if self.edges.contains_key(&id) {
            return Err(StorageError::DuplicateElement(format!("edge {id}")));
        }
        if !self.vertices.contains_key(&in_vertex) {
            return Err(StorageError::NotFound(format!("vertex {in_vertex}")));
        }
        let out = self
            .vertices
            .get_mut(&out_vertex)
            .ok_or_else(|| StorageError::NotFound(format!("vertex {out_vertex}")))?;
        out.out_edges.push(id);
        self.edges.insert(
            id,
            EdgeEntry {
                record: EdgeRecord {
                    id,
                    out_vertex,
                    in_vertex,
                    label: label.to_string(),
                },
                properties: BTreeMap::new(),
            },
        );
        self.journal.push(Undo::RemoveEdge(id));
        Ok(id)
    }

    fn set_vertex_property(
        &mut self,
        id: VertexId,
        key: &str,
        value: PropertyValue,
    ) -> Result<()> {
        self.limits.check(key, &value)?;
        let vertex = self
            .vertices
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("vertex {id}")))?;
        let previous = vertex.properties.insert(key.to_string(), value);
        self.journal.push(Undo::RestoreVertexProperty {
            id,
            key: key.to_string(),
            previous,
        });
        Ok(())
    }

    fn set_edge_property(&mut self, id: EdgeId, key: &str, value: PropertyValue) -> Result<()> {
        self.limits.check(key, &value)?;
        let edge = self
            .edges
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("edge {id}")))?;
        let previous = edge.properties.insert(key.to_string(), value);
        self.journal.push(Undo::RestoreEdgeProperty {
            id,
            key: key.to_string(),
            previous,
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.journal.is_empty() {
            self.commits += 1;
            log::debug!("memory graph commit of {} mutations", self.journal.len());
        }
        self.journal.clear();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::RemoveVertex(id) => {
                    self.vertices.remove(&id);
                }
                Undo::RemoveEdge(id) => {
                    if let Some(edge) = self.edges.remove(&id) {
                        if let Some(out) = self.vertices.get_mut(&edge.record.out_vertex) {
                            out.out_edges.retain(|e| *e != id);
                        }
                    }
                }
                Undo::RestoreVertexProperty { id, key, previous } => {
                    if let Some(vertex) = self.vertices.get_mut(&id) {
                        match previous {
                            Some(value) => vertex.properties.insert(key, value),
                            None => vertex.properties.remove(&key),
                        };
                    }
                }
                Undo::RestoreEdgeProperty { id, key, previous } => {
                    if let Some(edge) = self.edges.get_mut(&id) {
                        match previous {
                            Some(value) => edge.properties.insert(key, value),
                            None => edge.properties.remove(&key),
                        };
                    }
                }
            }
        }
        Ok(())
    }

    fn id_policy(&self) -> Arc<dyn IdPolicy> {
        Arc::clone(&self.policy)
    }

    fn vertex_property(&mut self, id: VertexId, key: &str) -> Result<Option<PropertyValue>> {
        Ok(self
            .vertices
            .get(&id)
            .and_then(|v| v.properties.get(key))
            .cloned())
    }

    fn edge_property(&mut self, id: EdgeId, key: &str) -> Result<Option<PropertyValue>> {
        Ok(self
            .edges
            .get(&id)
            .and_then(|e| e.properties.get(key))
            .cloned())
    }

    fn out_edges(&mut self, id: VertexId) -> Result<Vec<EdgeRecord>> {
        let Some(vertex) = self.vertices.get(&id) else {
            return Ok(Vec::new());
        };
        Ok(vertex
            .out_edges
            .iter()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .map(|edge| edge.record.clone())
            .collect())
    }

    fn vertex_count(&mut self) -> Result<u64> {
        Ok(self.vertices.len() as u64)
    }

    fn edge_count(&mut self) -> Result<u64> {
        Ok(self.edges.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_discards_uncommitted_mutations() {
        let mut graph = MemoryGraph::new();
        graph.add_vertex(4).unwrap();
        graph.set_vertex_property(4, "name", "kept".into()).unwrap();
        graph.commit().unwrap();

        graph.set_vertex_property(4, "name", "dropped".into()).unwrap();
        graph.add_vertex(8).unwrap();
        graph.add_edge(5, 4, 8, "actor").unwrap();
        graph.rollback().unwrap();

        assert_eq!(graph.vertex_count().unwrap(), 1);
        assert_eq!(graph.edge_count().unwrap(), 0);
        assert!(graph.out_edges(4).unwrap().is_empty());
        assert_eq!(
            graph.vertex_property(4, "name").unwrap(),
            Some(PropertyValue::String("kept".to_string()))
        );
        assert_eq!(graph.commit_count(), 1);
    }

    #[test]
    fn rejects_duplicates_and_invalid_ids() {
        let mut graph = MemoryGraph::new();
        graph.add_vertex(4).unwrap();
        assert!(matches!(
            graph.add_vertex(4),
            Err(StorageError::DuplicateElement(_))
        ));
        assert!(matches!(
            graph.add_vertex(5),
            Err(StorageError::InvalidId { .. })
        ));
        assert!(matches!(
            graph.add_edge(4, 4, 4, "actor"),
            Err(StorageError::InvalidId { .. })
        ));
        assert!(matches!(
            graph.add_edge(5, 4, 12, "actor"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn property_rejection_leaves_journal_untouched() {
        let mut graph =
            MemoryGraph::with_policy(Arc::new(TaggedIdPolicy::default()), PropertyLimits { max_string_len: 3 });
        graph.add_vertex(4).unwrap();
        let before = graph.pending_mutations();
        let err = graph
            .set_vertex_property(4, "body", "too long".into())
            .unwrap_err();
        assert!(err.is_property_rejection());
        assert_eq!(graph.pending_mutations(), before);
    }
}
