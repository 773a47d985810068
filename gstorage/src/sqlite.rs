use crate::errors::{Result, StorageError};
use crate::graph::{EdgeId, EdgeRecord, GraphStore, PropertyLimits, PropertyValue, VertexId};
use crate::utils::id::{IdKind, IdPolicy, TaggedIdPolicy};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// A graph persisted in a single SQLite file.
///
/// A transaction is opened lazily by the first mutation after a commit or
/// rollback, so reads never hold a write lock on their own.
pub struct SqliteGraph {
    conn: Connection,
    in_txn: bool,
    policy: Arc<dyn IdPolicy>,
    limits: PropertyLimits,
}

impl SqliteGraph {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(
            conn,
            Arc::new(TaggedIdPolicy::default()),
            PropertyLimits::default(),
        )
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(
            conn,
            Arc::new(TaggedIdPolicy::default()),
            PropertyLimits::default(),
        )
    }

    pub fn from_connection(
        conn: Connection,
        policy: Arc<dyn IdPolicy>,
        limits: PropertyLimits,
    ) -> Result<Self> {
        let graph = Self {
            conn,
            in_txn: false,
            policy,
            limits,
        };
        graph.initialize_schema()?;
        Ok(graph)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS vertices (
                id INTEGER PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS edges (
                id INTEGER PRIMARY KEY,
                out_id INTEGER NOT NULL,
                in_id INTEGER NOT NULL,
                label TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_edges_out ON edges(out_id);
            CREATE TABLE IF NOT EXISTS vertex_properties (
                vertex_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value_type TEXT NOT NULL,
                value,
                PRIMARY KEY (vertex_id, key)
            );
            CREATE TABLE IF NOT EXISTS edge_properties (
                edge_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value_type TEXT NOT NULL,
                value,
                PRIMARY KEY (edge_id, key)
            );
            COMMIT;",
        )?;
        Ok(())
    }

    fn begin_if_needed(&mut self) -> Result<()> {
        if !self.in_txn {
            self.conn.execute_batch("BEGIN")?;
            self.in_txn = true;
        }
        Ok(())
    }

    fn check_id(&self, id: u64, kind: IdKind) -> Result<i64> {
        if !self.policy.is_valid(id, kind) {
            return Err(StorageError::InvalidId {
                id,
                kind: kind.as_str(),
            });
        }
        i64::try_from(id).map_err(|_| StorageError::InvalidId {
            id,
            kind: kind.as_str(),
        })
    }

    fn exists(&self, table: &str, id: u64) -> Result<bool> {
        let Ok(id) = i64::try_from(id) else {
            return Ok(false);
        };
        let sql = format!("SELECT 1 FROM {table} WHERE id = ?1");
        let found = self
            .conn
            .query_row(&sql, params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn write_property(
        &mut self,
        table: &str,
        owner_column: &str,
        owner: i64,
        key: &str,
        value: PropertyValue,
    ) -> Result<()> {
        self.begin_if_needed()?;
        let value_type = value.type_name();
        let sql_value = to_sql_value(value);
        let sql = format!(
            "INSERT INTO {table} ({owner_column}, key, value_type, value) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT({owner_column}, key) DO UPDATE SET
                value_type = excluded.value_type,
                value = excluded.value"
        );
        self.conn
            .execute(&sql, params![owner, key, value_type, sql_value])?;
        Ok(())
    }

    fn read_property(
        &self,
        table: &str,
        owner_column: &str,
        owner: u64,
        key: &str,
    ) -> Result<Option<PropertyValue>> {
        let Ok(owner) = i64::try_from(owner) else {
            return Ok(None);
        };
        let sql = format!("SELECT value_type, value FROM {table} WHERE {owner_column} = ?1 AND key = ?2");
        let row = self
            .conn
            .query_row(&sql, params![owner, key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, SqlValue>(1)?))
            })
            .optional()?;
        match row {
            Some((value_type, value)) => from_sql_value(&value_type, value).map(Some),
            None => Ok(None),
        }
    }

    fn count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }
}

fn to_sql_value(value: PropertyValue) -> SqlValue {
    match value {
        PropertyValue::String(s) => SqlValue::Text(s),
        PropertyValue::Boolean(b) => SqlValue::Integer(i64::from(b)),
        PropertyValue::Int(v) => SqlValue::Integer(i64::from(v)),
        PropertyValue::Long(v) => SqlValue::Integer(v),
    }
}

fn from_sql_value(value_type: &str, value: SqlValue) -> Result<PropertyValue> {
    let converted = match (value_type, value) {
        ("string", SqlValue::Text(s)) => Some(PropertyValue::String(s)),
        ("boolean", SqlValue::Integer(v)) => Some(PropertyValue::Boolean(v != 0)),
        ("int", SqlValue::Integer(v)) => i32::try_from(v).ok().map(PropertyValue::Int),
        ("long", SqlValue::Integer(v)) => Some(PropertyValue::Long(v)),
        _ => None,
    };
    converted.ok_or_else(|| {
        StorageError::Config(format!("corrupt property of declared type '{value_type}'"))
    })
}

impl GraphStore for SqliteGraph {
    fn get_vertex(&mut self, id: VertexId) -> Result<Option<VertexId>> {
        Ok(self.exists("vertices", id)?.then_some(id))
    }

    fn add_vertex(&mut self, id: VertexId) -> Result<VertexId> {
        let sql_id = self.check_id(id, IdKind::Vertex)?;
        if self.exists("vertices", id)? {
            return Err(StorageError::DuplicateElement(format!("vertex {id}")));
        }
        self.begin_if_needed()?;
        self.conn
            .execute("INSERT INTO vertices (id) VALUES (?1)", params![sql_id])?;
        Ok(id)
    }

    fn add_edge(
        &mut self,
        id: EdgeId,
        out_vertex: VertexId,
        in_vertex: VertexId,
        label: &str,
    ) -> Result<EdgeId> {
        let sql_id = self.check_id(id, IdKind::Relation)?;
        if self.exists("edges", id)? {
            return Err(StorageError::DuplicateElement(format!("edge {id}")));
        }
        for vertex in [out_vertex, in_vertex] {
            if !self.exists("vertices", vertex)? {
                return Err(StorageError::NotFound(format!("vertex {vertex}")));
            }
        }
        self.begin_if_needed()?;
        self.conn.execute(
            "INSERT INTO edges (id, out_id, in_id, label) VALUES (?1, ?2, ?3, ?4)",
            params![sql_id, out_vertex as i64, in_vertex as i64, label],
        )?;
        Ok(id)
    }

    fn set_vertex_property(
        &mut self,
        id: VertexId,
        key: &str,
        value: PropertyValue,
    ) -> Result<()> {
        self.limits.check(key, &value)?;
        if !self.exists("vertices", id)? {
            return Err(StorageError::NotFound(format!("vertex {id}")));
        }
        self.write_property("vertex_properties", "vertex_id", id as i64, key, value)
    }

    fn set_edge_property(&mut self, id: EdgeId, key: &str, value: PropertyValue) -> Result<()> {
        self.limits.check(key, &value)?;
        if !self.exists("edges", id)? {
            return Err(StorageError::NotFound(format!("edge {id}")));
        }
        self.write_property("edge_properties", "edge_id", id as i64, key, value)
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_txn {
            self.conn.execute_batch("COMMIT")?;
            self.in_txn = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_txn {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_txn = false;
        }
        Ok(())
    }

    fn id_policy(&self) -> Arc<dyn IdPolicy> {
        Arc::clone(&self.policy)
    }

    fn vertex_property(&mut self, id: VertexId, key: &str) -> Result<Option<PropertyValue>> {
        self.read_property("vertex_properties", "vertex_id", id, key)
    }

    fn edge_property(&mut self, id: EdgeId, key: &str) -> Result<Option<PropertyValue>> {
        self.read_property("edge_properties", "edge_id", id, key)
    }

    fn out_edges(&mut self, id: VertexId) -> Result<Vec<EdgeRecord>> {
        let Ok(sql_id) = i64::try_from(id) else {
            return Ok(Vec::new());
        };
        let mut stmt = self
            .conn
            .prepare("SELECT id, out_id, in_id, label FROM edges WHERE out_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![sql_id], |row| {
            Ok(EdgeRecord {
                id: row.get::<_, i64>(0)? as u64,
                out_vertex: row.get::<_, i64>(1)? as u64,
                in_vertex: row.get::<_, i64>(2)? as u64,
                label: row.get(3)?,
            })
        })?;
        let mut edges = Vec::new();
        for edge in rows {
            edges.push(edge?);
        }
        Ok(edges)
    }

    fn vertex_count(&mut self) -> Result<u64> {
        self.count("vertices")
    }

    fn edge_count(&mut self) -> Result<u64> {
        self.count("edges")
    }
}

impl Drop for SqliteGraph {
    fn drop(&mut self) {
        if self.in_txn {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("failed to roll back open graph transaction: {err}");
            }
        }
    }
}
