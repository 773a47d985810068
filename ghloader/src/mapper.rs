use gstorage::graph::{GraphStore, VertexId};
use gstorage::PropertyValue;

use crate::error::Result;
use crate::models::Projectable;
use crate::schema::Label;

/// Escapes field names that collide with an edge label or with `id`/`label`.
pub fn fix_reserved_key(key: &str) -> String {
    let reserved = key == "id" || key == "label" || Label::ALL.iter().any(|l| l.as_str() == key);
    if reserved {
        format!("{key}_")
    } else {
        key.to_string()
    }
}

/// Copies the scalar fields of `record` onto `vertex`.
///
/// Values the store refuses are logged and skipped; any other store failure
/// propagates.
pub fn project<S, R>(store: &mut S, vertex: VertexId, record: &R) -> Result<()>
where
    S: GraphStore + ?Sized,
    R: Projectable + ?Sized,
{
    for (field, value) in record.scalar_fields() {
        set_property(store, vertex, &fix_reserved_key(field), value)?;
    }
    Ok(())
}

/// Sets one vertex property, downgrading a rejected value to a warning.
pub fn set_property<S>(store: &mut S, vertex: VertexId, key: &str, value: PropertyValue) -> Result<()>
where
    S: GraphStore + ?Sized,
{
    match store.set_vertex_property(vertex, key, value) {
        Ok(()) => Ok(()),
        Err(err) if err.is_property_rejection() => {
            log::warn!("failed to set property {key} on vertex {vertex}: {err}");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, RepositoryBrief};
    use gstorage::memory::MemoryGraph;

    #[test]
    fn reserved_names_get_a_trailing_underscore() {
        for label in Label::ALL {
            assert_eq!(fix_reserved_key(label.as_str()), format!("{label}_"));
        }
        assert_eq!(fix_reserved_key("id"), "id_");
        assert_eq!(fix_reserved_key("label"), "label_");
        assert_eq!(fix_reserved_key("login"), "login");
        assert_eq!(fix_reserved_key("actor_"), "actor_");
    }

    #[test]
    fn projects_scalars_under_escaped_names() {
        let mut graph = MemoryGraph::new();
        let v = graph.add_vertex(4).unwrap();
        let repo = RepositoryBrief {
            id: Some(42),
            name: Some("Hello-World".to_string()),
            fork: Some(false),
            ..Default::default()
        };
        project(&mut graph, v, &repo).unwrap();
        assert_eq!(graph.vertex_property(v, "id_").unwrap(), Some(PropertyValue::Long(42)));
        assert_eq!(graph.vertex_property(v, "id").unwrap(), None);
        assert_eq!(
            graph.vertex_property(v, "fork").unwrap(),
            Some(PropertyValue::Boolean(false))
        );
    }

    #[test]
    fn rejected_values_are_skipped() {
        let mut graph = MemoryGraph::new();
        let v = graph.add_vertex(4).unwrap();
        let event = Event {
            url: Some("bad\0url".to_string()),
            event_type: Some("WatchEvent".to_string()),
            ..Default::default()
        };
        project(&mut graph, v, &event).unwrap();
        assert_eq!(graph.vertex_property(v, "url").unwrap(), None);
        assert_eq!(
            graph.vertex_property(v, "type").unwrap(),
            Some(PropertyValue::from("WatchEvent"))
        );
    }

    #[test]
    fn missing_vertex_is_not_swallowed() {
        let mut graph = MemoryGraph::new();
        let event = Event {
            url: Some("https://github.com".to_string()),
            ..Default::default()
        };
        assert!(project(&mut graph, 8, &event).is_err());
    }
}
