use gstorage::errors::StorageError;
use gstorage::graph::GraphStore;
use gstorage::PropertyValue;

/// Behavior every backend must share: transactional writes, id policy
/// checks and property rejection.
#[allow(dead_code)]
pub fn exercise_store(store: &mut dyn GraphStore) -> anyhow::Result<()> {
    let policy = store.id_policy();
    assert!(policy.is_vertex_id(4) && !policy.is_relation_id(4));
    assert!(policy.is_relation_id(5) && !policy.is_vertex_id(5));

    store.add_vertex(4)?;
    store.add_vertex(8)?;
    store.add_edge(5, 4, 8, "repository")?;
    store.set_edge_property(5, "timestamp", PropertyValue::Long(1_401_520_410_000))?;
    store.set_vertex_property(8, "name", "Hello-World".into())?;
    store.commit()?;

    store.add_vertex(12)?;
    store.set_vertex_property(8, "name", "renamed".into())?;
    store.rollback()?;

    assert_eq!(store.get_vertex(12)?, None);
    assert_eq!(store.get_vertex(8)?, Some(8));
    assert_eq!(
        store.vertex_property(8, "name")?,
        Some(PropertyValue::from("Hello-World"))
    );
    assert_eq!(
        store.edge_property(5, "timestamp")?,
        Some(PropertyValue::Long(1_401_520_410_000))
    );

    let edges = store.out_edges(4)?;
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].in_vertex, 8);
    assert_eq!(edges[0].label, "repository");

    assert!(matches!(
        store.add_vertex(4),
        Err(StorageError::DuplicateElement(_))
    ));
    assert!(matches!(
        store.add_vertex(5),
        Err(StorageError::InvalidId { .. })
    ));
    let rejected = store
        .set_vertex_property(8, "bio", "nul\0byte".into())
        .unwrap_err();
    assert!(rejected.is_property_rejection());

    store.rollback()?;
    assert_eq!(store.vertex_count()?, 2);
    assert_eq!(store.edge_count()?, 1);
    Ok(())
}
