//! Identifier-space partitioning.
//!
//! A backend hands out one numeric space for both vertices and relations and
//! decides which values belong to which kind. Callers that mint their own ids
//! (see the loader's identity resolver) consult the policy before use.

/// The kind of graph element an identifier is minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Vertex,
    Relation,
}

impl IdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Vertex => "vertex",
            IdKind::Relation => "relation",
        }
    }
}

/// Validity predicates supplied by a storage backend.
pub trait IdPolicy: Send + Sync {
    fn is_vertex_id(&self, id: u64) -> bool;
    fn is_relation_id(&self, id: u64) -> bool;

    fn is_valid(&self, id: u64, kind: IdKind) -> bool {
        match kind {
            IdKind::Vertex => self.is_vertex_id(id),
            IdKind::Relation => self.is_relation_id(id),
        }
    }
}

/// Largest identifier any backend will accept; ids must fit a signed 64-bit column.
pub const MAX_ID: u64 = i64::MAX as u64;

/// Tags the low bits of an identifier with its kind: `..00` for vertices and
/// `..01` for relations. Zero and values above [`MAX_ID`] are never valid.
#[derive(Debug, Clone, Copy)]
pub struct TaggedIdPolicy {
    tag_bits: u32,
}

impl TaggedIdPolicy {
    const VERTEX_TAG: u64 = 0b00;
    const RELATION_TAG: u64 = 0b01;

    pub fn new(tag_bits: u32) -> Self {
        Self {
            tag_bits: tag_bits.clamp(1, 8),
        }
    }

    fn tag(&self, id: u64) -> u64 {
        id & ((1u64 << self.tag_bits) - 1)
    }

    fn in_range(id: u64) -> bool {
        id > 0 && id <= MAX_ID
    }
}

impl Default for TaggedIdPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

impl IdPolicy for TaggedIdPolicy {
    fn is_vertex_id(&self, id: u64) -> bool {
        Self::in_range(id) && self.tag(id) == Self::VERTEX_TAG
    }

    fn is_relation_id(&self, id: u64) -> bool {
        Self::in_range(id) && self.tag(id) == Self::RELATION_TAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_are_disjoint() {
        let policy = TaggedIdPolicy::default();
        for id in 0u64..4096 {
            assert!(!(policy.is_vertex_id(id) && policy.is_relation_id(id)));
        }
    }

    #[test]
    fn zero_and_out_of_range_are_rejected() {
        let policy = TaggedIdPolicy::default();
        assert!(!policy.is_vertex_id(0));
        assert!(!policy.is_vertex_id(1u64 << 63));
        assert!(policy.is_vertex_id(4));
        assert!(policy.is_relation_id(5));
        assert!(!policy.is_relation_id(6));
        assert!(policy.is_valid(8, IdKind::Vertex));
        assert!(policy.is_valid(9, IdKind::Relation));
    }
}
