//! Collection and index metadata.
//!
//! Read-only input to node lowering, constructed once per lowering
//! invocation by the caller. Lowering consults it to validate scan
//! targets and to look up index definitions; it never mutates it, so a
//! single metadata object may back concurrent lowering calls over
//! independent trees.

use std::collections::HashMap;

use crate::algebra::{FieldName, SortDirection};

/// Opaque scan options supplied by the caller (deployment type,
/// database name, collection identifier, and similar).
pub type ScanOptions = HashMap<String, String>;

/// Definition of one index on a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    /// Indexed fields with per-field direction, leftmost first.
    pub collation: Vec<(FieldName, SortDirection)>,
    /// Whether any indexed field is multi-key (array-valued).
    pub multikey: bool,
}

impl IndexDefinition {
    /// Creates a single-field index definition.
    pub fn single(field: impl Into<FieldName>, direction: SortDirection, multikey: bool) -> Self {
        Self { collation: vec![(field.into(), direction)], multikey }
    }
}

/// Tracks which field paths under a collection are multi-key.
///
/// A trie over field names; a node flagged multi-key means the path to
/// it can hold arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultikeynessTrie {
    /// Whether the path to this node is multi-key.
    pub multikey: bool,
    /// Child paths.
    pub children: HashMap<FieldName, MultikeynessTrie>,
}

/// How a collection's data is distributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistributionType {
    /// All data on one node.
    #[default]
    Centralized,
    /// Replicated to every node.
    Replicated,
    /// Partitioned by a key.
    Partitioned,
}

/// Distribution info plus the paths it applies to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionAndPaths {
    /// The distribution type.
    pub distribution: DistributionType,
    /// Paths the distribution key covers, if partitioned.
    pub paths: Vec<FieldName>,
}

/// Everything lowering needs to know about one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanDefinition {
    /// Caller-supplied scan options.
    pub options: ScanOptions,
    /// Index definitions keyed by index name.
    pub indexes: HashMap<String, IndexDefinition>,
    /// Multi-key info for the collection's fields.
    pub multikeyness: MultikeynessTrie,
    /// Distribution of the collection's data.
    pub distribution: DistributionAndPaths,
    /// Whether the collection exists.
    pub exists: bool,
    /// Cardinality estimate (row count).
    pub cardinality: f64,
}

impl ScanDefinition {
    /// Creates a definition for an existing collection with the given indexes.
    #[must_use]
    pub fn with_indexes(indexes: HashMap<String, IndexDefinition>) -> Self {
        Self { indexes, exists: true, ..Self::default() }
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.get(name)
    }
}

/// Mapping from collection name to scan definition.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    scan_defs: HashMap<String, ScanDefinition>,
}

impl Metadata {
    /// Creates metadata over the given scan definitions.
    #[must_use]
    pub fn new(scan_defs: HashMap<String, ScanDefinition>) -> Self {
        Self { scan_defs }
    }

    /// Adds a collection.
    #[must_use]
    pub fn with_collection(mut self, name: impl Into<String>, def: ScanDefinition) -> Self {
        self.scan_defs.insert(name.into(), def);
        self
    }

    /// Looks up a collection's scan definition.
    #[must_use]
    pub fn scan_definition(&self, collection: &str) -> Option<&ScanDefinition> {
        self.scan_defs.get(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_lookup() {
        let md = Metadata::default().with_collection("collName", ScanDefinition::default());
        assert!(md.scan_definition("collName").is_some());
        assert!(md.scan_definition("other").is_none());
    }

    #[test]
    fn index_lookup() {
        let mut indexes = HashMap::new();
        indexes
            .insert("index0".to_string(), IndexDefinition::single("a", SortDirection::Ascending, false));
        let def = ScanDefinition::with_indexes(indexes);
        assert!(def.index("index0").is_some());
        assert_eq!(def.index("index0").unwrap().collation.len(), 1);
        assert!(def.index("missing").is_none());
    }
}
