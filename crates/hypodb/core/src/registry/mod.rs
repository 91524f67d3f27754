// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Hypothetical object registry
//!
//! Owns every hypothetical index and every node of every hypothetical partition tree. Entries are
//! allocated from [`SimulationArena`]s and are never mutated after registration; they only go
//! away individually or all at once through [`HypoRegistry::reset`].
//!
//! A partition tree is addressed two ways. Its root has a synthetic identifier of its own, but
//! the planner reaches it through the real table it shadows, so lookups by the real table's
//! identifier resolve to the root as well.

pub mod allocator;
pub mod index;
pub mod sizing;
pub mod table;

pub use allocator::ShadowIdAllocator;
pub use index::{HypotheticalIndex, HypotheticalIndexColumn, IndexKey, IndexSpec};
pub use sizing::IndexSize;
pub use table::{HypotheticalTable, PartitionSpec, PartitioningSpec};

use hypodb_common::{CatalogError, Oid};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

use crate::arena::{ArenaKey, SimulationArena};
use crate::host::Constraint;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot shadow relation {relid}: {reason}")]
    InvalidShadowTarget { relid: Oid, reason: String },
    #[error("table \"{0}\" is already partitioned")]
    AlreadyPartitioned(String),
    #[error("table \"{0}\" is already hypothetically partitioned")]
    AlreadyHypotheticallyPartitioned(String),
    #[error("invalid partitioning: {0}")]
    InvalidPartitionSpec(String),
    #[error("unsupported hypothetical index: {0}")]
    UnsupportedIndex(String),
    #[error("column \"{column}\" of relation \"{relation}\" does not exist")]
    ColumnNotFound { relation: String, column: String },
    #[error("could not allocate a hypothetical object identifier: {0}")]
    IdentifierAllocation(#[source] CatalogError),
    #[error("no free hypothetical object identifier after {attempts} attempts")]
    IdentifierExhausted { attempts: usize },
    #[error("no hypothetical object with identifier {0}")]
    UnknownObject(Oid),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

pub struct HypoRegistry {
    indexes: SimulationArena<HypotheticalIndex>,
    index_order: Vec<ArenaKey<HypotheticalIndex>>,
    index_by_oid: HashMap<Oid, ArenaKey<HypotheticalIndex>>,
    tables: SimulationArena<HypotheticalTable>,
    table_by_oid: HashMap<Oid, ArenaKey<HypotheticalTable>>,
    root_by_relid: HashMap<Oid, Oid>,
    roots: Vec<Oid>,
}

impl HypoRegistry {
    pub fn new() -> Self {
        Self {
            indexes: SimulationArena::new(),
            index_order: Vec::new(),
            index_by_oid: HashMap::new(),
            tables: SimulationArena::new(),
            table_by_oid: HashMap::new(),
            root_by_relid: HashMap::new(),
            roots: Vec::new(),
        }
    }

    pub fn insert_index(&mut self, index: HypotheticalIndex) -> Oid {
        let oid = index.oid;
        let key = self.indexes.alloc(index);
        self.index_order.push(key);
        self.index_by_oid.insert(oid, key);
        oid
    }

    pub fn index(&self, oid: Oid) -> Option<&HypotheticalIndex> {
        self.index_by_oid.get(&oid).and_then(|key| self.indexes.get(*key))
    }

    /// Every index, in registration order
    pub fn indexes(&self) -> impl Iterator<Item = &HypotheticalIndex> {
        self.index_order.iter().filter_map(|key| self.indexes.get(*key))
    }

    /// Indexes on a relation, in registration order
    pub fn indexes_for(&self, relid: Oid) -> Vec<&HypotheticalIndex> {
        self.indexes().filter(|index| index.relid == relid).collect()
    }

    pub fn remove_index(&mut self, oid: Oid) -> Option<HypotheticalIndex> {
        let key = self.index_by_oid.remove(&oid)?;
        self.index_order.retain(|k| *k != key);
        self.indexes.free(key)
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    /// Stores a validated partition tree. `nodes` must start with the root.
    pub fn insert_table_tree(&mut self, nodes: Vec<HypotheticalTable>) -> Option<Oid> {
        let root = nodes.first()?;
        let (root_oid, relid) = (root.oid, root.relid);
        for node in nodes {
            let oid = node.oid;
            let key = self.tables.alloc(node);
            self.table_by_oid.insert(oid, key);
        }
        self.root_by_relid.insert(relid, root_oid);
        self.roots.push(root_oid);
        Some(root_oid)
    }

    /// Maps a real table shadowed by a tree to the tree's root; other identifiers map to themselves
    fn canonical(&self, oid: Oid) -> Oid {
        self.root_by_relid.get(&oid).copied().unwrap_or(oid)
    }

    pub fn table(&self, oid: Oid) -> Option<&HypotheticalTable> {
        self.table_by_oid.get(&self.canonical(oid)).and_then(|key| self.tables.get(*key))
    }

    pub fn is_hypothetical_table(&self, oid: Oid) -> bool {
        self.table(oid).is_some()
    }

    /// Whether a real table is shadowed by a partition tree
    pub fn is_shadowed(&self, relid: Oid) -> bool {
        self.root_by_relid.contains_key(&relid)
    }

    /// Roots of every registered tree, in registration order
    pub fn tables(&self) -> Vec<&HypotheticalTable> {
        self.roots.iter().filter_map(|oid| self.table(*oid)).collect()
    }

    /// Every node of every tree
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Every partition below `oid`, breadth-first
    pub fn descendants(&self, oid: Oid) -> Vec<Oid> {
        let mut found = Vec::new();
        let mut queue: VecDeque<Oid> = self.table(oid).map(|t| t.children.iter().copied().collect()).unwrap_or_default();
        while let Some(next) = queue.pop_front() {
            found.push(next);
            if let Some(node) = self.table(next) {
                queue.extend(node.children.iter().copied());
            }
        }
        found
    }

    /// Removes the whole tree `oid` belongs to, returning every identifier it held.
    /// Only roots, or the real table they shadow, name a tree.
    pub fn remove_table(&mut self, oid: Oid) -> Option<Vec<Oid>> {
        let root = self.table(oid).filter(|t| t.is_root())?;
        let (root_oid, relid) = (root.oid, root.relid);

        let mut removed = vec![root_oid];
        removed.extend(self.descendants(root_oid));
        for member in &removed {
            if let Some(key) = self.table_by_oid.remove(member) {
                self.tables.free(key);
            }
        }
        self.root_by_relid.remove(&relid);
        self.roots.retain(|r| *r != root_oid);
        Some(removed)
    }

    /// The bound constraints a partition's rows satisfy: its own bound and every ancestor's
    pub fn bound_constraints(&self, oid: Oid) -> Vec<Constraint> {
        let mut constraints = Vec::new();
        let mut current = self.table(oid);
        while let Some(node) = current {
            let parent = node.parent.and_then(|p| self.table_by_oid.get(&p)).and_then(|key| self.tables.get(*key));
            if let (Some(bound), Some(key)) = (&node.bound, parent.and_then(|p| p.key.as_deref())) {
                constraints.extend(bound.constraints(key));
            }
            current = parent;
        }
        constraints
    }

    /// Drops every hypothetical object and invalidates every arena key
    pub fn reset(&mut self) {
        self.indexes.reset();
        self.index_order.clear();
        self.index_by_oid.clear();
        self.tables.reset();
        self.table_by_oid.clear();
        self.root_by_relid.clear();
        self.roots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty() && self.tables.is_empty()
    }
}

impl Default for HypoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{PartitionBound, RangeDatum};
    use hypodb_common::{ColumnDef, DataType, Datum, Persistence, RelKind, RelationMeta};

    fn relation() -> RelationMeta {
        RelationMeta {
            oid: Oid(16384),
            name: "t".to_string(),
            kind: RelKind::Relation,
            persistence: Persistence::Permanent,
            tablespace: Oid::INVALID,
            columns: vec![ColumnDef::new(1, "c", DataType::Int4), ColumnDef::new(2, "d", DataType::Int4)],
            pages: 100,
            tuples: 10_000.0,
        }
    }

    fn index(oid: u32, column: &str) -> HypotheticalIndex {
        HypotheticalIndex::build(Oid(oid), &relation(), &IndexSpec::btree(&[column])).unwrap()
    }

    fn tree(spec: &PartitioningSpec, first_oid: u32) -> Vec<HypotheticalTable> {
        let mut next = first_oid;
        let mut allocate = || {
            next += 1;
            Ok(Oid(next))
        };
        table::build_tree(&relation(), spec, &mut Vec::new(), &mut allocate).unwrap()
    }

    fn two_level() -> PartitioningSpec {
        PartitioningSpec::range(&["c"])
            .partition(
                PartitionSpec::range("t_lo", RangeDatum::MinValue, RangeDatum::Value(Datum::Int(10)))
                    .subpartition_by(PartitioningSpec::list("d").partition(PartitionSpec::list("t_lo_1", vec![Datum::Int(1)])).partition(PartitionSpec::default("t_lo_rest"))),
            )
            .partition(PartitionSpec::range("t_hi", RangeDatum::Value(Datum::Int(10)), RangeDatum::MaxValue))
    }

    #[test]
    fn test_indexes_keep_registration_order() {
        let mut registry = HypoRegistry::new();
        registry.insert_index(index(30, "d"));
        registry.insert_index(index(20, "c"));
        let oids: Vec<Oid> = registry.indexes_for(Oid(16384)).iter().map(|i| i.oid).collect();
        assert_eq!(oids, vec![Oid(30), Oid(20)]);
        assert!(registry.indexes_for(Oid(1)).is_empty());
    }

    #[test]
    fn test_remove_index() {
        let mut registry = HypoRegistry::new();
        registry.insert_index(index(30, "d"));
        assert!(registry.remove_index(Oid(30)).is_some());
        assert!(registry.remove_index(Oid(30)).is_none());
        assert!(registry.index(Oid(30)).is_none());
        assert_eq!(registry.index_count(), 0);
    }

    #[test]
    fn test_tree_lookup_through_real_table() {
        let mut registry = HypoRegistry::new();
        let root = registry.insert_table_tree(tree(&two_level(), 50_000)).unwrap();
        assert_ne!(root, Oid(16384));
        assert_eq!(registry.table(Oid(16384)).map(|t| t.oid), Some(root));
        assert!(registry.is_shadowed(Oid(16384)));
        assert_eq!(registry.table_count(), 5);
    }

    #[test]
    fn test_descendants_are_breadth_first() {
        let mut registry = HypoRegistry::new();
        registry.insert_table_tree(tree(&two_level(), 50_000)).unwrap();
        let names: Vec<String> = registry.descendants(Oid(16384)).iter().filter_map(|oid| registry.table(*oid)).map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["t_lo", "t_hi", "t_lo_1", "t_lo_rest"]);
    }

    #[test]
    fn test_bound_constraints_include_ancestors() {
        let mut registry = HypoRegistry::new();
        registry.insert_table_tree(tree(&two_level(), 50_000)).unwrap();
        let leaf = registry.descendants(Oid(16384)).into_iter().find(|oid| registry.table(*oid).is_some_and(|t| t.name == "t_lo_1")).unwrap();
        let constraints = registry.bound_constraints(leaf);
        // d IN (1), then c IS NOT NULL and c < 10 from the parent
        assert_eq!(constraints.len(), 3);
        assert!(registry.bound_constraints(Oid(16384)).is_empty());
    }

    #[test]
    fn test_remove_table_drops_whole_tree() {
        let mut registry = HypoRegistry::new();
        let root = registry.insert_table_tree(tree(&two_level(), 50_000)).unwrap();
        let child = registry.descendants(root)[0];
        assert!(registry.remove_table(child).is_none());

        let removed = registry.remove_table(Oid(16384)).unwrap();
        assert_eq!(removed.len(), 5);
        assert!(!registry.is_shadowed(Oid(16384)));
        assert!(registry.table(child).is_none());
        assert!(registry.tables().is_empty());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut registry = HypoRegistry::new();
        registry.insert_index(index(30, "d"));
        registry.insert_table_tree(tree(&two_level(), 50_000)).unwrap();
        registry.reset();
        assert!(registry.is_empty());
        registry.reset();
        assert!(registry.is_empty());
        assert!(registry.table(Oid(16384)).is_none());
    }

    #[test]
    fn test_list_bound_is_not_range() {
        let mut registry = HypoRegistry::new();
        registry.insert_table_tree(tree(&two_level(), 50_000)).unwrap();
        let hi = registry.tables()[0].children[1];
        assert!(matches!(registry.table(hi).and_then(|t| t.bound.clone()), Some(PartitionBound::Range { .. })));
    }
}
