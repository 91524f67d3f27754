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

//! Hypothetical index attachment

use hypodb_common::{Oid, RelKind};
use tracing::debug;

use crate::host::{IndexOptInfo, RelOptInfo};
use crate::registry::{HypoRegistry, HypotheticalIndex};

/// Describes a hypothetical index the way the planner describes a physical one
pub fn index_opt_info(index: &HypotheticalIndex) -> IndexOptInfo {
    let am = index.access_method;
    IndexOptInfo {
        index_oid: index.oid,
        relid: index.relid,
        access_method: am,
        pages: index.size.pages,
        tuples: index.size.tuples,
        tree_height: index.size.tree_height,
        index_keys: index.columns.iter().map(|c| c.attnum).collect(),
        include: index.include.iter().map(|(attnum, _)| *attnum).collect(),
        reverse_sort: index.columns.iter().map(|c| c.descending).collect(),
        nulls_first: index.columns.iter().map(|c| c.nulls_first).collect(),
        unique: index.unique,
        predicate: index.predicate.clone(),
        pred_ok: false,
        can_order: am.can_order(),
        has_gettuple: am.has_gettuple(),
        has_getbitmap: am.has_getbitmap(),
        supports_range: am.supports_range(),
        hypothetical: true,
    }
}

/// Appends every hypothetical index on `relid`, in registration order, to the relation's
/// candidate list. Returns how many were added.
pub fn attach_indexes(registry: &HypoRegistry, relid: Oid, relkind: RelKind, rel: &mut RelOptInfo) -> usize {
    if !relkind.is_indexable() {
        return 0;
    }
    let before = rel.index_list.len();
    rel.index_list.extend(registry.indexes_for(relid).into_iter().map(index_opt_info));
    let added = rel.index_list.len() - before;
    if added > 0 {
        debug!("Attached {} hypothetical index(es) to {}", added, rel.name);
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CmpOp;
    use crate::registry::IndexSpec;
    use hypodb_common::{AttrNumber, ColumnDef, DataType, Oid, Persistence, RelationMeta, RtIndex};

    fn relation() -> RelationMeta {
        RelationMeta {
            oid: Oid(16384),
            name: "orders".to_string(),
            kind: RelKind::Relation,
            persistence: Persistence::Permanent,
            tablespace: Oid::INVALID,
            columns: vec![ColumnDef::new(1, "id", DataType::Int8), ColumnDef::new(2, "status", DataType::Text)],
            pages: 1000,
            tuples: 100_000.0,
        }
    }

    fn rel() -> RelOptInfo {
        RelOptInfo {
            rti: RtIndex(1),
            relid: Oid(16384),
            name: "orders".to_string(),
            pages: 1000,
            tuples: 100_000.0,
            rows: 100_000.0,
            width: 40,
            columns: relation().columns,
            index_list: Vec::new(),
            base_restrictions: Vec::new(),
            pathlist: Vec::new(),
            partitioning: None,
            partition_constraints: Vec::new(),
            is_dummy: false,
        }
    }

    fn registry_with(specs: &[(u32, IndexSpec)]) -> HypoRegistry {
        let mut registry = HypoRegistry::new();
        for (oid, spec) in specs {
            registry.insert_index(HypotheticalIndex::build(Oid(*oid), &relation(), spec).unwrap());
        }
        registry
    }

    #[test]
    fn test_opt_info_mirrors_definition() {
        let spec = IndexSpec::btree(&["id", "status"]).desc("status").unique().filter("status", CmpOp::Eq, "open");
        let index = HypotheticalIndex::build(Oid(90_000), &relation(), &spec).unwrap();
        let info = index_opt_info(&index);

        assert!(info.hypothetical);
        assert!(info.unique && info.can_order && info.has_gettuple);
        assert_eq!(info.index_keys, vec![Some(AttrNumber(1)), Some(AttrNumber(2))]);
        assert_eq!(info.reverse_sort, vec![false, true]);
        assert_eq!(info.nulls_first, vec![false, true]);
        assert!(info.is_partial());
        assert_eq!(info.pages, index.size.pages);
    }

    #[test]
    fn test_attach_keeps_registration_order() {
        let registry = registry_with(&[(90_002, IndexSpec::btree(&["status"])), (90_001, IndexSpec::hash("id"))]);
        let mut rel = rel();
        assert_eq!(attach_indexes(&registry, Oid(16384), RelKind::Relation, &mut rel), 2);
        let oids: Vec<Oid> = rel.index_list.iter().map(|i| i.index_oid).collect();
        assert_eq!(oids, vec![Oid(90_002), Oid(90_001)]);
    }

    #[test]
    fn test_attach_skips_non_indexable_relations() {
        let registry = registry_with(&[(90_001, IndexSpec::btree(&["id"]))]);
        let mut rel = rel();
        assert_eq!(attach_indexes(&registry, Oid(16384), RelKind::View, &mut rel), 0);
        assert!(rel.index_list.is_empty());
    }

    #[test]
    fn test_attach_other_relation_is_noop() {
        let registry = registry_with(&[(90_001, IndexSpec::btree(&["id"]))]);
        let mut rel = rel();
        assert_eq!(attach_indexes(&registry, Oid(5), RelKind::Relation, &mut rel), 0);
    }
}
