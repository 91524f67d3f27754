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

//! Hypothetical partitioning: descriptors, keys, bound constraints and constraint exclusion

use std::sync::Arc;
use tracing::debug;

use crate::host::predtest::refuted_by;
use crate::host::{PartitionDesc, PlannerInfo, RelOptInfo, RelPartitionInfo};
use crate::registry::{HypoRegistry, HypotheticalTable};

/// Descriptor of a partitioned node: its partitions in bound order, default last
pub fn partition_desc(registry: &HypoRegistry, node: &HypotheticalTable) -> PartitionDesc {
    PartitionDesc::new(
        node.children
            .iter()
            .filter_map(|oid| registry.table(*oid))
            .filter_map(|child| child.bound.clone().map(|bound| (child.oid, bound)))
            .collect(),
    )
}

fn scale_pages(pages: u64, share: f64) -> u64 {
    ((pages as f64 * share).ceil() as u64).max(1)
}

/// Installs partitioning on a relation whose range-table entry stands for a hypothetical table.
///
/// A partitioned node gets its key and descriptor. A partition also gets the constraints implied
/// by its bound and every ancestor's, and its size and index sizes shrink to its share of the heap.
pub fn attach_partitioning(registry: &HypoRegistry, root: &PlannerInfo, rel: &mut RelOptInfo) -> bool {
    let Some(logical) = root.rte(rel.rti).map(|rte| rte.logical_relid()) else {
        return false;
    };
    let Some(node) = registry.table(logical) else {
        return false;
    };

    if let Some(key) = &node.key {
        rel.partitioning = Some(RelPartitionInfo {
            key: Arc::clone(key),
            desc: Arc::new(partition_desc(registry, node)),
        });
    }

    if !node.is_root() {
        rel.partition_constraints = registry.bound_constraints(node.oid);
        rel.pages = scale_pages(rel.pages, node.share);
        rel.tuples = (rel.tuples * node.share).round();
        for index in &mut rel.index_list {
            index.pages = scale_pages(index.pages, node.share);
            index.tuples = (index.tuples * node.share).round();
        }
        rel.name = node.name.clone();
        debug!("Sized hypothetical partition {} at {:.3} of {}", node.name, node.share, node.relid);
    }
    true
}

/// Marks a hypothetical partition dummy when its restrictions contradict its bound constraints
pub fn exclude_refuted(root: &PlannerInfo, rel: &mut RelOptInfo) -> bool {
    if rel.is_dummy || rel.partition_constraints.is_empty() || !root.settings.constraint_exclusion.applies(true) {
        return false;
    }
    if !refuted_by(&rel.base_restrictions, &rel.partition_constraints) {
        return false;
    }
    debug!("Excluding hypothetical partition {}", rel.name);
    rel.set_dummy();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::settings::{ConstraintExclusion, PlannerSettings};
    use crate::host::{ColumnTest, CmpOp, RangeDatum, RangeTblEntry, Restriction};
    use crate::registry::table::build_tree;
    use crate::registry::{PartitionSpec, PartitioningSpec};
    use hypodb_common::{AttrNumber, ColumnDef, DataType, Datum, Oid, Persistence, RelKind, RelationMeta, RtIndex};

    fn relation() -> RelationMeta {
        RelationMeta {
            oid: Oid(16384),
            name: "t".to_string(),
            kind: RelKind::Relation,
            persistence: Persistence::Permanent,
            tablespace: Oid::INVALID,
            columns: vec![ColumnDef::new(1, "c", DataType::Int4)],
            pages: 100,
            tuples: 10_000.0,
        }
    }

    fn registry() -> HypoRegistry {
        let spec = PartitioningSpec::range(&["c"])
            .partition(PartitionSpec::range("t_lo", RangeDatum::MinValue, RangeDatum::Value(Datum::Int(10))))
            .partition(PartitionSpec::range("t_hi", RangeDatum::Value(Datum::Int(10)), RangeDatum::MaxValue));
        let mut next = 70_000;
        let mut allocate = || {
            next += 1;
            Ok(Oid(next))
        };
        let nodes = build_tree(&relation(), &spec, &mut Vec::new(), &mut allocate).unwrap();
        let mut registry = HypoRegistry::new();
        registry.insert_table_tree(nodes).unwrap();
        registry
    }

    fn planner_with(entry: RangeTblEntry, settings: PlannerSettings) -> PlannerInfo {
        let mut root = PlannerInfo::new(settings);
        root.add_rte(entry);
        root
    }

    fn rel(restriction: Option<Restriction>) -> RelOptInfo {
        RelOptInfo {
            rti: RtIndex(1),
            relid: Oid(16384),
            name: "t".to_string(),
            pages: 100,
            tuples: 10_000.0,
            rows: 10_000.0,
            width: 4,
            columns: relation().columns,
            index_list: Vec::new(),
            base_restrictions: restriction.into_iter().collect(),
            pathlist: Vec::new(),
            partitioning: None,
            partition_constraints: Vec::new(),
            is_dummy: false,
        }
    }

    fn partition_entry(registry: &HypoRegistry, name: &str) -> RangeTblEntry {
        let oid = registry.descendants(Oid(16384)).into_iter().find(|oid| registry.table(*oid).is_some_and(|t| t.name == name)).unwrap();
        let mut entry = RangeTblEntry::new(Oid(16384), RelKind::Relation, name, false);
        entry.hypo_partition = Some(oid);
        entry
    }

    fn c_equals(value: i64) -> Restriction {
        Restriction::new(AttrNumber(1), "c", ColumnTest::Cmp(CmpOp::Eq, Datum::Int(value)))
    }

    #[test]
    fn test_root_gets_descriptor_and_key() {
        let registry = registry();
        let root = planner_with(RangeTblEntry::new(Oid(16384), RelKind::Relation, "t", true), PlannerSettings::default());
        let mut rel = rel(None);
        assert!(attach_partitioning(&registry, &root, &mut rel));

        let info = rel.partitioning.unwrap();
        assert_eq!(info.desc.len(), 2);
        assert_eq!(info.desc.default_index, None);
        assert_eq!(info.key.attnums, vec![AttrNumber(1)]);
        assert!(rel.partition_constraints.is_empty());
        assert_eq!(rel.pages, 100);
    }

    #[test]
    fn test_partition_is_scaled_and_constrained() {
        let registry = registry();
        let root = planner_with(partition_entry(&registry, "t_lo"), PlannerSettings::default());
        let mut rel = rel(None);
        assert!(attach_partitioning(&registry, &root, &mut rel));

        assert!(rel.partitioning.is_none());
        assert_eq!(rel.pages, 50);
        assert_eq!(rel.tuples, 5_000.0);
        assert_eq!(rel.name, "t_lo");
        assert_eq!(rel.partition_constraints.len(), 2);
    }

    #[test]
    fn test_plain_relation_untouched() {
        let registry = registry();
        let root = planner_with(RangeTblEntry::new(Oid(99), RelKind::Relation, "other", false), PlannerSettings::default());
        let mut rel = rel(None);
        assert!(!attach_partitioning(&registry, &root, &mut rel));
        assert!(rel.partitioning.is_none());
    }

    #[test]
    fn test_refuted_partition_becomes_dummy() {
        let registry = registry();
        let root = planner_with(partition_entry(&registry, "t_lo"), PlannerSettings::default());
        let mut rel = rel(Some(c_equals(50)));
        attach_partitioning(&registry, &root, &mut rel);

        assert!(exclude_refuted(&root, &mut rel));
        assert!(rel.is_dummy);
        assert_eq!(rel.pathlist.len(), 1);
        assert!(rel.pathlist[0].is_dummy());
        assert_eq!(rel.rows, 0.0);
    }

    #[test]
    fn test_matching_partition_survives() {
        let registry = registry();
        let root = planner_with(partition_entry(&registry, "t_hi"), PlannerSettings::default());
        let mut rel = rel(Some(c_equals(50)));
        attach_partitioning(&registry, &root, &mut rel);
        assert!(!exclude_refuted(&root, &mut rel));
        assert!(!rel.is_dummy);
    }

    #[test]
    fn test_exclusion_can_be_switched_off() {
        let registry = registry();
        let settings = PlannerSettings {
            constraint_exclusion: ConstraintExclusion::Off,
            ..PlannerSettings::default()
        };
        let root = planner_with(partition_entry(&registry, "t_lo"), settings);
        let mut rel = rel(Some(c_equals(50)));
        attach_partitioning(&registry, &root, &mut rel);
        assert!(!exclude_refuted(&root, &mut rel));
    }
}
