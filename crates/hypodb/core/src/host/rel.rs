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

//! The planner's working structures: range table, per-relation planning state and candidate indexes

use hypodb_common::{AccessMethod, AttrNumber, ColumnDef, Oid, RelKind, RtIndex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::partition::{PartitionDesc, PartitionKey};
use super::path::Path;
use super::predtest::{Constraint, Restriction};
use super::settings::PlannerSettings;

/// A relation referenced by the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeTblEntry {
    /// The physical relation scanned
    pub relid: Oid,
    pub relkind: RelKind,
    /// Whether inheritance children should be expanded
    pub inh: bool,
    pub alias: String,
    /// Set when this entry stands for a hypothetical partition of `relid`
    pub hypo_partition: Option<Oid>,
    pub parent: Option<RtIndex>,
}

impl RangeTblEntry {
    pub fn new(relid: Oid, relkind: RelKind, alias: &str, inh: bool) -> Self {
        Self {
            relid,
            relkind,
            inh,
            alias: alias.to_string(),
            hypo_partition: None,
            parent: None,
        }
    }

    /// The identifier the planner reasons about: the hypothetical partition if any, else the relation
    pub fn logical_relid(&self) -> Oid {
        self.hypo_partition.unwrap_or(self.relid)
    }
}

/// Links a child range-table entry to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendRelInfo {
    pub parent_rti: RtIndex,
    pub child_rti: RtIndex,
    pub parent_relid: Oid,
    pub child_relid: Oid,
}

/// A candidate index as the planner costs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOptInfo {
    pub index_oid: Oid,
    pub relid: Oid,
    pub access_method: AccessMethod,
    pub pages: u64,
    pub tuples: f64,
    pub tree_height: i32,
    /// One entry per key column, `None` for an expression
    pub index_keys: Vec<Option<AttrNumber>>,
    pub include: Vec<AttrNumber>,
    pub reverse_sort: Vec<bool>,
    pub nulls_first: Vec<bool>,
    pub unique: bool,
    pub predicate: Vec<Restriction>,
    /// Whether the query's restrictions imply the partial predicate
    pub pred_ok: bool,
    pub can_order: bool,
    pub has_gettuple: bool,
    pub has_getbitmap: bool,
    pub supports_range: bool,
    pub hypothetical: bool,
}

impl IndexOptInfo {
    pub fn leading_key(&self) -> Option<AttrNumber> {
        self.index_keys.first().copied().flatten()
    }

    pub fn is_partial(&self) -> bool {
        !self.predicate.is_empty()
    }
}

/// Partitioning attached to a partitioned relation during planning
#[derive(Debug, Clone, PartialEq)]
pub struct RelPartitionInfo {
    pub key: Arc<PartitionKey>,
    pub desc: Arc<PartitionDesc>,
}

#[derive(Debug, Clone)]
pub struct RelOptInfo {
    pub rti: RtIndex,
    pub relid: Oid,
    pub name: String,
    pub pages: u64,
    pub tuples: f64,
    pub rows: f64,
    pub width: u32,
    pub columns: Vec<ColumnDef>,
    pub index_list: Vec<IndexOptInfo>,
    pub base_restrictions: Vec<Restriction>,
    pub pathlist: Vec<Path>,
    pub partitioning: Option<RelPartitionInfo>,
    pub partition_constraints: Vec<Constraint>,
    pub is_dummy: bool,
}

impl RelOptInfo {
    pub fn column_name(&self, attnum: AttrNumber) -> Option<&str> {
        self.columns.iter().find(|c| c.attnum == attnum).map(|c| c.name.as_str())
    }

    pub fn add_path(&mut self, path: Path) {
        self.pathlist.push(path);
    }

    /// Cheapest path by total cost. On ties the path added first wins.
    pub fn cheapest_path(&self) -> Option<&Path> {
        self.pathlist.iter().fold(None, |best: Option<&Path>, path| match best {
            Some(current) if current.total_cost <= path.total_cost => Some(current),
            _ => Some(path),
        })
    }

    /// Replaces every path with a single dummy path
    pub fn set_dummy(&mut self) {
        self.pathlist.clear();
        self.pathlist.push(Path::dummy(self.rti, self.relid));
        self.rows = 0.0;
        self.is_dummy = true;
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlannerInfo {
    pub range_table: Vec<RangeTblEntry>,
    pub append_rel_list: Vec<AppendRelInfo>,
    pub settings: PlannerSettings,
}

impl PlannerInfo {
    pub fn new(settings: PlannerSettings) -> Self {
        Self {
            range_table: Vec::new(),
            append_rel_list: Vec::new(),
            settings,
        }
    }

    pub fn rte(&self, rti: RtIndex) -> Option<&RangeTblEntry> {
        rti.0.checked_sub(1).and_then(|slot| self.range_table.get(slot))
    }

    pub fn add_rte(&mut self, rte: RangeTblEntry) -> RtIndex {
        self.range_table.push(rte);
        RtIndex(self.range_table.len())
    }

    /// Appends a child entry and links it to its parent
    pub fn add_child_rte(&mut self, parent_rti: RtIndex, mut child: RangeTblEntry) -> RtIndex {
        let parent_relid = self.rte(parent_rti).map(RangeTblEntry::logical_relid).unwrap_or(Oid::INVALID);
        child.parent = Some(parent_rti);
        let child_relid = child.logical_relid();
        let child_rti = self.add_rte(child);
        self.append_rel_list.push(AppendRelInfo {
            parent_rti,
            child_rti,
            parent_relid,
            child_relid,
        });
        child_rti
    }

    pub fn children_of(&self, parent_rti: RtIndex) -> Vec<RtIndex> {
        self.append_rel_list.iter().filter(|info| info.parent_rti == parent_rti).map(|info| info.child_rti).collect()
    }

    /// Whether a child with the given logical id was already expanded under the parent
    pub fn has_child(&self, parent_rti: RtIndex, child_relid: Oid) -> bool {
        self.append_rel_list.iter().any(|info| info.parent_rti == parent_rti && info.child_relid == child_relid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rt_indexes_are_one_based() {
        let mut root = PlannerInfo::default();
        let rti = root.add_rte(RangeTblEntry::new(Oid(100), RelKind::Relation, "t", true));
        assert_eq!(rti, RtIndex(1));
        assert_eq!(root.rte(rti).map(|r| r.relid), Some(Oid(100)));
    }

    #[test]
    fn test_child_rte_linking() {
        let mut root = PlannerInfo::default();
        let parent = root.add_rte(RangeTblEntry::new(Oid(100), RelKind::Relation, "t", true));
        let mut child = RangeTblEntry::new(Oid(100), RelKind::Relation, "t_1", false);
        child.hypo_partition = Some(Oid(200));
        let child_rti = root.add_child_rte(parent, child);

        assert_eq!(root.children_of(parent), vec![child_rti]);
        assert!(root.has_child(parent, Oid(200)));
        assert!(!root.has_child(parent, Oid(100)));
        assert_eq!(root.rte(child_rti).and_then(|r| r.parent), Some(parent));
    }
}
