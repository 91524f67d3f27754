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

//! Inheritance metadata for hypothetical partition trees

use hypodb_common::{Oid, RelKind, RtIndex};

use crate::error::{HypoError, HypoResult};
use crate::host::{PlannerInfo, RangeTblEntry};
use crate::registry::{HypoRegistry, HypotheticalTable};

/// A partition to expand, detached from the registry so no lock is held while hooks run
#[derive(Debug, Clone, PartialEq)]
pub struct ChildEntry {
    pub oid: Oid,
    pub name: String,
}

/// `relid` followed by every partition below it, breadth-first
pub fn inheritors(registry: &HypoRegistry, relid: Oid) -> Option<Vec<Oid>> {
    registry.table(relid)?;
    let mut all = vec![relid];
    all.extend(registry.descendants(relid));
    Some(all)
}

/// Direct partitions of a hypothetical partitioned node, in descriptor order
pub fn child_entries(registry: &HypoRegistry, parent: Oid) -> Option<Vec<ChildEntry>> {
    let node = registry.table(parent).filter(|t| t.is_partitioned())?;
    Some(
        node.children
            .iter()
            .filter_map(|oid| registry.table(*oid))
            .map(|child| ChildEntry {
                oid: child.oid,
                name: child.name.clone(),
            })
            .collect(),
    )
}

/// Adds one range-table entry per child below `parent_rti`.
///
/// Each entry starts as a copy of the parent's and is handed to `finish` together with the child's
/// identifier before it is linked. Children already expanded under this parent are skipped.
pub fn expand_children(
    root: &mut PlannerInfo,
    parent_rti: RtIndex,
    children: &[ChildEntry],
    finish: &mut dyn FnMut(&mut RangeTblEntry, Oid) -> HypoResult<()>,
) -> HypoResult<usize> {
    let parent = root.rte(parent_rti).cloned().ok_or_else(|| HypoError::Planner(format!("no range table entry {}", parent_rti.0)))?;

    let mut added = 0;
    for child in children {
        let mut entry = RangeTblEntry::new(parent.relid, parent.relkind, &parent.alias, false);
        finish(&mut entry, child.oid)?;
        if root.has_child(parent_rti, entry.logical_relid()) {
            continue;
        }
        root.add_child_rte(parent_rti, entry);
        added += 1;
    }
    Ok(added)
}

/// Turns a child entry into one that scans the shadowed heap on behalf of a hypothetical partition
pub fn build_child_rtentry(node: &HypotheticalTable, child: &mut RangeTblEntry) {
    child.relid = node.relid;
    child.relkind = RelKind::Relation;
    child.hypo_partition = Some(node.oid);
    child.inh = node.is_partitioned();
    child.alias = node.name.clone();
}
