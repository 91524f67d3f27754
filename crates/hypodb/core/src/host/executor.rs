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

//! Plan execution
//!
//! No tuples are read. Executing a plan opens every relation and index it references through the
//! catalog and records what was opened, so a plan naming an object that does not physically exist
//! fails exactly where a real executor would.

use hypodb_common::{Catalog, Oid};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::path::{Path, PathKind};
use super::planner::Plan;
use super::settings::PlannerSettings;
use super::statement::PlannedStmt;
use crate::error::{HypoError, HypoResult};

/// Objects opened while executing a plan, in execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub relations: Vec<String>,
    pub indexes: Vec<Oid>,
    /// Rows the plan was estimated to return
    pub rows: f64,
}

impl ExecutionTrace {
    pub fn used_index(&self, oid: Oid) -> bool {
        self.indexes.contains(&oid)
    }
}

/// Everything the hooks see about the statement being run
#[derive(Debug, Clone)]
pub struct QueryDesc {
    pub statement: PlannedStmt,
    /// Settings in force; a SET updates them here and the session keeps the result
    pub settings: PlannerSettings,
    pub plan: Option<Plan>,
    /// Rendered EXPLAIN output
    pub explain: Option<String>,
    pub trace: Option<ExecutionTrace>,
}

impl QueryDesc {
    pub fn new(statement: PlannedStmt, settings: PlannerSettings) -> Self {
        Self {
            statement,
            settings,
            plan: None,
            explain: None,
            trace: None,
        }
    }
}

pub fn execute(catalog: &dyn Catalog, plan: &Plan) -> HypoResult<ExecutionTrace> {
    let mut trace = ExecutionTrace::default();
    visit(catalog, plan, &plan.path, &mut trace)?;
    trace.rows = plan.path.rows;
    debug!("Executed plan over {} relation(s), {} index(es)", trace.relations.len(), trace.indexes.len());
    Ok(trace)
}

fn visit(catalog: &dyn Catalog, plan: &Plan, path: &Path, trace: &mut ExecutionTrace) -> HypoResult<()> {
    if let PathKind::Append { children } = &path.kind {
        for child in children {
            visit(catalog, plan, child, trace)?;
        }
        return Ok(());
    }
    if path.is_dummy() {
        return Ok(());
    }

    let rte = plan.root.rte(path.rti).ok_or_else(|| HypoError::Executor(format!("no range table entry {}", path.rti.0)))?;
    if let Some(partition) = rte.hypo_partition {
        return Err(HypoError::Executor(format!("relation {partition} does not exist")));
    }
    let relation = catalog.relation(rte.relid).map_err(|e| HypoError::Executor(e.to_string()))?;

    if let Some(oid) = path.index_oid() {
        let index = catalog.index(oid).map_err(|_| HypoError::Executor(format!("could not open index {oid}")))?;
        if index.relid != relation.oid {
            return Err(HypoError::Executor(format!("index \"{}\" does not belong to \"{}\"", index.name, relation.name)));
        }
        trace.indexes.push(oid);
    }
    trace.relations.push(relation.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::catalog::{MemoryCatalog, TableBuilder};
    use crate::host::rel::{PlannerInfo, RangeTblEntry};
    use hypodb_common::{AccessMethod, ColumnDef, DataType, RelKind, RtIndex};
    use std::collections::HashMap;

    fn plan_with(entry: RangeTblEntry, kind: PathKind) -> Plan {
        let mut root = PlannerInfo::default();
        let rti = root.add_rte(entry);
        let relid = root.rte(rti).map(|r| r.relid).unwrap();
        Plan {
            root,
            path: Path {
                kind,
                rti,
                relid,
                rows: 3.0,
                startup_cost: 0.0,
                total_cost: 1.0,
                filter: Vec::new(),
            },
            widths: HashMap::new(),
            pruned: Vec::new(),
        }
    }

    fn catalog() -> (MemoryCatalog, Oid) {
        let catalog = MemoryCatalog::new();
        let t = catalog.create_table(TableBuilder::new("t").column(ColumnDef::new(1, "c", DataType::Int4)).stats(1, 10.0)).unwrap();
        (catalog, t)
    }

    #[test]
    fn test_trace_records_scans() {
        let (catalog, t) = catalog();
        let index = catalog.create_index(t, "t_c", AccessMethod::BTree, &["c"], false).unwrap();
        let plan = plan_with(
            RangeTblEntry::new(t, RelKind::Relation, "t", false),
            PathKind::IndexScan {
                index_oid: index,
                index_quals: Vec::new(),
            },
        );
        let trace = execute(&catalog, &plan).unwrap();
        assert_eq!(trace.relations, vec!["t"]);
        assert!(trace.used_index(index));
        assert_eq!(trace.rows, 3.0);
    }

    #[test]
    fn test_unknown_index_fails() {
        let (catalog, t) = catalog();
        let plan = plan_with(
            RangeTblEntry::new(t, RelKind::Relation, "t", false),
            PathKind::IndexScan {
                index_oid: Oid(999_999),
                index_quals: Vec::new(),
            },
        );
        assert!(matches!(execute(&catalog, &plan), Err(HypoError::Executor(_))));
    }

    #[test]
    fn test_hypothetical_partition_cannot_run() {
        let (catalog, t) = catalog();
        let mut entry = RangeTblEntry::new(t, RelKind::Relation, "t_p1", false);
        entry.hypo_partition = Some(Oid(999_998));
        let plan = plan_with(entry, PathKind::SeqScan);
        assert!(matches!(execute(&catalog, &plan), Err(HypoError::Executor(_))));
    }

    #[test]
    fn test_dummy_plan_touches_nothing() {
        let (catalog, t) = catalog();
        let mut plan = plan_with(RangeTblEntry::new(t, RelKind::Relation, "t", false), PathKind::SeqScan);
        plan.path = Path::dummy(RtIndex(1), t);
        let trace = execute(&catalog, &plan).unwrap();
        assert!(trace.relations.is_empty());
    }
}
