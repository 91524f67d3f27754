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

//! The host planner
//!
//! A small cost-based planner and the statement pipeline around it: statements, settings, the
//! in-memory catalog, relation and path structures, predicate proofs, plan rendering and a
//! trace-only executor. Every planner extensibility point is reached through a [`crate::hooks::HookChain`],
//! so interceptors observe and adjust planning the same way they would inside a real server.

pub mod catalog;
pub mod cost_model;
pub mod executor;
pub mod partition;
pub mod path;
pub mod planner;
pub mod predtest;
pub mod rel;
pub mod render;
pub mod session;
pub mod settings;
pub mod standard;
pub mod statement;

pub use catalog::{MemoryCatalog, TableBuilder};
pub use cost_model::{CostModel, restriction_selectivity};
pub use executor::{ExecutionTrace, QueryDesc, execute};
pub use partition::{PartitionBound, PartitionDesc, PartitionKey, PartitionStrategy, RangeDatum, compare_range_bounds, row_hash};
pub use path::{Path, PathKind};
pub use planner::{Plan, Planner};
pub use predtest::{Constraint, Restriction, implied_by, refuted_by};
pub use rel::{AppendRelInfo, IndexOptInfo, PlannerInfo, RangeTblEntry, RelOptInfo, RelPartitionInfo};
pub use render::{ExplainFormat, PlanNode, PlanRenderer, RenderOptions};
pub use session::{Session, StatementOutcome};
pub use settings::{ConstraintExclusion, PlannerSettings};
pub use standard::StandardHost;
pub use statement::{CmpOp, ColumnTest, CommandType, ExplainOption, ExplainStmt, PlannedStmt, Qual, Query, Statement, UtilityStmt};
