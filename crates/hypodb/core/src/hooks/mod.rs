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

//! Planner extensibility points
//!
//! Every extensibility point is served by a stack of [`PlannerHook`] interceptors. The most
//! recently installed interceptor runs first and receives a [`Next`] continuation; calling the
//! matching method on it runs the rest of the stack, and finally the host's [`StandardHooks`].
//! An interceptor that does not override a method delegates to `next` unchanged.

mod chain;

pub use chain::{HookChain, HookError, HookHandle, Next};

use hypodb_common::{Oid, RtIndex};
use std::fmt;
use std::sync::Arc;

use crate::context::StatementContext;
use crate::error::HypoResult;
use crate::host::{PartitionDesc, PartitionKey, PlannedStmt, PlannerInfo, QueryDesc, RangeTblEntry, RelOptInfo};

/// An interceptor over the planner's extensibility points
pub trait PlannerHook: Send + Sync {
    fn name(&self) -> &str;

    /// Runs a utility statement such as EXPLAIN or SET
    fn process_utility(&self, ctx: &mut StatementContext, stmt: &PlannedStmt, desc: &mut QueryDesc, next: Next<'_>) -> HypoResult<()> {
        next.process_utility(ctx, stmt, desc)
    }

    /// Runs once per statement after execution, on success and on error
    fn executor_end(&self, ctx: &mut StatementContext, desc: &mut QueryDesc, next: Next<'_>) -> HypoResult<()> {
        next.executor_end(ctx, desc)
    }

    /// Fills in a relation's size, candidate indexes and partitioning
    fn get_relation_info(
        &self,
        ctx: &StatementContext,
        root: &mut PlannerInfo,
        relation_oid: Oid,
        inhparent: bool,
        rel: &mut RelOptInfo,
        next: Next<'_>,
    ) -> HypoResult<()> {
        next.get_relation_info(ctx, root, relation_oid, inhparent, rel)
    }

    /// Adjusts a base relation's access paths once they have been built
    fn set_rel_pathlist(&self, ctx: &StatementContext, root: &mut PlannerInfo, rel: &mut RelOptInfo, rti: RtIndex, next: Next<'_>) -> HypoResult<()> {
        next.set_rel_pathlist(ctx, root, rel, rti)
    }

    fn partition_desc(&self, ctx: &StatementContext, relid: Oid, next: Next<'_>) -> HypoResult<Option<Arc<PartitionDesc>>> {
        next.partition_desc(ctx, relid)
    }

    fn partition_key(&self, ctx: &StatementContext, relid: Oid, next: Next<'_>) -> HypoResult<Option<Arc<PartitionKey>>> {
        next.partition_key(ctx, relid)
    }

    fn has_subclass(&self, ctx: &StatementContext, relid: Oid, next: Next<'_>) -> HypoResult<bool> {
        next.has_subclass(ctx, relid)
    }

    /// The relation itself followed by every descendant
    fn find_all_inheritors(&self, ctx: &StatementContext, relid: Oid, next: Next<'_>) -> HypoResult<Vec<Oid>> {
        next.find_all_inheritors(ctx, relid)
    }

    /// Adds the child range-table entries of a partitioned or inherited parent
    fn expand_child_rtentries(
        &self,
        ctx: &StatementContext,
        root: &mut PlannerInfo,
        parent_rti: RtIndex,
        partdesc: Option<&PartitionDesc>,
        next: Next<'_>,
    ) -> HypoResult<()> {
        next.expand_child_rtentries(ctx, root, parent_rti, partdesc)
    }

    /// Finishes a single child range-table entry built from its parent's
    fn build_child_rtentry(&self, ctx: &StatementContext, child: &mut RangeTblEntry, parent_oid: Oid, child_oid: Oid, next: Next<'_>) -> HypoResult<()> {
        next.build_child_rtentry(ctx, child, parent_oid, child_oid)
    }

    /// Display name of an index in plan output
    fn explain_index_name(&self, ctx: &StatementContext, index_oid: Oid, next: Next<'_>) -> HypoResult<Option<String>> {
        next.explain_index_name(ctx, index_oid)
    }
}

impl fmt::Debug for dyn PlannerHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannerHook").field("name", &self.name()).finish()
    }
}

/// The host's own implementation of every extensibility point, run when the interceptor stack is exhausted.
///
/// Each method receives the chain so that it can call back into other extensibility points
/// through the full stack.
pub trait StandardHooks: Send + Sync {
    fn process_utility(&self, chain: &HookChain, ctx: &mut StatementContext, stmt: &PlannedStmt, desc: &mut QueryDesc) -> HypoResult<()>;

    fn executor_end(&self, chain: &HookChain, ctx: &mut StatementContext, desc: &mut QueryDesc) -> HypoResult<()>;

    fn get_relation_info(
        &self,
        chain: &HookChain,
        ctx: &StatementContext,
        root: &mut PlannerInfo,
        relation_oid: Oid,
        inhparent: bool,
        rel: &mut RelOptInfo,
    ) -> HypoResult<()>;

    fn set_rel_pathlist(&self, chain: &HookChain, ctx: &StatementContext, root: &mut PlannerInfo, rel: &mut RelOptInfo, rti: RtIndex) -> HypoResult<()>;

    fn partition_desc(&self, chain: &HookChain, ctx: &StatementContext, relid: Oid) -> HypoResult<Option<Arc<PartitionDesc>>>;

    fn partition_key(&self, chain: &HookChain, ctx: &StatementContext, relid: Oid) -> HypoResult<Option<Arc<PartitionKey>>>;

    fn has_subclass(&self, chain: &HookChain, ctx: &StatementContext, relid: Oid) -> HypoResult<bool>;

    fn find_all_inheritors(&self, chain: &HookChain, ctx: &StatementContext, relid: Oid) -> HypoResult<Vec<Oid>>;

    fn expand_child_rtentries(
        &self,
        chain: &HookChain,
        ctx: &StatementContext,
        root: &mut PlannerInfo,
        parent_rti: RtIndex,
        partdesc: Option<&PartitionDesc>,
    ) -> HypoResult<()>;

    fn build_child_rtentry(&self, chain: &HookChain, ctx: &StatementContext, child: &mut RangeTblEntry, parent_oid: Oid, child_oid: Oid) -> HypoResult<()>;

    fn explain_index_name(&self, chain: &HookChain, ctx: &StatementContext, index_oid: Oid) -> HypoResult<Option<String>>;
}
