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

//! The hypothetical object extension
//!
//! [`HypoExtension`] owns the registry of hypothetical indexes and partition trees and installs
//! itself as a [`PlannerHook`]. Utility processing opens the statement's simulation window when the
//! statement is a plan-only `EXPLAIN`; every other hook injects only while that window is active
//! and otherwise passes straight through. Executor end closes the window.

use hypodb_common::{Catalog, Oid, RelKind, RtIndex};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::HypoConfig;
use crate::context::{SimulationWindow, StatementContext};
use crate::error::HypoResult;
use crate::explain::is_plan_only_explain;
use crate::hooks::{HookHandle, Next, PlannerHook};
use crate::host::{PartitionDesc, PartitionKey, PlannedStmt, PlannerInfo, QueryDesc, RangeTblEntry, RelOptInfo, Session};
use crate::inject;
use crate::registry::table::{build_tree, validate};
use crate::registry::{HypoRegistry, HypotheticalIndex, HypotheticalTable, IndexSpec, PartitioningSpec, RegistryError, ShadowIdAllocator};

pub const EXTENSION_NAME: &str = "hypodb";

struct HypoState {
    registry: HypoRegistry,
    allocator: ShadowIdAllocator,
}

pub struct HypoExtension {
    catalog: Arc<dyn Catalog>,
    config: RwLock<HypoConfig>,
    state: RwLock<HypoState>,
}

impl HypoExtension {
    pub fn new(catalog: Arc<dyn Catalog>, config: HypoConfig) -> Self {
        let allocator = ShadowIdAllocator::new(catalog.clone());
        Self {
            catalog,
            config: RwLock::new(config),
            state: RwLock::new(HypoState {
                registry: HypoRegistry::new(),
                allocator,
            }),
        }
    }

    /// Installs the extension on top of the session's interceptor stack
    pub fn load(self: Arc<Self>, session: &mut Session) -> HookHandle {
        let handle = session.install(self);
        info!("Loaded {} as interceptor {}", EXTENSION_NAME, handle);
        handle
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.config.write().enabled = enabled;
        info!("Hypothetical objects {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.config.read().enabled
    }

    /// Registers a hypothetical index on a table or materialized view
    #[instrument(skip(self, spec))]
    pub fn register_index(&self, relid: Oid, spec: IndexSpec) -> HypoResult<Oid> {
        let relation = self.catalog.relation(relid).map_err(|e| RegistryError::InvalidShadowTarget {
            relid,
            reason: e.to_string(),
        })?;
        let mut state = self.state.write();
        let oid = state.allocator.allocate(relid)?;

        match HypotheticalIndex::build(oid, &relation, &spec) {
            Ok(index) => {
                info!("Registered hypothetical index {}", index.name);
                state.registry.insert_index(index);
                Ok(oid)
            }
            Err(e) => {
                state.allocator.release(oid);
                Err(e.into())
            }
        }
    }

    /// Shadows an ordinary table with a hypothetical partition tree and returns the root's identifier
    #[instrument(skip(self, spec))]
    pub fn register_partitioned_table(&self, relid: Oid, spec: PartitioningSpec) -> HypoResult<Oid> {
        let relation = self.catalog.relation(relid).map_err(|e| RegistryError::InvalidShadowTarget {
            relid,
            reason: e.to_string(),
        })?;
        match relation.kind {
            RelKind::Relation => {}
            RelKind::PartitionedTable => return Err(RegistryError::AlreadyPartitioned(relation.name).into()),
            _ => {
                return Err(RegistryError::InvalidShadowTarget {
                    relid,
                    reason: format!("\"{}\" is not a table", relation.name),
                }
                .into());
            }
        }
        if !self.catalog.inheritance_children(relid)?.is_empty() {
            return Err(RegistryError::InvalidShadowTarget {
                relid,
                reason: format!("\"{}\" already has inheritance children", relation.name),
            }
            .into());
        }

        let mut state = self.state.write();
        if state.registry.is_shadowed(relid) {
            return Err(RegistryError::AlreadyHypotheticallyPartitioned(relation.name).into());
        }
        validate(&relation, &spec)?;

        let HypoState { registry, allocator } = &mut *state;
        let mut allocated = Vec::new();
        let built = build_tree(&relation, &spec, &mut allocated, &mut || allocator.allocate(relid));
        let nodes = match built {
            Ok(nodes) => nodes,
            Err(e) => {
                for oid in allocated {
                    allocator.release(oid);
                }
                return Err(e.into());
            }
        };

        let count = nodes.len();
        let root = registry
            .insert_table_tree(nodes)
            .ok_or_else(|| RegistryError::InvalidPartitionSpec(format!("no partitions for \"{}\"", relation.name)))?;
        info!("Registered hypothetical partitioning of {} with {} node(s)", relation.name, count);
        Ok(root)
    }

    /// Drops every hypothetical object. Calling it again is a no-op.
    #[instrument(skip(self))]
    pub fn reset_all(&self) {
        let mut state = self.state.write();
        let (indexes, tables) = (state.registry.index_count(), state.registry.table_count());
        state.registry.reset();
        state.allocator.reset();
        info!("Dropped {} hypothetical index(es) and {} hypothetical table node(s)", indexes, tables);
    }

    #[instrument(skip(self))]
    pub fn drop_index(&self, oid: Oid) -> bool {
        let mut state = self.state.write();
        let Some(index) = state.registry.remove_index(oid) else {
            return false;
        };
        state.allocator.release(oid);
        info!("Dropped hypothetical index {}", index.name);
        true
    }

    /// Drops a whole hypothetical partition tree, named by its root or by the table it shadows
    #[instrument(skip(self))]
    pub fn drop_table(&self, oid: Oid) -> bool {
        let mut state = self.state.write();
        let Some(removed) = state.registry.remove_table(oid) else {
            return false;
        };
        for member in &removed {
            state.allocator.release(*member);
        }
        info!("Dropped hypothetical partition tree {} ({} node(s))", oid, removed.len());
        true
    }

    /// Registered indexes in registration order
    pub fn list_indexes(&self) -> Vec<HypotheticalIndex> {
        self.state.read().registry.indexes().cloned().collect()
    }

    /// Every node of every tree: each root followed by its partitions, breadth-first
    pub fn list_tables(&self) -> Vec<HypotheticalTable> {
        let state = self.state.read();
        let mut all = Vec::with_capacity(state.registry.table_count());
        for root in state.registry.tables() {
            all.push(root.clone());
            all.extend(state.registry.descendants(root.oid).into_iter().filter_map(|oid| state.registry.table(oid)).cloned());
        }
        all
    }

    pub fn index_definition(&self, oid: Oid) -> HypoResult<String> {
        let state = self.state.read();
        let index = state.registry.index(oid).ok_or(RegistryError::UnknownObject(oid))?;
        Ok(index.definition())
    }

    /// Estimated on-disk size in bytes
    pub fn estimated_size(&self, oid: Oid) -> HypoResult<u64> {
        let state = self.state.read();
        let index = state.registry.index(oid).ok_or(RegistryError::UnknownObject(oid))?;
        Ok(index.estimated_bytes())
    }

    /// The hypothetical partitioned node `relid` stands for, if any
    fn partitioned_node<T>(&self, relid: Oid, f: impl FnOnce(&HypoRegistry, &HypotheticalTable) -> T) -> Option<T> {
        let state = self.state.read();
        let node = state.registry.table(relid).filter(|t| t.is_partitioned())?;
        Some(f(&state.registry, node))
    }
}

impl PlannerHook for HypoExtension {
    fn name(&self) -> &str {
        EXTENSION_NAME
    }

    fn process_utility(&self, ctx: &mut StatementContext, stmt: &PlannedStmt, desc: &mut QueryDesc, next: Next<'_>) -> HypoResult<()> {
        ctx.simulation = SimulationWindow::open(is_plan_only_explain(Some(stmt)), self.is_enabled());
        if ctx.simulation.is_active() {
            debug!("Simulation window open for statement {}", ctx.statement_id);
        }
        next.process_utility(ctx, stmt, desc)
    }

    fn executor_end(&self, ctx: &mut StatementContext, desc: &mut QueryDesc, next: Next<'_>) -> HypoResult<()> {
        ctx.simulation.close();
        next.executor_end(ctx, desc)
    }

    fn get_relation_info(
        &self,
        ctx: &StatementContext,
        root: &mut PlannerInfo,
        relation_oid: Oid,
        inhparent: bool,
        rel: &mut RelOptInfo,
        next: Next<'_>,
    ) -> HypoResult<()> {
        next.get_relation_info(ctx, root, relation_oid, inhparent, rel)?;
        if !ctx.simulation.is_active() {
            return Ok(());
        }

        let state = self.state.read();
        if !inhparent {
            let relkind = root.rte(rel.rti).map_or(RelKind::Relation, |rte| rte.relkind);
            inject::attach_indexes(&state.registry, relation_oid, relkind, rel);
        }
        inject::attach_partitioning(&state.registry, root, rel);
        Ok(())
    }

    fn set_rel_pathlist(&self, ctx: &StatementContext, root: &mut PlannerInfo, rel: &mut RelOptInfo, rti: RtIndex, next: Next<'_>) -> HypoResult<()> {
        next.set_rel_pathlist(ctx, root, rel, rti)?;
        if ctx.simulation.is_active() {
            inject::exclude_refuted(root, rel);
        }
        Ok(())
    }

    fn partition_desc(&self, ctx: &StatementContext, relid: Oid, next: Next<'_>) -> HypoResult<Option<Arc<PartitionDesc>>> {
        if ctx.simulation.is_active()
            && let Some(desc) = self.partitioned_node(relid, inject::partition_desc)
        {
            return Ok(Some(Arc::new(desc)));
        }
        next.partition_desc(ctx, relid)
    }

    fn partition_key(&self, ctx: &StatementContext, relid: Oid, next: Next<'_>) -> HypoResult<Option<Arc<PartitionKey>>> {
        if ctx.simulation.is_active()
            && let Some(key) = self.partitioned_node(relid, |_, node| node.key.clone()).flatten()
        {
            return Ok(Some(key));
        }
        next.partition_key(ctx, relid)
    }

    fn has_subclass(&self, ctx: &StatementContext, relid: Oid, next: Next<'_>) -> HypoResult<bool> {
        if ctx.simulation.is_active() {
            let state = self.state.read();
            if state.registry.is_shadowed(relid) || state.registry.table(relid).is_some_and(|t| t.is_partitioned()) {
                return Ok(true);
            }
        }
        next.has_subclass(ctx, relid)
    }

    fn find_all_inheritors(&self, ctx: &StatementContext, relid: Oid, next: Next<'_>) -> HypoResult<Vec<Oid>> {
        if ctx.simulation.is_active()
            && let Some(all) = inject::inheritors(&self.state.read().registry, relid)
        {
            return Ok(all);
        }
        next.find_all_inheritors(ctx, relid)
    }

    fn expand_child_rtentries(
        &self,
        ctx: &StatementContext,
        root: &mut PlannerInfo,
        parent_rti: RtIndex,
        partdesc: Option<&PartitionDesc>,
        next: Next<'_>,
    ) -> HypoResult<()> {
        if !ctx.simulation.is_active() {
            return next.expand_child_rtentries(ctx, root, parent_rti, partdesc);
        }
        let Some(parent_oid) = root.rte(parent_rti).map(RangeTblEntry::logical_relid) else {
            return next.expand_child_rtentries(ctx, root, parent_rti, partdesc);
        };
        // The read guard must be gone before child entries call back into the chain
        let children = inject::child_entries(&self.state.read().registry, parent_oid);
        let Some(children) = children else {
            return next.expand_child_rtentries(ctx, root, parent_rti, partdesc);
        };

        let chain = next.chain();
        let added = inject::expand_children(root, parent_rti, &children, &mut |entry: &mut RangeTblEntry, child_oid: Oid| {
            chain.dispatch().build_child_rtentry(ctx, entry, parent_oid, child_oid)
        })?;
        debug!("Expanded {} hypothetical partition(s) of {}", added, parent_oid);
        Ok(())
    }

    fn build_child_rtentry(&self, ctx: &StatementContext, child: &mut RangeTblEntry, parent_oid: Oid, child_oid: Oid, next: Next<'_>) -> HypoResult<()> {
        next.build_child_rtentry(ctx, child, parent_oid, child_oid)?;
        if !ctx.simulation.is_active() {
            return Ok(());
        }
        let state = self.state.read();
        if let Some(node) = state.registry.table(child_oid).filter(|t| !t.is_root()) {
            inject::build_child_rtentry(node, child);
        }
        Ok(())
    }

    fn explain_index_name(&self, ctx: &StatementContext, index_oid: Oid, next: Next<'_>) -> HypoResult<Option<String>> {
        let name = self.state.read().registry.index(index_oid).map(|index| index.name.clone());
        match name {
            Some(name) => Ok(Some(name)),
            None => next.explain_index_name(ctx, index_oid),
        }
    }
}
