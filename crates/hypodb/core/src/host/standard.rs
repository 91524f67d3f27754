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

//! The host's own behavior at every extensibility point

use hypodb_common::{Catalog, Oid, RtIndex};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

use super::executor::{QueryDesc, execute};
use super::partition::{PartitionDesc, PartitionKey};
use super::planner::Planner;
use super::rel::{IndexOptInfo, PlannerInfo, RangeTblEntry, RelOptInfo};
use super::render::{PlanRenderer, RenderOptions};
use super::statement::{ExplainStmt, PlannedStmt, UtilityStmt};
use crate::config::parse_bool;
use crate::context::StatementContext;
use crate::error::{HypoError, HypoResult};
use crate::explain::ANALYZE_OPTION;
use crate::hooks::{HookChain, StandardHooks};

/// Reads the physical catalog and knows nothing about hypothetical objects
pub struct StandardHost {
    catalog: Arc<dyn Catalog>,
}

impl StandardHost {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    fn explain(&self, chain: &HookChain, ctx: &StatementContext, explain: &ExplainStmt, desc: &mut QueryDesc) -> HypoResult<()> {
        let flag = |name: &str| -> HypoResult<Option<bool>> {
            let Some(option) = explain.option(name) else {
                return Ok(None);
            };
            match option.value.as_deref() {
                None => Ok(Some(true)),
                Some(value) => parse_bool(value).map(Some).ok_or_else(|| HypoError::InvalidSetting {
                    name: option.name.clone(),
                    reason: format!("expected a boolean, got \"{value}\""),
                }),
            }
        };
        let analyze = flag(ANALYZE_OPTION)?.unwrap_or(false);
        let options = RenderOptions {
            format: match explain.option("format") {
                Some(option) => option
                    .value
                    .as_deref()
                    .ok_or_else(|| HypoError::Unsupported("EXPLAIN option \"format\" requires a value".to_string()))?
                    .parse()?,
                None => Default::default(),
            },
            costs: flag("costs")?.unwrap_or(true),
        };

        let plan = Planner::new(chain, self.catalog.as_ref()).plan(ctx, &explain.query, &desc.settings)?;
        if analyze {
            desc.trace = Some(execute(self.catalog.as_ref(), &plan)?);
        }
        desc.explain = Some(PlanRenderer::new(chain, ctx).render(&plan, options)?);
        desc.plan = Some(plan);
        Ok(())
    }
}

impl StandardHooks for StandardHost {
    fn process_utility(&self, chain: &HookChain, ctx: &mut StatementContext, stmt: &PlannedStmt, desc: &mut QueryDesc) -> HypoResult<()> {
        match &stmt.utility {
            Some(UtilityStmt::Explain(explain)) => self.explain(chain, ctx, explain, desc),
            Some(UtilityStmt::Set { name, value }) => {
                desc.settings.apply(name, value)?;
                debug!("SET {} = {}", name, value);
                Ok(())
            }
            None => Err(HypoError::Unsupported("not a utility statement".to_string())),
        }
    }

    fn executor_end(&self, _chain: &HookChain, _ctx: &mut StatementContext, _desc: &mut QueryDesc) -> HypoResult<()> {
        Ok(())
    }

    fn get_relation_info(
        &self,
        _chain: &HookChain,
        _ctx: &StatementContext,
        _root: &mut PlannerInfo,
        relation_oid: Oid,
        inhparent: bool,
        rel: &mut RelOptInfo,
    ) -> HypoResult<()> {
        let relation = self.catalog.relation(relation_oid)?;
        rel.pages = relation.pages;
        rel.tuples = relation.tuples;
        rel.width = relation.tuple_width();
        rel.columns = relation.columns.clone();

        // An inheritance parent is only ever scanned through its children
        if inhparent || !relation.kind.is_indexable() {
            return Ok(());
        }
        for index in self.catalog.indexes(relation_oid)? {
            let am = index.access_method;
            let keys = index.key_columns.len();
            rel.index_list.push(IndexOptInfo {
                index_oid: index.oid,
                relid: index.relid,
                access_method: am,
                pages: index.pages,
                tuples: index.tuples,
                tree_height: index.tree_height,
                index_keys: index.key_columns.iter().copied().map(Some).collect(),
                include: Vec::new(),
                reverse_sort: vec![false; keys],
                nulls_first: vec![false; keys],
                unique: index.unique,
                predicate: Vec::new(),
                pred_ok: true,
                can_order: am.can_order(),
                has_gettuple: am.has_gettuple(),
                has_getbitmap: am.has_getbitmap(),
                supports_range: am.supports_range(),
                hypothetical: false,
            });
        }
        Ok(())
    }

    fn set_rel_pathlist(&self, _chain: &HookChain, _ctx: &StatementContext, _root: &mut PlannerInfo, _rel: &mut RelOptInfo, _rti: RtIndex) -> HypoResult<()> {
        Ok(())
    }

    fn partition_desc(&self, _chain: &HookChain, _ctx: &StatementContext, _relid: Oid) -> HypoResult<Option<Arc<PartitionDesc>>> {
        Ok(None)
    }

    fn partition_key(&self, _chain: &HookChain, _ctx: &StatementContext, _relid: Oid) -> HypoResult<Option<Arc<PartitionKey>>> {
        Ok(None)
    }

    fn has_subclass(&self, _chain: &HookChain, _ctx: &StatementContext, relid: Oid) -> HypoResult<bool> {
        Ok(!self.catalog.inheritance_children(relid)?.is_empty())
    }

    fn find_all_inheritors(&self, _chain: &HookChain, _ctx: &StatementContext, relid: Oid) -> HypoResult<Vec<Oid>> {
        let mut found = vec![relid];
        let mut seen: HashSet<Oid> = found.iter().copied().collect();
        let mut queue = VecDeque::from([relid]);
        while let Some(next) = queue.pop_front() {
            for child in self.catalog.inheritance_children(next)? {
                if seen.insert(child) {
                    found.push(child);
                    queue.push_back(child);
                }
            }
        }
        Ok(found)
    }

    /// Expands a plain inheritance parent into itself plus every descendant
    fn expand_child_rtentries(
        &self,
        chain: &HookChain,
        ctx: &StatementContext,
        root: &mut PlannerInfo,
        parent_rti: RtIndex,
        partdesc: Option<&PartitionDesc>,
    ) -> HypoResult<()> {
        let parent = root.rte(parent_rti).cloned().ok_or_else(|| HypoError::Planner(format!("no range table entry {}", parent_rti.0)))?;
        let members = match partdesc {
            Some(desc) => desc.oids.clone(),
            None => chain.dispatch().find_all_inheritors(ctx, parent.relid)?,
        };

        for oid in members {
            let relation = self.catalog.relation(oid)?;
            let mut child = RangeTblEntry::new(oid, relation.kind, &relation.name, false);
            chain.dispatch().build_child_rtentry(ctx, &mut child, parent.relid, oid)?;
            if !root.has_child(parent_rti, child.logical_relid()) {
                root.add_child_rte(parent_rti, child);
            }
        }
        Ok(())
    }

    fn build_child_rtentry(&self, _chain: &HookChain, _ctx: &StatementContext, _child: &mut RangeTblEntry, _parent_oid: Oid, _child_oid: Oid) -> HypoResult<()> {
        Ok(())
    }

    fn explain_index_name(&self, _chain: &HookChain, _ctx: &StatementContext, index_oid: Oid) -> HypoResult<Option<String>> {
        Ok(self.catalog.index(index_oid).ok().map(|index| index.name))
    }
}
