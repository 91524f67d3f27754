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

//! Cost-based planning of single-relation queries
//!
//! Planning consults the hook chain at the same points a full planner would: whether the relation
//! has children, the relation's size and candidate indexes, its partitioning, the expansion of its
//! children, and a final pass over each relation's access paths.

use hypodb_common::{AccessMethod, Catalog, Oid, RelKind, RtIndex};
use std::collections::HashMap;
use tracing::debug;

use super::cost_model::{CostModel, OperationCost, restriction_selectivity};
use super::path::{Path, PathKind};
use super::predtest::{Restriction, implied_by};
use super::rel::{IndexOptInfo, PlannerInfo, RangeTblEntry, RelOptInfo};
use super::settings::PlannerSettings;
use super::statement::{CmpOp, ColumnTest, Query};
use crate::context::StatementContext;
use crate::error::{HypoError, HypoResult};
use crate::hooks::HookChain;

/// Heap pages summarized by one BRIN index entry
pub const BRIN_PAGES_PER_RANGE: u64 = 128;

/// The chosen plan together with the planner state it was chosen from
#[derive(Debug, Clone)]
pub struct Plan {
    pub root: PlannerInfo,
    pub path: Path,
    /// Row width of every planned range-table entry
    pub widths: HashMap<RtIndex, u32>,
    /// Child entries proven empty and left out of the plan
    pub pruned: Vec<RtIndex>,
}

impl Plan {
    pub fn width(&self, rti: RtIndex) -> u32 {
        self.widths.get(&rti).copied().unwrap_or(0)
    }

    pub fn referenced_indexes(&self) -> Vec<Oid> {
        self.path.referenced_indexes()
    }

    /// Aliases of the pruned children
    pub fn pruned_aliases(&self) -> Vec<&str> {
        self.pruned.iter().filter_map(|rti| self.root.rte(*rti)).map(|rte| rte.alias.as_str()).collect()
    }
}

#[derive(Default)]
struct Collected {
    widths: HashMap<RtIndex, u32>,
    pruned: Vec<RtIndex>,
}

fn clamp_rows(rows: f64) -> f64 {
    if rows.is_finite() { rows.round().max(1.0) } else { 1.0 }
}

pub struct Planner<'a> {
    chain: &'a HookChain,
    catalog: &'a dyn Catalog,
}

impl<'a> Planner<'a> {
    pub fn new(chain: &'a HookChain, catalog: &'a dyn Catalog) -> Self {
        Self { chain, catalog }
    }

    pub fn plan(&self, ctx: &StatementContext, query: &Query, settings: &PlannerSettings) -> HypoResult<Plan> {
        let relation = self.catalog.relation_by_name(&query.relation)?;
        let restrictions = query
            .quals
            .iter()
            .map(|qual| {
                qual.resolve(&relation)
                    .ok_or_else(|| HypoError::Planner(format!("column \"{}\" of relation \"{}\" does not exist", qual.column, relation.name)))
            })
            .collect::<HypoResult<Vec<_>>>()?;

        let mut root = PlannerInfo::new(settings.clone());
        let inh = !query.only && (relation.kind == RelKind::PartitionedTable || self.chain.dispatch().has_subclass(ctx, relation.oid)?);
        let rti = root.add_rte(RangeTblEntry::new(relation.oid, relation.kind, &relation.name, inh));

        let mut collected = Collected::default();
        let path = self.plan_rel(ctx, &mut root, rti, &restrictions, &mut collected)?;
        debug!("Planned statement {} on {}: total cost {:.2}", ctx.statement_id, relation.name, path.total_cost);

        Ok(Plan {
            root,
            path,
            widths: collected.widths,
            pruned: collected.pruned,
        })
    }

    fn plan_rel(&self, ctx: &StatementContext, root: &mut PlannerInfo, rti: RtIndex, restrictions: &[Restriction], collected: &mut Collected) -> HypoResult<Path> {
        let rte = root.rte(rti).cloned().ok_or_else(|| HypoError::Planner(format!("no range table entry {}", rti.0)))?;
        let mut rel = RelOptInfo {
            rti,
            relid: rte.relid,
            name: rte.alias.clone(),
            pages: 0,
            tuples: 0.0,
            rows: 0.0,
            width: 0,
            columns: Vec::new(),
            index_list: Vec::new(),
            base_restrictions: restrictions.to_vec(),
            pathlist: Vec::new(),
            partitioning: None,
            partition_constraints: Vec::new(),
            is_dummy: false,
        };
        self.chain.dispatch().get_relation_info(ctx, root, rte.relid, rte.inh, &mut rel)?;
        collected.widths.insert(rti, rel.width);

        if rte.inh {
            self.add_append_path(ctx, root, &rte, &mut rel, restrictions, collected)?;
        } else {
            for index in &mut rel.index_list {
                index.pred_ok = !index.is_partial() || implied_by(&index.predicate, &rel.base_restrictions);
            }
            rel.rows = clamp_rows(rel.tuples * restriction_selectivity(&rel.base_restrictions, &rel.columns));
            add_base_paths(&root.settings, &mut rel);
        }

        self.chain.dispatch().set_rel_pathlist(ctx, root, &mut rel, rti)?;
        if rel.is_dummy && rte.parent.is_some() {
            collected.pruned.push(rti);
        }
        rel.cheapest_path().cloned().ok_or_else(|| HypoError::Planner(format!("no access path for relation \"{}\"", rel.name)))
    }

    fn add_append_path(
        &self,
        ctx: &StatementContext,
        root: &mut PlannerInfo,
        rte: &RangeTblEntry,
        rel: &mut RelOptInfo,
        restrictions: &[Restriction],
        collected: &mut Collected,
    ) -> HypoResult<()> {
        let partdesc = self.chain.dispatch().partition_desc(ctx, rte.logical_relid())?;
        self.chain.dispatch().expand_child_rtentries(ctx, root, rel.rti, partdesc.as_deref())?;

        let mut children = Vec::new();
        for child in root.children_of(rel.rti) {
            let path = self.plan_rel(ctx, root, child, restrictions, collected)?;
            if !path.is_dummy() {
                children.push(path);
            }
        }

        if children.is_empty() {
            rel.set_dummy();
            return Ok(());
        }
        rel.rows = children.iter().map(|p| p.rows).sum();
        rel.add_path(Path {
            rti: rel.rti,
            relid: rel.relid,
            rows: rel.rows,
            startup_cost: children.first().map_or(0.0, |p| p.startup_cost),
            total_cost: children.iter().map(|p| p.total_cost).sum(),
            filter: Vec::new(),
            kind: PathKind::Append { children },
        });
        Ok(())
    }
}

/// Whether an index can evaluate a restriction as an index condition
fn matches_clause(index: &IndexOptInfo, restriction: &Restriction) -> bool {
    if !index.index_keys.contains(&Some(restriction.attnum)) {
        return false;
    }
    match &restriction.test {
        ColumnTest::Cmp(_, value) if value.is_null() => false,
        ColumnTest::Cmp(CmpOp::Eq, _) => true,
        ColumnTest::Cmp(CmpOp::Ne, _) => false,
        ColumnTest::Cmp(_, _) => index.supports_range,
        ColumnTest::In(_) => index.can_order,
        ColumnTest::IsNull | ColumnTest::IsNotNull => index.access_method != AccessMethod::Hash,
    }
}

/// Sequential scan plus every index path the relation's restrictions make usable
fn add_base_paths(settings: &PlannerSettings, rel: &mut RelOptInfo) {
    let model = CostModel::from_settings(settings);
    let restrictions = rel.base_restrictions.clone();

    let seq = model.estimate_operation_cost(&OperationCost::SeqScan {
        pages: rel.pages,
        tuples: rel.tuples,
        quals: restrictions.len(),
    });
    let seq = if settings.enable_seqscan { seq } else { seq.disabled() };
    let mut paths = vec![Path {
        kind: PathKind::SeqScan,
        rti: rel.rti,
        relid: rel.relid,
        rows: rel.rows,
        startup_cost: seq.startup_cost,
        total_cost: seq.total_cost,
        filter: restrictions.clone(),
    }];

    for index in &rel.index_list {
        if index.is_partial() && !index.pred_ok {
            continue;
        }
        let index_quals: Vec<Restriction> = restrictions.iter().filter(|r| matches_clause(index, r)).cloned().collect();
        let leading_matched = index_quals.iter().any(|r| Some(r.attnum) == index.leading_key());
        if index_quals.is_empty() || (index.access_method != AccessMethod::Brin && !leading_matched) {
            continue;
        }
        let filter: Vec<Restriction> = restrictions.iter().filter(|r| !index_quals.contains(r)).cloned().collect();
        let selectivity = restriction_selectivity(&index_quals, &rel.columns);

        if index.has_gettuple {
            let cost = model.estimate_operation_cost(&OperationCost::IndexScan {
                index_pages: index.pages,
                index_tuples: index.tuples,
                tree_height: index.tree_height,
                heap_pages: rel.pages,
                heap_tuples: rel.tuples,
                selectivity,
                index_quals: index_quals.len(),
                filter_quals: filter.len(),
            });
            let cost = if settings.enable_indexscan { cost } else { cost.disabled() };
            paths.push(Path {
                kind: PathKind::IndexScan {
                    index_oid: index.index_oid,
                    index_quals: index_quals.clone(),
                },
                rti: rel.rti,
                relid: rel.relid,
                rows: rel.rows,
                startup_cost: cost.startup_cost,
                total_cost: cost.total_cost,
                filter: filter.clone(),
            });
        }

        if index.has_getbitmap {
            let lossy_pages = if index.access_method == AccessMethod::Brin { BRIN_PAGES_PER_RANGE } else { 1 };
            let cost = model.estimate_operation_cost(&OperationCost::BitmapHeapScan {
                index_pages: index.pages,
                heap_pages: rel.pages,
                heap_tuples: rel.tuples,
                selectivity,
                lossy_pages,
                quals: restrictions.len(),
            });
            let cost = if settings.enable_bitmapscan { cost } else { cost.disabled() };
            paths.push(Path {
                kind: PathKind::BitmapHeapScan {
                    index_oid: index.index_oid,
                    index_quals,
                },
                rti: rel.rti,
                relid: rel.relid,
                rows: rel.rows,
                startup_cost: cost.startup_cost,
                total_cost: cost.total_cost,
                filter,
            });
        }
    }

    for path in paths {
        rel.add_path(path);
    }
}
