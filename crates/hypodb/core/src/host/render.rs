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

//! EXPLAIN output
//!
//! A plan is first turned into a tree of [`PlanNode`]s, which serializes directly as the JSON
//! format and is walked to produce the text format.

use hypodb_common::Oid;
use serde::Serialize;
use std::str::FromStr;

use super::path::{Path, PathKind};
use super::planner::Plan;
use super::predtest::Restriction;
use crate::context::StatementContext;
use crate::error::{HypoError, HypoResult};
use crate::hooks::HookChain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExplainFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ExplainFormat {
    type Err = HypoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ExplainFormat::Text),
            "json" => Ok(ExplainFormat::Json),
            other => Err(HypoError::Unsupported(format!("unrecognized value for EXPLAIN option \"format\": \"{other}\""))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub format: ExplainFormat,
    pub costs: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: ExplainFormat::Text,
            costs: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanNode {
    #[serde(rename = "Node Type")]
    pub node_type: String,
    #[serde(rename = "Relation Name", skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    #[serde(rename = "Index Name", skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(rename = "Startup Cost")]
    pub startup_cost: f64,
    #[serde(rename = "Total Cost")]
    pub total_cost: f64,
    #[serde(rename = "Plan Rows")]
    pub plan_rows: f64,
    #[serde(rename = "Plan Width")]
    pub plan_width: u32,
    #[serde(rename = "Index Cond", skip_serializing_if = "Option::is_none")]
    pub index_cond: Option<String>,
    #[serde(rename = "Recheck Cond", skip_serializing_if = "Option::is_none")]
    pub recheck_cond: Option<String>,
    #[serde(rename = "Filter", skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(rename = "One-Time Filter", skip_serializing_if = "Option::is_none")]
    pub one_time_filter: Option<String>,
    #[serde(rename = "Plans", skip_serializing_if = "Vec::is_empty")]
    pub plans: Vec<PlanNode>,
}

impl PlanNode {
    fn new(node_type: &str, startup_cost: f64, total_cost: f64, plan_rows: f64, plan_width: u32) -> Self {
        Self {
            node_type: node_type.to_string(),
            relation_name: None,
            index_name: None,
            startup_cost,
            total_cost,
            plan_rows,
            plan_width,
            index_cond: None,
            recheck_cond: None,
            filter: None,
            one_time_filter: None,
            plans: Vec::new(),
        }
    }

    fn header(&self, costs: bool) -> String {
        let target = match (&self.index_name, &self.relation_name) {
            (Some(index), Some(relation)) => format!(" using {index} on {relation}"),
            (Some(index), None) => format!(" on {index}"),
            (None, Some(relation)) => format!(" on {relation}"),
            (None, None) => String::new(),
        };
        if !costs {
            return format!("{}{}", self.node_type, target);
        }
        format!(
            "{}{}  (cost={:.2}..{:.2} rows={:.0} width={})",
            self.node_type, target, self.startup_cost, self.total_cost, self.plan_rows, self.plan_width
        )
    }

    fn details(&self) -> Vec<String> {
        [
            ("One-Time Filter", &self.one_time_filter),
            ("Index Cond", &self.index_cond),
            ("Recheck Cond", &self.recheck_cond),
            ("Filter", &self.filter),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}: {v}")))
        .collect()
    }

    fn write_text(&self, depth: usize, costs: bool, out: &mut Vec<String>) {
        if depth == 0 {
            out.push(self.header(costs));
        } else {
            out.push(format!("{}->  {}", " ".repeat(6 * depth - 4), self.header(costs)));
        }
        let indent = " ".repeat(6 * depth + 2);
        out.extend(self.details().into_iter().map(|line| format!("{indent}{line}")));
        for child in &self.plans {
            child.write_text(depth + 1, costs, out);
        }
    }
}

#[derive(Serialize)]
struct ExplainDocument<'a> {
    #[serde(rename = "Plan")]
    plan: &'a PlanNode,
}

/// A conjunction of restrictions as plan output shows it
fn conjunction(restrictions: &[Restriction]) -> Option<String> {
    match restrictions {
        [] => None,
        [single] => Some(single.to_string()),
        many => Some(format!("({})", many.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(" AND "))),
    }
}

/// Renders plans, asking the hook chain for index names
pub struct PlanRenderer<'a> {
    chain: &'a HookChain,
    ctx: &'a StatementContext,
}

impl<'a> PlanRenderer<'a> {
    pub fn new(chain: &'a HookChain, ctx: &'a StatementContext) -> Self {
        Self { chain, ctx }
    }

    pub fn render(&self, plan: &Plan, options: RenderOptions) -> HypoResult<String> {
        let node = self.node(plan, &plan.path)?;
        match options.format {
            ExplainFormat::Text => {
                let mut lines = Vec::new();
                node.write_text(0, options.costs, &mut lines);
                Ok(lines.join("\n"))
            }
            ExplainFormat::Json => Ok(serde_json::to_string_pretty(&[ExplainDocument { plan: &node }])?),
        }
    }

    pub fn node(&self, plan: &Plan, path: &Path) -> HypoResult<PlanNode> {
        let width = plan.width(path.rti);
        let relation = || plan.root.rte(path.rti).map(|rte| rte.alias.clone());

        let node = match &path.kind {
            PathKind::Dummy => {
                let mut node = PlanNode::new("Result", 0.0, 0.0, 0.0, width);
                node.one_time_filter = Some("false".to_string());
                node
            }
            PathKind::Append { children } => {
                let mut node = PlanNode::new("Append", path.startup_cost, path.total_cost, path.rows, width);
                for child in children {
                    node.plans.push(self.node(plan, child)?);
                }
                node
            }
            PathKind::SeqScan => {
                let mut node = PlanNode::new("Seq Scan", path.startup_cost, path.total_cost, path.rows, width);
                node.relation_name = relation();
                node.filter = conjunction(&path.filter);
                node
            }
            PathKind::IndexScan { index_oid, index_quals } => {
                let mut node = PlanNode::new("Index Scan", path.startup_cost, path.total_cost, path.rows, width);
                node.relation_name = relation();
                node.index_name = Some(self.index_name(*index_oid)?);
                node.index_cond = conjunction(index_quals);
                node.filter = conjunction(&path.filter);
                node
            }
            PathKind::BitmapHeapScan { index_oid, index_quals } => {
                let mut node = PlanNode::new("Bitmap Heap Scan", path.startup_cost, path.total_cost, path.rows, width);
                node.relation_name = relation();
                node.recheck_cond = conjunction(index_quals);
                node.filter = conjunction(&path.filter);

                let mut scan = PlanNode::new("Bitmap Index Scan", 0.0, path.startup_cost, path.rows, 0);
                scan.index_name = Some(self.index_name(*index_oid)?);
                scan.index_cond = conjunction(index_quals);
                node.plans.push(scan);
                node
            }
        };
        Ok(node)
    }

    fn index_name(&self, oid: Oid) -> HypoResult<String> {
        Ok(self.chain.dispatch().explain_index_name(self.ctx, oid)?.unwrap_or_else(|| oid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(node_type: &str, relation: &str) -> PlanNode {
        let mut node = PlanNode::new(node_type, 0.0, 35.5, 10.0, 4);
        node.relation_name = Some(relation.to_string());
        node
    }

    #[test]
    fn test_text_layout() {
        let mut append = PlanNode::new("Append", 0.0, 71.0, 20.0, 4);
        let mut first = scan("Seq Scan", "t_hi");
        first.filter = Some("(c = 50)".to_string());
        append.plans.push(first);

        let mut lines = Vec::new();
        append.write_text(0, true, &mut lines);
        assert_eq!(
            lines,
            vec![
                "Append  (cost=0.00..71.00 rows=20 width=4)",
                "  ->  Seq Scan on t_hi  (cost=0.00..35.50 rows=10 width=4)",
                "        Filter: (c = 50)",
            ]
        );
    }

    #[test]
    fn test_costs_off() {
        let mut node = scan("Index Scan", "orders");
        node.index_name = Some("orders_id".to_string());
        assert_eq!(node.header(false), "Index Scan using orders_id on orders");
    }

    #[test]
    fn test_json_names() {
        let node = scan("Seq Scan", "t");
        let json = serde_json::to_value([ExplainDocument { plan: &node }]).unwrap();
        assert_eq!(json[0]["Plan"]["Node Type"], "Seq Scan");
        assert_eq!(json[0]["Plan"]["Relation Name"], "t");
        assert!(json[0]["Plan"].get("Plans").is_none());
        assert!(json[0]["Plan"].get("Filter").is_none());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ExplainFormat>().unwrap(), ExplainFormat::Json);
        assert!(matches!("yaml".parse::<ExplainFormat>(), Err(HypoError::Unsupported(_))));
    }

    #[test]
    fn test_conjunction() {
        use crate::host::statement::ColumnTest;
        use hypodb_common::AttrNumber;

        assert_eq!(conjunction(&[]), None);
        let a = Restriction::new(AttrNumber(1), "a", ColumnTest::IsNull);
        let b = Restriction::new(AttrNumber(2), "b", ColumnTest::IsNotNull);
        assert_eq!(conjunction(&[a.clone()]).as_deref(), Some("(a IS NULL)"));
        assert_eq!(conjunction(&[a, b]).as_deref(), Some("((a IS NULL) AND (b IS NOT NULL))"));
    }
}
