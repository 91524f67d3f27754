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

use hypodb_common::ColumnDef;
use serde::{Deserialize, Serialize};

use super::predtest::Restriction;
use super::settings::PlannerSettings;
use super::statement::{CmpOp, ColumnTest};

/// Cost added to paths of a disabled kind so they only win when nothing else is possible
pub const DISABLE_COST: f64 = 1.0e10;

const DEFAULT_EQ_SEL: f64 = 0.005;
const DEFAULT_INEQ_SEL: f64 = 0.3333333333333333;
const DEFAULT_NULL_SEL: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub startup_cost: f64,
    pub cpu_cost: f64,
    pub io_cost: f64,
    pub total_cost: f64,
}

impl CostEstimate {
    pub fn new(startup: f64, cpu: f64, io: f64) -> Self {
        Self {
            startup_cost: startup,
            cpu_cost: cpu,
            io_cost: io,
            total_cost: startup + cpu + io,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(&self, other: &CostEstimate) -> CostEstimate {
        CostEstimate::new(self.startup_cost + other.startup_cost, self.cpu_cost + other.cpu_cost, self.io_cost + other.io_cost)
    }

    /// Pushes the estimate out of contention without discarding it
    pub fn disabled(&self) -> CostEstimate {
        CostEstimate::new(self.startup_cost + DISABLE_COST, self.cpu_cost, self.io_cost)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationCost {
    SeqScan {
        pages: u64,
        tuples: f64,
        quals: usize,
    },
    IndexScan {
        index_pages: u64,
        index_tuples: f64,
        tree_height: i32,
        heap_pages: u64,
        heap_tuples: f64,
        selectivity: f64,
        index_quals: usize,
        filter_quals: usize,
    },
    BitmapHeapScan {
        index_pages: u64,
        heap_pages: u64,
        heap_tuples: f64,
        selectivity: f64,
        /// Heap pages summarized by one index entry; 1 for exact bitmaps
        lossy_pages: u64,
        quals: usize,
    },
}

pub struct CostModel {
    seq_page_cost: f64,
    random_page_cost: f64,
    cpu_tuple_cost: f64,
    cpu_index_tuple_cost: f64,
    cpu_operator_cost: f64,
}

impl CostModel {
    pub fn new() -> Self {
        Self::from_settings(&PlannerSettings::default())
    }

    pub fn from_settings(settings: &PlannerSettings) -> Self {
        Self {
            seq_page_cost: settings.seq_page_cost,
            random_page_cost: settings.random_page_cost,
            cpu_tuple_cost: settings.cpu_tuple_cost,
            cpu_index_tuple_cost: settings.cpu_index_tuple_cost,
            cpu_operator_cost: settings.cpu_operator_cost,
        }
    }

    pub fn estimate_operation_cost(&self, operation: &OperationCost) -> CostEstimate {
        match operation {
            OperationCost::SeqScan { pages, tuples, quals } => {
                let io_cost = *pages as f64 * self.seq_page_cost;
                let cpu_cost = tuples * (self.cpu_tuple_cost + *quals as f64 * self.cpu_operator_cost);
                CostEstimate::new(0.0, cpu_cost, io_cost)
            }
            OperationCost::IndexScan {
                index_pages,
                index_tuples,
                tree_height,
                heap_pages,
                heap_tuples,
                selectivity,
                index_quals,
                filter_quals,
            } => {
                // Descent: one comparison per level of a binary search plus a page touch per level
                let descent = index_tuples.max(2.0).log2().ceil() * self.cpu_operator_cost + (*tree_height as f64 + 1.0) * 50.0 * self.cpu_operator_cost;
                let tuples_fetched = (selectivity * index_tuples).max(1.0);
                let index_pages_fetched = (selectivity * *index_pages as f64).ceil().max(1.0);
                let rows_fetched = (selectivity * heap_tuples).max(1.0);
                let heap_pages_fetched = rows_fetched.min(*heap_pages as f64).max(1.0);

                let io_cost = (index_pages_fetched + heap_pages_fetched) * self.random_page_cost;
                let cpu_cost = tuples_fetched * (self.cpu_index_tuple_cost + *index_quals as f64 * self.cpu_operator_cost)
                    + rows_fetched * (self.cpu_tuple_cost + *filter_quals as f64 * self.cpu_operator_cost);
                CostEstimate::new(descent, cpu_cost, io_cost)
            }
            OperationCost::BitmapHeapScan {
                index_pages,
                heap_pages,
                heap_tuples,
                selectivity,
                lossy_pages,
                quals,
            } => {
                let total_pages = (*heap_pages).max(1) as f64;
                let exact = (selectivity * heap_tuples).max(1.0).min(total_pages);
                let pages_fetched = (exact * (*lossy_pages).max(1) as f64).min(total_pages);
                // Sparse fetches cost close to random I/O, dense ones close to sequential
                let per_page = self.random_page_cost - (self.random_page_cost - self.seq_page_cost) * (pages_fetched / total_pages).sqrt();
                let tuples_per_page = heap_tuples / total_pages;

                let startup = *index_pages as f64 * self.seq_page_cost;
                let io_cost = pages_fetched * per_page;
                let cpu_cost = pages_fetched * tuples_per_page * (self.cpu_tuple_cost + *quals as f64 * self.cpu_operator_cost);
                CostEstimate::new(startup, cpu_cost, io_cost)
            }
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new()
    }
}

fn eq_selectivity(column: Option<&ColumnDef>) -> f64 {
    match column.and_then(|c| c.n_distinct) {
        Some(n) if n >= 1.0 => 1.0 / n,
        _ => DEFAULT_EQ_SEL,
    }
}

/// Fraction of rows expected to satisfy a restriction
pub fn clause_selectivity(restriction: &Restriction, column: Option<&ColumnDef>) -> f64 {
    let not_null = column.is_some_and(|c| c.not_null);
    let selectivity = match &restriction.test {
        ColumnTest::Cmp(_, value) if value.is_null() => 0.0,
        ColumnTest::Cmp(CmpOp::Eq, _) => eq_selectivity(column),
        ColumnTest::Cmp(CmpOp::Ne, _) => 1.0 - eq_selectivity(column),
        ColumnTest::Cmp(_, _) => DEFAULT_INEQ_SEL,
        ColumnTest::In(values) => values.iter().filter(|v| !v.is_null()).count() as f64 * eq_selectivity(column),
        ColumnTest::IsNull if not_null => 0.0,
        ColumnTest::IsNull => DEFAULT_NULL_SEL,
        ColumnTest::IsNotNull if not_null => 1.0,
        ColumnTest::IsNotNull => 1.0 - DEFAULT_NULL_SEL,
    };
    selectivity.clamp(0.0, 1.0)
}

/// Combined selectivity of a conjunction, assuming independence
pub fn restriction_selectivity<'a>(restrictions: impl IntoIterator<Item = &'a Restriction>, columns: &[ColumnDef]) -> f64 {
    restrictions
        .into_iter()
        .map(|r| clause_selectivity(r, columns.iter().find(|c| c.attnum == r.attnum)))
        .product::<f64>()
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypodb_common::{AttrNumber, DataType, Datum};

    fn restriction(test: ColumnTest) -> Restriction {
        Restriction::new(AttrNumber(1), "id", test)
    }

    #[test]
    fn test_cost_estimate_add() {
        let a = CostEstimate::new(1.0, 2.0, 3.0);
        let b = CostEstimate::new(0.5, 0.5, 1.0);
        assert_eq!(a.add(&b).total_cost, 8.0);
        assert_eq!(a.total_cost, 6.0);
    }

    #[test]
    fn test_disabled_estimate() {
        let cost = CostEstimate::new(0.0, 1.0, 1.0).disabled();
        assert!(cost.total_cost >= DISABLE_COST);
    }

    #[test]
    fn test_selective_index_scan_beats_seq_scan() {
        let model = CostModel::new();
        let seq = model.estimate_operation_cost(&OperationCost::SeqScan {
            pages: 1000,
            tuples: 100_000.0,
            quals: 1,
        });
        let index = model.estimate_operation_cost(&OperationCost::IndexScan {
            index_pages: 300,
            index_tuples: 100_000.0,
            tree_height: 1,
            heap_pages: 1000,
            heap_tuples: 100_000.0,
            selectivity: 0.00001,
            index_quals: 1,
            filter_quals: 0,
        });
        assert!(index.total_cost < seq.total_cost);
    }

    #[test]
    fn test_unselective_index_scan_loses() {
        let model = CostModel::new();
        let seq = model.estimate_operation_cost(&OperationCost::SeqScan {
            pages: 1000,
            tuples: 100_000.0,
            quals: 1,
        });
        let index = model.estimate_operation_cost(&OperationCost::IndexScan {
            index_pages: 300,
            index_tuples: 100_000.0,
            tree_height: 1,
            heap_pages: 1000,
            heap_tuples: 100_000.0,
            selectivity: 0.5,
            index_quals: 1,
            filter_quals: 0,
        });
        assert!(index.total_cost > seq.total_cost);
    }

    #[test]
    fn test_clause_selectivity() {
        let column = ColumnDef::new(1, "id", DataType::Int8).with_distinct(1000.0);
        let eq = restriction(ColumnTest::Cmp(CmpOp::Eq, Datum::Int(1)));
        assert_eq!(clause_selectivity(&eq, Some(&column)), 0.001);
        assert_eq!(clause_selectivity(&eq, None), DEFAULT_EQ_SEL);

        let null = restriction(ColumnTest::IsNull);
        assert_eq!(clause_selectivity(&null, Some(&column.clone().not_null())), 0.0);
    }

    #[test]
    fn test_restriction_selectivity_multiplies() {
        let columns = vec![ColumnDef::new(1, "id", DataType::Int8).with_distinct(10.0)];
        let restrictions = vec![restriction(ColumnTest::Cmp(CmpOp::Eq, Datum::Int(1))), restriction(ColumnTest::Cmp(CmpOp::Gt, Datum::Int(0)))];
        let selectivity = restriction_selectivity(&restrictions, &columns);
        assert!((selectivity - 0.1 * DEFAULT_INEQ_SEL).abs() < 1e-12);
    }
}
