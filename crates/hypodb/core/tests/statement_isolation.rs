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

//! Simulation windows, interceptor stacking and identifier allocation

use hypodb_common::{Catalog, ColumnDef, DataType, Datum, Oid};
use hypodb_core::host::{MemoryCatalog, PlannerInfo, Query, RangeDatum, RelOptInfo, Session, Statement, TableBuilder};
use hypodb_core::registry::{IndexSpec, PartitionSpec, PartitioningSpec};
use hypodb_core::{HookError, HypoConfig, HypoError, HypoExtension, HypoResult, Next, PlannerHook, StatementContext};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn setup() -> (Arc<MemoryCatalog>, Oid, Session, Arc<HypoExtension>) {
    let catalog = Arc::new(MemoryCatalog::new());
    let orders = catalog
        .create_table(
            TableBuilder::new("orders")
                .column(ColumnDef::new(1, "id", DataType::Int8).with_distinct(100_000.0))
                .stats(1000, 100_000.0),
        )
        .unwrap();
    let mut session = Session::new(catalog.clone());
    let hypo = Arc::new(HypoExtension::new(catalog.clone(), HypoConfig::default()));
    hypo.clone().load(&mut session);
    (catalog, orders, session, hypo)
}

fn by_id() -> Query {
    Query::select("orders").filter_eq("id", 42)
}

/// Fails relation-info resolution for every relation
struct Sabotage;

impl PlannerHook for Sabotage {
    fn name(&self) -> &str {
        "sabotage"
    }

    fn get_relation_info(
        &self,
        _ctx: &StatementContext,
        _root: &mut PlannerInfo,
        relation_oid: Oid,
        _inhparent: bool,
        _rel: &mut RelOptInfo,
        _next: Next<'_>,
    ) -> HypoResult<()> {
        Err(HypoError::Interceptor {
            hook: "sabotage".to_string(),
            message: format!("refusing {relation_oid}"),
        })
    }
}

#[test]
fn test_window_closed_after_successful_explain() {
    let (_, orders, mut session, hypo) = setup();
    let index = hypo.register_index(orders, IndexSpec::btree(&["id"])).unwrap();

    session.execute(Statement::explain(by_id())).unwrap();
    assert!(!session.last_simulation_window().unwrap().is_active());

    let outcome = session.execute(Statement::Select(by_id())).unwrap();
    assert!(!outcome.trace().unwrap().used_index(index));
}

#[test]
fn test_window_closed_after_failing_explain() {
    let (_, orders, mut session, hypo) = setup();
    let index = hypo.register_index(orders, IndexSpec::btree(&["id"])).unwrap();

    let err = session.execute(Statement::explain(Query::select("orders").filter_eq("missing", 1))).unwrap_err();
    assert!(matches!(err, HypoError::Planner(_)));
    assert!(!session.last_simulation_window().unwrap().is_active());

    let outcome = session.execute(Statement::Select(by_id())).unwrap();
    assert!(!outcome.trace().unwrap().used_index(index));
    assert!(outcome.trace().unwrap().indexes.is_empty());
}

#[test]
fn test_interceptor_error_propagates_and_window_closes() {
    let (_, orders, mut session, hypo) = setup();
    let index = hypo.register_index(orders, IndexSpec::btree(&["id"])).unwrap();
    let handle = session.install(Arc::new(Sabotage));

    let err = session.execute(Statement::explain(by_id())).unwrap_err();
    assert!(matches!(err, HypoError::Interceptor { .. }));
    assert!(!session.last_simulation_window().unwrap().is_active());

    session.uninstall(handle).unwrap();
    let outcome = session.execute(Statement::explain(by_id())).unwrap();
    assert!(outcome.explain_text().unwrap().contains(&format!("<{index}>")));
}

#[test]
fn test_uninstall_follows_stack_order() {
    let catalog = Arc::new(MemoryCatalog::new());
    let orders = catalog
        .create_table(TableBuilder::new("orders").column(ColumnDef::new(1, "id", DataType::Int8).with_distinct(100_000.0)).stats(1000, 100_000.0))
        .unwrap();
    let mut session = Session::new(catalog.clone());
    let hypo = Arc::new(HypoExtension::new(catalog.clone(), HypoConfig::default()));
    hypo.register_index(orders, IndexSpec::btree(&["id"])).unwrap();

    let below = hypo.clone().load(&mut session);
    let above = session.install(Arc::new(Sabotage));
    assert_eq!(session.hooks().installed_names(), vec!["hypodb", "sabotage"]);

    let err = session.uninstall(below).unwrap_err();
    assert!(matches!(err, HypoError::Hook(HookError::OutOfOrder { .. })));
    assert_eq!(session.hooks().depth(), 2);

    session.uninstall(above).unwrap();
    assert!(session.execute(Statement::explain(by_id())).unwrap().explain_text().unwrap().starts_with("Index Scan"));

    session.uninstall(below).unwrap();
    assert!(session.execute(Statement::explain(by_id())).unwrap().explain_text().unwrap().starts_with("Seq Scan"));
    assert!(matches!(session.uninstall(below), Err(HypoError::Hook(HookError::UnknownHandle(_)))));
}

#[test]
fn test_two_sessions_do_not_share_registries() {
    let (catalog, orders, mut first, hypo) = setup();
    hypo.register_index(orders, IndexSpec::btree(&["id"])).unwrap();

    let mut second = Session::new(catalog.clone());
    Arc::new(HypoExtension::new(catalog, HypoConfig::default())).load(&mut second);

    assert!(first.execute(Statement::explain(by_id())).unwrap().explain_text().unwrap().starts_with("Index Scan"));
    assert!(second.execute(Statement::explain(by_id())).unwrap().explain_text().unwrap().starts_with("Seq Scan"));
}

proptest! {
    #[test]
    fn prop_identifiers_are_distinct_and_unused(steps in prop::collection::vec(0u8..3, 1..24)) {
        let (catalog, orders, _session, hypo) = setup();
        let mut hypothetical = Vec::new();

        for (n, step) in steps.iter().enumerate() {
            match *step {
                0 => {
                    hypothetical.push(hypo.register_index(orders, IndexSpec::btree(&["id"])).unwrap());
                }
                1 => {
                    let table = catalog
                        .create_table(TableBuilder::new(&format!("t{n}")).column(ColumnDef::new(1, "c", DataType::Int4)).stats(10, 1000.0))
                        .unwrap();
                    let spec = PartitioningSpec::range(&["c"])
                        .partition(PartitionSpec::range("lo", RangeDatum::MinValue, RangeDatum::Value(Datum::Int(0))))
                        .partition(PartitionSpec::range("hi", RangeDatum::Value(Datum::Int(0)), RangeDatum::MaxValue));
                    hypo.register_partitioned_table(table, spec).unwrap();
                }
                _ => {
                    catalog.create_table(TableBuilder::new(&format!("plain{n}")).column(ColumnDef::new(1, "c", DataType::Int4))).unwrap();
                }
            }
        }
        hypothetical.extend(hypo.list_tables().iter().map(|t| t.oid));

        let unique: HashSet<Oid> = hypothetical.iter().copied().collect();
        prop_assert_eq!(unique.len(), hypothetical.len());
        for oid in &hypothetical {
            prop_assert!(oid.is_valid());
            prop_assert!(!catalog.oid_in_use(*oid));
        }
    }
}
