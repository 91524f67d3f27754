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

//! A client session: runs statements through the hook chain one at a time

use hypodb_common::Catalog;
use std::sync::Arc;
use tracing::{debug, warn};

use super::executor::{ExecutionTrace, QueryDesc, execute};
use super::planner::{Plan, Planner};
use super::settings::PlannerSettings;
use super::standard::StandardHost;
use super::statement::{CommandType, PlannedStmt, Statement, UtilityStmt};
use crate::context::{SimulationWindow, StatementContext};
use crate::error::{HypoError, HypoResult};
use crate::hooks::{HookChain, HookHandle, PlannerHook};

/// What a statement produced
#[derive(Debug, Clone, Default)]
pub struct StatementOutcome {
    pub explain: Option<String>,
    pub trace: Option<ExecutionTrace>,
    pub plan: Option<Plan>,
}

impl StatementOutcome {
    pub fn explain_text(&self) -> Option<&str> {
        self.explain.as_deref()
    }

    pub fn trace(&self) -> Option<&ExecutionTrace> {
        self.trace.as_ref()
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }
}

pub struct Session {
    catalog: Arc<dyn Catalog>,
    hooks: HookChain,
    settings: PlannerSettings,
    statements: u64,
    last_window: Option<SimulationWindow>,
}

impl Session {
    /// A session with planner settings taken from the environment
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self::with_settings(catalog, PlannerSettings::from_env())
    }

    pub fn with_settings(catalog: Arc<dyn Catalog>, settings: PlannerSettings) -> Self {
        let host = Arc::new(StandardHost::new(catalog.clone()));
        Self {
            catalog,
            hooks: HookChain::new(host),
            settings,
            statements: 0,
            last_window: None,
        }
    }

    pub fn install(&mut self, hook: Arc<dyn PlannerHook>) -> HookHandle {
        self.hooks.install(hook)
    }

    pub fn uninstall(&mut self, handle: HookHandle) -> HypoResult<Arc<dyn PlannerHook>> {
        Ok(self.hooks.uninstall(handle)?)
    }

    pub fn hooks(&self) -> &HookChain {
        &self.hooks
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    /// Simulation window as the last statement left it
    pub fn last_simulation_window(&self) -> Option<SimulationWindow> {
        self.last_window
    }

    /// Runs one statement. The executor-end hooks run whether or not the statement succeeded.
    pub fn execute(&mut self, statement: Statement) -> HypoResult<StatementOutcome> {
        self.statements += 1;
        let mut ctx = StatementContext::new(self.statements);
        let stmt = PlannedStmt::from(statement);
        let mut desc = QueryDesc::new(stmt.clone(), self.settings.clone());

        let result = self.run(&mut ctx, &stmt, &mut desc);
        let ended = self.hooks.dispatch().executor_end(&mut ctx, &mut desc);
        self.last_window = Some(ctx.simulation);

        if let Err(e) = &result {
            warn!("Statement {} failed: {}", ctx.statement_id, e);
        }
        result?;
        ended?;

        if matches!(stmt.utility, Some(UtilityStmt::Set { .. })) {
            self.settings = desc.settings;
        }
        debug!("Statement {} complete", ctx.statement_id);
        Ok(StatementOutcome {
            explain: desc.explain,
            trace: desc.trace,
            plan: desc.plan,
        })
    }

    fn run(&self, ctx: &mut StatementContext, stmt: &PlannedStmt, desc: &mut QueryDesc) -> HypoResult<()> {
        match stmt.command {
            CommandType::Utility => self.hooks.dispatch().process_utility(ctx, stmt, desc),
            CommandType::Select => {
                let query = stmt.query.as_ref().ok_or_else(|| HypoError::Planner("SELECT without a query".to_string()))?;
                let plan = Planner::new(&self.hooks, self.catalog.as_ref()).plan(ctx, query, &desc.settings)?;
                desc.trace = Some(execute(self.catalog.as_ref(), &plan)?);
                desc.plan = Some(plan);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::catalog::{MemoryCatalog, TableBuilder};
    use crate::host::statement::Query;
    use crate::hooks::Next;
    use hypodb_common::{ColumnDef, DataType};
    use parking_lot::Mutex;

    fn session() -> Session {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.create_table(TableBuilder::new("t").column(ColumnDef::new(1, "c", DataType::Int4)).stats(10, 1000.0)).unwrap();
        Session::with_settings(catalog, PlannerSettings::default())
    }

    /// Records every executor-end call
    #[derive(Default)]
    struct EndCounter {
        ends: Mutex<u32>,
    }

    impl PlannerHook for EndCounter {
        fn name(&self) -> &str {
            "end-counter"
        }

        fn executor_end(&self, ctx: &mut StatementContext, desc: &mut QueryDesc, next: Next<'_>) -> HypoResult<()> {
            *self.ends.lock() += 1;
            next.executor_end(ctx, desc)
        }
    }

    #[test]
    fn test_select_executes() {
        let mut session = session();
        let outcome = session.execute(Statement::Select(Query::select("t"))).unwrap();
        assert_eq!(outcome.trace().unwrap().relations, vec!["t"]);
        assert!(outcome.explain_text().is_none());
    }

    #[test]
    fn test_set_persists_across_statements() {
        let mut session = session();
        session.execute(Statement::set("random_page_cost", "1.5")).unwrap();
        assert_eq!(session.settings().random_page_cost, 1.5);
    }

    #[test]
    fn test_failed_set_leaves_settings() {
        let mut session = session();
        assert!(session.execute(Statement::set("random_page_cost", "-1")).is_err());
        assert_eq!(session.settings().random_page_cost, 4.0);
    }

    #[test]
    fn test_executor_end_runs_on_error() {
        let mut session = session();
        let counter = Arc::new(EndCounter::default());
        session.install(counter.clone());

        session.execute(Statement::explain(Query::select("t"))).unwrap();
        assert!(session.execute(Statement::explain(Query::select("missing"))).is_err());
        assert_eq!(*counter.ends.lock(), 2);
        assert!(!session.last_simulation_window().unwrap().is_active());
    }

    #[test]
    fn test_uninstall_through_session() {
        let mut session = session();
        let handle = session.install(Arc::new(EndCounter::default()));
        assert_eq!(session.hooks().installed_names(), vec!["end-counter"]);
        session.uninstall(handle).unwrap();
        assert_eq!(session.hooks().depth(), 0);
        assert!(session.uninstall(handle).is_err());
    }
}
