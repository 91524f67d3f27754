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

//! Plan-only explanation detection

use crate::host::{PlannedStmt, UtilityStmt};

/// Option name that turns an explanation into a real execution
pub const ANALYZE_OPTION: &str = "analyze";

/// True when `stmt` is an EXPLAIN that will only plan, never execute.
///
/// The presence of an `analyze` option is enough to rule it out, whatever its value:
/// `EXPLAIN (ANALYZE off)` still counts as analyzing.
pub fn is_plan_only_explain(stmt: Option<&PlannedStmt>) -> bool {
    let Some(stmt) = stmt else {
        return false;
    };
    match &stmt.utility {
        Some(UtilityStmt::Explain(explain)) => !explain.has_option(ANALYZE_OPTION),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ExplainOption, Query, Statement};

    fn planned(statement: Statement) -> PlannedStmt {
        PlannedStmt::from(statement)
    }

    #[test]
    fn test_plain_explain_is_plan_only() {
        let stmt = planned(Statement::explain(Query::select("t")));
        assert!(is_plan_only_explain(Some(&stmt)));
    }

    #[test]
    fn test_explain_with_other_options() {
        let stmt = planned(Statement::explain_with(
            Query::select("t"),
            vec![ExplainOption::with_value("format", "json"), ExplainOption::flag("verbose")],
        ));
        assert!(is_plan_only_explain(Some(&stmt)));
    }

    #[test]
    fn test_analyze_presence_forces_false() {
        for option in [ExplainOption::flag("ANALYZE"), ExplainOption::with_value("Analyze", "off"), ExplainOption::with_value("analyze", "false")] {
            let stmt = planned(Statement::explain_with(Query::select("t"), vec![option]));
            assert!(!is_plan_only_explain(Some(&stmt)));
        }
    }

    #[test]
    fn test_non_explain_statements() {
        assert!(!is_plan_only_explain(None));
        assert!(!is_plan_only_explain(Some(&planned(Statement::Select(Query::select("t"))))));
        assert!(!is_plan_only_explain(Some(&planned(Statement::set("enable_seqscan", "off")))));
    }
}
