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

//! Statements as handed over by the front end

use hypodb_common::{Datum, RelationMeta};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::predtest::Restriction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// Whether `lhs op rhs` holds given `lhs.cmp(rhs)`
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// A test applied to a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnTest {
    Cmp(CmpOp, Datum),
    In(Vec<Datum>),
    IsNull,
    IsNotNull,
}

impl ColumnTest {
    /// Evaluates the test against a value. `None` means the result is NULL (unknown).
    pub fn evaluate(&self, value: &Datum) -> Option<bool> {
        match self {
            ColumnTest::IsNull => Some(value.is_null()),
            ColumnTest::IsNotNull => Some(!value.is_null()),
            ColumnTest::Cmp(op, rhs) => value.compare(rhs).map(|ordering| op.holds(ordering)),
            ColumnTest::In(list) => {
                if value.is_null() {
                    return None;
                }
                let mut saw_unknown = false;
                for item in list {
                    match value.compare(item) {
                        Some(Ordering::Equal) => return Some(true),
                        Some(_) => {}
                        None => saw_unknown = true,
                    }
                }
                if saw_unknown { None } else { Some(false) }
            }
        }
    }

    pub fn render(&self, column: &str) -> String {
        match self {
            ColumnTest::Cmp(op, value) => format!("({column} {} {value})", op.symbol()),
            ColumnTest::In(values) => {
                let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!("({column} = ANY ('{{{}}}'))", list.join(","))
            }
            ColumnTest::IsNull => format!("({column} IS NULL)"),
            ColumnTest::IsNotNull => format!("({column} IS NOT NULL)"),
        }
    }
}

/// A WHERE clause conjunct, still referring to its column by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qual {
    pub column: String,
    pub test: ColumnTest,
}

impl Qual {
    pub fn new(column: &str, test: ColumnTest) -> Self {
        Self {
            column: column.to_string(),
            test,
        }
    }

    /// Binds the column name against a relation
    pub fn resolve(&self, relation: &RelationMeta) -> Option<Restriction> {
        relation.column_by_name(&self.column).map(|column| Restriction {
            attnum: column.attnum,
            column: column.name.clone(),
            test: self.test.clone(),
        })
    }
}

impl fmt::Display for Qual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.test.render(&self.column))
    }
}

/// A single-relation SELECT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub relation: String,
    /// `SELECT ... FROM ONLY relation`: never expand inheritance children
    pub only: bool,
    pub quals: Vec<Qual>,
}

impl Query {
    pub fn select(relation: &str) -> Self {
        Self {
            relation: relation.to_string(),
            only: false,
            quals: Vec::new(),
        }
    }

    pub fn only(mut self) -> Self {
        self.only = true;
        self
    }

    pub fn filter(mut self, column: &str, op: CmpOp, value: impl Into<Datum>) -> Self {
        self.quals.push(Qual::new(column, ColumnTest::Cmp(op, value.into())));
        self
    }

    pub fn filter_eq(self, column: &str, value: impl Into<Datum>) -> Self {
        self.filter(column, CmpOp::Eq, value)
    }

    pub fn filter_in(mut self, column: &str, values: Vec<Datum>) -> Self {
        self.quals.push(Qual::new(column, ColumnTest::In(values)));
        self
    }

    pub fn filter_null(mut self, column: &str) -> Self {
        self.quals.push(Qual::new(column, ColumnTest::IsNull));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainOption {
    pub name: String,
    pub value: Option<String>,
}

impl ExplainOption {
    pub fn flag(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }

    pub fn with_value(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainStmt {
    pub query: Query,
    pub options: Vec<ExplainOption>,
}

impl ExplainStmt {
    pub fn option(&self, name: &str) -> Option<&ExplainOption> {
        self.options.iter().find(|o| o.name.eq_ignore_ascii_case(name))
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.option(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UtilityStmt {
    Explain(ExplainStmt),
    Set { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(Query),
    Utility(UtilityStmt),
}

impl Statement {
    pub fn explain(query: Query) -> Self {
        Self::explain_with(query, Vec::new())
    }

    pub fn explain_analyze(query: Query) -> Self {
        Self::explain_with(query, vec![ExplainOption::flag("analyze")])
    }

    pub fn explain_with(query: Query, options: Vec<ExplainOption>) -> Self {
        Statement::Utility(UtilityStmt::Explain(ExplainStmt { query, options }))
    }

    pub fn set(name: &str, value: &str) -> Self {
        Statement::Utility(UtilityStmt::Set {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    Select,
    Utility,
}

/// A statement after analysis. Utility statements are carried wrapped, unplanned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStmt {
    pub command: CommandType,
    pub query: Option<Query>,
    pub utility: Option<UtilityStmt>,
}

impl From<Statement> for PlannedStmt {
    fn from(statement: Statement) -> Self {
        match statement {
            Statement::Select(query) => PlannedStmt {
                command: CommandType::Select,
                query: Some(query),
                utility: None,
            },
            Statement::Utility(utility) => PlannedStmt {
                command: CommandType::Utility,
                query: None,
                utility: Some(utility),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmp_op_holds() {
        assert!(CmpOp::Le.holds(Ordering::Equal));
        assert!(!CmpOp::Lt.holds(Ordering::Equal));
        assert!(CmpOp::Ne.holds(Ordering::Less));
    }

    #[test]
    fn test_in_list_evaluation() {
        let test = ColumnTest::In(vec![Datum::Int(1), Datum::Int(3)]);
        assert_eq!(test.evaluate(&Datum::Int(3)), Some(true));
        assert_eq!(test.evaluate(&Datum::Int(2)), Some(false));
        assert_eq!(test.evaluate(&Datum::Null), None);
    }

    #[test]
    fn test_qual_rendering() {
        let qual = Qual::new("c", ColumnTest::Cmp(CmpOp::Ge, Datum::Int(10)));
        assert_eq!(qual.to_string(), "(c >= 10)");
    }

    #[test]
    fn test_explain_option_lookup_ignores_case() {
        let Statement::Utility(UtilityStmt::Explain(stmt)) = Statement::explain_with(Query::select("t"), vec![ExplainOption::flag("ANALYZE")]) else {
            panic!("expected explain");
        };
        assert!(stmt.has_option("analyze"));
    }

    #[test]
    fn test_planned_stmt_wraps_utility() {
        let planned = PlannedStmt::from(Statement::explain(Query::select("t")));
        assert_eq!(planned.command, CommandType::Utility);
        assert!(planned.query.is_none());
        assert!(matches!(planned.utility, Some(UtilityStmt::Explain(_))));
    }
}
