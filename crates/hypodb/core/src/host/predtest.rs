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

//! Predicate proofs
//!
//! Two questions are answered here. Refutation: can no row satisfy both a relation's restriction
//! clauses and a set of constraints (used for constraint exclusion)? Implication: does every row
//! satisfying the restriction clauses also satisfy a partial index predicate?
//!
//! Both are proved per column over a value domain. Whenever datums are not comparable the proof
//! gives up, so a refutation or implication is only ever reported when it actually holds.

use hypodb_common::{AttrNumber, DataType, Datum};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use super::partition::row_hash;
use super::statement::{CmpOp, ColumnTest};

/// A qualification bound to a column of a specific relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restriction {
    pub attnum: AttrNumber,
    pub column: String,
    pub test: ColumnTest,
}

impl Restriction {
    pub fn new(attnum: AttrNumber, column: &str, test: ColumnTest) -> Self {
        Self {
            attnum,
            column: column.to_string(),
            test,
        }
    }

    /// The constant this restriction pins the column to, if any
    pub fn equality_value(&self) -> Option<&Datum> {
        match &self.test {
            ColumnTest::Cmp(CmpOp::Eq, value) if !value.is_null() => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.test.render(&self.column))
    }
}

/// A constraint every row of a relation is known to satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    Column(Restriction),
    /// The column satisfies at least one of the alternatives
    Either { attnum: AttrNumber, column: String, alternatives: Vec<ColumnTest> },
    /// The combined hash of the key columns has the given remainder
    Hash { attnums: Vec<AttrNumber>, types: Vec<DataType>, modulus: u32, remainder: u32 },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Column(restriction) => write!(f, "{restriction}"),
            Constraint::Either { column, alternatives, .. } => {
                let parts: Vec<String> = alternatives.iter().map(|t| t.render(column)).collect();
                write!(f, "({})", parts.join(" OR "))
            }
            Constraint::Hash { modulus, remainder, .. } => write!(f, "satisfies_hash_partition({modulus}, {remainder})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nullness {
    Unknown,
    Null,
    NotNull,
}

/// The set of values a column may still take
#[derive(Debug, Clone)]
struct Domain {
    lower: Option<(Datum, bool)>,
    upper: Option<(Datum, bool)>,
    values: Option<Vec<Datum>>,
    excluded: Vec<Datum>,
    nullness: Nullness,
    empty: bool,
    /// A comparison could not be decided, so emptiness cannot be proved
    undecidable: bool,
}

impl Domain {
    fn new() -> Self {
        Self {
            lower: None,
            upper: None,
            values: None,
            excluded: Vec::new(),
            nullness: Nullness::Unknown,
            empty: false,
            undecidable: false,
        }
    }

    fn require_not_null(&mut self) {
        match self.nullness {
            Nullness::Null => self.empty = true,
            _ => self.nullness = Nullness::NotNull,
        }
    }

    fn apply(&mut self, test: &ColumnTest) {
        match test {
            ColumnTest::IsNull => match self.nullness {
                Nullness::NotNull => self.empty = true,
                _ => self.nullness = Nullness::Null,
            },
            ColumnTest::IsNotNull => self.require_not_null(),
            ColumnTest::Cmp(op, value) => {
                self.require_not_null();
                if value.is_null() {
                    self.empty = true;
                    return;
                }
                match op {
                    CmpOp::Eq => self.restrict_values(std::slice::from_ref(value)),
                    CmpOp::Ne => self.excluded.push(value.clone()),
                    CmpOp::Gt | CmpOp::Ge => self.tighten_lower(value, *op == CmpOp::Ge),
                    CmpOp::Lt | CmpOp::Le => self.tighten_upper(value, *op == CmpOp::Le),
                }
            }
            ColumnTest::In(list) => {
                self.require_not_null();
                let non_null: Vec<Datum> = list.iter().filter(|v| !v.is_null()).cloned().collect();
                self.restrict_values(&non_null);
            }
        }
    }

    fn restrict_values(&mut self, candidates: &[Datum]) {
        let next = match self.values.take() {
            None => candidates.to_vec(),
            Some(current) => {
                let mut kept = Vec::new();
                for value in current {
                    let mut matched = false;
                    for candidate in candidates {
                        match value.compare(candidate) {
                            Some(Ordering::Equal) => matched = true,
                            Some(_) => {}
                            None => self.undecidable = true,
                        }
                    }
                    if matched {
                        kept.push(value);
                    }
                }
                kept
            }
        };
        self.values = Some(next);
    }

    fn tighten_lower(&mut self, value: &Datum, inclusive: bool) {
        let replace = match &self.lower {
            None => true,
            Some((current, current_inclusive)) => match value.compare(current) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => *current_inclusive && !inclusive,
                Some(Ordering::Less) => false,
                None => {
                    self.undecidable = true;
                    false
                }
            },
        };
        if replace {
            self.lower = Some((value.clone(), inclusive));
        }
    }

    fn tighten_upper(&mut self, value: &Datum, inclusive: bool) {
        let replace = match &self.upper {
            None => true,
            Some((current, current_inclusive)) => match value.compare(current) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => *current_inclusive && !inclusive,
                Some(Ordering::Greater) => false,
                None => {
                    self.undecidable = true;
                    false
                }
            },
        };
        if replace {
            self.upper = Some((value.clone(), inclusive));
        }
    }

    fn admits(&self, value: &Datum) -> Option<bool> {
        if let Some((low, inclusive)) = &self.lower {
            match value.compare(low)? {
                Ordering::Less => return Some(false),
                Ordering::Equal if !inclusive => return Some(false),
                _ => {}
            }
        }
        if let Some((high, inclusive)) = &self.upper {
            match value.compare(high)? {
                Ordering::Greater => return Some(false),
                Ordering::Equal if !inclusive => return Some(false),
                _ => {}
            }
        }
        for excluded in &self.excluded {
            if value.compare(excluded)? == Ordering::Equal {
                return Some(false);
            }
        }
        Some(true)
    }

    /// True only when no value can possibly remain
    fn is_provably_empty(&self) -> bool {
        if self.empty {
            return true;
        }
        if self.undecidable {
            return false;
        }
        if self.nullness == Nullness::Null {
            return self.lower.is_some() || self.upper.is_some() || self.values.is_some() || !self.excluded.is_empty();
        }
        if let Some(values) = &self.values {
            let mut any_possible = false;
            for value in values {
                match self.admits(value) {
                    Some(false) => {}
                    _ => any_possible = true,
                }
            }
            return !any_possible;
        }
        if let (Some((low, low_inclusive)), Some((high, high_inclusive))) = (&self.lower, &self.upper) {
            return match low.compare(high) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => !(*low_inclusive && *high_inclusive),
                _ => false,
            };
        }
        false
    }
}

struct ColumnProblem<'a> {
    tests: Vec<&'a ColumnTest>,
    disjunctions: Vec<&'a [ColumnTest]>,
}

fn provably_empty(tests: &[&ColumnTest], disjunctions: &[&[ColumnTest]]) -> bool {
    match disjunctions.split_first() {
        None => {
            let mut domain = Domain::new();
            for test in tests {
                domain.apply(test);
            }
            domain.is_provably_empty()
        }
        Some((alternatives, rest)) => alternatives.iter().all(|alternative| {
            let mut extended: Vec<&ColumnTest> = tests.to_vec();
            extended.push(alternative);
            provably_empty(&extended, rest)
        }),
    }
}

fn column_problem<'m, 'a>(columns: &'m mut BTreeMap<AttrNumber, ColumnProblem<'a>>, attnum: AttrNumber) -> &'m mut ColumnProblem<'a> {
    columns.entry(attnum).or_insert_with(|| ColumnProblem {
        tests: Vec::new(),
        disjunctions: Vec::new(),
    })
}

/// True if no row can satisfy both the restriction clauses and the constraints
pub fn refuted_by(restrictions: &[Restriction], constraints: &[Constraint]) -> bool {
    let mut columns: BTreeMap<AttrNumber, ColumnProblem<'_>> = BTreeMap::new();

    for restriction in restrictions {
        column_problem(&mut columns, restriction.attnum).tests.push(&restriction.test);
    }
    for constraint in constraints {
        match constraint {
            Constraint::Column(restriction) => column_problem(&mut columns, restriction.attnum).tests.push(&restriction.test),
            Constraint::Either { attnum, alternatives, .. } => column_problem(&mut columns, *attnum).disjunctions.push(alternatives.as_slice()),
            Constraint::Hash { .. } => {}
        }
    }

    if columns.values().any(|p| provably_empty(&p.tests, &p.disjunctions)) {
        return true;
    }

    constraints.iter().any(|constraint| match constraint {
        Constraint::Hash { attnums, types, modulus, remainder } => hash_refuted(restrictions, attnums, types, *modulus, *remainder),
        _ => false,
    })
}

fn hash_refuted(restrictions: &[Restriction], attnums: &[AttrNumber], types: &[DataType], modulus: u32, remainder: u32) -> bool {
    if modulus == 0 || types.len() != attnums.len() {
        return false;
    }
    // Values are hashed as the key column stores them, whatever the literal's own type.
    let mut values = Vec::with_capacity(attnums.len());
    for (attnum, ty) in attnums.iter().zip(types) {
        let value = restrictions.iter().filter(|r| r.attnum == *attnum).find_map(Restriction::equality_value);
        match value.and_then(|v| v.coerce_to(*ty)) {
            Some(value) => values.push(value),
            None => return false,
        }
    }
    row_hash(&values) % modulus != remainder
}

/// True if every row satisfying `restrictions` satisfies `predicate`
pub fn implied_by(predicate: &[Restriction], restrictions: &[Restriction]) -> bool {
    predicate.iter().all(|clause| restrictions.iter().filter(|r| r.attnum == clause.attnum).any(|r| clause_implies(&r.test, &clause.test)))
}

fn clause_implies(given: &ColumnTest, wanted: &ColumnTest) -> bool {
    if given == wanted {
        return true;
    }
    match (given, wanted) {
        (_, ColumnTest::IsNotNull) => !matches!(given, ColumnTest::IsNull),
        (ColumnTest::Cmp(CmpOp::Eq, value), _) => wanted.evaluate(value) == Some(true),
        (ColumnTest::In(values), _) => !values.is_empty() && values.iter().all(|v| v.is_null() || wanted.evaluate(v) == Some(true)),
        (ColumnTest::Cmp(given_op, given_value), ColumnTest::Cmp(wanted_op, wanted_value)) => {
            let Some(ordering) = given_value.compare(wanted_value) else {
                return false;
            };
            match (given_op, wanted_op) {
                (CmpOp::Lt | CmpOp::Le, CmpOp::Lt | CmpOp::Le) => {
                    ordering == Ordering::Less || (ordering == Ordering::Equal && (*given_op == CmpOp::Lt || *wanted_op == CmpOp::Le))
                }
                (CmpOp::Gt | CmpOp::Ge, CmpOp::Gt | CmpOp::Ge) => {
                    ordering == Ordering::Greater || (ordering == Ordering::Equal && (*given_op == CmpOp::Gt || *wanted_op == CmpOp::Ge))
                }
                _ => false,
            }
        }
        _ => false,
    }
}
