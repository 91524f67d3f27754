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

//! Partitioning metadata: strategies, bounds, keys and descriptors

use hypodb_common::{AttrNumber, DataType, Datum, Oid};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::predtest::{Constraint, Restriction};
use super::statement::{CmpOp, ColumnTest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionStrategy {
    Range,
    List,
    Hash,
}

impl PartitionStrategy {
    pub fn name(self) -> &'static str {
        match self {
            PartitionStrategy::Range => "range",
            PartitionStrategy::List => "list",
            PartitionStrategy::Hash => "hash",
        }
    }
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One column of a range bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RangeDatum {
    MinValue,
    Value(Datum),
    MaxValue,
}

impl RangeDatum {
    /// Total order over range bound values. `None` for incomparable values.
    pub fn compare(&self, other: &RangeDatum) -> Option<Ordering> {
        match (self, other) {
            (RangeDatum::MinValue, RangeDatum::MinValue) | (RangeDatum::MaxValue, RangeDatum::MaxValue) => Some(Ordering::Equal),
            (RangeDatum::MinValue, _) | (_, RangeDatum::MaxValue) => Some(Ordering::Less),
            (RangeDatum::MaxValue, _) | (_, RangeDatum::MinValue) => Some(Ordering::Greater),
            (RangeDatum::Value(a), RangeDatum::Value(b)) => a.compare(b),
        }
    }
}

impl fmt::Display for RangeDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeDatum::MinValue => f.write_str("MINVALUE"),
            RangeDatum::MaxValue => f.write_str("MAXVALUE"),
            RangeDatum::Value(datum) => write!(f, "{datum}"),
        }
    }
}

/// Compares two range bounds column by column
pub fn compare_range_bounds(a: &[RangeDatum], b: &[RangeDatum]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.compare(y)? {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(a.len().cmp(&b.len()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartitionBound {
    /// Lower bound inclusive, upper bound exclusive
    Range { lower: Vec<RangeDatum>, upper: Vec<RangeDatum> },
    List(Vec<Datum>),
    Hash { modulus: u32, remainder: u32 },
    Default,
}

impl PartitionBound {
    pub fn is_default(&self) -> bool {
        matches!(self, PartitionBound::Default)
    }

    pub fn strategy(&self) -> Option<PartitionStrategy> {
        match self {
            PartitionBound::Range { .. } => Some(PartitionStrategy::Range),
            PartitionBound::List(_) => Some(PartitionStrategy::List),
            PartitionBound::Hash { .. } => Some(PartitionStrategy::Hash),
            PartitionBound::Default => None,
        }
    }

    /// The constraints a row must satisfy to belong to this partition.
    ///
    /// A default partition yields none. Multi-column range bounds only constrain the leading
    /// column, which is weaker than the real bound but never wrong.
    pub fn constraints(&self, key: &PartitionKey) -> Vec<Constraint> {
        match self {
            PartitionBound::Default => Vec::new(),
            PartitionBound::Hash { modulus, remainder } => vec![Constraint::Hash {
                attnums: key.attnums.clone(),
                types: key.types.clone(),
                modulus: *modulus,
                remainder: *remainder,
            }],
            PartitionBound::List(values) => {
                let Some((attnum, column)) = key.column(0) else {
                    return Vec::new();
                };
                let accepts_null = values.iter().any(Datum::is_null);
                let non_null: Vec<Datum> = values.iter().filter(|v| !v.is_null()).cloned().collect();
                let in_list = ColumnTest::In(non_null);
                if accepts_null {
                    vec![Constraint::Either {
                        attnum,
                        column: column.to_string(),
                        alternatives: vec![ColumnTest::IsNull, in_list],
                    }]
                } else {
                    vec![Constraint::Column(Restriction::new(attnum, column, in_list))]
                }
            }
            PartitionBound::Range { lower, upper } => {
                let Some((attnum, column)) = key.column(0) else {
                    return Vec::new();
                };
                let mut constraints = Vec::new();
                for (index, name) in key.names.iter().enumerate() {
                    constraints.push(Constraint::Column(Restriction::new(key.attnums[index], name, ColumnTest::IsNotNull)));
                }
                if let Some(RangeDatum::Value(low)) = lower.first() {
                    constraints.push(Constraint::Column(Restriction::new(attnum, column, ColumnTest::Cmp(CmpOp::Ge, low.clone()))));
                }
                if let Some(RangeDatum::Value(high)) = upper.first() {
                    let exclusive = upper.iter().skip(1).all(|d| matches!(d, RangeDatum::MinValue));
                    let op = if exclusive { CmpOp::Lt } else { CmpOp::Le };
                    constraints.push(Constraint::Column(Restriction::new(attnum, column, ColumnTest::Cmp(op, high.clone()))));
                }
                constraints
            }
        }
    }

    /// Whether a row with the given key values belongs here. Default partitions never match directly.
    pub fn contains(&self, values: &[Datum]) -> bool {
        match self {
            PartitionBound::Default => false,
            PartitionBound::Hash { modulus, remainder } => *modulus > 0 && row_hash(values) % modulus == *remainder,
            PartitionBound::List(list) => match values.first() {
                Some(Datum::Null) => list.iter().any(Datum::is_null),
                Some(value) => list.iter().any(|v| value.compare(v) == Some(Ordering::Equal)),
                None => false,
            },
            PartitionBound::Range { lower, upper } => {
                if values.iter().any(Datum::is_null) {
                    return false;
                }
                let row: Vec<RangeDatum> = values.iter().cloned().map(RangeDatum::Value).collect();
                let above = matches!(compare_range_bounds(&row, lower), Some(Ordering::Greater | Ordering::Equal));
                let below = matches!(compare_range_bounds(&row, upper), Some(Ordering::Less));
                above && below
            }
        }
    }
}

impl fmt::Display for PartitionBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |items: Vec<String>| items.join(", ");
        match self {
            PartitionBound::Default => f.write_str("DEFAULT"),
            PartitionBound::Hash { modulus, remainder } => write!(f, "FOR VALUES WITH (modulus {modulus}, remainder {remainder})"),
            PartitionBound::List(values) => write!(f, "FOR VALUES IN ({})", join(values.iter().map(|v| v.to_string()).collect())),
            PartitionBound::Range { lower, upper } => write!(
                f,
                "FOR VALUES FROM ({}) TO ({})",
                join(lower.iter().map(|v| v.to_string()).collect()),
                join(upper.iter().map(|v| v.to_string()).collect())
            ),
        }
    }
}

/// Combined hash of a row's key values
pub fn row_hash(values: &[Datum]) -> u32 {
    values.iter().fold(0u32, |acc, value| acc.wrapping_mul(31).wrapping_add(value.partition_hash()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionKey {
    pub strategy: PartitionStrategy,
    pub attnums: Vec<AttrNumber>,
    pub types: Vec<DataType>,
    pub names: Vec<String>,
}

impl PartitionKey {
    pub fn arity(&self) -> usize {
        self.attnums.len()
    }

    fn column(&self, position: usize) -> Option<(AttrNumber, &str)> {
        Some((*self.attnums.get(position)?, self.names.get(position)?.as_str()))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.strategy.name().to_ascii_uppercase(), self.names.join(", "))
    }
}

/// Partitions of a partitioned relation, in bound order with the default partition last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionDesc {
    pub oids: Vec<Oid>,
    pub bounds: Vec<PartitionBound>,
    pub default_index: Option<usize>,
}

impl PartitionDesc {
    pub fn new(parts: Vec<(Oid, PartitionBound)>) -> Self {
        let default_index = parts.iter().position(|(_, bound)| bound.is_default());
        let (oids, bounds) = parts.into_iter().unzip();
        Self { oids, bounds, default_index }
    }

    pub fn len(&self) -> usize {
        self.oids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oids.is_empty()
    }

    /// Index of the partition a row routes to, falling back to the default partition
    pub fn route(&self, values: &[Datum]) -> Option<usize> {
        self.bounds.iter().position(|bound| bound.contains(values)).or(self.default_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_key(strategy: PartitionStrategy) -> PartitionKey {
        PartitionKey {
            strategy,
            attnums: vec![AttrNumber(1)],
            types: vec![DataType::Int4],
            names: vec!["c".to_string()],
        }
    }

    fn range(lo: RangeDatum, hi: RangeDatum) -> PartitionBound {
        PartitionBound::Range { lower: vec![lo], upper: vec![hi] }
    }

    #[test]
    fn test_range_datum_ordering() {
        let five = RangeDatum::Value(Datum::Int(5));
        assert_eq!(RangeDatum::MinValue.compare(&five), Some(Ordering::Less));
        assert_eq!(five.compare(&RangeDatum::MaxValue), Some(Ordering::Less));
        assert_eq!(RangeDatum::MaxValue.compare(&RangeDatum::MaxValue), Some(Ordering::Equal));
    }

    #[test]
    fn test_bound_display() {
        assert_eq!(range(RangeDatum::MinValue, RangeDatum::Value(Datum::Int(10))).to_string(), "FOR VALUES FROM (MINVALUE) TO (10)");
        assert_eq!(PartitionBound::List(vec![Datum::Int(1), Datum::Int(2)]).to_string(), "FOR VALUES IN (1, 2)");
        assert_eq!(PartitionBound::Hash { modulus: 4, remainder: 1 }.to_string(), "FOR VALUES WITH (modulus 4, remainder 1)");
        assert_eq!(PartitionBound::Default.to_string(), "DEFAULT");
    }

    #[test]
    fn test_route_range() {
        let desc = PartitionDesc::new(vec![
            (Oid(1), range(RangeDatum::MinValue, RangeDatum::Value(Datum::Int(10)))),
            (Oid(2), range(RangeDatum::Value(Datum::Int(10)), RangeDatum::MaxValue)),
        ]);
        assert_eq!(desc.route(&[Datum::Int(9)]), Some(0));
        assert_eq!(desc.route(&[Datum::Int(10)]), Some(1));
        assert_eq!(desc.route(&[Datum::Null]), None);
    }

    #[test]
    fn test_route_list_with_default() {
        let desc = PartitionDesc::new(vec![
            (Oid(1), PartitionBound::List(vec![Datum::from("eu"), Datum::Null])),
            (Oid(2), PartitionBound::Default),
        ]);
        assert_eq!(desc.default_index, Some(1));
        assert_eq!(desc.route(&[Datum::from("eu")]), Some(0));
        assert_eq!(desc.route(&[Datum::Null]), Some(0));
        assert_eq!(desc.route(&[Datum::from("us")]), Some(1));
    }

    #[test]
    fn test_hash_routing_is_total() {
        let desc = PartitionDesc::new((0..4).map(|r| (Oid(r + 1), PartitionBound::Hash { modulus: 4, remainder: r })).collect());
        for value in 0..100i64 {
            assert!(desc.route(&[Datum::Int(value)]).is_some());
        }
    }

    #[test]
    fn test_range_constraints() {
        let key = int_key(PartitionStrategy::Range);
        let constraints = range(RangeDatum::Value(Datum::Int(10)), RangeDatum::Value(Datum::Int(20))).constraints(&key);
        assert_eq!(constraints.len(), 3);
        assert!(PartitionBound::Default.constraints(&key).is_empty());
    }
}
