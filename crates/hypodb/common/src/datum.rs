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

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Column data types understood by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int4,
    Int8,
    Float8,
    Text,
}

impl DataType {
    /// Average stored width in bytes, used for tuple and index sizing
    pub fn avg_width(self) -> u32 {
        match self {
            DataType::Bool => 1,
            DataType::Int4 => 4,
            DataType::Int8 | DataType::Float8 => 8,
            DataType::Text => 32,
        }
    }

    /// Storage alignment in bytes
    pub fn alignment(self) -> u32 {
        match self {
            DataType::Bool => 1,
            DataType::Int4 | DataType::Text => 4,
            DataType::Int8 | DataType::Float8 => 8,
        }
    }

    pub fn sql_name(self) -> &'static str {
        match self {
            DataType::Bool => "boolean",
            DataType::Int4 => "integer",
            DataType::Int8 => "bigint",
            DataType::Float8 => "double precision",
            DataType::Text => "text",
        }
    }
}

/// A scalar value appearing in qualifications and partition bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// SQL comparison. `None` when either side is NULL or the types are not comparable.
    pub fn compare(&self, other: &Datum) -> Option<Ordering> {
        match (self, other) {
            (Datum::Bool(a), Datum::Bool(b)) => Some(a.cmp(b)),
            (Datum::Int(a), Datum::Int(b)) => Some(a.cmp(b)),
            (Datum::Float(a), Datum::Float(b)) => a.partial_cmp(b),
            (Datum::Int(a), Datum::Float(b)) => (*a as f64).partial_cmp(b),
            (Datum::Float(a), Datum::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Datum::Text(a), Datum::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Stable hash used to route values to hash partitions.
    ///
    /// Numeric values that compare equal hash equally: an integral float hashes as the integer,
    /// and `-0.0` as `0`.
    pub fn partition_hash(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        match self {
            Datum::Null => hasher.update(&[0u8]),
            Datum::Bool(b) => hasher.update(&[u8::from(*b)]),
            Datum::Int(i) => hasher.update(&i.to_le_bytes()),
            Datum::Float(f) => match integral(*f) {
                Some(i) => hasher.update(&i.to_le_bytes()),
                None if f.is_nan() => hasher.update(&f64::NAN.to_bits().to_le_bytes()),
                None => hasher.update(&f.to_bits().to_le_bytes()),
            },
            Datum::Text(s) => hasher.update(s.as_bytes()),
        }
        hasher.finalize()
    }

    /// Converts the value to the representation a column of type `ty` stores.
    ///
    /// `None` when no value of that type equals this one, e.g. `5.5` for an integer column.
    pub fn coerce_to(&self, ty: DataType) -> Option<Datum> {
        match (self, ty) {
            (Datum::Null, _) => Some(Datum::Null),
            (Datum::Bool(b), DataType::Bool) => Some(Datum::Bool(*b)),
            (Datum::Int(i), DataType::Int4 | DataType::Int8) => Some(Datum::Int(*i)),
            (Datum::Float(f), DataType::Int4 | DataType::Int8) => integral(*f).map(Datum::Int),
            (Datum::Int(i), DataType::Float8) => Some(Datum::Float(*i as f64)),
            (Datum::Float(f), DataType::Float8) => Some(Datum::Float(*f)),
            (Datum::Text(s), DataType::Text) => Some(Datum::Text(s.clone())),
            _ => None,
        }
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Bool(b) => write!(f, "{b}"),
            Datum::Int(i) => write!(f, "{i}"),
            Datum::Float(x) => write!(f, "{x}"),
            Datum::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<i64> for Datum {
    fn from(value: i64) -> Self {
        Datum::Int(value)
    }
}

impl From<i32> for Datum {
    fn from(value: i32) -> Self {
        Datum::Int(i64::from(value))
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Text(value.to_string())
    }
}
