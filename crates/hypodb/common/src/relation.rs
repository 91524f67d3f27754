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

//! Relation metadata as reported by the catalog

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::datum::DataType;
use crate::ids::{AttrNumber, Oid};

/// Kind of a catalog relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelKind {
    Relation,
    MatView,
    PartitionedTable,
    View,
    Index,
    Foreign,
}

impl RelKind {
    /// Relations that own a heap and can carry indexes
    pub fn is_indexable(self) -> bool {
        matches!(self, RelKind::Relation | RelKind::MatView)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Persistence {
    Permanent,
    Unlogged,
    Temporary,
}

/// Index access methods the planner knows how to cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMethod {
    BTree,
    Hash,
    Brin,
}

impl AccessMethod {
    pub fn name(self) -> &'static str {
        match self {
            AccessMethod::BTree => "btree",
            AccessMethod::Hash => "hash",
            AccessMethod::Brin => "brin",
        }
    }

    /// Parses an access method name as written in CREATE INDEX ... USING
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "btree" => Some(AccessMethod::BTree),
            "hash" => Some(AccessMethod::Hash),
            "brin" => Some(AccessMethod::Brin),
            _ => None,
        }
    }

    pub fn can_order(self) -> bool {
        matches!(self, AccessMethod::BTree)
    }

    pub fn can_unique(self) -> bool {
        matches!(self, AccessMethod::BTree)
    }

    pub fn can_multi_column(self) -> bool {
        !matches!(self, AccessMethod::Hash)
    }

    pub fn can_include(self) -> bool {
        matches!(self, AccessMethod::BTree)
    }

    /// Whether plain index scans are possible, as opposed to bitmap scans only
    pub fn has_gettuple(self) -> bool {
        !matches!(self, AccessMethod::Brin)
    }

    pub fn has_getbitmap(self) -> bool {
        true
    }

    /// Whether the method answers inequality operators, not only equality
    pub fn supports_range(self) -> bool {
        !matches!(self, AccessMethod::Hash)
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub attnum: AttrNumber,
    pub name: String,
    pub data_type: DataType,
    pub not_null: bool,
    /// Number of distinct values, when statistics are available
    pub n_distinct: Option<f64>,
}

impl ColumnDef {
    pub fn new(attnum: i16, name: &str, data_type: DataType) -> Self {
        Self {
            attnum: AttrNumber(attnum),
            name: name.to_string(),
            data_type,
            not_null: false,
            n_distinct: None,
        }
    }

    pub fn with_distinct(mut self, n_distinct: f64) -> Self {
        self.n_distinct = Some(n_distinct);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// A relation as opened read-only from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMeta {
    pub oid: Oid,
    pub name: String,
    pub kind: RelKind,
    pub persistence: Persistence,
    pub tablespace: Oid,
    pub columns: Vec<ColumnDef>,
    pub pages: u64,
    pub tuples: f64,
}

impl RelationMeta {
    pub fn column(&self, attnum: AttrNumber) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.attnum == attnum)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Estimated average width of a heap tuple's user data
    pub fn tuple_width(&self) -> u32 {
        self.columns.iter().map(|c| c.data_type.avg_width()).sum()
    }
}

/// A physical index registered in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub oid: Oid,
    pub name: String,
    pub relid: Oid,
    pub access_method: AccessMethod,
    pub key_columns: Vec<AttrNumber>,
    pub unique: bool,
    pub pages: u64,
    pub tuples: f64,
    pub tree_height: i32,
}
