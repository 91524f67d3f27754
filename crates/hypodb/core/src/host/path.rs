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

use hypodb_common::{Oid, RtIndex};
use serde::{Deserialize, Serialize};

use super::predtest::Restriction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathKind {
    SeqScan,
    IndexScan { index_oid: Oid, index_quals: Vec<Restriction> },
    BitmapHeapScan { index_oid: Oid, index_quals: Vec<Restriction> },
    Append { children: Vec<Path> },
    /// A relation proven empty
    Dummy,
}

/// An access path with its estimated cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub kind: PathKind,
    pub rti: RtIndex,
    pub relid: Oid,
    pub rows: f64,
    pub startup_cost: f64,
    pub total_cost: f64,
    /// Restrictions rechecked against each fetched row
    pub filter: Vec<Restriction>,
}

impl Path {
    pub fn dummy(rti: RtIndex, relid: Oid) -> Self {
        Self {
            kind: PathKind::Dummy,
            rti,
            relid,
            rows: 0.0,
            startup_cost: f64::INFINITY,
            total_cost: f64::INFINITY,
            filter: Vec::new(),
        }
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self.kind, PathKind::Dummy)
    }

    /// Index used by this path, if any
    pub fn index_oid(&self) -> Option<Oid> {
        match &self.kind {
            PathKind::IndexScan { index_oid, .. } | PathKind::BitmapHeapScan { index_oid, .. } => Some(*index_oid),
            _ => None,
        }
    }

    /// Every index referenced by this path or its children
    pub fn referenced_indexes(&self) -> Vec<Oid> {
        match &self.kind {
            PathKind::Append { children } => children.iter().flat_map(Path::referenced_indexes).collect(),
            _ => self.index_oid().into_iter().collect(),
        }
    }
}
