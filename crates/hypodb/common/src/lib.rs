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

//! # HypoDB Common Types
//!
//! Types shared between the hypothetical object engine and the host it plugs into:
//!
//! - `ids`: object identifiers, attribute numbers and range-table indexes
//! - `datum`: scalar values and their data types
//! - `relation`: relation, column and index metadata as the catalog reports it
//! - `catalog`: the read-only catalog interface, including the shadow identifier capability

pub mod catalog;
pub mod datum;
pub mod ids;
pub mod relation;

pub use catalog::{Catalog, CatalogError, CatalogResult};
pub use datum::{DataType, Datum};
pub use ids::{AttrNumber, FIRST_NORMAL_OBJECT_ID, Oid, RtIndex};
pub use relation::{AccessMethod, ColumnDef, IndexMeta, Persistence, RelKind, RelationMeta};
