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

//! Read-only catalog interface consumed by the planner and the hypothetical object engine

use thiserror::Error;

use crate::ids::Oid;
use crate::relation::{IndexMeta, RelationMeta};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("relation with OID {0} does not exist")]
    RelationNotFound(Oid),
    #[error("relation \"{0}\" does not exist")]
    RelationNameNotFound(String),
    #[error("index with OID {0} does not exist")]
    IndexNotFound(Oid),
    #[error("relation \"{0}\" already exists")]
    DuplicateRelation(String),
    #[error("object identifier space exhausted")]
    IdentifierSpaceExhausted,
    #[error("catalog access failed: {0}")]
    AccessFailed(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog lookups. Every call opens the object read-only and releases it before returning.
pub trait Catalog: Send + Sync {
    /// Opens a relation by identifier
    fn relation(&self, oid: Oid) -> CatalogResult<RelationMeta>;

    /// Resolves a relation by name
    fn relation_by_name(&self, name: &str) -> CatalogResult<RelationMeta>;

    /// Physical indexes defined on a relation
    fn indexes(&self, relid: Oid) -> CatalogResult<Vec<IndexMeta>>;

    /// A physical index by identifier
    fn index(&self, oid: Oid) -> CatalogResult<IndexMeta>;

    /// Direct physical inheritance children of a relation
    fn inheritance_children(&self, relid: Oid) -> CatalogResult<Vec<Oid>>;

    /// Borrows a fresh identifier from the shared identifier space, in the tablespace and
    /// persistence of `relation`. The shared space is locked exclusively only for the duration
    /// of the call.
    fn allocate_shadow_id(&self, relation: Oid) -> CatalogResult<Oid>;

    /// Whether an identifier is currently used by a physical catalog object
    fn oid_in_use(&self, oid: Oid) -> bool;
}
