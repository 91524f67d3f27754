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

//! Synthetic identifiers borrowed from the catalog's identifier space

use hypodb_common::{Catalog, Oid};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::{RegistryError, RegistryResult};

/// Upper bound on catalog round trips for a single identifier
pub const MAX_ALLOCATION_ATTEMPTS: usize = 16;

pub struct ShadowIdAllocator {
    catalog: Arc<dyn Catalog>,
    issued: HashSet<Oid>,
}

impl ShadowIdAllocator {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            issued: HashSet::new(),
        }
    }

    /// A fresh identifier, distinct from every identifier this allocator still holds and from
    /// every identifier the catalog uses.
    pub fn allocate(&mut self, relation: Oid) -> RegistryResult<Oid> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let oid = self.catalog.allocate_shadow_id(relation).map_err(RegistryError::IdentifierAllocation)?;
            if !oid.is_valid() || self.issued.contains(&oid) || self.catalog.oid_in_use(oid) {
                debug!("Shadow id {} for {} is taken, retrying", oid, relation);
                continue;
            }
            self.issued.insert(oid);
            return Ok(oid);
        }
        Err(RegistryError::IdentifierExhausted {
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }

    /// Makes an identifier available again
    pub fn release(&mut self, oid: Oid) -> bool {
        self.issued.remove(&oid)
    }

    pub fn is_issued(&self, oid: Oid) -> bool {
        self.issued.contains(&oid)
    }

    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    pub fn reset(&mut self) {
        self.issued.clear();
    }
}
