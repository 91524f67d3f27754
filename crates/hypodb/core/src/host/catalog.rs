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

//! In-memory catalog

use hypodb_common::{
    AccessMethod, Catalog, CatalogError, CatalogResult, ColumnDef, FIRST_NORMAL_OBJECT_ID, IndexMeta, Oid, Persistence, RelKind, RelationMeta,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const BLOCK_SIZE: f64 = 8192.0;
const INDEX_TUPLE_OVERHEAD: f64 = 16.0;

/// Describes a table to create
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    kind: RelKind,
    persistence: Persistence,
    columns: Vec<ColumnDef>,
    pages: u64,
    tuples: f64,
}

impl TableBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RelKind::Relation,
            persistence: Persistence::Permanent,
            columns: Vec::new(),
            pages: 0,
            tuples: 0.0,
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn kind(mut self, kind: RelKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = persistence;
        self
    }

    /// Page and tuple counts as the last statistics run recorded them
    pub fn stats(mut self, pages: u64, tuples: f64) -> Self {
        self.pages = pages;
        self.tuples = tuples;
        self
    }
}

#[derive(Default)]
struct CatalogState {
    relations: BTreeMap<Oid, RelationMeta>,
    by_name: HashMap<String, Oid>,
    indexes: BTreeMap<Oid, IndexMeta>,
    children: HashMap<Oid, Vec<Oid>>,
}

/// A catalog held entirely in memory.
///
/// Identifiers for relations, indexes and borrowed shadow ids come from one counter, so no two
/// objects of any kind ever share an identifier.
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
    next_oid: Mutex<u32>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::starting_at(FIRST_NORMAL_OBJECT_ID)
    }

    /// A catalog whose identifier counter starts at `next_oid`
    pub fn starting_at(next_oid: u32) -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            next_oid: Mutex::new(next_oid.max(FIRST_NORMAL_OBJECT_ID)),
        }
    }

    /// Takes the next free identifier, wrapping around once past the end of the space
    fn next_free_oid(&self, state: &CatalogState) -> CatalogResult<Oid> {
        let mut next = self.next_oid.lock();
        let span = u64::from(u32::MAX - FIRST_NORMAL_OBJECT_ID) + 1;
        for _ in 0..span {
            let candidate = Oid(*next);
            *next = if *next == u32::MAX { FIRST_NORMAL_OBJECT_ID } else { *next + 1 };
            if !Self::in_use(state, candidate) {
                return Ok(candidate);
            }
        }
        Err(CatalogError::IdentifierSpaceExhausted)
    }

    fn in_use(state: &CatalogState, oid: Oid) -> bool {
        state.relations.contains_key(&oid) || state.indexes.contains_key(&oid)
    }

    pub fn create_table(&self, table: TableBuilder) -> CatalogResult<Oid> {
        let mut state = self.state.write();
        let key = table.name.to_ascii_lowercase();
        if state.by_name.contains_key(&key) {
            return Err(CatalogError::DuplicateRelation(table.name));
        }

        let oid = self.next_free_oid(&state)?;
        debug!("Creating relation {} ({})", table.name, oid);
        state.by_name.insert(key, oid);
        state.relations.insert(
            oid,
            RelationMeta {
                oid,
                name: table.name,
                kind: table.kind,
                persistence: table.persistence,
                tablespace: Oid::INVALID,
                columns: table.columns,
                pages: table.pages,
                tuples: table.tuples,
            },
        );
        Ok(oid)
    }

    /// Creates a physical index with a rough size estimate
    pub fn create_index(&self, relid: Oid, name: &str, access_method: AccessMethod, columns: &[&str], unique: bool) -> CatalogResult<Oid> {
        let mut state = self.state.write();
        let relation = state.relations.get(&relid).ok_or(CatalogError::RelationNotFound(relid))?;

        let mut key_columns = Vec::with_capacity(columns.len());
        let mut key_width = 0.0;
        for column in columns {
            let def = relation
                .column_by_name(column)
                .ok_or_else(|| CatalogError::AccessFailed(format!("column \"{column}\" of relation \"{}\" does not exist", relation.name)))?;
            key_columns.push(def.attnum);
            key_width += f64::from(def.data_type.avg_width());
        }
        let tuples = relation.tuples;
        let pages = ((tuples * (key_width + INDEX_TUPLE_OVERHEAD)) / (BLOCK_SIZE * 0.9)).ceil() as u64 + 1;

        let oid = self.next_free_oid(&state)?;
        debug!("Creating index {} ({}) on {}", name, oid, relid);
        state.indexes.insert(
            oid,
            IndexMeta {
                oid,
                name: name.to_string(),
                relid,
                access_method,
                key_columns,
                unique,
                pages,
                tuples,
                tree_height: if pages > 2 { 1 } else { 0 },
            },
        );
        Ok(oid)
    }

    /// Records `child` as a direct inheritance child of `parent`
    pub fn add_inheritance_child(&self, parent: Oid, child: Oid) -> CatalogResult<()> {
        let mut state = self.state.write();
        for oid in [parent, child] {
            if !state.relations.contains_key(&oid) {
                return Err(CatalogError::RelationNotFound(oid));
            }
        }
        state.children.entry(parent).or_default().push(child);
        Ok(())
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for MemoryCatalog {
    fn relation(&self, oid: Oid) -> CatalogResult<RelationMeta> {
        self.state.read().relations.get(&oid).cloned().ok_or(CatalogError::RelationNotFound(oid))
    }

    fn relation_by_name(&self, name: &str) -> CatalogResult<RelationMeta> {
        let state = self.state.read();
        state
            .by_name
            .get(&name.to_ascii_lowercase())
            .and_then(|oid| state.relations.get(oid))
            .cloned()
            .ok_or_else(|| CatalogError::RelationNameNotFound(name.to_string()))
    }

    fn indexes(&self, relid: Oid) -> CatalogResult<Vec<IndexMeta>> {
        let state = self.state.read();
        if !state.relations.contains_key(&relid) {
            return Err(CatalogError::RelationNotFound(relid));
        }
        Ok(state.indexes.values().filter(|index| index.relid == relid).cloned().collect())
    }

    fn index(&self, oid: Oid) -> CatalogResult<IndexMeta> {
        self.state.read().indexes.get(&oid).cloned().ok_or(CatalogError::IndexNotFound(oid))
    }

    fn inheritance_children(&self, relid: Oid) -> CatalogResult<Vec<Oid>> {
        Ok(self.state.read().children.get(&relid).cloned().unwrap_or_default())
    }

    fn allocate_shadow_id(&self, relation: Oid) -> CatalogResult<Oid> {
        let state = self.state.read();
        if !state.relations.contains_key(&relation) {
            return Err(CatalogError::RelationNotFound(relation));
        }
        self.next_free_oid(&state)
    }

    fn oid_in_use(&self, oid: Oid) -> bool {
        Self::in_use(&self.state.read(), oid)
    }
}
