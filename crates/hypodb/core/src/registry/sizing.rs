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

//! Size estimates for indexes that were never built

use hypodb_common::{AccessMethod, DataType};
use serde::{Deserialize, Serialize};

pub const BLOCK_SIZE: u64 = 8192;
const PAGE_HEADER: u64 = 24;
const BTREE_SPECIAL: u64 = 16;
const HASH_SPECIAL: u64 = 16;
const INDEX_TUPLE_HEADER: u64 = 8;
const LINE_POINTER: u64 = 4;
const BTREE_FILLFACTOR: f64 = 0.90;
const HASH_FILLFACTOR: f64 = 0.75;
const BRIN_PAGES_PER_RANGE: u64 = 128;
const BRIN_REVMAP_ENTRY: u64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexSize {
    pub pages: u64,
    pub tuples: f64,
    pub tree_height: i32,
}

impl IndexSize {
    pub fn bytes(&self) -> u64 {
        self.pages * BLOCK_SIZE
    }
}

fn maxalign(len: u64) -> u64 {
    (len + 7) & !7
}

/// Per-entry footprint of an index tuple holding `columns`, including its line pointer
fn index_tuple_size(columns: &[DataType]) -> u64 {
    let data: u64 = columns.iter().map(|t| u64::from(t.avg_width())).sum();
    maxalign(INDEX_TUPLE_HEADER + data) + LINE_POINTER
}

fn entries_per_page(special: u64, fillfactor: f64, tuple_size: u64) -> u64 {
    let usable = ((BLOCK_SIZE - PAGE_HEADER - special) as f64 * fillfactor) as u64;
    (usable / tuple_size).max(1)
}

/// Estimates the size of an index over `tuples` rows of a heap of `heap_pages` pages.
///
/// `columns` are the key columns followed by any INCLUDE columns.
pub fn estimate(access_method: AccessMethod, columns: &[DataType], heap_pages: u64, tuples: f64) -> IndexSize {
    let tuples = tuples.max(0.0);
    match access_method {
        AccessMethod::BTree => {
            let per_page = entries_per_page(BTREE_SPECIAL, BTREE_FILLFACTOR, index_tuple_size(columns));
            let leaf_pages = ((tuples / per_page as f64).ceil() as u64).max(1);
            let mut pages = leaf_pages;
            let mut level = leaf_pages;
            let mut height = 0;
            while level > 1 {
                level = level.div_ceil(per_page);
                pages += level;
                height += 1;
            }
            IndexSize {
                // plus the metapage
                pages: pages + 1,
                tuples,
                tree_height: height,
            }
        }
        AccessMethod::Hash => {
            // Hash indexes store only the 4-byte hash code
            let per_page = entries_per_page(HASH_SPECIAL, HASH_FILLFACTOR, maxalign(INDEX_TUPLE_HEADER + 4) + LINE_POINTER);
            let buckets = ((tuples / per_page as f64).ceil() as u64).max(2).next_power_of_two();
            IndexSize {
                // metapage and one bitmap page
                pages: buckets + 2,
                tuples,
                tree_height: 0,
            }
        }
        AccessMethod::Brin => {
            let ranges = heap_pages.div_ceil(BRIN_PAGES_PER_RANGE).max(1);
            // Each summary holds a min and a max per column
            let doubled: Vec<DataType> = columns.iter().flat_map(|t| [*t, *t]).collect();
            let per_page = entries_per_page(0, 1.0, index_tuple_size(&doubled));
            let revmap_per_page = (BLOCK_SIZE - PAGE_HEADER) / BRIN_REVMAP_ENTRY;
            IndexSize {
                pages: ranges.div_ceil(per_page) + ranges.div_ceil(revmap_per_page) + 1,
                tuples: ranges as f64,
                tree_height: 0,
            }
        }
    }
}
