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

//! Injection of hypothetical objects into the planner's working structures
//!
//! Every function here assumes the caller has already checked that the statement's simulation
//! window is active. Nothing is validated: registry entries were validated when registered.

pub mod index;
pub mod inheritance;
pub mod partition;

pub use index::{attach_indexes, index_opt_info};
pub use inheritance::{ChildEntry, build_child_rtentry, child_entries, expand_children, inheritors};
pub use partition::{attach_partitioning, exclude_refuted, partition_desc};
