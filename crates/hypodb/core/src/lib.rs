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

//! # HypoDB Core
//!
//! Hypothetical indexes and hypothetical partitioning for a cost-based planner.
//!
//! Hypothetical objects live only in memory. While a statement is a plan-only `EXPLAIN`, they are
//! injected into the planner's working structures through a chain of hooks so that the planner
//! costs them exactly as if they physically existed. Any other statement, including
//! `EXPLAIN ANALYZE`, never sees them.
//!
//! ## Modules
//!
//! - `registry`: the hypothetical index and partitioned table registry, and the shadow id allocator
//! - `arena`: the generational arena every registry entry is allocated from
//! - `explain`: plan-only explanation detection
//! - `context`: per-statement state threaded through every hook
//! - `hooks`: the interceptor chain over the planner's extensibility points
//! - `inject`: synthesis of index, partition and inheritance metadata
//! - `extension`: the interceptor that ties the above together, plus its administrative surface
//! - `host`: a reference catalog, planner, explain renderer, executor and session
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use hypodb_common::{ColumnDef, DataType};
//! use hypodb_core::config::HypoConfig;
//! use hypodb_core::extension::HypoExtension;
//! use hypodb_core::host::{MemoryCatalog, Query, Session, Statement, TableBuilder};
//! use hypodb_core::registry::IndexSpec;
//!
//! let catalog = Arc::new(MemoryCatalog::new());
//! let orders = catalog
//!     .create_table(TableBuilder::new("orders").column(ColumnDef::new(1, "id", DataType::Int8).with_distinct(100_000.0)).stats(1000, 100_000.0))
//!     .unwrap();
//!
//! let mut session = Session::new(catalog.clone());
//! let hypo = Arc::new(HypoExtension::new(catalog.clone(), HypoConfig::default()));
//! hypo.clone().load(&mut session);
//!
//! let index = hypo.register_index(orders, IndexSpec::btree(&["id"])).unwrap();
//! let outcome = session.execute(Statement::explain(Query::select("orders").filter_eq("id", 42))).unwrap();
//! assert!(outcome.explain_text().unwrap().contains(&format!("<{index}>btree_orders_id")));
//! ```

pub mod arena;
pub mod config;
pub mod context;
pub mod error;
pub mod explain;
pub mod extension;
pub mod hooks;
pub mod host;
pub mod inject;
pub mod registry;

pub use config::HypoConfig;
pub use context::{SimulationWindow, StatementContext};
pub use error::{HypoError, HypoResult};
pub use extension::HypoExtension;
pub use hooks::{HookChain, HookError, HookHandle, Next, PlannerHook, StandardHooks};
pub use registry::{HypoRegistry, HypotheticalIndex, HypotheticalTable, IndexSpec, PartitionSpec, PartitioningSpec, RegistryError};
