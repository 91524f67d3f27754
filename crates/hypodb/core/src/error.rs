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

use hypodb_common::CatalogError;
use thiserror::Error;

use crate::hooks::HookError;
use crate::registry::RegistryError;

/// Errors that abort the current statement or administrative call
#[derive(Debug, Error)]
pub enum HypoError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("planning failed: {0}")]
    Planner(String),
    #[error("execution failed: {0}")]
    Executor(String),
    #[error("unsupported statement: {0}")]
    Unsupported(String),
    #[error("invalid value for setting \"{name}\": {reason}")]
    InvalidSetting { name: String, reason: String },
    #[error("interceptor {hook} failed: {message}")]
    Interceptor { hook: String, message: String },
    #[error("failed to render plan: {0}")]
    Render(#[from] serde_json::Error),
}

pub type HypoResult<T> = Result<T, HypoError>;
