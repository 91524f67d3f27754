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

//! Planner settings, adjustable per session with SET

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use crate::config::parse_bool;
use crate::error::{HypoError, HypoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintExclusion {
    On,
    Off,
    /// Only for inheritance children and partitions
    Partition,
}

impl ConstraintExclusion {
    /// Whether constraints are checked for a relation that is, or is not, an inheritance child
    pub fn applies(self, is_child: bool) -> bool {
        match self {
            ConstraintExclusion::On => true,
            ConstraintExclusion::Off => false,
            ConstraintExclusion::Partition => is_child,
        }
    }
}

impl FromStr for ConstraintExclusion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("partition") {
            return Ok(ConstraintExclusion::Partition);
        }
        match parse_bool(value) {
            Some(true) => Ok(ConstraintExclusion::On),
            Some(false) => Ok(ConstraintExclusion::Off),
            None => Err(format!("expected on, off or partition, got \"{value}\"")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerSettings {
    pub enable_seqscan: bool,
    pub enable_indexscan: bool,
    pub enable_bitmapscan: bool,
    pub constraint_exclusion: ConstraintExclusion,
    pub seq_page_cost: f64,
    pub random_page_cost: f64,
    pub cpu_tuple_cost: f64,
    pub cpu_index_tuple_cost: f64,
    pub cpu_operator_cost: f64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            enable_seqscan: true,
            enable_indexscan: true,
            enable_bitmapscan: true,
            constraint_exclusion: ConstraintExclusion::Partition,
            seq_page_cost: 1.0,
            random_page_cost: 4.0,
            cpu_tuple_cost: 0.01,
            cpu_index_tuple_cost: 0.005,
            cpu_operator_cost: 0.0025,
        }
    }
}

impl PlannerSettings {
    pub const NAMES: [&'static str; 9] = [
        "enable_seqscan",
        "enable_indexscan",
        "enable_bitmapscan",
        "constraint_exclusion",
        "seq_page_cost",
        "random_page_cost",
        "cpu_tuple_cost",
        "cpu_index_tuple_cost",
        "cpu_operator_cost",
    ];

    /// Defaults overridden by `HYPODB_<SETTING>` environment variables
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        for name in Self::NAMES {
            let var = format!("HYPODB_{}", name.to_ascii_uppercase());
            if let Ok(value) = std::env::var(&var)
                && let Err(e) = settings.apply(name, &value)
            {
                warn!("Invalid {} '{}', using default: {}", var, value, e);
            }
        }

        settings
    }

    /// Applies `SET name = value`
    pub fn apply(&mut self, name: &str, value: &str) -> HypoResult<()> {
        let invalid = |reason: String| HypoError::InvalidSetting {
            name: name.to_string(),
            reason,
        };
        let flag = || parse_bool(value).ok_or_else(|| invalid(format!("expected a boolean, got \"{value}\"")));
        let cost = || match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(invalid(format!("expected a non-negative number, got \"{value}\""))),
        };

        match name.to_ascii_lowercase().as_str() {
            "enable_seqscan" => self.enable_seqscan = flag()?,
            "enable_indexscan" => self.enable_indexscan = flag()?,
            "enable_bitmapscan" => self.enable_bitmapscan = flag()?,
            "constraint_exclusion" => self.constraint_exclusion = value.parse().map_err(invalid)?,
            "seq_page_cost" => self.seq_page_cost = cost()?,
            "random_page_cost" => self.random_page_cost = cost()?,
            "cpu_tuple_cost" => self.cpu_tuple_cost = cost()?,
            "cpu_index_tuple_cost" => self.cpu_index_tuple_cost = cost()?,
            "cpu_operator_cost" => self.cpu_operator_cost = cost()?,
            _ => return Err(invalid("unrecognized configuration parameter".to_string())),
        }
        Ok(())
    }
}
