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

//! Extension configuration

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENABLED_ENV: &str = "HYPODB_ENABLED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypoConfig {
    /// When false, nothing is injected even during a plan-only explanation
    pub enabled: bool,
}

impl Default for HypoConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl HypoConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENABLED_ENV) {
            match parse_bool(&value) {
                Some(enabled) => config.enabled = enabled,
                None => warn!("Invalid {} '{}', using default", ENABLED_ENV, value),
            }
        }

        config
    }
}

/// Boolean setting values in the spellings a SET command accepts
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" | "t" => Some(true),
        "off" | "false" | "no" | "0" | "f" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_by_default() {
        assert!(HypoConfig::default().enabled);
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_config_serde() {
        let json = serde_json::to_string(&HypoConfig { enabled: false }).unwrap();
        let back: HypoConfig = serde_json::from_str(&json).unwrap();
        assert!(!back.enabled);
    }
}
