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

//! Per-statement state passed explicitly through the hook chain

use serde::{Deserialize, Serialize};

/// Whether hypothetical objects may be injected for the current statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationWindow {
    plan_only_explain: bool,
    enabled: bool,
}

impl SimulationWindow {
    pub fn open(plan_only_explain: bool, enabled: bool) -> Self {
        Self { plan_only_explain, enabled }
    }

    pub fn is_active(&self) -> bool {
        self.plan_only_explain && self.enabled
    }

    pub fn is_plan_only_explain(&self) -> bool {
        self.plan_only_explain
    }

    pub fn close(&mut self) {
        *self = Self::default();
    }
}

/// Created by the session for one statement and dropped when it completes
#[derive(Debug, Clone, Default)]
pub struct StatementContext {
    pub statement_id: u64,
    pub simulation: SimulationWindow,
}

impl StatementContext {
    pub fn new(statement_id: u64) -> Self {
        Self {
            statement_id,
            simulation: SimulationWindow::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_requires_both_flags() {
        assert!(SimulationWindow::open(true, true).is_active());
        assert!(!SimulationWindow::open(true, false).is_active());
        assert!(!SimulationWindow::open(false, true).is_active());
    }

    #[test]
    fn test_close_resets_window() {
        let mut window = SimulationWindow::open(true, true);
        window.close();
        assert!(!window.is_active());
        assert!(!window.is_plan_only_explain());
    }

    #[test]
    fn test_new_context_is_inactive() {
        let ctx = StatementContext::new(7);
        assert_eq!(ctx.statement_id, 7);
        assert!(!ctx.simulation.is_active());
    }
}
