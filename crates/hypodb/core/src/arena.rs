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

//! Simulation arena
//!
//! Every hypothetical object is allocated from a [`SimulationArena`] that lives as long as the
//! extension instance. Keys are generational: removing an entry or resetting the whole arena
//! invalidates every key handed out for it, so a stale key can never alias a newer entry.

use generational_arena::{Arena, Index};
use std::marker::PhantomData;

/// Typed key into a [`SimulationArena`]
pub struct ArenaKey<T> {
    index: Index,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArenaKey<T> {
    fn new(index: Index) -> Self {
        Self { index, _marker: PhantomData }
    }
}

impl<T> Clone for ArenaKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaKey<T> {}

impl<T> PartialEq for ArenaKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for ArenaKey<T> {}

impl<T> std::fmt::Debug for ArenaKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (slot, generation) = self.index.into_raw_parts();
        write!(f, "ArenaKey({slot}v{generation})")
    }
}

pub struct SimulationArena<T> {
    slots: Arena<T>,
    resets: u64,
}

impl<T> SimulationArena<T> {
    pub fn new() -> Self {
        Self { slots: Arena::new(), resets: 0 }
    }

    pub fn alloc(&mut self, value: T) -> ArenaKey<T> {
        ArenaKey::new(self.slots.insert(value))
    }

    pub fn get(&self, key: ArenaKey<T>) -> Option<&T> {
        self.slots.get(key.index)
    }

    pub fn get_mut(&mut self, key: ArenaKey<T>) -> Option<&mut T> {
        self.slots.get_mut(key.index)
    }

    pub fn free(&mut self, key: ArenaKey<T>) -> Option<T> {
        self.slots.remove(key.index)
    }

    pub fn contains(&self, key: ArenaKey<T>) -> bool {
        self.slots.contains(key.index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drops every entry at once and invalidates all outstanding keys
    pub fn reset(&mut self) {
        self.slots.clear();
        self.resets += 1;
    }

    /// Number of times the arena has been reset
    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArenaKey<T>, &T)> {
        self.slots.iter().map(|(index, value)| (ArenaKey::new(index), value))
    }
}

impl<T> Default for SimulationArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_get() {
        let mut arena = SimulationArena::new();
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_free_invalidates_key() {
        let mut arena = SimulationArena::new();
        let a = arena.alloc(1);
        assert_eq!(arena.free(a), Some(1));
        let b = arena.alloc(2);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn test_reset_invalidates_every_key() {
        let mut arena = SimulationArena::new();
        let keys: Vec<_> = (0..4).map(|i| arena.alloc(i)).collect();
        arena.reset();
        assert!(arena.is_empty());
        assert_eq!(arena.resets(), 1);

        let fresh = arena.alloc(99);
        for key in keys {
            assert!(!arena.contains(key));
        }
        assert_eq!(arena.get(fresh), Some(&99));
    }

    #[test]
    fn test_reset_twice_is_harmless() {
        let mut arena: SimulationArena<u8> = SimulationArena::new();
        arena.reset();
        arena.reset();
        assert!(arena.is_empty());
    }
}
