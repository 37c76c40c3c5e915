// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Content-addressed memo tables reused across generation passes.
//!
//! **DDD Context:** Generation
//!
//! Every model type implements structural `Eq + Hash`, so "rebuild only
//! what changed" reduces to a key-value lookup: a pass that sees an input
//! equal to one from the previous pass reuses the previous result. Entries
//! not touched during a pass are swept when it ends, so the tables never
//! outgrow the live compilation.

use crate::analysis::handlers::TypeHandlers;
use crate::analysis::middleware::TypeMiddleware;
use crate::analysis::type_shape::TypeShape;
use crate::codegen::GeneratedSource;
use crate::symbols::{Origin, TypeRef, TypeSymbol};
use std::collections::HashMap;
use std::hash::Hash;

/// A memo table with hit/miss accounting.
#[derive(Debug)]
pub struct MemoTable<K, V> {
    entries: HashMap<K, Slot<V>>,
    pass: u64,
    hits: u64,
    misses: u64,
}

#[derive(Debug)]
struct Slot<V> {
    value: V,
    last_used: u64,
}

impl<K, V> Default for MemoTable<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            pass: 0,
            hits: 0,
            misses: 0,
        }
    }
}

impl<K: Eq + Hash, V: Clone> MemoTable<K, V> {
    /// Returns the cached value for `key`, computing it on a miss.
    pub fn get_or_insert_with(&mut self, key: K, compute: impl FnOnce(&K) -> V) -> V {
        let pass = self.pass;
        if let Some(slot) = self.entries.get_mut(&key) {
            slot.last_used = pass;
            self.hits += 1;
            return slot.value.clone();
        }
        self.misses += 1;
        let value = compute(&key);
        self.entries.insert(
            key,
            Slot {
                value: value.clone(),
                last_used: pass,
            },
        );
        value
    }

    /// Fallible variant of [`MemoTable::get_or_insert_with`]; errors are not cached.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `compute`.
    pub fn try_get_or_insert_with<E>(
        &mut self,
        key: K,
        compute: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<V, E> {
        let pass = self.pass;
        if let Some(slot) = self.entries.get_mut(&key) {
            slot.last_used = pass;
            self.hits += 1;
            return Ok(slot.value.clone());
        }
        self.misses += 1;
        let value = compute(&key)?;
        self.entries.insert(
            key,
            Slot {
                value: value.clone(),
                last_used: pass,
            },
        );
        Ok(value)
    }

    fn begin_pass(&mut self) {
        self.pass += 1;
        self.hits = 0;
        self.misses = 0;
    }

    fn sweep(&mut self) {
        let pass = self.pass;
        self.entries.retain(|_, slot| slot.last_used == pass);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn stats(&self) -> TableStats {
        TableStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

/// Counters for one table, reset at the start of each pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Counters for every table after the most recent pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub shapes: TableStats,
    pub handlers: TableStats,
    pub middleware: TableStats,
    pub sources: TableStats,
}

impl CacheStats {
    #[must_use]
    pub fn total_hits(&self) -> u64 {
        self.shapes.hits + self.handlers.hits + self.middleware.hits + self.sources.hits
    }

    #[must_use]
    pub fn total_misses(&self) -> u64 {
        self.shapes.misses + self.handlers.misses + self.middleware.misses + self.sources.misses
    }
}

/// Key for per-type discovery: the declaration, where it came from, and the
/// supertype layout its message chains were computed against.
pub type TypeKey = (u64, Origin, TypeSymbol);

/// All memo tables owned by one generator.
#[derive(Debug, Default)]
pub struct IncrementalCache {
    pub(crate) shapes: MemoTable<TypeRef, TypeShape>,
    pub(crate) handlers: MemoTable<TypeKey, TypeHandlers>,
    pub(crate) middleware: MemoTable<TypeKey, TypeMiddleware>,
    pub(crate) sources: MemoTable<SourceKey, GeneratedSource>,
}

/// Key for rendered sources: the emitter and the hash-stable plan it rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SourceKey {
    Wrapper(crate::codegen::handler_wrapper::WrapperPlan),
    Publisher(crate::codegen::publisher::PublisherPlan),
    Interceptors(crate::codegen::interceptor::InterceptorFilePlan),
    Registry(crate::codegen::registry::RegistryPlan),
    Polyfill,
}

impl IncrementalCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_pass(&mut self) {
        self.shapes.begin_pass();
        self.handlers.begin_pass();
        self.middleware.begin_pass();
        self.sources.begin_pass();
    }

    /// Drops entries the pass just finished did not use.
    pub(crate) fn end_pass(&mut self) {
        self.shapes.sweep();
        self.handlers.sweep();
        self.middleware.sweep();
        self.sources.sweep();
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
        self.handlers.clear();
        self.middleware.clear();
        self.sources.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            shapes: self.shapes.stats(),
            handlers: self.handlers.stats(),
            middleware: self.middleware.stats(),
            sources: self.sources.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lookup_hits() {
        let mut table: MemoTable<u32, String> = MemoTable::default();
        table.begin_pass();
        let mut calls = 0;
        let first = table.get_or_insert_with(7, |k| {
            calls += 1;
            k.to_string()
        });
        let second = table.get_or_insert_with(7, |k| {
            calls += 1;
            k.to_string()
        });
        assert_eq!(first, second);
        assert_eq!(calls, 1);
        assert_eq!(table.stats(), TableStats { hits: 1, misses: 1, entries: 1 });
    }

    #[test]
    fn sweep_drops_untouched_entries() {
        let mut table: MemoTable<u32, u32> = MemoTable::default();
        table.begin_pass();
        table.get_or_insert_with(1, |k| *k);
        table.get_or_insert_with(2, |k| *k);
        table.sweep();

        table.begin_pass();
        table.get_or_insert_with(1, |k| *k);
        table.sweep();

        assert_eq!(table.stats().entries, 1);
        assert_eq!(table.stats().hits, 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let mut table: MemoTable<u32, u32> = MemoTable::default();
        table.begin_pass();
        let failed: Result<u32, &str> = table.try_get_or_insert_with(1, |_| Err("cancelled"));
        assert!(failed.is_err());
        let ok: Result<u32, &str> = table.try_get_or_insert_with(1, |k| Ok(*k));
        assert_eq!(ok, Ok(1));
        assert_eq!(table.stats().misses, 2);
    }
}
