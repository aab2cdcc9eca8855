//! Memoized query results.
//!
//! Keyed by the pattern, the context ids (deduplicated, in request order, since
//! results are reported in that order) and the variable request.
//! The store clears the whole cache from inside every mutating lock scope, so
//! an entry is never older than the state it was computed against.

use std::collections::{HashMap, VecDeque};

use crate::symbol::VarId;
use crate::term::Term;

use super::QueryMatch;

/// Cache key for one pattern query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub pattern: Term,
    pub contexts: Vec<String>,
    pub vars: Option<Vec<VarId>>,
}

impl QueryKey {
    pub fn new(pattern: &Term, requested: &[&str], vars: Option<&[VarId]>) -> Self {
        let mut contexts: Vec<String> = Vec::with_capacity(requested.len());
        for c in requested {
            if !contexts.iter().any(|seen| seen == c) {
                contexts.push(c.to_string());
            }
        }
        let vars = vars.map(|v| {
            let mut v = v.to_vec();
            v.sort();
            v.dedup();
            v
        });
        Self {
            pattern: pattern.clone(),
            contexts,
            vars,
        }
    }
}

/// Bounded FIFO cache of query results.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, Vec<QueryMatch>>,
    order: VecDeque<QueryKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl QueryCache {
    /// A cache holding at most `capacity` results. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Look up a result, counting the hit or miss.
    pub fn get(&mut self, key: &QueryKey) -> Option<Vec<QueryMatch>> {
        match self.entries.get(key) {
            Some(found) => {
                self.hits += 1;
                Some(found.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a result, evicting the oldest entry when full.
    pub fn put(&mut self, key: QueryKey, result: Vec<QueryMatch>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.contains_key(&key) {
            self.entries.insert(key, result);
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, result);
    }

    /// Drop every entry. Hit and miss counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
