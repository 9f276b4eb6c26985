// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsed expressions keyed by source string.

use super::expr::{CronExpr, CronParseError};
use std::collections::HashMap;
use std::sync::Arc;

/// Parse results (including failures) keyed by the trimmed source.
/// Cleared whenever the task list is reloaded from disk.
#[derive(Debug, Default)]
pub struct CronCache {
    entries: HashMap<String, Result<Arc<CronExpr>, CronParseError>>,
}

impl CronCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, source: &str) -> Result<Arc<CronExpr>, CronParseError> {
        let key = source.trim();
        if let Some(entry) = self.entries.get(key) {
            return entry.clone();
        }
        let parsed = CronExpr::parse(key).map(Arc::new);
        self.entries.insert(key.to_string(), parsed.clone());
        parsed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_successes_and_failures() {
        let mut cache = CronCache::new();
        let a = cache.get("*/5 * * * *").unwrap();
        let b = cache.get("  */5 * * * *  ").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.get("nope").is_err());
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
