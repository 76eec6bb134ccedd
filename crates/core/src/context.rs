//! Per-scenario key/value state shared between step handlers

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;

use crate::automation::Page;
use crate::error::{Error, Result};

/// Key under which the scenario's page is stored
pub const PAGE_KEY: &str = "page";

/// Key under which the run configuration (`Arc<RunConfig>`) is stored
pub const CONFIG_KEY: &str = "config";

struct Entry {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Mutable state scoped to exactly one scenario.
///
/// Values are stored type-erased and read back through type-checked
/// accessors; asking for a missing key or the wrong type yields
/// [`Error::ContextKey`] instead of a panic.
pub struct ScenarioContext {
    scope: String,
    values: HashMap<String, Entry>,
}

impl fmt::Debug for ScenarioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("ScenarioContext")
            .field("scope", &self.scope)
            .field("keys", &keys)
            .finish()
    }
}

impl ScenarioContext {
    /// Create an empty context. `scope` is the owning scenario id (or `run`).
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            values: HashMap::new(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Store a value, replacing whatever was under `key`
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(
            key.into(),
            Entry {
                value: Box::new(value),
                type_name: type_name::<T>(),
            },
        );
    }

    /// Borrow a value of type `T`
    pub fn get<T: Any>(&self, key: &str) -> Result<&T> {
        let entry = self.values.get(key).ok_or_else(|| missing(key))?;
        entry
            .value
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(key, entry.type_name))
    }

    /// Mutably borrow a value of type `T`
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Result<&mut T> {
        let entry = self.values.get_mut(key).ok_or_else(|| missing(key))?;
        let stored = entry.type_name;
        entry
            .value
            .downcast_mut::<T>()
            .ok_or_else(|| mismatch::<T>(key, stored))
    }

    /// Borrow a value if present with the right type
    pub fn try_get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values
            .get(key)
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    /// Take a value out of the context.
    ///
    /// On a type mismatch the value stays in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Result<T> {
        let entry = self.values.remove(key).ok_or_else(|| missing(key))?;
        let stored = entry.type_name;
        match entry.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => {
                self.values.insert(
                    key.to_string(),
                    Entry {
                        value,
                        type_name: stored,
                    },
                );
                Err(mismatch::<T>(key, stored))
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The page acquired for this scenario
    pub fn page(&self) -> Result<&Page> {
        self.get::<Page>(PAGE_KEY)
    }
}

fn missing(key: &str) -> Error {
    Error::ContextKey {
        key: key.to_string(),
        reason: "not present".to_string(),
    }
}

fn mismatch<T>(key: &str, stored: &str) -> Error {
    Error::ContextKey {
        key: key.to_string(),
        reason: format!("holds {}, not {}", stored, type_name::<T>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut ctx = ScenarioContext::new("search:4");
        ctx.insert("term", "flu jab".to_string());
        ctx.insert("count", 3usize);

        assert_eq!(ctx.get::<String>("term").unwrap(), "flu jab");
        assert_eq!(*ctx.get::<usize>("count").unwrap(), 3);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.scope(), "search:4");
    }

    #[test]
    fn test_missing_key() {
        let ctx = ScenarioContext::new("s");
        let err = ctx.get::<String>("term").unwrap_err();
        assert!(matches!(err, Error::ContextKey { ref key, .. } if key == "term"));
        assert!(ctx.try_get::<String>("term").is_none());
    }

    #[test]
    fn test_type_mismatch_is_typed_error() {
        let mut ctx = ScenarioContext::new("s");
        ctx.insert("count", 3u32);
        match ctx.get::<String>("count") {
            Err(Error::ContextKey { reason, .. }) => {
                assert!(reason.contains("u32"), "{}", reason);
                assert!(reason.contains("String"), "{}", reason);
            }
            other => panic!("expected ContextKey error, got {:?}", other),
        }
        assert!(ctx.try_get::<String>("count").is_none());
    }

    #[test]
    fn test_get_mut_and_remove() {
        let mut ctx = ScenarioContext::new("s");
        ctx.insert("visited", vec!["home".to_string()]);
        ctx.get_mut::<Vec<String>>("visited")
            .unwrap()
            .push("results".to_string());

        assert!(ctx.remove::<u8>("visited").is_err());
        assert!(ctx.contains_key("visited"));

        let visited: Vec<String> = ctx.remove("visited").unwrap();
        assert_eq!(visited, vec!["home", "results"]);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_page_absent() {
        let ctx = ScenarioContext::new("s");
        assert!(matches!(ctx.page(), Err(Error::ContextKey { .. })));
    }
}
