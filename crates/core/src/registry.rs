//! Step registry: pattern → handler bindings and step resolution

use futures::future::BoxFuture;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::context::ScenarioContext;
use crate::error::{Error, Result};
use crate::feature::Keyword;

/// Future returned by step handlers and hooks
pub type StepFuture<'a> = BoxFuture<'a, Result<()>>;

/// A step handler: receives the scenario context and the captured arguments
pub type StepFn =
    dyn for<'a> Fn(&'a mut ScenarioContext, Vec<String>) -> StepFuture<'a> + Send + Sync;

/// An immutable keyword + pattern + handler binding
pub struct StepDefinition {
    keyword: Keyword,
    pattern: String,
    regex: Regex,
    handler: Arc<StepFn>,
}

impl StepDefinition {
    pub fn keyword(&self) -> Keyword {
        self.keyword
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("keyword", &self.keyword)
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// Outcome of a successful resolution
pub struct ResolvedStep {
    pub pattern: String,
    /// Captured substrings, left to right
    pub args: Vec<String>,
    handler: Arc<StepFn>,
}

impl ResolvedStep {
    /// Run the handler against `ctx` with the captured arguments
    pub fn invoke<'a>(&'a self, ctx: &'a mut ScenarioContext) -> StepFuture<'a> {
        (self.handler)(ctx, self.args.clone())
    }
}

impl fmt::Debug for ResolvedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedStep")
            .field("pattern", &self.pattern)
            .field("args", &self.args)
            .finish()
    }
}

/// Holds every step definition of a run.
///
/// Patterns are regular expressions matched against the whole step text.
/// Resolution considers all definitions for the keyword, so registration
/// order never decides which handler runs: two matches is an
/// [`Error::AmbiguousMatch`].
#[derive(Default)]
pub struct StepRegistry {
    definitions: Vec<StepDefinition>,
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("definitions", &self.definitions)
            .finish()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Fails with [`Error::Pattern`] if the pattern does not compile.
    pub fn register<F>(&mut self, keyword: Keyword, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a mut ScenarioContext, Vec<String>) -> StepFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| Error::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;

        debug!(%keyword, pattern, "registered step");
        self.definitions.push(StepDefinition {
            keyword,
            pattern: pattern.to_string(),
            regex,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    pub fn given<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a mut ScenarioContext, Vec<String>) -> StepFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.register(Keyword::Given, pattern, handler)
    }

    pub fn when<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a mut ScenarioContext, Vec<String>) -> StepFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.register(Keyword::When, pattern, handler)
    }

    pub fn then<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a mut ScenarioContext, Vec<String>) -> StepFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.register(Keyword::Then, pattern, handler)
    }

    /// Find the single definition matching `keyword` + `text`
    pub fn resolve(&self, keyword: Keyword, text: &str) -> Result<ResolvedStep> {
        let mut matches = self
            .definitions
            .iter()
            .filter(|d| d.keyword == keyword)
            .filter_map(|d| d.regex.captures(text).map(|caps| (d, caps)));

        let (definition, captures) = match (matches.next(), matches.next()) {
            (None, _) => {
                return Err(Error::NoMatch {
                    keyword,
                    text: text.to_string(),
                })
            }
            (Some(only), None) => only,
            (Some(first), Some(second)) => {
                let mut patterns = vec![first.0.pattern.clone(), second.0.pattern.clone()];
                patterns.extend(matches.map(|(d, _)| d.pattern.clone()));
                return Err(Error::AmbiguousMatch {
                    keyword,
                    text: text.to_string(),
                    patterns,
                });
            }
        };

        let args = captures
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();

        debug!(%keyword, text, pattern = %definition.pattern, "resolved step");
        Ok(ResolvedStep {
            pattern: definition.pattern.clone(),
            args,
            handler: Arc::clone(&definition.handler),
        })
    }

    pub fn definitions(&self) -> &[StepDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop<'a>(_ctx: &'a mut ScenarioContext, _args: Vec<String>) -> StepFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn test_resolve_extracts_captures_in_order() {
        let mut registry = StepRegistry::new();
        registry
            .when(r#"I enter "(.*)" in the search field"#, noop)
            .unwrap()
            .then(r#"I see "(.*)" before "(.*)""#, noop)
            .unwrap();

        let resolved = registry
            .resolve(Keyword::When, r#"I enter "flu jab" in the search field"#)
            .unwrap();
        assert_eq!(resolved.args, vec!["flu jab"]);

        let resolved = registry
            .resolve(Keyword::Then, r#"I see "a" before "b c""#)
            .unwrap();
        assert_eq!(resolved.args, vec!["a", "b c"]);
    }

    #[test]
    fn test_captures_keep_literal_text() {
        let mut registry = StepRegistry::new();
        registry.when(r#"I enter "(.*)" in the search field"#, noop).unwrap();

        let resolved = registry
            .resolve(
                Keyword::When,
                r#"I enter "<script>alert('test')</script> 42" in the search field"#,
            )
            .unwrap();
        assert_eq!(resolved.args, vec!["<script>alert('test')</script> 42"]);

        let resolved = registry
            .resolve(Keyword::When, r#"I enter "" in the search field"#)
            .unwrap();
        assert_eq!(resolved.args, vec![""]);
    }

    #[test]
    fn test_keyword_must_match() {
        let mut registry = StepRegistry::new();
        registry.given("I am on the Northumbria NHS website", noop).unwrap();

        assert!(registry
            .resolve(Keyword::Given, "I am on the Northumbria NHS website")
            .is_ok());
        assert!(matches!(
            registry.resolve(Keyword::When, "I am on the Northumbria NHS website"),
            Err(Error::NoMatch { .. })
        ));
    }

    #[test]
    fn test_full_text_match_required() {
        let mut registry = StepRegistry::new();
        registry.when("I click the search button", noop).unwrap();

        assert!(registry.resolve(Keyword::When, "I click the search button").is_ok());
        assert!(matches!(
            registry.resolve(
                Keyword::When,
                "I click the search button without expecting navigation"
            ),
            Err(Error::NoMatch { .. })
        ));
    }

    #[test]
    fn test_ambiguous_match_regardless_of_order() {
        for reversed in [false, true] {
            let mut registry = StepRegistry::new();
            let mut patterns = vec!["I click the search button", "I click the (.*) button"];
            if reversed {
                patterns.reverse();
            }
            for pattern in &patterns {
                registry.when(pattern, noop).unwrap();
            }

            match registry.resolve(Keyword::When, "I click the search button") {
                Err(Error::AmbiguousMatch { patterns: found, .. }) => {
                    assert_eq!(found.len(), 2);
                }
                other => panic!("expected ambiguity, got {:?}", other),
            }
            // Only the wildcard matches here
            assert_eq!(
                registry
                    .resolve(Keyword::When, "I click the reset button")
                    .unwrap()
                    .args,
                vec!["reset"]
            );
        }
    }

    #[test]
    fn test_invalid_pattern_rejected_at_registration() {
        let mut registry = StepRegistry::new();
        let err = registry.when("I enter \"(.*\" broken", noop).unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_non_participating_group_is_empty() {
        let mut registry = StepRegistry::new();
        registry.then("I see (?:(\\d+) )?results", noop).unwrap();

        assert_eq!(
            registry.resolve(Keyword::Then, "I see results").unwrap().args,
            vec![""]
        );
        assert_eq!(
            registry.resolve(Keyword::Then, "I see 3 results").unwrap().args,
            vec!["3"]
        );
    }

    #[tokio::test]
    async fn test_invoke_passes_args_and_context() {
        let mut registry = StepRegistry::new();
        registry
            .when(r#"I remember "(.*)""#, |ctx, args| {
                Box::pin(async move {
                    ctx.insert("remembered", args[0].clone());
                    Ok(())
                })
            })
            .unwrap();

        let mut ctx = ScenarioContext::new("s");
        let resolved = registry.resolve(Keyword::When, r#"I remember "flu jab""#).unwrap();
        resolved.invoke(&mut ctx).await.unwrap();
        assert_eq!(ctx.get::<String>("remembered").unwrap(), "flu jab");
    }
}
