//! Ordered route table and request classification.

use super::rule::RouteRule;
use crate::config::{ConfigError, RouteConfig};
use axum::http::Method;

/// The request matched no rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFound;

/// First-match-wins route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Compile and check the configured rules.
    ///
    /// Two rules sharing a method whose patterns can match the same path are
    /// rejected when they point at different backends or use the same
    /// pattern. A rule that can never be reached because an earlier rule
    /// takes every request it would match is rejected as well.
    pub fn build(configs: &[RouteConfig]) -> Result<Self, Vec<ConfigError>> {
        let mut errors = Vec::new();
        let mut rules = Vec::with_capacity(configs.len());

        for config in configs {
            match RouteRule::from_config(config) {
                Ok(rule) => rules.push(rule),
                Err(e) => errors.push(e),
            }
        }

        for (i, earlier) in rules.iter().enumerate() {
            for later in &rules[i + 1..] {
                if !earlier.shares_method_with(later) || !earlier.pattern.overlaps(&later.pattern) {
                    continue;
                }

                if earlier.backend != later.backend || earlier.pattern == later.pattern {
                    errors.push(ConfigError::AmbiguousRoutes {
                        first: earlier.name.clone(),
                        second: later.name.clone(),
                    });
                } else if earlier.pattern.covers(&later.pattern) && earlier.has_all_methods_of(later) {
                    errors.push(ConfigError::ShadowedRoute {
                        route: later.name.clone(),
                        by: earlier.name.clone(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(Self { rules })
        } else {
            Err(errors)
        }
    }

    /// Find the first rule matching `method` and `path`.
    pub fn classify(&self, method: &Method, path: &str) -> Result<&RouteRule, NotFound> {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .ok_or(NotFound)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
