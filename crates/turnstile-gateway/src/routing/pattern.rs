//! Route path patterns.
//!
//! Three forms are supported:
//!
//! - exact: `/api/auth/login`
//! - single level: `/api/profile/*` matches `/api/profile/` plus one segment
//!   (possibly empty) with no further `/`
//! - multi level: `/api/courses/**` matches `/api/courses` and anything
//!   below `/api/courses/`

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    /// Prefix without the trailing `/*`.
    SingleLevel(String),
    /// Prefix without the trailing `/**`; empty for the catch-all `/**`.
    MultiLevel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError(pub String);

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError("must start with '/'".into()));
        }

        let (kind, prefix): (fn(String) -> Self, &str) = if let Some(p) = raw.strip_suffix("/**") {
            (Self::MultiLevel, p)
        } else if let Some(p) = raw.strip_suffix("/*") {
            (Self::SingleLevel, p)
        } else {
            (Self::Exact, raw)
        };

        if prefix.contains('*') {
            return Err(PatternError("wildcards are only allowed as the last segment".into()));
        }
        if prefix.contains("//") {
            return Err(PatternError("empty path segment".into()));
        }

        Ok(kind(prefix.to_string()))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::SingleLevel(prefix) => path
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|segment| !segment.contains('/')),
            Self::MultiLevel(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }

    /// Whether some path is matched by both patterns.
    pub fn overlaps(&self, other: &Self) -> bool {
        use PathPattern::*;

        match (self, other) {
            (Exact(a), _) => other.matches(a),
            (_, Exact(b)) => self.matches(b),
            (SingleLevel(a), SingleLevel(b)) => a == b,
            (SingleLevel(s), MultiLevel(m)) | (MultiLevel(m), SingleLevel(s)) => {
                // `s/x` lies under `m`, or `m` itself is one level below `s`.
                is_under(s, m) || self_one_level_below(m, s)
            }
            (MultiLevel(a), MultiLevel(b)) => is_under(a, b) || is_under(b, a),
        }
    }

    /// Whether every path matched by `other` is also matched by `self`.
    pub fn covers(&self, other: &Self) -> bool {
        use PathPattern::*;

        match (self, other) {
            (_, Exact(b)) => self.matches(b),
            (Exact(_), _) => false,
            (SingleLevel(a), SingleLevel(b)) => a == b,
            (SingleLevel(_), MultiLevel(_)) => false,
            (MultiLevel(a), SingleLevel(b)) | (MultiLevel(a), MultiLevel(b)) => is_under(b, a),
        }
    }

    /// The pattern in its configured form.
    pub fn as_str(&self) -> String {
        match self {
            Self::Exact(p) => p.clone(),
            Self::SingleLevel(p) => format!("{}/*", p),
            Self::MultiLevel(p) => format!("{}/**", p),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// `path` equals `prefix` or lies below it.
fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// `path` is exactly one non-empty segment below `prefix`.
fn self_one_level_below(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|segment| !segment.is_empty() && !segment.contains('/'))
}
