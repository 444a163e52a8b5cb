//! Event-name pattern matching.
//!
//! Patterns use shell-style wildcards (`*`, `?`, `[...]`) over the whole event
//! name. There is no path hierarchy: `*` happily crosses `.` and `/`.
//! A pattern that fails to compile matches nothing.

use glob::Pattern;

/// A compiled listener/middleware pattern.
///
/// The original string is kept verbatim so that exact-string operations such
/// as `remove_all_listeners` can compare against it.
#[derive(Debug, Clone)]
pub struct EventPattern {
    raw: String,
    compiled: Option<Pattern>,
}

impl EventPattern {
    /// Compiles `raw`. Invalid patterns are kept but never match.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let compiled = Pattern::new(&raw).ok();
        if compiled.is_none() {
            tracing::debug!(pattern = %raw, "Invalid event pattern, it will never match");
        }
        Self { raw, compiled }
    }

    /// Returns the pattern exactly as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if the pattern compiled.
    pub fn is_valid(&self) -> bool {
        self.compiled.is_some()
    }

    /// Tests an emitted event name against this pattern.
    pub fn matches(&self, event: &str) -> bool {
        self.compiled.as_ref().is_some_and(|p| p.matches(event))
    }
}

/// Tests `event` against `pattern` without keeping the compiled form.
///
/// Invalid patterns return `false`.
pub fn matches(pattern: &str, event: &str) -> bool {
    Pattern::new(pattern).is_ok_and(|p| p.matches(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        assert!(matches("onMessage", "onMessage"));
        assert!(!matches("onMessage", "onCommand"));
    }

    #[test]
    fn test_wildcards() {
        assert!(matches("test.*", "test.event"));
        assert!(matches("*", "onUpdate"));
        assert!(matches("on?pdate", "onUpdate"));
        assert!(matches("on[CM]*", "onCommand"));
        assert!(!matches("test.*", "other.event"));
    }

    #[test]
    fn test_star_is_not_hierarchical() {
        assert!(matches("a*", "a.b.c"));
        assert!(matches("a*", "a/b"));
    }

    #[test]
    fn test_invalid_pattern_matches_nothing() {
        assert!(!matches("[", "["));
        assert!(!matches("[", "test"));

        let pattern = EventPattern::new("[");
        assert!(!pattern.is_valid());
        assert!(!pattern.matches("anything"));
        assert_eq!(pattern.as_str(), "[");
    }
}
