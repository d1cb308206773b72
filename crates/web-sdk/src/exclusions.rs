//! Include/exclude path rules for pageviews.
//!
//! Patterns use shell-style wildcards: `**` matches anything, a single `*`
//! matches within one path segment. Every pattern is anchored and tolerates a
//! trailing slash.

use regex::Regex;

use tracker_core::TrackerResult;

use crate::page::Location;

/// Translate a wildcard pattern into an anchored regular expression.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.trim().chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str(r"[^\s/]*");
            }
        } else {
            out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    out.push_str("/?$");
    out
}

#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> TrackerResult<Self> {
        Ok(Self {
            source: pattern.trim().to_string(),
            regex: Regex::new(&wildcard_to_regex(pattern))?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Compiled include/exclude lists. An absent list places no constraint.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    include: Option<Vec<PathPattern>>,
    exclude: Option<Vec<PathPattern>>,
}

impl ExclusionRules {
    pub fn new(include: &[String], exclude: &[String]) -> TrackerResult<Self> {
        Ok(Self {
            include: compile_list(include)?,
            exclude: compile_list(exclude)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    /// Exclusion takes precedence over inclusion.
    pub fn is_pageview_allowed(&self, path: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.iter().any(|p| p.matches(path)) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|p| p.matches(path)) {
                return false;
            }
        }
        true
    }
}

fn compile_list(patterns: &[String]) -> TrackerResult<Option<Vec<PathPattern>>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    patterns
        .iter()
        .map(|p| PathPattern::compile(p))
        .collect::<TrackerResult<Vec<_>>>()
        .map(Some)
}

pub fn is_pageview_allowed(path: &str, rules: &ExclusionRules) -> bool {
    rules.is_pageview_allowed(path)
}

/// The string rules are matched against: the pathname, plus the hash on
/// hash-routed sites.
pub fn match_subject(location: &Location, hash_routing: bool) -> String {
    if hash_routing {
        format!("{}{}", location.pathname, location.hash)
    } else {
        location.pathname.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(include: &[&str], exclude: &[&str]) -> ExclusionRules {
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        ExclusionRules::new(&include, &exclude).unwrap()
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let pattern = PathPattern::compile("/blog/**").unwrap();
        assert!(pattern.matches("/blog/a/b"));
        assert!(pattern.matches("/blog/a"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let pattern = PathPattern::compile("/blog/*").unwrap();
        assert!(pattern.matches("/blog/a"));
        assert!(pattern.matches("/blog/a/"));
        assert!(!pattern.matches("/blog/a/b"));
    }

    #[test]
    fn test_dots_are_literal() {
        let pattern = PathPattern::compile("/file.html").unwrap();
        assert!(pattern.matches("/file.html"));
        assert!(!pattern.matches("/fileXhtml"));
    }

    #[test]
    fn test_regex() {
        assert_eq!(wildcard_to_regex(" /a/*/b/** "), r"^/a/[^\s/]*/b/.*/?$");
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let rules = rules(&["/blog/**"], &["/blog/drafts/**"]);
        assert!(rules.is_pageview_allowed("/blog/post"));
        assert!(!rules.is_pageview_allowed("/blog/drafts/one"));
        assert!(!rules.is_pageview_allowed("/about"));
    }

    #[test]
    fn test_no_lists_allows_everything() {
        let rules = ExclusionRules::default();
        assert!(rules.is_empty());
        assert!(is_pageview_allowed("/anything", &rules));
    }

    #[test]
    fn test_hash_subject() {
        let loc = Location::parse("https://example.com/app#/settings").unwrap();
        assert_eq!(match_subject(&loc, true), "/app#/settings");
        assert_eq!(match_subject(&loc, false), "/app");
    }
}
