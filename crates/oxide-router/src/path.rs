//! Path pattern matching.

use percent_encoding::percent_decode_str;
use tracing::warn;

use crate::request::Params;

/// Parameter name under which a wildcard segment binds the rest of the path.
pub const WILDCARD: &str = "wildcard";

/// A segment in a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A literal string segment.
    Literal(String),
    /// A literal that may be left out of the path (e.g. `edit?`).
    OptionalLiteral(String),
    /// A parameter segment (e.g. `:id`).
    Param(String),
    /// A parameter that may be left out of the path (e.g. `:id?`).
    OptionalParam(String),
    /// A wildcard segment (`*`), matches the remainder of the path.
    Wildcard,
}

impl PathSegment {
    fn parse(raw: &str) -> Self {
        if raw == "*" {
            return Self::Wildcard;
        }

        if let Some(name) = raw.strip_prefix(':') {
            return match name.strip_suffix('?') {
                Some(name) => Self::OptionalParam(name.to_string()),
                None => Self::Param(name.to_string()),
            };
        }

        match raw.strip_suffix('?') {
            Some(literal) => Self::OptionalLiteral(literal.to_string()),
            None => Self::Literal(raw.to_string()),
        }
    }

    /// Contribution of this segment to the pattern score.
    const fn weight(&self) -> i32 {
        match self {
            Self::Literal(_) | Self::OptionalLiteral(_) => 3,
            Self::Param(_) | Self::OptionalParam(_) => 1,
            Self::Wildcard => -2,
        }
    }
}

/// A successful match of a path against a pattern.
#[derive(Debug, Clone)]
pub struct PathMatch {
    /// Bound parameters.
    pub params: Params,
    /// Score of the pattern that produced this match.
    pub score: i32,
}

/// A compiled path pattern for matching URLs.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// The original pattern string.
    pattern: String,
    /// Parsed segments.
    segments: Vec<PathSegment>,
    /// Ranking score, higher is more specific.
    score: i32,
}

impl PathPattern {
    /// Parses a path pattern string.
    ///
    /// Pattern syntax:
    /// - `/users` - Literal path
    /// - `/users/:id` - Path with parameter
    /// - `/users/:id?` - Optional parameter
    /// - `/files/*` - Wildcard (binds the rest of the path as `wildcard`)
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_router::PathPattern;
    ///
    /// let pattern = PathPattern::new("/posts/:id/comments/:comment_id");
    /// let found = pattern.match_path("/posts/123/comments/456").unwrap();
    /// assert_eq!(found.params.get("id"), Some("123"));
    /// assert_eq!(found.params.get("comment_id"), Some("456"));
    /// assert_eq!(found.score, 8);
    /// ```
    pub fn new(pattern: &str) -> Self {
        let segments: Vec<PathSegment> = split(pattern).map(PathSegment::parse).collect();

        if let Some(pos) = segments.iter().position(|s| *s == PathSegment::Wildcard) {
            if pos + 1 != segments.len() {
                warn!(pattern, "wildcard is not the final segment; ranking is undefined");
            }
        }

        let score = segments.iter().map(PathSegment::weight).sum();

        Self {
            pattern: pattern.to_string(),
            segments,
            score,
        }
    }

    /// Attempts to match a path against this pattern.
    ///
    /// Returns the bound parameters and the pattern score on success.
    pub fn match_path(&self, path: &str) -> Option<PathMatch> {
        let parts: Vec<&str> = split(path).collect();
        let mut params = Params::new();
        let mut wildcard = false;
        let (mut i, mut j) = (0, 0);

        while i < self.segments.len() && j < parts.len() {
            match &self.segments[i] {
                PathSegment::Wildcard => {
                    let rest: Vec<String> = parts[j..].iter().map(|part| decode(part)).collect();
                    params.insert(WILDCARD, rest.join("/"));
                    wildcard = true;
                    i += 1;
                    j = parts.len();
                    break;
                }
                PathSegment::Param(name) | PathSegment::OptionalParam(name) => {
                    params.insert(name.as_str(), decode(parts[j]));
                    i += 1;
                    j += 1;
                }
                PathSegment::Literal(literal) => {
                    if literal != parts[j] {
                        return None;
                    }
                    i += 1;
                    j += 1;
                }
                PathSegment::OptionalLiteral(literal) => {
                    if literal == parts[j] {
                        j += 1;
                    }
                    i += 1;
                }
            }
        }

        // The path ran out first: fill what the pattern allows to be absent.
        while !wildcard && i < self.segments.len() {
            match &self.segments[i] {
                PathSegment::Wildcard => {
                    params.insert(WILDCARD, String::new());
                    wildcard = true;
                }
                PathSegment::OptionalParam(name) => params.insert_absent(name.as_str()),
                PathSegment::OptionalLiteral(_) => {}
                PathSegment::Literal(_) | PathSegment::Param(_) => break,
            }
            i += 1;
        }

        let complete = i == self.segments.len() && j == parts.len();
        (wildcard || complete).then(|| PathMatch {
            params,
            score: self.score,
        })
    }

    /// Returns the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the parsed segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns the ranking score: +3 per literal, +1 per parameter, -2 per wildcard.
    pub const fn score(&self) -> i32 {
        self.score
    }
}

/// Splits a path into its non-empty segments.
fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_path() {
        let pattern = PathPattern::new("/users");
        assert!(pattern.match_path("/users").is_some());
        assert!(pattern.match_path("/users/").is_some());
        assert!(pattern.match_path("/posts").is_none());
        assert!(pattern.match_path("/users/1").is_none());
        assert!(pattern.match_path("/").is_none());
    }

    #[test]
    fn test_literal_segment_count_must_match() {
        let pattern = PathPattern::new("/a/b/c");
        assert!(pattern.match_path("/a/b/c").is_some());
        assert!(pattern.match_path("/a/b").is_none());
        assert!(pattern.match_path("/a/b/c/d").is_none());
        assert!(pattern.match_path("/a/x/c").is_none());
        assert_eq!(pattern.score(), 9);
    }

    #[test]
    fn test_two_params() {
        let pattern = PathPattern::new("/:a/:b");
        let found = pattern.match_path("/x/y").unwrap();
        assert_eq!(found.params.get("a"), Some("x"));
        assert_eq!(found.params.get("b"), Some("y"));
        assert_eq!(found.score, 2);
    }

    #[test]
    fn test_param_is_decoded() {
        let pattern = PathPattern::new("/greet/:name");
        let found = pattern.match_path("/greet/Jane%20Doe").unwrap();
        assert_eq!(found.params.get("name"), Some("Jane Doe"));
    }

    #[test]
    fn test_malformed_escape_does_not_fail() {
        let pattern = PathPattern::new("/greet/:name");
        let found = pattern.match_path("/greet/%E0%A4%A").unwrap();
        assert!(found.params.get("name").is_some());
    }

    #[test]
    fn test_literal_outranks_param() {
        let literal = PathPattern::new("/users/new");
        let param = PathPattern::new("/users/:id");
        assert_eq!(literal.match_path("/users/new").unwrap().score, 6);
        assert_eq!(param.match_path("/users/new").unwrap().score, 4);
    }

    #[test]
    fn test_wildcard_binds_rest() {
        let pattern = PathPattern::new("/files/*");
        let found = pattern.match_path("/files/a/b/c").unwrap();
        assert_eq!(found.params.get(WILDCARD), Some("a/b/c"));
        assert_eq!(found.score, 1);
    }

    #[test]
    fn test_wildcard_is_decoded() {
        let pattern = PathPattern::new("/files/*");
        let found = pattern.match_path("/files/a%20b/c%2Ed").unwrap();
        assert_eq!(found.params.get(WILDCARD), Some("a b/c.d"));
    }

    #[test]
    fn test_wildcard_binds_empty() {
        let pattern = PathPattern::new("/files/*");
        let found = pattern.match_path("/files").unwrap();
        assert_eq!(found.params.get(WILDCARD), Some(""));
        assert!(pattern.match_path("/other").is_none());
    }

    #[test]
    fn test_optional_param() {
        let pattern = PathPattern::new("/item/:id?");

        let short = pattern.match_path("/item").unwrap();
        assert!(short.params.contains("id"));
        assert_eq!(short.params.get("id"), None);

        let full = pattern.match_path("/item/42").unwrap();
        assert_eq!(full.params.get("id"), Some("42"));

        assert!(pattern.match_path("/item/42/extra").is_none());
    }

    #[test]
    fn test_optional_literal() {
        let pattern = PathPattern::new("/posts/:id/edit?");
        assert!(pattern.match_path("/posts/1/edit").is_some());
        assert!(pattern.match_path("/posts/1").is_some());
        assert_eq!(pattern.score(), 7);
    }

    #[test]
    fn test_required_param_needs_segment() {
        let pattern = PathPattern::new("/users/:id");
        assert!(pattern.match_path("/users").is_none());
    }

    #[test]
    fn test_root_and_empty() {
        let root = PathPattern::new("/");
        let empty = PathPattern::new("");
        for path in ["/", ""] {
            assert_eq!(root.match_path(path).unwrap().score, 0);
            assert_eq!(empty.match_path(path).unwrap().score, 0);
        }
        assert!(root.match_path("/a").is_none());
    }

    #[test]
    fn test_non_final_wildcard_does_not_panic() {
        let pattern = PathPattern::new("/a/*/b");
        assert!(pattern.match_path("/a/x/y").is_some());
        assert!(pattern.match_path("/a").is_some());
        assert!(pattern.match_path("/z").is_none());
    }

    #[test]
    fn test_segments_parse() {
        let pattern = PathPattern::new("/a/:b/:c?/d?/*");
        assert_eq!(
            pattern.segments(),
            &[
                PathSegment::Literal("a".to_string()),
                PathSegment::Param("b".to_string()),
                PathSegment::OptionalParam("c".to_string()),
                PathSegment::OptionalLiteral("d".to_string()),
                PathSegment::Wildcard,
            ]
        );
        assert_eq!(pattern.pattern(), "/a/:b/:c?/d?/*");
    }
}
