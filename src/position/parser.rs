//! Position identifier parser
//!
//! Grammar (only what overlap detection needs):
//! ```text
//! id        = wrapper "(" inner ")"
//! inner     = point | range
//! point     = path ":" digits
//! range     = parent "," path ":" digits "," path ":" digits
//! ```
//!
//! Both endpoints of a range must live in the same structural node; the
//! base path is `parent` joined with that node's relative path. Selections
//! spanning several nodes are rejected.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::range::PositionRange;

static WRAPPER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^()]*\((.*)\)$").expect("wrapper regex is valid"));

static OFFSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*):([0-9]+)$").expect("offset regex is valid"));

/// Why a position identifier could not be turned into a range
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionParseError {
    #[error("empty position identifier")]
    Empty,

    #[error("position identifier must look like wrapper(...)")]
    MissingWrapper,

    #[error("range must have exactly two endpoints after the parent path, found {0}")]
    EndpointCount(usize),

    #[error("missing trailing character offset in '{0}'")]
    MissingOffset(String),

    #[error("character offset out of range in '{0}'")]
    OffsetOverflow(String),

    #[error("range endpoints live in different nodes ({start} vs {end})")]
    SpansNodes { start: String, end: String },

    #[error("range start {start} is after range end {end}")]
    Reversed { start: usize, end: usize },
}

/// Parse a position identifier, discarding the failure reason.
///
/// Malformed identifiers are common (spanning selections, foreign
/// formats) and are treated as "cannot overlap anything" by callers.
#[must_use]
pub fn parse(position_id: &str) -> Option<PositionRange> {
    try_parse(position_id).ok()
}

/// Parse a position identifier into a comparable range.
pub fn try_parse(position_id: &str) -> Result<PositionRange, PositionParseError> {
    let trimmed = position_id.trim();
    if trimmed.is_empty() {
        return Err(PositionParseError::Empty);
    }

    let inner = WRAPPER_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or(PositionParseError::MissingWrapper)?;

    match inner.split_once(',') {
        Some((parent, rest)) => parse_range(parent, rest),
        None => {
            let (path, offset) = split_offset(inner)?;
            Ok(PositionRange::point(path, offset))
        }
    }
}

fn parse_range(parent: &str, rest: &str) -> Result<PositionRange, PositionParseError> {
    let endpoints: Vec<&str> = rest.split(',').collect();
    let [start, end] = endpoints.as_slice() else {
        return Err(PositionParseError::EndpointCount(endpoints.len()));
    };

    let (start_path, start_offset) = split_offset(start)?;
    let (end_path, end_offset) = split_offset(end)?;

    if start_path != end_path {
        return Err(PositionParseError::SpansNodes {
            start: start_path.to_string(),
            end: end_path.to_string(),
        });
    }

    if start_offset > end_offset {
        return Err(PositionParseError::Reversed {
            start: start_offset,
            end: end_offset,
        });
    }

    Ok(PositionRange {
        base_path: format!("{parent}{start_path}"),
        start_offset,
        end_offset,
    })
}

/// Split `path:123` into `("path", 123)`.
fn split_offset(part: &str) -> Result<(&str, usize), PositionParseError> {
    let caps = OFFSET_RE
        .captures(part)
        .ok_or_else(|| PositionParseError::MissingOffset(part.to_string()))?;

    let path = caps.get(1).map_or("", |m| m.as_str());
    let digits = caps.get(2).map_or("", |m| m.as_str());
    let offset = digits
        .parse::<usize>()
        .map_err(|_| PositionParseError::OffsetOverflow(part.to_string()))?;

    Ok((path, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_range_form() {
        let range = parse("epubcfi(/6/4!/4/2,/1:0,/1:11)").unwrap();
        assert_eq!(range.base_path, "/6/4!/4/2/1");
        assert_eq!(range.start_offset, 0);
        assert_eq!(range.end_offset, 11);
    }

    #[test]
    fn parses_range_with_full_endpoint_paths() {
        let range = parse("X(..,/4/2/1:5,/4/2/1:8)").unwrap();
        assert_eq!(range.base_path, "../4/2/1");
        assert_eq!((range.start_offset, range.end_offset), (5, 8));
    }

    #[test]
    fn point_form_is_zero_width() {
        for k in [0usize, 1, 42, 9_999] {
            let id = format!("epubcfi(/6/4!/4/2/1:{k})");
            let range = parse(&id).unwrap();
            assert_eq!(range.base_path, "/6/4!/4/2/1");
            assert_eq!(range.start_offset, k);
            assert_eq!(range.end_offset, k);
        }
    }

    #[test]
    fn missing_wrapper_fails() {
        assert_eq!(
            try_parse("/6/4!/4/2/1:3"),
            Err(PositionParseError::MissingWrapper)
        );
        assert_eq!(try_parse("   "), Err(PositionParseError::Empty));
    }

    #[test]
    fn wrong_endpoint_count_fails() {
        assert_eq!(
            try_parse("epubcfi(/6/4,/1:0)"),
            Err(PositionParseError::EndpointCount(1))
        );
        assert_eq!(
            try_parse("epubcfi(/6/4,/1:0,/1:3,/1:5)"),
            Err(PositionParseError::EndpointCount(3))
        );
    }

    #[test]
    fn missing_offset_fails() {
        assert!(matches!(
            try_parse("epubcfi(/6/4,/1:0,/1)"),
            Err(PositionParseError::MissingOffset(_))
        ));
        assert!(matches!(
            try_parse("epubcfi(/6/4!/4/2/1)"),
            Err(PositionParseError::MissingOffset(_))
        ));
        // Trailing assertions hide the offset from the parser.
        assert!(parse("epubcfi(/6/4!/4/2/1:10[abc])").is_none());
    }

    #[test]
    fn reversed_range_fails() {
        assert_eq!(
            try_parse("epubcfi(/6/4,/1:9,/1:3)"),
            Err(PositionParseError::Reversed { start: 9, end: 3 })
        );
    }

    #[test]
    fn huge_offset_fails_without_panicking() {
        let id = "epubcfi(/6/4!/4/2/1:99999999999999999999999999)";
        assert!(matches!(
            try_parse(id),
            Err(PositionParseError::OffsetOverflow(_))
        ));
    }

    #[test]
    fn spanning_selection_fails() {
        assert_eq!(
            try_parse("epubcfi(/6/4!/4,/2/1:3,/6/1:2)"),
            Err(PositionParseError::SpansNodes {
                start: "/2/1".to_string(),
                end: "/6/1".to_string(),
            })
        );
    }
}
