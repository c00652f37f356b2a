use crate::annotation::Annotation;

use super::parser::parse;

/// Find the first annotation whose stored range strictly intersects the
/// candidate's range.
///
/// Returns `None` for an empty list or an unparseable candidate. Existing
/// annotations with unparseable ids, or living in a different node, are
/// skipped. Only the first hit is reported even when several overlap.
pub fn find_overlap<'a>(candidate_id: &str, existing: &'a [Annotation]) -> Option<&'a Annotation> {
    if existing.is_empty() {
        return None;
    }

    let candidate = parse(candidate_id)?;

    existing.iter().find(|annotation| {
        parse(&annotation.position_id).is_some_and(|range| range.overlaps(&candidate))
    })
}
