//! Endpoint path templates.
//!
//! A template is a `/`-delimited string where any segment starting with `:`
//! captures the corresponding request segment, e.g. `/v1/albums/:offset`.
//! Every other segment is literal and must match exactly: matching is
//! case-sensitive and does not normalise trailing slashes.

const CAPTURE_MARKER: char = ':';

/// Splits a template or a request path into its raw segments.
pub fn segments(path: &str) -> std::str::Split<'_, char> {
    path.split('/')
}

/// Returns the variable name if the template segment is a capture.
pub fn capture_name(segment: &str) -> Option<&str> {
    segment.strip_prefix(CAPTURE_MARKER)
}

/// Checks whether a concrete request path satisfies an endpoint path template.
pub fn matches(template: &str, path: &str) -> bool {
    let template_segments: Vec<&str> = segments(template).collect();
    let path_segments: Vec<&str> = segments(path).collect();

    if template_segments.len() != path_segments.len() {
        tracing::trace!(template, path, reason = "length", "Path mismatch");
        return false;
    }

    let matched = template_segments
        .iter()
        .zip(path_segments.iter())
        .all(|(expected, actual)| match capture_name(expected) {
            Some(_) => !actual.is_empty(),
            None => expected == actual,
        });

    tracing::trace!(template, path, matched, "Path compared");
    matched
}
