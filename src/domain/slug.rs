//! URL segment normalization for idiom titles and language labels.

use slug::slugify;

/// Placeholder segment used when the source text has no representable characters.
const EMPTY_SEGMENT: &str = "_";

/// Normalize free text into a URL path segment.
///
/// `"Reverse a list"` becomes `reverse-a-list`. The result is never empty so
/// that derived paths always keep the same number of segments.
pub fn uri_normalize(input: &str) -> String {
    let candidate = slugify(input.trim());
    if candidate.is_empty() {
        EMPTY_SEGMENT.to_string()
    } else {
        candidate
    }
}
