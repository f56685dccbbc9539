//! Page text and vector preprocessing for embedding generation.
//!
//! Prepares extracted page text for embedding:
//! 1. Collapse runs of whitespace
//! 2. Skip if empty or shorter than the minimum page length
//! 3. Truncate to max length with ellipsis

/// Default maximum content length for embedding input (characters, not tokens)
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 2048;

/// Pages with fewer characters than this hold only a page number or a
/// running header
pub const DEFAULT_MIN_PAGE_CHARS: usize = 50;

/// Ellipsis suffix when content is truncated
const TRUNCATION_SUFFIX: &str = "...";

/// Norms below this are treated as zero.
const MIN_NORM: f32 = 1e-12;

/// Page text ready for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPage {
    /// Whitespace-normalized page text, kept for display
    pub content: String,
    /// `content` cut down to what is handed to the embedder
    pub embed_input: String,
}

/// Preprocess extracted page text for embedding generation.
///
/// Returns `None` if the page has no visible text or fewer than `min_chars`
/// characters once whitespace is collapsed. Otherwise, truncates the embedder
/// input to `max_chars` characters.
pub fn prepare_page(text: &str, min_chars: usize, max_chars: usize) -> Option<PreparedPage> {
    let content = collapse_whitespace(text);

    if content.is_empty() || content.chars().count() < min_chars {
        return None;
    }

    let embed_input = truncate_content(&content, max_chars);
    Some(PreparedPage {
        content,
        embed_input,
    })
}

/// Replace every run of whitespace (including line breaks) with a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate content to `max_chars` characters, adding ellipsis if truncated.
fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    // count chars, not bytes, so multi-byte text is never split
    let keep = max_chars.saturating_sub(TRUNCATION_SUFFIX.len());
    let truncated: String = content.chars().take(keep).collect();

    format!("{}{}", truncated.trim_end(), TRUNCATION_SUFFIX)
}

/// Compute the L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length in place.
///
/// Returns `false` (leaving the vector untouched) if its norm is zero.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm < MIN_NORM {
        return false;
    }

    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}
