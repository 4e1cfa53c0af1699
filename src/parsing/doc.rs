//! Doc-comment cleanup: turn a `/** … */` block into a free-text description.
//!
//! Only the lead paragraph survives. Structured tags (`@param`, `@returns`,
//! and friends) and everything after the first of them are stripped - they
//! describe the signature, which is carried verbatim elsewhere.

use once_cell::sync::Lazy;
use regex::Regex;

/// A line that opens a structured tag section: `@param x …`, `@returns …`.
static TAG_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@\w+").expect("invalid tag regex"));

/// Extract the free-text lead of a `/** … */` comment.
///
/// Returns `None` for non-doc comments (`//`, `/* … */`) and for doc
/// comments whose lead is empty.
pub fn doc_description(comment: &str) -> Option<String> {
    let trimmed = comment.trim();
    let body = trimmed
        .strip_prefix("/**")?
        .strip_suffix("*/")
        .unwrap_or(trimmed);

    let mut lead: Vec<String> = Vec::new();
    for raw_line in body.lines() {
        // strip the decorative leading asterisk
        let line = raw_line.trim().trim_start_matches('*').trim();
        if TAG_START.is_match(line) {
            break;
        }
        if line.is_empty() {
            if !lead.is_empty() {
                break; // lead paragraph ended
            }
            continue;
        }
        lead.push(line.to_string());
    }

    let text = lead.join(" ").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_lead_and_strips_tags() {
        let comment = "/**\n * Loads a record by id.\n * Validates first.\n *\n * @param id the id\n * @returns the record\n */";
        assert_eq!(
            doc_description(comment).as_deref(),
            Some("Loads a record by id. Validates first.")
        );
    }

    #[test]
    fn single_line_doc() {
        assert_eq!(
            doc_description("/** Runs the agent. */").as_deref(),
            Some("Runs the agent.")
        );
    }

    #[test]
    fn plain_comments_are_not_docs() {
        assert_eq!(doc_description("// nope"), None);
        assert_eq!(doc_description("/* also no */"), None);
    }

    #[test]
    fn tag_only_doc_has_no_description() {
        assert_eq!(doc_description("/** @deprecated */"), None);
    }
}
