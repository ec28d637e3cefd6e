use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

static COMMENT_REF_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<comment-ref[^>]*>").expect("valid regex"));
static COMMENT_REF_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</comment-ref>").expect("valid regex"));

/// Generic SHA256 helper — returns a lowercase hex-encoded digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Remove `<comment-ref>` open/close/self-closing tags from an XML fragment.
///
/// Comment refs are pure annotations: they carry no text and occupy no index
/// space, so two fragments differing only in comment refs are the same
/// content.
pub fn strip_comment_refs(xml: &str) -> Cow<'_, str> {
    if !xml.contains("<comment-ref") && !xml.contains("</comment-ref") {
        return Cow::Borrowed(xml);
    }
    let stripped = COMMENT_REF_OPEN.replace_all(xml, "");
    Cow::Owned(COMMENT_REF_CLOSE.replace_all(&stripped, "").into_owned())
}

/// SHA256 fingerprint of a block's XML with comment refs stripped.
///
/// Used as the exact-match key during alignment: identical fingerprints mean
/// identical content, styles, and indexing.
pub fn content_fingerprint(xml: &str) -> String {
    sha256_hex(&strip_comment_refs(xml))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_known_vector() {
        // SHA-256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        let digest = sha256_hex("");
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn strip_comment_refs_removes_wrapping_tags() {
        let xml = r#"<p>Hello <comment-ref id="c1">world</comment-ref></p>"#;
        assert_eq!(strip_comment_refs(xml), "<p>Hello world</p>");
    }

    #[test]
    fn strip_comment_refs_removes_self_closing() {
        let xml = r#"<p>Hi<comment-ref id="c2"/></p>"#;
        assert_eq!(strip_comment_refs(xml), "<p>Hi</p>");
    }

    #[test]
    fn strip_comment_refs_borrows_when_absent() {
        let xml = "<p>plain</p>";
        assert!(matches!(strip_comment_refs(xml), Cow::Borrowed(_)));
    }

    #[test]
    fn fingerprint_ignores_comment_refs() {
        let with = r#"<p>text<comment-ref id="a"/></p>"#;
        let without = "<p>text</p>";
        assert_eq!(content_fingerprint(with), content_fingerprint(without));
    }

    #[test]
    fn fingerprint_differs_on_real_change() {
        assert_ne!(
            content_fingerprint("<p>foo</p>"),
            content_fingerprint("<p>bar</p>")
        );
    }
}
