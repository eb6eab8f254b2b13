//! Shape the MIME tree from the bodies and attachment parts.

use crate::model::mime::{MimeLeaf, MimeNode, MultipartKind};

/// Pick the plain and HTML bodies, using RTF as the plain body when neither exists.
pub fn select_bodies(
    plain: Option<String>,
    html: Option<String>,
    rtf: Option<String>,
) -> (Option<String>, Option<String>) {
    match (plain, html) {
        (None, None) => (rtf, None),
        other => other,
    }
}

/// Build the MIME tree.
///
/// | attachments | plain | html | root                                   |
/// |-------------|-------|------|----------------------------------------|
/// | yes         | yes   | yes  | mixed[alternative[plain, html], att..] |
/// | yes         | no    | yes  | mixed[html, att..]                     |
/// | yes         | yes   | no   | mixed[plain, att..]                    |
/// | yes         | no    | no   | mixed[empty plain, att..]              |
/// | no          | yes   | yes  | alternative[plain, html]               |
/// | no          | no    | yes  | html                                   |
/// | no          | -     | no   | plain (empty when absent)              |
///
/// `attachments` is only used when `include_attachments` is set.
pub fn assemble(
    plain: Option<&str>,
    html: Option<&str>,
    attachments: Vec<MimeLeaf>,
    include_attachments: bool,
) -> MimeNode {
    let plain_leaf = |text: &str| MimeNode::Leaf(MimeLeaf::text("plain", text));
    let html_leaf = |text: &str| MimeNode::Leaf(MimeLeaf::text("html", text));

    let body = match (plain, html) {
        (Some(p), Some(h)) => MimeNode::Multipart {
            kind: MultipartKind::Alternative,
            children: vec![plain_leaf(p), html_leaf(h)],
        },
        (None, Some(h)) => html_leaf(h),
        (Some(p), None) => plain_leaf(p),
        (None, None) => plain_leaf(""),
    };

    if !include_attachments || attachments.is_empty() {
        return body;
    }

    let mut children = Vec::with_capacity(attachments.len() + 1);
    children.push(body);
    children.extend(attachments.into_iter().map(MimeNode::Leaf));
    MimeNode::Multipart {
        kind: MultipartKind::Mixed,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn att(name: &str) -> MimeLeaf {
        MimeLeaf::attachment("application/pdf", name, b"%PDF".to_vec())
    }

    fn shape(node: &MimeNode) -> String {
        match node {
            MimeNode::Leaf(leaf) => leaf.content_type.clone(),
            MimeNode::Multipart { kind, children } => format!(
                "{}[{}]",
                kind.as_str(),
                children.iter().map(shape).collect::<Vec<_>>().join(", ")
            ),
        }
    }

    #[test]
    fn test_decision_table() {
        let cases: Vec<(Option<&str>, Option<&str>, usize, &str)> = vec![
            (
                Some("p"),
                Some("h"),
                2,
                "mixed[alternative[text/plain, text/html], application/pdf, application/pdf]",
            ),
            (None, Some("h"), 1, "mixed[text/html, application/pdf]"),
            (Some("p"), None, 1, "mixed[text/plain, application/pdf]"),
            (None, None, 1, "mixed[text/plain, application/pdf]"),
            (Some("p"), Some("h"), 0, "alternative[text/plain, text/html]"),
            (None, Some("h"), 0, "text/html"),
            (Some("p"), None, 0, "text/plain"),
            (None, None, 0, "text/plain"),
        ];
        for (plain, html, n, expected) in cases {
            let atts = (0..n).map(|i| att(&format!("{i}.pdf"))).collect();
            assert_eq!(shape(&assemble(plain, html, atts, true)), expected);
        }
    }

    #[test]
    fn test_empty_message_is_empty_plain_leaf() {
        let node = assemble(None, None, Vec::new(), true);
        let leaf = node.as_leaf().unwrap();
        assert_eq!(leaf.content_type, "text/plain");
        assert!(leaf.payload.is_empty());
    }

    #[test]
    fn test_attachments_dropped_when_excluded() {
        let node = assemble(Some("p"), None, vec![att("a.pdf")], false);
        assert_eq!(shape(&node), "text/plain");
        assert_eq!(node.attachment_count(), 0);
    }

    #[test]
    fn test_mixed_with_alternative_child() {
        let node = assemble(Some("Hello"), Some("<p>Hi</p>"), vec![att("a.pdf")], true);
        assert_eq!(node.content_type(), "multipart/mixed");
        let alternatives: Vec<_> = node
            .children()
            .iter()
            .filter(|c| c.content_type() == "multipart/alternative")
            .collect();
        assert_eq!(alternatives.len(), 1);
        assert_eq!(alternatives[0].children().len(), 2);
        assert_eq!(node.attachment_count(), 1);
    }

    #[test]
    fn test_rtf_fallback_only_without_other_bodies() {
        let rtf = || Some("{\\rtf1 x}".to_string());
        assert_eq!(select_bodies(None, None, rtf()), (rtf(), None));
        assert_eq!(
            select_bodies(None, Some("h".into()), rtf()),
            (None, Some("h".into()))
        );
        assert_eq!(
            select_bodies(Some("p".into()), None, rtf()),
            (Some("p".into()), None)
        );
    }
}
