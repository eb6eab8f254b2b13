//! In-memory MIME tree built before serialization.

/// Composite part subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartKind {
    Mixed,
    Alternative,
}

impl MultipartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mixed => "mixed",
            Self::Alternative => "alternative",
        }
    }
}

/// A single-body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeLeaf {
    /// `type/subtype`, e.g. `text/plain`.
    pub content_type: String,
    /// Charset parameter for text parts.
    pub charset: Option<String>,
    /// Filename for `Content-Disposition: attachment`.
    pub attachment_name: Option<String>,
    pub payload: Vec<u8>,
}

impl MimeLeaf {
    /// A UTF-8 text part (`subtype` is `plain` or `html`).
    pub fn text(subtype: &str, text: &str) -> Self {
        Self {
            content_type: format!("text/{subtype}"),
            charset: Some("utf-8".to_string()),
            attachment_name: None,
            payload: text.as_bytes().to_vec(),
        }
    }

    /// A binary attachment part.
    pub fn attachment(content_type: &str, filename: &str, payload: Vec<u8>) -> Self {
        Self {
            content_type: content_type.to_string(),
            charset: None,
            attachment_name: Some(filename.to_string()),
            payload,
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.attachment_name.is_some()
    }
}

/// A node of the MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeNode {
    Leaf(MimeLeaf),
    Multipart {
        kind: MultipartKind,
        children: Vec<MimeNode>,
    },
}

impl MimeNode {
    /// `type/subtype` of this node.
    pub fn content_type(&self) -> String {
        match self {
            Self::Leaf(leaf) => leaf.content_type.clone(),
            Self::Multipart { kind, .. } => format!("multipart/{}", kind.as_str()),
        }
    }

    /// Children of a composite, empty for a leaf.
    pub fn children(&self) -> &[MimeNode] {
        match self {
            Self::Leaf(_) => &[],
            Self::Multipart { children, .. } => children,
        }
    }

    pub fn as_leaf(&self) -> Option<&MimeLeaf> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            Self::Multipart { .. } => None,
        }
    }

    /// Number of attachment leaves anywhere in the tree.
    pub fn attachment_count(&self) -> usize {
        match self {
            Self::Leaf(leaf) => usize::from(leaf.is_attachment()),
            Self::Multipart { children, .. } => {
                children.iter().map(MimeNode::attachment_count).sum()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        let leaf = MimeNode::Leaf(MimeLeaf::text("html", "<p>x</p>"));
        assert_eq!(leaf.content_type(), "text/html");
        let alt = MimeNode::Multipart {
            kind: MultipartKind::Alternative,
            children: vec![leaf],
        };
        assert_eq!(alt.content_type(), "multipart/alternative");
        assert_eq!(alt.children().len(), 1);
    }

    #[test]
    fn test_attachment_count_is_recursive() {
        let tree = MimeNode::Multipart {
            kind: MultipartKind::Mixed,
            children: vec![
                MimeNode::Leaf(MimeLeaf::text("plain", "")),
                MimeNode::Leaf(MimeLeaf::attachment("image/png", "a.png", vec![1])),
                MimeNode::Leaf(MimeLeaf::attachment("text/plain", "b.txt", vec![2])),
            ],
        };
        assert_eq!(tree.attachment_count(), 2);
    }
}
