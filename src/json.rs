//! Nested JSON bookmark format.
//!
//! Every node becomes `{"title": ..., "page_num": ..., "child": [...]}` with a
//! one-based `page_num`, or `""` when the bookmark has no destination.  Levels
//! are not stored; they follow from the nesting when the document is loaded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::{BookmarkTree, NodeId, ROOT_TITLE};

/// Errors produced while reading the JSON format.
#[derive(Debug)]
pub enum JsonError {
    /// The document is not valid JSON or does not have the expected shape.
    Parse(serde_json::Error),
    /// A `page_num` value is neither a non-negative integer nor empty.
    InvalidPage {
        /// Title of the offending bookmark.
        title: String,
        /// The rejected value as found in the document.
        value: String,
    },
}

impl From<serde_json::Error> for JsonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid bookmark JSON: {err}"),
            Self::InvalidPage { title, value } => {
                write!(f, "bookmark \"{title}\" has an invalid page_num {value}")
            }
        }
    }
}

impl std::error::Error for JsonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidPage { .. } => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonBookmark {
    title: String,
    #[serde(default = "JsonPage::empty")]
    page_num: JsonPage,
    #[serde(default)]
    child: Vec<JsonBookmark>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonPage {
    Number(u64),
    Text(String),
    Other(serde_json::Value),
}

impl JsonPage {
    fn empty() -> Self {
        Self::Text(String::new())
    }

    fn from_page(page_num: Option<u32>) -> Self {
        match page_num {
            Some(page) => Self::Number(u64::from(page)),
            None => Self::empty(),
        }
    }

    fn into_page(self, title: &str) -> Result<Option<u32>, JsonError> {
        let invalid = |value: String| JsonError::InvalidPage {
            title: title.to_string(),
            value,
        };
        match self {
            Self::Number(value) => u32::try_from(value)
                .map(Some)
                .map_err(|_| invalid(value.to_string())),
            Self::Text(text) if text.trim().is_empty() => Ok(None),
            Self::Text(text) => text
                .trim()
                .parse::<u32>()
                .map(Some)
                .map_err(|_| invalid(format!("{text:?}"))),
            Self::Other(serde_json::Value::Null) => Ok(None),
            Self::Other(value) => Err(invalid(value.to_string())),
        }
    }
}

/// Serializes the whole tree, root included, as pretty-printed JSON.
pub fn to_json(tree: &BookmarkTree) -> Result<String, JsonError> {
    let document = to_document(tree, tree.root());
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Parses a JSON document produced by [`to_json`] (or written by hand) into a tree.
///
/// The top-level object is taken as the root; its title and page are ignored.
pub fn from_json(input: &str) -> Result<BookmarkTree, JsonError> {
    let document: JsonBookmark = serde_json::from_str(input)?;
    let mut tree = BookmarkTree::new();
    let root = tree.root();

    let mut pending: Vec<(NodeId, JsonBookmark)> = document
        .child
        .into_iter()
        .rev()
        .map(|child| (root, child))
        .collect();
    while let Some((parent, bookmark)) = pending.pop() {
        let page_num = bookmark.page_num.into_page(&bookmark.title)?;
        let node = tree.append(parent, bookmark.title, page_num);
        pending.extend(bookmark.child.into_iter().rev().map(|child| (node, child)));
    }

    Ok(tree)
}

fn to_document(tree: &BookmarkTree, id: NodeId) -> JsonBookmark {
    let node = &tree[id];
    let title = if id == tree.root() {
        ROOT_TITLE.to_string()
    } else {
        node.title().to_string()
    };
    JsonBookmark {
        title,
        page_num: JsonPage::from_page(node.page_num()),
        child: node
            .children()
            .iter()
            .map(|&child| to_document(tree, child))
            .collect(),
    }
}
