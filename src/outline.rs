//! Mapping between [`BookmarkTree`] and the outline of a [`PdfDocument`].
//!
//! PDF destinations address pages by zero-based position while the tree
//! stores one-based page numbers.  The conversion happens here and nowhere
//! else: reading adds one, writing subtracts one.

use std::fmt;

use log::{info, warn};
use lopdf::Object;

use crate::pdf::{NameTree, OutlineEntryId, OutlineItem, PdfDocument, PdfError};
use crate::tree::{BookmarkTree, NodeId};

/// Errors raised while converting between outlines and bookmark trees.
#[derive(Debug)]
pub enum OutlineError {
    /// The underlying document could not be read or modified.
    Pdf(PdfError),
    /// A destination has a shape that cannot designate a page.
    UnsupportedDestination {
        /// Title of the outline entry carrying the destination.
        title: String,
        /// PDF type of the rejected object.
        kind: &'static str,
    },
    /// A bookmark carries page 0, which has no zero-based counterpart.
    InvalidPage {
        /// Title of the bookmark.
        title: String,
    },
}

impl From<PdfError> for OutlineError {
    fn from(err: PdfError) -> Self {
        Self::Pdf(err)
    }
}

impl From<lopdf::Error> for OutlineError {
    fn from(err: lopdf::Error) -> Self {
        Self::Pdf(PdfError::Parse(err))
    }
}

impl fmt::Display for OutlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf(err) => write!(f, "{err}"),
            Self::UnsupportedDestination { title, kind } => write!(
                f,
                "outline entry \"{title}\" has a destination of unsupported type {kind}"
            ),
            Self::InvalidPage { title } => {
                write!(f, "bookmark \"{title}\" points to page 0; pages start at 1")
            }
        }
    }
}

impl std::error::Error for OutlineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pdf(err) => Some(err),
            Self::UnsupportedDestination { .. } | Self::InvalidPage { .. } => None,
        }
    }
}

/// The destination encodings an outline entry may use.
#[derive(Clone, Copy, Debug)]
pub enum Destination<'a> {
    /// `[page /Fit ...]`: the first element designates the page.
    Explicit(&'a [Object]),
    /// A byte string naming an entry of the `/Dests` name tree.
    NamedString(&'a [u8]),
    /// A name object naming a destination (PDF 1.1 style).
    Name(&'a [u8]),
    /// A bare zero-based page number.
    PageNumber(i64),
}

impl<'a> Destination<'a> {
    /// Classifies a direct destination object.
    pub fn classify(object: &'a Object, title: &str) -> Result<Self, OutlineError> {
        match object {
            Object::Array(items) => Ok(Self::Explicit(items)),
            Object::String(bytes, _) => Ok(Self::NamedString(bytes)),
            Object::Name(name) => Ok(Self::Name(name)),
            Object::Integer(page) => Ok(Self::PageNumber(*page)),
            other => Err(OutlineError::UnsupportedDestination {
                title: title.to_string(),
                kind: kind_name(other),
            }),
        }
    }
}

/// Resolves destinations of one document to zero-based page indices.
struct PageResolver<'a> {
    document: &'a PdfDocument,
    names: NameTree,
}

impl<'a> PageResolver<'a> {
    fn new(document: &'a PdfDocument) -> Result<Self, OutlineError> {
        Ok(Self {
            document,
            names: document.name_tree()?,
        })
    }

    fn item_page(&self, item: &OutlineItem) -> Result<Option<u32>, OutlineError> {
        let object = match (item.destination(), item.action_destination()) {
            (Some(destination), _) => destination,
            (None, Some(action)) => action,
            (None, None) => return Ok(None),
        };
        let destination = Destination::classify(object, item.title())?;
        self.resolve(destination, item.title())
    }

    fn resolve(
        &self,
        destination: Destination<'_>,
        title: &str,
    ) -> Result<Option<u32>, OutlineError> {
        match destination {
            Destination::Explicit(items) => {
                let Some(target) = items.first() else {
                    return Ok(None);
                };
                if let Some(index) = self.direct_page(target) {
                    return Ok(Some(index));
                }
                match self.document.resolve(target) {
                    Ok(Object::String(name, _) | Object::Name(name)) => self.named(name, title),
                    Ok(_) => {
                        warn!("outline entry \"{title}\": page is outside the page tree");
                        Ok(None)
                    }
                    Err(err) => {
                        warn!("outline entry \"{title}\": destination page cannot be read: {err}");
                        Ok(None)
                    }
                }
            }
            Destination::NamedString(name) | Destination::Name(name) => self.named(name, title),
            Destination::PageNumber(page) => Ok(u32::try_from(page).ok()),
        }
    }

    fn direct_page(&self, target: &Object) -> Option<u32> {
        match target {
            Object::Reference(id) => self.document.page_index(*id),
            Object::Integer(page) => u32::try_from(*page).ok(),
            _ => None,
        }
    }

    fn named(&self, name: &[u8], title: &str) -> Result<Option<u32>, OutlineError> {
        let Some(value) = self.names.get(name) else {
            warn!(
                "outline entry \"{title}\": named destination {:?} not found",
                String::from_utf8_lossy(name)
            );
            return Ok(None);
        };

        let target = match value {
            Object::Array(items) => items.first(),
            Object::Dictionary(dictionary) => match dictionary.get(b"D") {
                Ok(explicit) => self
                    .document
                    .resolve(explicit)
                    .ok()
                    .and_then(|explicit| explicit.as_array().ok())
                    .and_then(|items| items.first()),
                Err(_) => None,
            },
            other => {
                return Err(OutlineError::UnsupportedDestination {
                    title: title.to_string(),
                    kind: kind_name(other),
                })
            }
        };

        let page = target.and_then(|target| self.direct_page(target));
        if page.is_none() {
            warn!("outline entry \"{title}\": named destination does not point at a page");
        }
        Ok(page)
    }
}

/// Reads the document outline into a new bookmark tree.
///
/// Entries whose destination cannot be tied to a page are kept without a page.
pub fn read_outline(document: &PdfDocument) -> Result<BookmarkTree, OutlineError> {
    let resolver = PageResolver::new(document)?;
    let mut tree = BookmarkTree::new();
    let root = tree.root();

    let mut pending: Vec<(NodeId, OutlineItem)> = document
        .outline_items()?
        .into_iter()
        .rev()
        .map(|item| (root, item))
        .collect();

    while let Some((parent, item)) = pending.pop() {
        let page_num = resolver.item_page(&item)?.and_then(to_one_based);
        let node = tree.append(parent, item.title().trim(), page_num);
        pending.extend(
            item.into_children()
                .into_iter()
                .rev()
                .map(|child| (node, child)),
        );
    }

    info!("read {} bookmarks from the document outline", tree.len());
    Ok(tree)
}

/// Appends every bookmark of `tree` to the document outline.
///
/// Level 1 bookmarks become top-level entries, deeper ones are nested below
/// the entry created for their parent.
pub fn write_outline(document: &mut PdfDocument, tree: &BookmarkTree) -> Result<(), OutlineError> {
    let mut pending: Vec<(Option<OutlineEntryId>, NodeId)> = tree
        .children(tree.root())
        .iter()
        .rev()
        .map(|&id| (None, id))
        .collect();
    let mut written = 0usize;

    while let Some((parent, id)) = pending.pop() {
        let node = &tree[id];
        let parent = if node.level() == 1 { None } else { parent };
        let page_index = match node.page_num() {
            Some(page) => Some(to_zero_based(page).ok_or_else(|| OutlineError::InvalidPage {
                title: node.title().to_string(),
            })?),
            None => None,
        };

        let entry = document.append_outline_entry(parent, node.title(), page_index)?;
        written += 1;
        pending.extend(tree.children(id).iter().rev().map(|&child| (Some(entry), child)));
    }

    info!("wrote {written} bookmarks to the document outline");
    Ok(())
}

fn to_one_based(index: u32) -> Option<u32> {
    index.checked_add(1)
}

fn to_zero_based(page: u32) -> Option<u32> {
    page.checked_sub(1)
}

fn kind_name(object: &Object) -> &'static str {
    match object {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) => "integer",
        Object::Real(_) => "real",
        Object::Name(_) => "name",
        Object::String(..) => "string",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        Object::Reference(_) => "reference",
    }
}
