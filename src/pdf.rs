//! Outline-level access to PDF documents built on top of `lopdf`.
//!
//! [`PdfDocument`] exposes only what bookmark conversion needs: reading the
//! raw `/Outlines` hierarchy, flattening the named-destination tree, mapping
//! page objects to zero-based indices and back, and rewriting the outline.
//! Interpreting destinations is left to [`crate::outline`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

/// Longest chain of indirect references followed before giving up.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Errors raised while reading or rewriting the document structure.
#[derive(Debug)]
pub enum PdfError {
    /// `lopdf` rejected the document or an object lookup failed.
    Parse(lopdf::Error),
    /// Reading or writing the file failed.
    Io(std::io::Error),
    /// The trailer does not reference a catalog.
    MissingCatalog,
    /// The catalog or the outline root is not a dictionary.
    InvalidCatalog,
    /// An outline entry is visited twice while walking `/First` and `/Next`.
    CyclicOutline(ObjectId),
    /// An indirect reference chain does not end in a direct object.
    ReferenceLoop(ObjectId),
    /// A bookmark targets a page the document does not have.
    MissingPage {
        /// Title of the bookmark being written.
        title: String,
        /// Requested zero-based page index.
        page_index: u32,
        /// Number of pages in the document.
        page_count: usize,
    },
}

impl From<lopdf::Error> for PdfError {
    fn from(err: lopdf::Error) -> Self {
        Self::Parse(err)
    }
}

impl From<std::io::Error> for PdfError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "failed to parse PDF: {err}"),
            Self::Io(err) => write!(f, "failed to read or write PDF: {err}"),
            Self::MissingCatalog => write!(f, "PDF catalog entry is missing"),
            Self::InvalidCatalog => write!(f, "PDF catalog or outline entry is not a dictionary"),
            Self::CyclicOutline(id) => write!(
                f,
                "PDF outline entry {} {} R is reachable twice",
                id.0, id.1
            ),
            Self::ReferenceLoop(id) => write!(
                f,
                "PDF reference {} {} R does not resolve to an object",
                id.0, id.1
            ),
            Self::MissingPage {
                title,
                page_index,
                page_count,
            } => write!(
                f,
                "bookmark \"{}\" refers to page {} but the document has {} pages",
                title,
                u64::from(*page_index) + 1,
                page_count
            ),
        }
    }
}

impl std::error::Error for PdfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::MissingCatalog
            | Self::InvalidCatalog
            | Self::CyclicOutline(_)
            | Self::ReferenceLoop(_)
            | Self::MissingPage { .. } => None,
        }
    }
}

/// One entry of the document outline as stored in the file.
///
/// Destinations are kept as raw objects with the outer indirect reference
/// already resolved.
#[derive(Clone, Debug)]
pub struct OutlineItem {
    title: String,
    destination: Option<Object>,
    action_destination: Option<Object>,
    children: Vec<OutlineItem>,
}

impl OutlineItem {
    /// Returns the decoded `/Title`.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the `/Dest` entry, if present.
    pub fn destination(&self) -> Option<&Object> {
        self.destination.as_ref()
    }

    /// Returns the `/D` entry of the `/A` action, if present.
    pub fn action_destination(&self) -> Option<&Object> {
        self.action_destination.as_ref()
    }

    /// Returns the nested entries.
    pub fn children(&self) -> &[OutlineItem] {
        &self.children
    }

    /// Consumes the entry and returns its nested entries.
    pub fn into_children(self) -> Vec<OutlineItem> {
        self.children
    }
}

/// Named destinations of a document, flattened into `(name, destination)` pairs.
#[derive(Clone, Debug, Default)]
pub struct NameTree {
    entries: Vec<(Vec<u8>, Object)>,
}

impl NameTree {
    /// Returns the destination registered under `name`.
    pub fn get(&self, name: &[u8]) -> Option<&Object> {
        self.entries
            .iter()
            .find(|(key, _)| key.as_slice() == name)
            .map(|(_, value)| value)
    }

    /// Number of named destinations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the document declares no named destinations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle to an outline entry created through [`PdfDocument::append_outline_entry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutlineEntryId(ObjectId);

/// A loaded PDF document together with its page order.
pub struct PdfDocument {
    document: Document,
    pages: Vec<ObjectId>,
    page_indices: HashMap<ObjectId, u32>,
}

impl PdfDocument {
    /// Loads a document from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        Ok(Self::from_document(Document::load(path)?))
    }

    /// Loads a document from an in-memory buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        Ok(Self::from_document(Document::load_mem(bytes)?))
    }

    /// Wraps an already parsed `lopdf` document.
    pub fn from_document(document: Document) -> Self {
        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        let page_indices = pages
            .iter()
            .enumerate()
            .filter_map(|(index, &id)| u32::try_from(index).ok().map(|index| (id, index)))
            .collect();
        Self {
            document,
            pages,
            page_indices,
        }
    }

    /// Writes the document to `path`.
    ///
    /// The file is only touched once the whole document has been serialized.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), PdfError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serializes the document into a byte buffer.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        let mut buffer = Vec::new();
        self.document.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Maps a page object to its zero-based position in the page tree.
    pub fn page_index(&self, page: ObjectId) -> Option<u32> {
        self.page_indices.get(&page).copied()
    }

    /// Maps a zero-based page index to the page object.
    pub fn page_id(&self, index: u32) -> Option<ObjectId> {
        self.pages.get(index as usize).copied()
    }

    /// Follows indirect references until a direct object is reached.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> Result<&'a Object, PdfError> {
        let mut current = object;
        for _ in 0..MAX_REFERENCE_DEPTH {
            match current {
                Object::Reference(id) => current = self.document.get_object(*id)?,
                direct => return Ok(direct),
            }
        }
        match current {
            Object::Reference(id) => Err(PdfError::ReferenceLoop(*id)),
            direct => Ok(direct),
        }
    }

    /// Reads the complete outline hierarchy.
    pub fn outline_items(&self) -> Result<Vec<OutlineItem>, PdfError> {
        let Some(root) = self.outline_root()? else {
            return Ok(Vec::new());
        };
        let first = reference(root, b"First");
        let mut visited = HashSet::new();
        self.read_siblings(first, &mut visited)
    }

    /// Flattens the `/Names /Dests` tree and the legacy catalog `/Dests` dictionary.
    pub fn name_tree(&self) -> Result<NameTree, PdfError> {
        let catalog = self.catalog()?;
        let mut tree = NameTree::default();

        if let Ok(names) = catalog.get(b"Names") {
            let dests = self
                .resolve(names)?
                .as_dict()
                .and_then(|names| names.get(b"Dests"));
            if let Ok(dests) = dests {
                let mut visited = HashSet::new();
                self.flatten_names(dests, &mut tree.entries, &mut visited)?;
            }
        }

        if let Ok(dests) = catalog.get(b"Dests") {
            if let Ok(dests) = self.resolve(dests)?.as_dict() {
                for (key, value) in dests.iter() {
                    if let Ok(value) = self.resolve(value) {
                        tree.entries.push((key.clone(), value.clone()));
                    }
                }
            }
        }

        Ok(tree)
    }

    /// Removes the whole outline and drops the objects it used.
    pub fn clear_outline(&mut self) -> Result<(), PdfError> {
        let catalog_id = self.catalog_id()?;
        let removed = self.dictionary_mut(catalog_id)?.remove(b"Outlines");
        if removed.is_some() {
            self.document.prune_objects();
        }
        Ok(())
    }

    /// Appends an outline entry below `parent`, or at the top level when `parent` is `None`.
    ///
    /// `page_index` is zero-based; `None` creates an entry without destination.
    pub fn append_outline_entry(
        &mut self,
        parent: Option<OutlineEntryId>,
        title: &str,
        page_index: Option<u32>,
    ) -> Result<OutlineEntryId, PdfError> {
        let destination = match page_index {
            Some(index) => Some(self.page_id(index).ok_or_else(|| PdfError::MissingPage {
                title: title.to_string(),
                page_index: index,
                page_count: self.pages.len(),
            })?),
            None => None,
        };

        let parent_id = match parent {
            Some(OutlineEntryId(id)) => id,
            None => self.ensure_outline_root()?,
        };
        let entry_id = self.document.new_object_id();

        let mut dictionary = Dictionary::new();
        dictionary.set("Title", encode_text_string(title));
        dictionary.set("Parent", Object::Reference(parent_id));
        if let Some(page) = destination {
            dictionary.set(
                "Dest",
                Object::Array(vec![Object::Reference(page), Object::Name(b"Fit".to_vec())]),
            );
        }

        let parent_dictionary = self.dictionary_mut(parent_id)?;
        let previous = reference(parent_dictionary, b"Last");
        parent_dictionary.set("Last", Object::Reference(entry_id));
        if previous.is_none() {
            parent_dictionary.set("First", Object::Reference(entry_id));
        }
        if let Some(previous) = previous {
            dictionary.set("Prev", Object::Reference(previous));
            self.dictionary_mut(previous)?
                .set("Next", Object::Reference(entry_id));
        }

        self.document
            .objects
            .insert(entry_id, Object::Dictionary(dictionary));
        self.increment_counts(parent_id)?;

        Ok(OutlineEntryId(entry_id))
    }

    fn catalog_id(&self) -> Result<ObjectId, PdfError> {
        self.document
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| PdfError::MissingCatalog)
    }

    fn catalog(&self) -> Result<&Dictionary, PdfError> {
        let catalog_id = self.catalog_id()?;
        self.document
            .get_object(catalog_id)
            .map_err(|_| PdfError::MissingCatalog)?
            .as_dict()
            .map_err(|_| PdfError::InvalidCatalog)
    }

    fn dictionary_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary, PdfError> {
        self.document
            .get_object_mut(id)?
            .as_dict_mut()
            .map_err(|_| PdfError::InvalidCatalog)
    }

    fn outline_root(&self) -> Result<Option<&Dictionary>, PdfError> {
        let Ok(outlines) = self.catalog()?.get(b"Outlines") else {
            return Ok(None);
        };
        match self.resolve(outlines)? {
            Object::Null => Ok(None),
            Object::Dictionary(root) => Ok(Some(root)),
            _ => Err(PdfError::InvalidCatalog),
        }
    }

    fn ensure_outline_root(&mut self) -> Result<ObjectId, PdfError> {
        let catalog_id = self.catalog_id()?;
        if let Ok(Object::Reference(id)) = self.catalog()?.get(b"Outlines") {
            let id = *id;
            if matches!(self.document.get_object(id), Ok(Object::Dictionary(_))) {
                return Ok(id);
            }
        }

        let mut root = Dictionary::new();
        root.set("Type", Object::Name(b"Outlines".to_vec()));
        root.set("Count", Object::Integer(0));
        let root_id = self.document.add_object(Object::Dictionary(root));

        let catalog = self.dictionary_mut(catalog_id)?;
        catalog.set("Outlines", Object::Reference(root_id));
        catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));
        Ok(root_id)
    }

    /// Adds one visible descendant to `id` and to every ancestor of `id`.
    fn increment_counts(&mut self, id: ObjectId) -> Result<(), PdfError> {
        let mut current = Some(id);
        let mut visited = HashSet::new();
        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(PdfError::CyclicOutline(id));
            }
            let dictionary = self.dictionary_mut(id)?;
            let count = dictionary
                .get(b"Count")
                .and_then(Object::as_i64)
                .unwrap_or(0);
            dictionary.set("Count", Object::Integer(count.abs() + 1));
            current = reference(dictionary, b"Parent");
        }
        Ok(())
    }

    fn read_siblings(
        &self,
        first: Option<ObjectId>,
        visited: &mut HashSet<ObjectId>,
    ) -> Result<Vec<OutlineItem>, PdfError> {
        let mut items = Vec::new();
        let mut current = first;

        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(PdfError::CyclicOutline(id));
            }
            let dictionary = self
                .document
                .get_object(id)?
                .as_dict()
                .map_err(|_| PdfError::InvalidCatalog)?;

            let title = match dictionary.get(b"Title") {
                Ok(title) => match self.resolve(title)? {
                    Object::String(bytes, _) => decode_text_string(bytes),
                    _ => String::new(),
                },
                Err(_) => String::new(),
            };
            let destination = self.optional_entry(dictionary, b"Dest")?;
            let action_destination = match dictionary.get(b"A") {
                Ok(action) => match self.resolve(action)? {
                    Object::Dictionary(action) => self.optional_entry(action, b"D")?,
                    _ => None,
                },
                Err(_) => None,
            };
            let children = self.read_siblings(reference(dictionary, b"First"), visited)?;

            items.push(OutlineItem {
                title,
                destination,
                action_destination,
                children,
            });
            current = reference(dictionary, b"Next");
        }

        Ok(items)
    }

    fn optional_entry(
        &self,
        dictionary: &Dictionary,
        key: &[u8],
    ) -> Result<Option<Object>, PdfError> {
        match dictionary.get(key) {
            Ok(value) => match self.resolve(value)? {
                Object::Null => Ok(None),
                value => Ok(Some(value.clone())),
            },
            Err(_) => Ok(None),
        }
    }

    fn flatten_names(
        &self,
        node: &Object,
        entries: &mut Vec<(Vec<u8>, Object)>,
        visited: &mut HashSet<ObjectId>,
    ) -> Result<(), PdfError> {
        if let Object::Reference(id) = node {
            if !visited.insert(*id) {
                return Ok(());
            }
        }
        let Ok(node) = self.resolve(node)?.as_dict() else {
            return Ok(());
        };

        if let Ok(names) = node.get(b"Names") {
            let names = self.resolve(names)?.as_array().map_err(PdfError::from)?;
            for pair in names.chunks_exact(2) {
                let key = match self.resolve(&pair[0])? {
                    Object::String(bytes, _) | Object::Name(bytes) => bytes.clone(),
                    _ => continue,
                };
                entries.push((key, self.resolve(&pair[1])?.clone()));
            }
        } else if let Ok(kids) = node.get(b"Kids") {
            let kids = self.resolve(kids)?.as_array().map_err(PdfError::from)?;
            for kid in kids {
                self.flatten_names(kid, entries, visited)?;
            }
        }

        Ok(())
    }
}

fn reference(dictionary: &Dictionary, key: &[u8]) -> Option<ObjectId> {
    dictionary.get(key).and_then(Object::as_reference).ok()
}

/// Decodes a PDF text string (UTF-16BE with byte order mark, UTF-8, or PDFDocEncoding).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| byte as char).collect(),
    }
}

/// Encodes a title as a literal string when ASCII, as UTF-16BE otherwise.
pub fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Builds a catalog with `page_count` empty pages and no outline.
#[cfg(test)]
pub(crate) fn blank_document(page_count: usize) -> Document {
    use lopdf::dictionary;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..page_count)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}
