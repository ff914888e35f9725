//! File-level operations: importing bookmark files into PDFs, exporting
//! outlines, removing them and cleaning up raw table-of-contents text.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::formatter::Formatter;
use crate::json::{self, JsonError};
use crate::markers::Markers;
use crate::outline::{self, OutlineError};
use crate::pdf::{PdfDocument, PdfError};
use crate::text::{TextCodec, TextError};
use crate::tree::BookmarkTree;

const UTF8_BOM: char = '\u{feff}';

/// Errors raised by the file-level operations.
#[derive(Debug)]
pub enum ConvertError {
    /// Reading or writing a file failed.
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A bookmark file has an extension other than `.txt` or `.json`.
    UnsupportedExtension(PathBuf),
    /// The formatter rules could not be compiled for the configured markers.
    Pattern(regex::Error),
    /// The text bookmark format could not be parsed.
    Text(TextError),
    /// The JSON bookmark format could not be read or written.
    Json(JsonError),
    /// The PDF could not be loaded or saved.
    Pdf(PdfError),
    /// The outline could not be converted.
    Outline(OutlineError),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, .. } => write!(f, "failed to access {}", path.display()),
            Self::UnsupportedExtension(path) => write!(
                f,
                "{}: bookmark files must end in .txt or .json",
                path.display()
            ),
            Self::Pattern(_) => write!(f, "failed to build the formatter rules"),
            Self::Text(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "{err}"),
            Self::Pdf(err) => write!(f, "{err}"),
            Self::Outline(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::UnsupportedExtension(_) => None,
            Self::Pattern(err) => Some(err),
            Self::Text(err) => std::error::Error::source(err),
            Self::Json(err) => std::error::Error::source(err),
            Self::Pdf(err) => std::error::Error::source(err),
            Self::Outline(err) => std::error::Error::source(err),
        }
    }
}

impl From<regex::Error> for ConvertError {
    fn from(err: regex::Error) -> Self {
        Self::Pattern(err)
    }
}

impl From<TextError> for ConvertError {
    fn from(err: TextError) -> Self {
        Self::Text(err)
    }
}

impl From<JsonError> for ConvertError {
    fn from(err: JsonError) -> Self {
        Self::Json(err)
    }
}

impl From<PdfError> for ConvertError {
    fn from(err: PdfError) -> Self {
        Self::Pdf(err)
    }
}

impl From<OutlineError> for ConvertError {
    fn from(err: OutlineError) -> Self {
        Self::Outline(err)
    }
}

/// Serialization used for a bookmark file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookmarkFormat {
    /// Indented lines, see [`crate::text`].
    Text,
    /// Nested objects, see [`crate::json`].
    Json,
}

impl BookmarkFormat {
    /// Picks the format for writing: `.json` (any case) selects JSON, everything else text.
    pub fn from_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }

    /// Picks the format for reading; only `.txt` and `.json` are accepted.
    pub fn for_reading(path: &Path) -> Result<Self, ConvertError> {
        match extension(path).as_deref() {
            Some("json") => Ok(Self::Json),
            Some("txt") => Ok(Self::Text),
            _ => Err(ConvertError::UnsupportedExtension(path.to_path_buf())),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Runs the bookmark operations with one set of markers.
#[derive(Clone, Debug)]
pub struct Converter {
    codec: TextCodec,
}

impl Converter {
    /// Builds a converter for the given markers.
    pub fn new(markers: Markers) -> Result<Self, ConvertError> {
        Ok(Self {
            codec: TextCodec::new(markers)?,
        })
    }

    /// Returns the text codec used for `.txt` files.
    pub fn codec(&self) -> &TextCodec {
        &self.codec
    }

    /// Loads a bookmark file, choosing the format by extension.
    pub fn read_bookmark_file(&self, path: &Path) -> Result<BookmarkTree, ConvertError> {
        let format = BookmarkFormat::for_reading(path)?;
        let contents = read_to_string(path)?;
        let tree = match format {
            BookmarkFormat::Text => self.codec.parse(&contents)?,
            BookmarkFormat::Json => json::from_json(&contents)?,
        };
        info!("loaded {} bookmarks from {}", tree.len(), path.display());
        Ok(tree)
    }

    /// Writes `tree` to `path`, as JSON for `.json` and as text otherwise.
    pub fn write_bookmark_file(
        &self,
        path: &Path,
        tree: &BookmarkTree,
    ) -> Result<(), ConvertError> {
        let contents = match BookmarkFormat::from_path(path) {
            BookmarkFormat::Text => self.codec.serialize(tree),
            BookmarkFormat::Json => json::to_json(tree)?,
        };
        write_string(path, &contents)
    }

    /// Replaces the outline of `input` with the bookmarks in `bookmarks` and
    /// saves the result to `output`.
    pub fn add_bookmarks(
        &self,
        input: &Path,
        bookmarks: &Path,
        output: &Path,
    ) -> Result<(), ConvertError> {
        let tree = self.read_bookmark_file(bookmarks)?;
        let mut document = PdfDocument::open(input)?;
        document.clear_outline()?;
        outline::write_outline(&mut document, &tree)?;
        document.save(output)?;
        info!("wrote {} with {} bookmarks", output.display(), tree.len());
        Ok(())
    }

    /// Saves a copy of `input` without outline to `output`.
    pub fn remove_bookmarks(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let mut document = PdfDocument::open(input)?;
        document.clear_outline()?;
        document.save(output)?;
        info!("removed bookmarks, saved {}", output.display());
        Ok(())
    }

    /// Writes the outline of `input` to the bookmark file `output`.
    pub fn export_bookmarks(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<BookmarkTree, ConvertError> {
        let document = PdfDocument::open(input)?;
        let tree = outline::read_outline(&document)?;
        self.write_bookmark_file(output, &tree)?;
        info!("exported {} bookmarks to {}", tree.len(), output.display());
        Ok(tree)
    }

    /// Rewrites the raw table of contents in `input` into the text format at `output`.
    pub fn format_bookmark_file(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let formatter = Formatter::new(self.codec.markers())?;
        let raw = read_to_string(input)?;
        write_string(output, &formatter.format(&raw))?;
        info!("formatted {} into {}", input.display(), output.display());
        Ok(())
    }
}

fn read_to_string(path: &Path) -> Result<String, ConvertError> {
    let contents = fs::read_to_string(path).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match contents.strip_prefix(UTF8_BOM) {
        Some(stripped) => stripped.to_string(),
        None => contents,
    })
}

fn write_string(path: &Path, contents: &str) -> Result<(), ConvertError> {
    fs::write(path, contents).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::blank_document;
    use tempfile::tempdir;

    fn converter() -> Converter {
        Converter::new(Markers::default()).expect("default markers")
    }

    #[test]
    fn format_is_chosen_by_extension() {
        let format = |path: &str| BookmarkFormat::from_path(Path::new(path));
        assert_eq!(format("a.JSON"), BookmarkFormat::Json);
        assert_eq!(format("a.txt"), BookmarkFormat::Text);
        assert_eq!(format("a"), BookmarkFormat::Text);
        assert!(matches!(
            BookmarkFormat::for_reading(Path::new("toc.md")),
            Err(ConvertError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn reads_text_with_byte_order_mark() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("toc.txt");
        fs::write(&path, "\u{feff}Intro\t1\n\tPart\t2").expect("write toc");

        let tree = converter().read_bookmark_file(&path).expect("read succeeds");
        let first = tree.iter().next().expect("bookmark");
        assert_eq!(tree[first].title(), "Intro");
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("absent.txt");
        let err = converter().read_bookmark_file(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Io { path: ref p, .. } if p == &path));
    }

    #[test]
    fn add_export_and_remove_through_files() {
        let dir = tempdir().expect("temp dir");
        let input = dir.path().join("in.pdf");
        let bookmarks = dir.path().join("toc.txt");
        let output = dir.path().join("out.pdf");
        let exported = dir.path().join("out.json");

        blank_document(4).save(&input).expect("save input");
        fs::write(&bookmarks, "//2\nOne\t1\n\tTwo\t2\nThree\t3").expect("write toc");

        let converter = converter();
        converter
            .add_bookmarks(&input, &bookmarks, &output)
            .expect("add succeeds");
        let tree = converter
            .export_bookmarks(&output, &exported)
            .expect("export succeeds");
        let pages: Vec<_> = tree.iter().map(|id| tree[id].page_num()).collect();
        assert_eq!(pages, vec![Some(2), Some(3), Some(4)]);

        let reloaded = converter.read_bookmark_file(&exported).expect("json reads");
        assert_eq!(reloaded.len(), 3);

        let stripped = dir.path().join("stripped.pdf");
        converter
            .remove_bookmarks(&output, &stripped)
            .expect("remove succeeds");
        let empty = converter
            .export_bookmarks(&stripped, &dir.path().join("empty.txt"))
            .expect("export succeeds");
        assert!(empty.is_empty());
    }

    #[test]
    fn formats_raw_toc_file() {
        let dir = tempdir().expect("temp dir");
        let raw = dir.path().join("raw.txt");
        let formatted = dir.path().join("toc.txt");
        fs::write(&raw, "第1章 概述 3\r\n1.1 背景 4\r\n").expect("write raw");

        converter()
            .format_bookmark_file(&raw, &formatted)
            .expect("format succeeds");
        assert_eq!(
            fs::read_to_string(&formatted).expect("read formatted"),
            "第1章 概述\t3\n\t1.1 背景\t4"
        );
    }
}
