//! Core entry point for the pdf_bookmarks crate.
//!
//! Bookmarks are held in a [`tree::BookmarkTree`] and move between three
//! representations: the indented text format ([`text`]), nested JSON
//! ([`json`]) and the outline of a PDF ([`outline`] on top of [`pdf`]).
//! [`convert`] ties them to files.

pub mod convert;
pub mod formatter;
pub mod json;
pub mod markers;
pub mod outline;
pub mod pdf;
pub mod text;
pub mod tree;

pub use convert::{BookmarkFormat, ConvertError, Converter};
pub use markers::Markers;
pub use tree::{BookmarkNode, BookmarkTree, NodeId};
