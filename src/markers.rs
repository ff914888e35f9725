//! Level and page marker configuration for the indented text format.

use std::fmt;

/// Marker used for both nesting and page separation when nothing else is configured.
pub const DEFAULT_MARKER: &str = "\t";

/// Errors raised when a marker cannot be used in the text grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerError {
    /// The marker string was empty.
    Empty(MarkerKind),
    /// The marker contained a character that collides with the grammar.
    InvalidCharacter {
        /// Which marker was rejected.
        kind: MarkerKind,
        /// The offending character.
        character: char,
    },
}

/// Identifies one of the two configurable markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// Marker repeated once per nesting level.
    Level,
    /// Marker separating the title from the page number.
    Page,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level => f.write_str("level marker"),
            Self::Page => f.write_str("page marker"),
        }
    }
}

impl fmt::Display for MarkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty(kind) => write!(f, "{} must not be empty", kind),
            Self::InvalidCharacter { kind, character } => {
                write!(f, "{} must not contain {:?}", kind, character)
            }
        }
    }
}

impl std::error::Error for MarkerError {}

/// The literal markers of the text format together with their regex-escaped forms.
///
/// The escaped forms are computed once here and never change afterwards, so a
/// `Markers` value can be shared by the text codec and the formatter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Markers {
    level: String,
    page: String,
    level_pattern: String,
    page_pattern: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self::build(DEFAULT_MARKER.to_string(), DEFAULT_MARKER.to_string())
    }
}

impl Markers {
    /// Validates the provided markers and precomputes their escaped forms.
    pub fn new(level: impl Into<String>, page: impl Into<String>) -> Result<Self, MarkerError> {
        let level = level.into();
        let page = page.into();
        validate(&level, MarkerKind::Level)?;
        validate(&page, MarkerKind::Page)?;
        Ok(Self::build(level, page))
    }

    fn build(level: String, page: String) -> Self {
        Self {
            level_pattern: regex::escape(&level),
            page_pattern: regex::escape(&page),
            level,
            page,
        }
    }

    /// Returns the literal level marker.
    pub fn level(&self) -> &str {
        &self.level
    }

    /// Returns the literal page marker.
    pub fn page(&self) -> &str {
        &self.page
    }

    /// Returns the level marker escaped for use inside a regular expression.
    pub fn level_pattern(&self) -> &str {
        &self.level_pattern
    }

    /// Returns the page marker escaped for use inside a regular expression.
    pub fn page_pattern(&self) -> &str {
        &self.page_pattern
    }

    /// Returns a bracket-expression body matching any single character of the level marker.
    pub(crate) fn level_class(&self) -> String {
        self.level
            .chars()
            .map(|ch| regex::escape(ch.encode_utf8(&mut [0; 4])))
            .collect()
    }
}

fn validate(marker: &str, kind: MarkerKind) -> Result<(), MarkerError> {
    if marker.is_empty() {
        return Err(MarkerError::Empty(kind));
    }
    if let Some(character) = marker
        .chars()
        .find(|ch| ch.is_ascii_digit() || *ch == '\n' || *ch == '\r')
    {
        return Err(MarkerError::InvalidCharacter { kind, character });
    }
    Ok(())
}
