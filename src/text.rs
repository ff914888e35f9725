//! Indented plain-text bookmark format.
//!
//! Each line reads `LEVEL_MARKER* TITLE PAGE_MARKER DIGITS?`.  The number of
//! leading level markers gives the nesting depth, the digits give the
//! one-based page.  A line of the form `//N` shifts every following page by
//! `N - 1`, which lets a table of contents copied from printed page numbers be
//! calibrated against the physical PDF pages.
//!
//! Parsing never leaves a gap in the hierarchy: when a line jumps more than one
//! level deeper than the current path, placeholder ancestors titled
//! [`PLACEHOLDER_TITLE`] are inserted for every missing level.

use std::fmt;

use log::{debug, warn};
use regex::Regex;

use crate::markers::Markers;
use crate::tree::{BookmarkTree, NodeId};

/// Title given to ancestors synthesized while repairing indentation gaps.
pub const PLACEHOLDER_TITLE: &str = ".....";

/// Errors produced while parsing the text format.
#[derive(Debug)]
pub enum TextError {
    /// The line grammar could not be compiled for the configured markers.
    Pattern(regex::Error),
    /// The leading markers of a line do not add up to a whole level.
    Format {
        /// One-based line number.
        line: usize,
    },
    /// The page number, after applying the offset, is negative or too large.
    PageOutOfRange {
        /// One-based line number.
        line: usize,
        /// The page value that could not be stored.
        value: i64,
    },
}

impl From<regex::Error> for TextError {
    fn from(err: regex::Error) -> Self {
        Self::Pattern(err)
    }
}

impl fmt::Display for TextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(err) => write!(f, "failed to build the bookmark line pattern: {err}"),
            Self::Format { line } => write!(
                f,
                "line {line}: level markers do not form a whole level, \
                 the bookmark file is not formatted"
            ),
            Self::PageOutOfRange { line, value } => {
                write!(f, "line {line}: page number {value} is out of range")
            }
        }
    }
}

impl std::error::Error for TextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pattern(err) => Some(err),
            Self::Format { .. } | Self::PageOutOfRange { .. } => None,
        }
    }
}

/// Parser and serializer for the indented text format.
#[derive(Clone, Debug)]
pub struct TextCodec {
    markers: Markers,
    line: Regex,
    directive: Regex,
}

impl TextCodec {
    /// Builds a codec for the given markers.
    pub fn new(markers: Markers) -> Result<Self, TextError> {
        let line = Regex::new(&format!(
            r"^(?P<indent>(?:{level})*)(?P<title>.*?){page}(?P<page>\d*)",
            level = markers.level_pattern(),
            page = markers.page_pattern(),
        ))?;
        let directive = Regex::new(r"^//\s*(?P<page>[+-]?\d+)$")?;
        Ok(Self {
            markers,
            line,
            directive,
        })
    }

    /// Returns the markers used by this codec.
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Parses a whole bookmark file into a tree.
    pub fn parse(&self, input: &str) -> Result<BookmarkTree, TextError> {
        let mut tree = BookmarkTree::new();
        // path[n] is the most recent node at level n.
        let mut path: Vec<NodeId> = vec![tree.root()];
        let mut offset: i64 = 0;

        for (index, raw_line) in input.split('\n').enumerate() {
            let line_number = index + 1;
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            let trimmed = line.trim();
            if trimmed.starts_with("//") {
                match self
                    .directive
                    .captures(trimmed)
                    .and_then(|caps| caps["page"].parse::<i64>().ok())
                {
                    Some(first_page) => {
                        offset = first_page - 1;
                        debug!("line {line_number}: page offset set to {offset}");
                    }
                    None => debug!("line {line_number}: ignoring malformed offset directive"),
                }
                continue;
            }

            let Some(caps) = self.line.captures(line) else {
                if !trimmed.is_empty() {
                    debug!("line {line_number}: no page marker, line dropped");
                }
                continue;
            };

            let level = level_for_indent(&caps["indent"], self.markers.level())
                .ok_or(TextError::Format { line: line_number })?;
            let page_num = match &caps["page"] {
                "" => None,
                digits => Some(offset_page(digits, offset, line_number)?),
            };
            let title = &caps["title"];

            fill_missing_ancestors(&mut tree, &mut path, level, title);
            path.truncate(level as usize);
            let parent = path[level as usize - 1];
            let node = tree.append(parent, title, page_num);
            path.push(node);
        }

        Ok(tree)
    }

    /// Serializes the tree in pre-order, one bookmark per line.
    pub fn serialize(&self, tree: &BookmarkTree) -> String {
        let mut lines = Vec::with_capacity(tree.len());
        for id in tree.iter() {
            let node = &tree[id];
            let mut line = self
                .markers
                .level()
                .repeat(node.level().saturating_sub(1) as usize);
            line.push_str(node.title());
            line.push_str(self.markers.page());
            if let Some(page) = node.page_num() {
                line.push_str(&page.to_string());
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

fn level_for_indent(indent: &str, marker: &str) -> Option<u32> {
    if indent.len() % marker.len() != 0 {
        return None;
    }
    u32::try_from(indent.len() / marker.len() + 1).ok()
}

fn offset_page(digits: &str, offset: i64, line: usize) -> Result<u32, TextError> {
    let value = digits
        .parse::<i64>()
        .map_err(|_| TextError::PageOutOfRange {
            line,
            value: i64::MAX,
        })?
        .saturating_add(offset);
    u32::try_from(value).map_err(|_| TextError::PageOutOfRange { line, value })
}

/// Extends `path` with placeholder nodes until it reaches `level - 1`.
fn fill_missing_ancestors(
    tree: &mut BookmarkTree,
    path: &mut Vec<NodeId>,
    level: u32,
    title: &str,
) {
    let wanted = level as usize;
    while path.len() < wanted {
        let missing = path.len();
        warn!("bookmark \"{title}\": missing level {missing} title, inserting placeholder");
        let parent = path[missing - 1];
        let placeholder = tree.append(parent, PLACEHOLDER_TITLE, None);
        path.push(placeholder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TextCodec {
        TextCodec::new(Markers::default()).expect("default markers compile")
    }

    fn flatten(tree: &BookmarkTree) -> Vec<(u32, String, Option<u32>)> {
        tree.iter()
            .map(|id| {
                let node = &tree[id];
                (node.level(), node.title().to_string(), node.page_num())
            })
            .collect()
    }

    #[test]
    fn parses_levels_and_pages() {
        let tree = codec()
            .parse("Preface\t1\n第1章 Intro\t5\n\t1.1 Sub\t12\nAppendix\t")
            .expect("parse succeeds");

        assert_eq!(
            flatten(&tree),
            vec![
                (1, "Preface".to_string(), Some(1)),
                (1, "第1章 Intro".to_string(), Some(5)),
                (2, "1.1 Sub".to_string(), Some(12)),
                (1, "Appendix".to_string(), None),
            ]
        );
    }

    #[test]
    fn repairs_missing_ancestors() {
        let tree = codec().parse("\t\tDeep\t7").expect("parse succeeds");

        let ids: Vec<_> = tree.iter().collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(tree[ids[0]].title(), PLACEHOLDER_TITLE);
        assert_eq!(tree[ids[1]].title(), PLACEHOLDER_TITLE);
        assert_eq!(tree[ids[0]].page_num(), None);

        let deep = ids[2];
        let mut levels = vec![tree[deep].level()];
        let mut current = tree.parent(deep);
        while let Some(id) = current {
            levels.push(tree[id].level());
            current = tree.parent(id);
        }
        assert_eq!(levels, vec![3, 2, 1, 0]);
    }

    #[test]
    fn deeper_entries_are_forgotten_after_shallower_line() {
        let tree = codec()
            .parse("A\t1\n\tA.1\t2\n\t\tA.1.1\t3\nB\t4\n\t\tB.x.1\t5")
            .expect("parse succeeds");

        let titles: Vec<_> = flatten(&tree).into_iter().map(|(l, t, _)| (l, t)).collect();
        assert_eq!(
            titles,
            vec![
                (1, "A".to_string()),
                (2, "A.1".to_string()),
                (3, "A.1.1".to_string()),
                (1, "B".to_string()),
                (2, PLACEHOLDER_TITLE.to_string()),
                (3, "B.x.1".to_string()),
            ]
        );
    }

    #[test]
    fn offset_directive_applies_to_following_lines() {
        let tree = codec()
            .parse("Cover\t1\n// 5\nChapter\t10\n\tSection\t11\n//1\nIndex\t3")
            .expect("parse succeeds");

        let pages: Vec<_> = flatten(&tree).into_iter().map(|(_, _, p)| p).collect();
        assert_eq!(pages, vec![Some(1), Some(14), Some(15), Some(3)]);
    }

    #[test]
    fn drops_lines_without_page_marker() {
        let tree = codec()
            .parse("no marker here\n\nTitle\t2\r\n//not a number")
            .expect("parse succeeds");
        assert_eq!(flatten(&tree), vec![(1, "Title".to_string(), Some(2))]);
    }

    #[test]
    fn negative_page_after_offset_is_an_error() {
        let err = codec().parse("//0\nIntro\t0").unwrap_err();
        assert!(matches!(err, TextError::PageOutOfRange { line: 2, value: -1 }));
    }

    #[test]
    fn partial_level_marker_is_a_format_error() {
        assert_eq!(level_for_indent("    ", "  "), Some(3));
        assert_eq!(level_for_indent("   ", "  "), None);
    }

    #[test]
    fn custom_markers_round_trip() {
        let codec = TextCodec::new(Markers::new("  ", " ... ").expect("valid markers"))
            .expect("codec builds");
        let text = "Intro ... 1\n  Details ... 2\n    Deeper ... \nOutro ... 9";
        let tree = codec.parse(text).expect("parse succeeds");
        assert_eq!(tree.len(), 4);
        assert_eq!(codec.serialize(&tree), text);
    }

    #[test]
    fn serializes_in_pre_order() {
        let mut tree = BookmarkTree::new();
        let root = tree.root();
        let chapter = tree.append(root, "Chapter", Some(3));
        tree.append(chapter, "Section", None);
        tree.append(root, "Index", Some(40));

        assert_eq!(codec().serialize(&tree), "Chapter\t3\n\tSection\t\nIndex\t40");
    }
}
