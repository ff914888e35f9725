//! Heuristic clean-up of raw table-of-contents text.
//!
//! Text copied from a PDF or a web page rarely follows the indented bookmark
//! grammar.  [`Formatter`] rewrites every line into canonical form with an
//! ordered set of regex rules:
//!
//! 1. lines that are not recognized headings get no indentation (level 1)
//! 2. `第N章` headings become level 1
//! 3. `第一章` / `第IV章` headings become level 1
//! 4. `Chapter N` headings become level 1
//! 5. `N` / `N.` headings become level 1
//! 6. `N.M` headings become level 2
//! 7. `第N节` headings become level 2
//! 8. `N.M.K` headings become level 3
//! 9. `N.M.K.J` headings become level 4
//! 10. a trailing page number (or the first number of a page range) moves
//!     behind the page marker
//! 11. lines without a page get an empty page field
//!
//! The page field is split off first, then the first heading rule matching
//! the remaining title decides the indentation and puts a single space
//! between the heading number and its text.  A canonical line maps onto
//! itself, so formatting is idempotent.  The result is best effort and
//! worth a quick review.

use log::debug;
use regex::Regex;

use crate::markers::Markers;

/// Horizontal whitespace; no rule may reach across a line break.
const SPACE: &str = r"[^\S\n]";

/// What may follow a heading number.
#[derive(Clone, Copy, Debug)]
enum Tail {
    NotDot,
    NotDigitOrDot,
}

impl Tail {
    fn accepts(self, rest: &str) -> bool {
        match (self, rest.chars().next()) {
            (_, None) => true,
            (Tail::NotDot, Some(c)) => c != '.',
            (Tail::NotDigitOrDot, Some(c)) => c != '.' && !c.is_ascii_digit(),
        }
    }
}

struct Rule {
    name: &'static str,
    head: Regex,
    tail: Tail,
    depth: usize,
}

/// Ordered rule set turning raw table-of-contents text into bookmark lines.
pub struct Formatter {
    markers: Markers,
    rules: Vec<Rule>,
    page: Regex,
    trailing: Regex,
}

impl Formatter {
    /// Compiles the rule set for the given markers.
    pub fn new(markers: &Markers) -> Result<Self, regex::Error> {
        let page = markers.page_pattern();
        let rule = |name: &'static str,
                    body: &str,
                    tail: Tail,
                    depth: usize|
         -> Result<Rule, regex::Error> {
            Ok(Rule {
                name,
                head: Regex::new(&format!("^(?:{body})"))?,
                tail,
                depth,
            })
        };

        let rules = vec![
            rule("chapter-numeric", "第[0-9]+章", Tail::NotDot, 0)?,
            rule(
                "chapter-ordinal",
                "第[一二三四五六七八九十百〇零IVX]+章",
                Tail::NotDot,
                0,
            )?,
            rule(
                "chapter-latin",
                r"(?i:chapter)[^\S\n]*(?:[0-9]+|[IVXLC]+\b)",
                Tail::NotDot,
                0,
            )?,
            rule("number-1", r"[0-9]+\.?", Tail::NotDigitOrDot, 0)?,
            rule("number-2", r"[0-9]+\.[0-9]+", Tail::NotDigitOrDot, 1)?,
            rule(
                "section",
                "第[一二三四五六七八九十百〇零IVX0-9]+节",
                Tail::NotDot,
                1,
            )?,
            rule("number-3", r"[0-9]+\.[0-9]+\.[0-9]+", Tail::NotDigitOrDot, 2)?,
            rule(
                "number-4",
                r"[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+",
                Tail::NotDigitOrDot,
                3,
            )?,
        ];

        Ok(Self {
            markers: markers.clone(),
            rules,
            page: Regex::new(&format!(
                r"(?:{page}|{SPACE})*([0-9]+)(?:-[0-9]*)?{SPACE}*$"
            ))?,
            trailing: Regex::new(&format!(r"(?:{page}|{SPACE})+$"))?,
        })
    }

    /// Rewrites `input` into the indented bookmark grammar.
    ///
    /// Line endings are normalized to `\n`, blank lines are dropped and
    /// `//N` offset directives are kept as they are.
    pub fn format(&self, input: &str) -> String {
        let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
        normalized
            .split('\n')
            .enumerate()
            .filter_map(|(index, line)| self.format_line(index + 1, line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_line(&self, number: usize, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with("//") {
            return Some(trimmed.to_string());
        }

        let body = self.strip_indent(line);
        let split = self
            .page
            .captures(body)
            .and_then(|caps| Some((caps.get(0)?.start(), caps.get(1)?.as_str())));
        let (title, page) = match split {
            Some((start, page)) => (&body[..start], page),
            None => (body, ""),
        };
        let title = self.trailing.replace(title, "").replace('\t', " ");
        let title = title.trim();
        if title.is_empty() && page.is_empty() {
            return None;
        }

        let (depth, title) = match self.heading(title) {
            Some((rule, title)) => {
                debug!("line {number}: {} heading at level {}", rule.name, rule.depth + 1);
                (rule.depth, title)
            }
            None => (0, title.to_string()),
        };

        Some(format!(
            "{}{}{}{}",
            self.markers.level().repeat(depth),
            title,
            self.markers.page(),
            page
        ))
    }

    /// Removes leading whitespace and level markers.
    fn strip_indent<'a>(&self, line: &'a str) -> &'a str {
        let mut rest = line;
        loop {
            rest = rest.trim_start();
            match rest.strip_prefix(self.markers.level()) {
                Some(stripped) => rest = stripped,
                None => return rest,
            }
        }
    }

    /// Finds the first heading rule matching `title` and normalizes the
    /// spacing after the heading number.
    fn heading(&self, title: &str) -> Option<(&Rule, String)> {
        self.rules.iter().find_map(|rule| {
            let head = rule.head.find(title)?;
            let rest = title[head.end()..].trim_start();
            if !rule.tail.accepts(rest) {
                return None;
            }
            let title = if rest.is_empty() {
                head.as_str().to_string()
            } else {
                format!("{} {}", head.as_str(), rest)
            };
            Some((rule, title))
        })
    }
}
