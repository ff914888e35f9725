use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Adds, removes, exports and formats PDF bookmarks.
///
/// Paths containing spaces must be quoted.
#[derive(Parser, Debug)]
#[command(name = "bookmark_tool", version, about = "PDF bookmark tool")]
pub struct Cli {
    /// Operation to run.
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = Mode::Add)]
    pub mode: Mode,

    /// Source file: a PDF, or a raw table of contents in format mode.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Bookmark file (.txt or .json) to import in add mode.
    #[arg(short, long)]
    pub bmk: Option<PathBuf>,

    /// Destination file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite the destination without asking.
    #[arg(short = 'y', long, default_value_t = false)]
    pub yes: bool,

    /// Marker repeated once per nesting level in text bookmark files.
    #[arg(long, default_value = "\t")]
    pub level_marker: String,

    /// Marker separating a title from its page number in text bookmark files.
    #[arg(long, default_value = "\t")]
    pub page_marker: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Replace the outline of a PDF with a bookmark file.
    Add,
    /// Save a copy of a PDF without outline.
    Remove,
    /// Write the outline of a PDF to a bookmark file.
    Export,
    /// Turn a raw table of contents into a text bookmark file.
    Format,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Add => "add",
            Mode::Remove => "remove",
            Mode::Export => "export",
            Mode::Format => "format",
        }
    }

    /// Extension of the default output file.
    pub fn output_extension(self) -> &'static str {
        match self {
            Mode::Add | Mode::Remove => "pdf",
            Mode::Export | Mode::Format => "txt",
        }
    }

    pub fn reads_pdf(self) -> bool {
        !matches!(self, Mode::Format)
    }

    pub fn writes_pdf(self) -> bool {
        matches!(self, Mode::Add | Mode::Remove)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_add_with_tab_markers() {
        let cli = Cli::try_parse_from(["bookmark_tool", "-i", "book.pdf"]).expect("parses");
        assert_eq!(cli.mode, Mode::Add);
        assert_eq!(cli.level_marker, "\t");
        assert_eq!(cli.page_marker, "\t");
        assert!(!cli.yes);
    }

    #[test]
    fn parses_every_flag() {
        let cli = Cli::try_parse_from([
            "bookmark_tool",
            "-m",
            "EXPORT",
            "-i",
            "in.pdf",
            "-o",
            "out.json",
            "-y",
            "--page-marker",
            " | ",
        ])
        .expect("parses");
        assert_eq!(cli.mode, Mode::Export);
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
        assert!(cli.yes);
        assert_eq!(cli.page_marker, " | ");
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["bookmark_tool", "--mode", "merge"]).is_err());
    }
}
