//! Argument validation and output path resolution.

use std::ffi::OsString;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::cli::{Cli, Mode};

/// Problems with the command line found before any file is touched.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    MissingInput,
    InputNotFound(PathBuf),
    InputNotPdf { mode: Mode, path: PathBuf },
    BookmarksNotFound(PathBuf),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInput => write!(f, "input file not specified"),
            Self::InputNotFound(path) => write!(f, "input file does not exist: {}", path.display()),
            Self::InputNotPdf { mode, path } => write!(
                f,
                "in mode \"{}\" the input file must be a PDF: {}",
                mode.name(),
                path.display()
            ),
            Self::BookmarksNotFound(path) => {
                write!(f, "bookmark file does not exist: {}", path.display())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Fully resolved paths for one run.
#[derive(Debug, PartialEq, Eq)]
pub struct Plan {
    pub mode: Mode,
    pub input: PathBuf,
    pub bookmarks: Option<PathBuf>,
    pub output: PathBuf,
}

/// Checks the arguments and fills in the default paths.
pub fn resolve(cli: &Cli) -> Result<Plan, ValidationError> {
    let mode = cli.mode;
    let input = cli.input.clone().ok_or(ValidationError::MissingInput)?;
    if !input.exists() {
        return Err(ValidationError::InputNotFound(input));
    }
    if mode.reads_pdf() && !has_extension(&input, "pdf") {
        return Err(ValidationError::InputNotPdf { mode, path: input });
    }

    let output = resolve_output(mode, &input, cli.output.as_deref());

    let bookmarks = match mode {
        Mode::Add => {
            let bookmarks = cli
                .bmk
                .clone()
                .unwrap_or_else(|| input.with_extension("txt"));
            if !bookmarks.exists() {
                return Err(ValidationError::BookmarksNotFound(bookmarks));
            }
            Some(bookmarks)
        }
        Mode::Remove | Mode::Export | Mode::Format => None,
    };

    Ok(Plan {
        mode,
        input,
        bookmarks,
        output,
    })
}

fn resolve_output(mode: Mode, input: &Path, output: Option<&Path>) -> PathBuf {
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => input.with_extension(mode.output_extension()),
    };

    if mode.writes_pdf() && !has_extension(&output, "pdf") {
        append_extension(output, "pdf")
    } else if !mode.writes_pdf() && output.extension().is_none() {
        append_extension(output, "txt")
    } else {
        output
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

fn append_extension(path: PathBuf, extension: &str) -> PathBuf {
    let mut raw: OsString = path.into_os_string();
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}

/// Asks whether `path` may be overwritten; only `y` or `Y` accepts.
pub fn confirm_overwrite<R: BufRead, W: Write>(
    path: &Path,
    mut reader: R,
    mut writer: W,
) -> io::Result<bool> {
    write!(
        writer,
        "Destination file: {}\n already exists, overwrite? (y/n) ",
        path.display()
    )?;
    writer.flush()?;

    let mut answer = String::new();
    reader.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
