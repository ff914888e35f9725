mod cli;
mod paths;

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pdf_bookmarks::markers::MarkerError;
use pdf_bookmarks::{Converter, Markers};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Mode};
use crate::paths::{Plan, ValidationError};

enum Outcome {
    Done,
    Declined,
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Declined) => {
            info!("destination kept, nothing written");
            ExitCode::from(3)
        }
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            if err.downcast_ref::<ValidationError>().is_some()
                || err.downcast_ref::<MarkerError>().is_some()
            {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run() -> Result<Outcome> {
    let cli = Cli::parse();
    let markers = Markers::new(&cli.level_marker, &cli.page_marker)?;
    let plan = paths::resolve(&cli)?;

    if !cli.yes && plan.output.exists() {
        let stdin = io::stdin();
        let accepted = paths::confirm_overwrite(&plan.output, stdin.lock(), io::stdout())
            .context("failed to read the overwrite answer")?;
        if !accepted {
            return Ok(Outcome::Declined);
        }
    }

    execute(&plan, Converter::new(markers)?)?;
    Ok(Outcome::Done)
}

fn execute(plan: &Plan, converter: Converter) -> Result<()> {
    info!(mode = plan.mode.name(), input = %plan.input.display(), "processing");
    if let Some(bookmarks) = &plan.bookmarks {
        info!(bookmarks = %bookmarks.display(), "bookmark file");
    }
    info!(output = %plan.output.display(), "output file");

    match plan.mode {
        Mode::Add => {
            let bookmarks = plan
                .bookmarks
                .as_deref()
                .context("add mode needs a bookmark file")?;
            converter
                .add_bookmarks(&plan.input, bookmarks, &plan.output)
                .with_context(|| format!("failed to add bookmarks to {}", plan.input.display()))?;
            info!("save pdf with bookmarks success");
        }
        Mode::Remove => {
            converter
                .remove_bookmarks(&plan.input, &plan.output)
                .with_context(|| {
                    format!("failed to remove bookmarks from {}", plan.input.display())
                })?;
            info!("remove bookmarks success");
        }
        Mode::Export => {
            converter
                .export_bookmarks(&plan.input, &plan.output)
                .with_context(|| {
                    format!("failed to export bookmarks from {}", plan.input.display())
                })?;
            info!("export bookmarks success");
        }
        Mode::Format => {
            converter
                .format_bookmark_file(&plan.input, &plan.output)
                .with_context(|| format!("failed to format {}", plan.input.display()))?;
            info!("format bookmarks success");
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
