//! mlseq CLI - Command-line interface for ML-rendered note tracks
//!
//! This binary segments MIDI tracks into conversion chunks, lists the models
//! of the conversion service and renders tracks through them.

mod cli_args;

use clap::Parser;
use cli_args::{Cli, Commands};
use mlseq_core::{Config, SplitOptions};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// Use modules from the library crate
use mlseq_cli::commands;

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "warn" })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn split_options(
    base: SplitOptions,
    min_rest: Option<u32>,
    min_notes: Option<usize>,
    max_notes: Option<usize>,
) -> SplitOptions {
    SplitOptions {
        min_rest: min_rest.unwrap_or(base.min_rest),
        min_notes: min_notes.unwrap_or(base.min_notes),
        max_notes: max_notes.unwrap_or(base.max_notes),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", colored::Colorize::red("error"), e);
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Models { json } => commands::models::run(&config, json),
        Commands::Split {
            input,
            track,
            min_rest,
            min_notes,
            max_notes,
            json,
        } => {
            let options = split_options(config.pipeline.split, min_rest, min_notes, max_notes);
            commands::split::run(&input, track, &options, json)
        }
        Commands::Render {
            input,
            model,
            track,
            out,
            options,
            timeout_secs,
        } => commands::render::run(
            &config,
            &commands::render::RenderArgs {
                input,
                model,
                track,
                out_dir: out,
                options,
                timeout: Duration::from_secs(timeout_secs),
            },
        ),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
