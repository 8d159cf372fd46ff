//! Models command implementation
//!
//! Lists the conversion models the service offers.

use anyhow::Result;
use colored::Colorize;
use mlseq_backend::HttpBackend;
use mlseq_core::{Config, ConversionBackend, ModelCatalog, ParameterDescriptor};
use std::process::ExitCode;

/// Run the models command
///
/// # Returns
/// Exit code: 0 if the catalog was fetched, 1 if the service is unavailable
pub fn run(config: &Config, json: bool) -> Result<ExitCode> {
    let backend = HttpBackend::new(&config.backend)?;
    let rt = super::runtime()?;

    match rt.block_on(backend.list_models()) {
        Ok(catalog) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                print_catalog(&catalog, &backend.active_url());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::debug!(error = ?err, "model discovery failed");
            eprintln!("{} {}", "error:".red().bold(), err.user_message());
            Ok(ExitCode::from(1))
        }
    }
}

fn print_catalog(catalog: &ModelCatalog, url: &str) {
    println!("{} {}", "Models at".cyan().bold(), url.cyan());
    if catalog.is_empty() {
        println!("  {}", "(none)".dimmed());
        return;
    }

    for (name, manifest) in catalog {
        println!();
        println!("  {} [{}]", name.bold(), manifest.format);
        if !manifest.description.is_empty() {
            println!("    {}", manifest.description.dimmed());
        }
        if !manifest.midi_parameters.is_empty() {
            println!("    requires: {}", manifest.midi_parameters.join(", ").yellow());
        }
        for (key, descriptor) in &manifest.parameters {
            println!("    {} {}", "-".green(), describe(key, descriptor));
        }
    }
}

fn describe(key: &str, descriptor: &ParameterDescriptor) -> String {
    let mut line = format!("{} ({})", key, descriptor.kind());
    match descriptor {
        ParameterDescriptor::Int {
            range: Some((lo, hi)),
            ..
        } => line.push_str(&format!(" {}..={}", lo, hi)),
        ParameterDescriptor::Float {
            range: Some((lo, hi)),
            ..
        } => line.push_str(&format!(" {}..={}", lo, hi)),
        ParameterDescriptor::Enum { values, .. } => {
            line.push_str(&format!(" [{}]", values.join("|")))
        }
        _ => {}
    }
    if let Some(default) = descriptor.default_value() {
        line.push_str(&format!(" default {}", default));
    }
    line
}
