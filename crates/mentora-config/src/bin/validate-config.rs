//! Config validation CLI tool
//!
//! Validates a mentora configuration file and reports any errors.

use mentora_config::{ConfigError, CURRENT_CONFIG_VERSION};
use mentora_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a mentora configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match mentora_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!(
                "  Join window: {} min before, {} min after",
                settings.join_window.join_minutes_before, settings.join_window.expire_minutes_after
            );
            println!("  Packages: {}", settings.catalog.packages.len());
            println!("  Services: {}", settings.catalog.services.len());
            println!("  Instructors: {}", settings.instructors.len());

            if !settings.catalog.packages.is_empty() {
                println!();
                println!("Packages:");
                for package in &settings.catalog.packages {
                    println!(
                        "  - {} [{} sessions, {}]: {}",
                        package.id, package.session_count, package.price, package.name
                    );
                }
            }

            if !settings.instructors.is_empty() {
                println!();
                println!("Instructors:");
                for instructor in &settings.instructors {
                    println!(
                        "  - {} [{} slots, {}]: {}",
                        instructor.id,
                        instructor.availability.len(),
                        instructor.schedule_status.as_tag(),
                        instructor.display_name
                    );
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
