//! Config validation CLI tool
//!
//! Validates a studylog configuration file and reports any errors.

use studylog_util::default_config_path;
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
            eprintln!("Validates a studylog configuration file.");
            eprintln!();
            eprintln!("Default location: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match studylog_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", studylog_config::CURRENT_CONFIG_VERSION);
            println!("  User: {}", settings.service.user_id);
            println!("  Data dir: {}", settings.service.data_dir.display());
            println!("  Timezone: {}", settings.service.timezone.label());
            println!("  Tick interval: {}ms", settings.timer.tick_interval.as_millis());
            println!(
                "  Advice: {} via {} (key from ${})",
                settings.advice.model, settings.advice.endpoint, settings.advice.api_key_env
            );

            println!();
            println!("Subjects ({}):", settings.subjects.len());
            for subject in &settings.subjects {
                println!("  - {} [{}]: {}", subject.id, subject.color, subject.name);
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                studylog_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                studylog_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                studylog_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                studylog_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        studylog_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
