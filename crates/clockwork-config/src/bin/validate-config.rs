//! Config validation CLI tool
//!
//! Validates a clockworkd configuration file and prints the resolved settings.

use clockwork_config::{ConfigError, CURRENT_CONFIG_VERSION};
use clockwork_util::default_config_path;
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
            eprintln!("Validates a clockworkd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match clockwork_config::load_config(&config_path) {
        Ok(config) => {
            let settings = &config.settings;
            let source = &config.source;

            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Socket: {}", config.service.socket_path.display());
            println!("  Data dir: {}", config.service.data_dir.display());
            println!();
            println!("Report:");
            println!("  UTC offset: {}", settings.utc_offset);
            println!(
                "  Payroll cycle: day {} through day {}",
                settings.payroll_cycle_start_day,
                settings.payroll_cycle_start_day - 1
            );
            println!("  Query timeout: {}s", settings.query_timeout_secs);
            println!(
                "  User page size: {} (max {})",
                settings.default_user_limit, settings.max_user_limit
            );
            println!();
            println!("Source:");
            println!(
                "  Users: {}({}, {}, {})",
                source.users_table, source.user_id_column, source.username_column, source.full_name_column
            );
            println!(
                "  Punches: {}({}, {}, {})",
                source.punches_table,
                source.punch_user_column,
                source.punch_time_column,
                source.punch_direction_column
            );
            println!();
            match &config.connection {
                Some(conn) => println!("Connection: {}", conn.describe()),
                None => println!("Connection: (none, falls back to environment)"),
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
