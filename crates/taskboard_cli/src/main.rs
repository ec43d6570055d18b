//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `taskboard_core` wiring end to end: config, logging and store.
//! - Keep output deterministic `key=value` lines for quick sanity checks.
//!
//! Usage: `taskboard_cli [config.json]`

use log::info;
use std::process::ExitCode;
use std::sync::Arc;
use taskboard_core::db::migrations::{current_user_version, latest_version};
use taskboard_core::{init_logging, AppConfig, AppContext, LocalIdentityProvider};

fn main() -> ExitCode {
    println!("taskboard_core version={}", taskboard_core::core_version());

    let config = match std::env::args().nth(1) {
        Some(path) => match AppConfig::load(&path) {
            Ok(config) => {
                println!("config=ok project_id={}", config.backend.project_id);
                config
            }
            Err(err) => {
                eprintln!("config=error {err}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            println!("config=default");
            AppConfig::default()
        }
    };

    if let Some(log_dir) = config.log_dir.as_deref().and_then(|dir| dir.to_str()) {
        match init_logging(config.log_level(), log_dir) {
            Ok(()) => println!("logging=ok level={}", config.log_level()),
            Err(err) => {
                eprintln!("logging=error {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    let ctx = match AppContext::open(&config, Arc::new(LocalIdentityProvider::new())) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("store=error {err}");
            return ExitCode::FAILURE;
        }
    };
    match current_user_version(ctx.connection()) {
        Ok(version) => println!(
            "store=ok schema_version={} latest={}",
            version,
            latest_version()
        ),
        Err(err) => {
            eprintln!("store=error {err}");
            return ExitCode::FAILURE;
        }
    }

    info!("event=cli_status module=taskboard_cli status=ok");
    ExitCode::SUCCESS
}
