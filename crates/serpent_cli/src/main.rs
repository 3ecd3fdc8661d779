//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `serpent_core` linkage.
//! - Check that environment settings load and the configured database opens.
//! - Keep output deterministic for quick local sanity checks.

use serpent_core::{init_logging, SessionFactory, Settings};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("serpent_core ping={}", serpent_core::ping());
    println!("serpent_core version={}", serpent_core::core_version());

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("settings status=error error={err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&settings.log_level, settings.log_dir.as_deref()) {
        eprintln!("logging status=error error={err}");
        return ExitCode::FAILURE;
    }

    let opened = SessionFactory::new(settings.database.database_type, &settings.database.url, &[])
        .and_then(|factory| factory.open().map(|session| (factory, session)));
    match opened {
        Ok((factory, session)) => {
            println!("database status=ok location={:?}", factory.location());
            let _ = session.close();
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("database status=error error={err}");
            ExitCode::FAILURE
        }
    }
}
