// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Masjid Receipts API Server
//!
//! Receipt uploads, tagging and financial reports for a mosque's
//! finance team.

use clap::Parser;
use masjid_receipts::{
    cli::{Cli, Command},
    config::Config,
    db::Database,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "masjid_receipts=debug,info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let mut config = load_config()?;

    match cli.command() {
        Command::Migrate => {
            let db = Database::connect(&config.database_url).await?;
            db.migrate().await?;
            tracing::info!("Database is at the latest schema version");
            Ok(())
        }
        Command::Activate { username } => set_active(&config, &username, true).await,
        Command::Deactivate { username } => set_active(&config, &username, false).await,
        Command::Serve { port, migrate } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config, migrate).await
        }
    }
}

/// Configuration problems abort startup, so they go to the log first.
fn load_config() -> anyhow::Result<Config> {
    Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e.into()
    })
}

async fn set_active(config: &Config, username: &str, is_active: bool) -> anyhow::Result<()> {
    let db = Database::connect(&config.database_url).await?;
    let user = db
        .get_user_by_username(username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No user named '{}'", username))?;
    db.set_user_active(user.id, is_active).await?;
    Ok(())
}

async fn serve(config: Config, migrate: bool) -> anyhow::Result<()> {
    tracing::info!(port = config.port, "Starting Masjid Receipts API");

    let db = Database::connect(&config.database_url).await?;
    if migrate {
        db.migrate().await?;
    }

    let state = Arc::new(AppState::new(config.clone(), db));
    state.uploads.ensure_dir().await?;
    tracing::info!(path = %state.uploads.dir().display(), "Upload directory ready");

    // Build router
    let app = masjid_receipts::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");
    tracing::info!(
        docs = %format!("http://localhost:{}/docs", config.port),
        "API documentation available"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_error_is_logged() {
        std::env::remove_var("SECRET_KEY");
        std::env::remove_var("ALGORITHM");
        std::env::remove_var("ACCESS_TOKEN_EXPIRE_MINUTES");

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, load_config);
        assert!(result.is_err());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Failed to load configuration"));
        assert!(output.contains("SECRET_KEY"));
        assert!(output.contains("ERROR"));
    }
}
