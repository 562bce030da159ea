// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Command-line interface.

use clap::{Parser, Subcommand};

/// Masjid Receipts API server.
#[derive(Parser, Debug)]
#[command(name = "masjid-receipts", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Port to listen on; overrides PORT.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,

        /// Apply pending database migrations before serving.
        #[arg(long = "migrate")]
        migrate: bool,
    },
    /// Apply all pending database migrations and exit.
    Migrate,
    /// Re-enable a user account.
    Activate {
        username: String,
    },
    /// Disable a user account; its tokens stop working immediately.
    Deactivate {
        username: String,
    },
}

impl Cli {
    /// The subcommand to run; no subcommand means `serve` with defaults.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            port: None,
            migrate: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_serve() {
        let cli = Cli::parse_from(["masjid-receipts"]);
        assert_eq!(
            cli.command(),
            Command::Serve {
                port: None,
                migrate: false
            }
        );
    }

    #[test]
    fn test_serve_flags() {
        let cli = Cli::parse_from(["masjid-receipts", "serve", "--port", "9000", "--migrate"]);
        assert_eq!(
            cli.command(),
            Command::Serve {
                port: Some(9000),
                migrate: true
            }
        );
    }

    #[test]
    fn test_migrate() {
        let cli = Cli::parse_from(["masjid-receipts", "migrate"]);
        assert_eq!(cli.command(), Command::Migrate);
        assert!(Cli::try_parse_from(["masjid-receipts", "serve", "--port", "nope"]).is_err());
    }

    #[test]
    fn test_account_commands() {
        let cli = Cli::parse_from(["masjid-receipts", "deactivate", "imam1"]);
        assert_eq!(
            cli.command(),
            Command::Deactivate {
                username: "imam1".to_string()
            }
        );
        assert!(Cli::try_parse_from(["masjid-receipts", "activate"]).is_err());
    }
}
