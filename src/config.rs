//! Command-line and environment configuration

use clap::{Parser, Subcommand};
use std::net::SocketAddr;

use crate::models::Role;

#[derive(Debug, Parser)]
#[command(name = "contract-flow", version, about = "Contract approval workflow service")]
pub struct Cli {
    /// SQLite database URL
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:contract_flow.db",
        global = true
    )]
    pub database_url: String,

    #[arg(
        long,
        env = "DATABASE_MAX_CONNECTIONS",
        default_value_t = 5,
        global = true
    )]
    pub max_connections: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
        bind: SocketAddr,

        /// POST notifications here instead of the in-process channel
        #[arg(long, env = "NOTIFY_WEBHOOK_URL")]
        webhook_url: Option<String>,
    },
    /// Register a user directly in the database
    AddUser {
        #[arg(long)]
        name: String,

        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["contract-flow", "serve"]).unwrap();
        match cli.command {
            Command::Serve { bind, webhook_url } => {
                assert_eq!(bind.port(), 3000);
                assert!(webhook_url.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_add_user_parses_role() {
        let cli = Cli::try_parse_from([
            "contract-flow",
            "--database-url",
            "sqlite::memory:",
            "add-user",
            "--name",
            "Root",
            "--role",
            "admin",
        ])
        .unwrap();
        assert_eq!(cli.database_url, "sqlite::memory:");
        match cli.command {
            Command::AddUser { name, role } => {
                assert_eq!(name, "Root");
                assert_eq!(role, Role::Admin);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_role() {
        assert!(Cli::try_parse_from([
            "contract-flow",
            "add-user",
            "--name",
            "X",
            "--role",
            "overlord"
        ])
        .is_err());
    }
}
