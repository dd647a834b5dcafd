//! CLI for the DocQA client.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docqa_core::config;
use docqa_core::context::AppContext;
use docqa_core::session::FileTokenStore;
use std::path::PathBuf;
use std::sync::Arc;

use commands::{
    run_ask, run_health, run_login, run_logout, run_register, run_upload, run_watch, run_whoami,
};

/// Top-level CLI for the DocQA client.
#[derive(Debug, Parser)]
#[command(name = "docqa")]
#[command(about = "DocQA: upload documents and ask questions about them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Sign in and store the access token. Password is read from DOCQA_PASSWORD or stdin.
    Login {
        email: String,
    },

    /// Create an account. Password is read from DOCQA_PASSWORD or stdin.
    Register {
        email: String,
    },

    /// Forget the stored access token.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// Upload a document for indexing.
    Upload {
        /// Path to the document (PDF, TXT, DOCX).
        path: PathBuf,
    },

    /// Ask a question about the uploaded documents.
    Ask {
        query: String,

        /// Deadline for the answer, overriding request_timeout_secs.
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },

    /// Probe the backend once and print per-service health.
    Health,

    /// Keep polling backend health and print every transition until Ctrl-C.
    Watch {
        /// Print only online / offline / checking.
        #[arg(long)]
        simple: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let tokens = FileTokenStore::open_default()?;
        let ctx = AppContext::new(cfg, Arc::new(tokens))?;

        match cli.command {
            CliCommand::Login { email } => run_login(&ctx, &email).await?,
            CliCommand::Register { email } => run_register(&ctx, &email).await?,
            CliCommand::Logout => run_logout(&ctx)?,
            CliCommand::Whoami => run_whoami(&ctx).await?,
            CliCommand::Upload { path } => run_upload(&ctx, &path).await?,
            CliCommand::Ask {
                query,
                timeout_secs,
            } => run_ask(&ctx, &query, timeout_secs).await?,
            CliCommand::Health => run_health(&ctx).await?,
            CliCommand::Watch { simple } => run_watch(&ctx, simple).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
