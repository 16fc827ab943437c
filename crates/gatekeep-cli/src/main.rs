mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gatekeep", version, about = "Gatekeep operator CLI")]
struct Cli {
    /// Path to a gatekeep.toml configuration file
    #[arg(long, global = true, env = "GATEKEEP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Signing key management
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },

    /// Issue and verify bearer tokens
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },

    /// Evaluate policy decisions offline
    Policy {
        #[command(subcommand)]
        cmd: PolicyCommand,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate a new Ed25519 keypair
    Generate {
        /// Directory to write private.key and public.key into
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Issue a token for a principal id
    Issue {
        /// Private key (base64) or path to a key file
        #[arg(long)]
        private_key: Option<String>,

        /// Principal id the token is bound to
        #[arg(long)]
        principal: u32,

        /// Lifetime override, e.g. "30m", "24h", "7d"
        #[arg(long)]
        ttl: Option<String>,

        /// Write the token to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Verify a token and print its claims
    Verify {
        /// Public key (base64) or path to a key file
        #[arg(long)]
        public_key: Option<String>,

        /// The token, or a path to a file holding it
        token: String,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyCommand {
    /// Check one decision against a YAML policy seed
    Check {
        /// Policy seed file
        #[arg(long, short)]
        file: PathBuf,

        /// Username of the principal
        #[arg(long)]
        principal: String,

        /// Resource type, e.g. ORDER
        #[arg(long)]
        resource: String,

        /// Action type, e.g. READ
        #[arg(long)]
        action: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.cmd {
        Command::Keys { cmd } => match cmd {
            KeysCommand::Generate { output } => {
                commands::keys::generate(output)?;
            }
        },

        Command::Token { cmd } => match cmd {
            TokenCommand::Issue {
                private_key,
                principal,
                ttl,
                output,
            } => {
                commands::token::issue(&config, private_key, principal, ttl, output)?;
            }
            TokenCommand::Verify { public_key, token } => {
                if commands::token::verify(&config, public_key, token)?.is_none() {
                    return Ok(ExitCode::FAILURE);
                }
            }
        },

        Command::Policy { cmd } => match cmd {
            PolicyCommand::Check {
                file,
                principal,
                resource,
                action,
            } => {
                let decision =
                    commands::policy::check(&file, &principal, &resource, &action).await?;
                if !decision.allowed {
                    return Ok(ExitCode::FAILURE);
                }
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
