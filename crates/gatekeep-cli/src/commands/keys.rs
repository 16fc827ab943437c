//! `gatekeep keys generate`: mint the Ed25519 pair tokens are signed with.
//!
//! The pair is checked by signing and verifying a throwaway token before anything
//! is written. The command prints the `[token.*_key]` sections that point
//! `gatekeep.toml` at the new material.

use anyhow::Context;
use gatekeep_core::{KeySource, PrincipalId, TokenConfig};
use gatekeep_token::{KeyPair, TokenManager};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const PRIVATE_KEY_FILE: &str = "private.key";
const PUBLIC_KEY_FILE: &str = "public.key";

/// A freshly generated pair and, when written out, the files holding it.
#[derive(Debug)]
pub struct GeneratedKeys {
    pub private_key: String,
    pub public_key: String,
    pub files: Option<KeyFiles>,
}

#[derive(Debug)]
pub struct KeyFiles {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

#[derive(Serialize)]
struct ConfigSnippet {
    token: TokenKeys,
}

#[derive(Serialize)]
struct TokenKeys {
    private_key: KeySource,
    public_key: KeySource,
}

/// Generate a pair, optionally store it under `output`, and print the matching
/// config sections.
pub fn generate(output: Option<PathBuf>) -> anyhow::Result<GeneratedKeys> {
    let keypair = KeyPair::generate()?;
    let private_key = keypair.private_key_base64();
    let public_key = keypair.public_key_base64();
    self_check(&private_key, &public_key)?;

    let files = output.map(|dir| write_pair(&dir, &private_key, &public_key)).transpose()?;

    let snippet = match &files {
        Some(files) => config_snippet(
            &files.private_key.display().to_string(),
            &files.public_key.display().to_string(),
        )?,
        None => config_snippet(&private_key, &public_key)?,
    };
    tracing::info!(written = files.is_some(), "generated token signing keys");

    println!("# Add to gatekeep.toml (keep the private key out of version control)");
    print!("{snippet}");

    Ok(GeneratedKeys {
        private_key,
        public_key,
        files,
    })
}

/// Load the pair the way the token manager will, then sign and verify with it.
fn self_check(private_key: &str, public_key: &str) -> anyhow::Result<()> {
    let manager = TokenManager::from_base64(Some(private_key), public_key, &TokenConfig::default())
        .context("Generated keypair could not be loaded")?;
    let issued = manager.issue(PrincipalId(0))?;
    manager
        .verify(&issued.token)
        .context("Generated keypair failed to verify its own token")?;
    Ok(())
}

fn write_pair(dir: &Path, private_key: &str, public_key: &str) -> anyhow::Result<KeyFiles> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create key directory: {}", dir.display()))?;

    let files = KeyFiles {
        private_key: dir.join(PRIVATE_KEY_FILE),
        public_key: dir.join(PUBLIC_KEY_FILE),
    };
    let pairs = [(&files.private_key, private_key), (&files.public_key, public_key)];
    if let Some((path, _)) = pairs.iter().find(|(path, _)| path.exists()) {
        anyhow::bail!("Refusing to overwrite existing key file: {}", path.display());
    }
    for (path, key) in pairs {
        fs::write(path, key).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(files)
}

/// `[token.private_key]` / `[token.public_key]` sections with inline values. A
/// value may be a key or the path of a file holding one.
fn config_snippet(private_value: &str, public_value: &str) -> anyhow::Result<String> {
    let snippet = ConfigSnippet {
        token: TokenKeys {
            private_key: KeySource {
                value: Some(private_value.to_string()),
                env: None,
            },
            public_key: KeySource {
                value: Some(public_value.to_string()),
                env: None,
            },
        },
    };
    Ok(toml::to_string(&snippet)?)
}
