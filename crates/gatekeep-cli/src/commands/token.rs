//! Token commands.
//!
//! `gatekeep token issue` - Issue a token for a principal id.
//! `gatekeep token verify` - Verify a token and print its claims.

use crate::config::{read_key_text, resolve_key};
use anyhow::Context;
use gatekeep_core::{GatekeepConfig, PrincipalId, TokenConfig};
use gatekeep_token::{IssuedToken, KeyPair, TokenClaims, TokenManager, load_public_key_base64};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve the signing key from `--private-key` or the configured key source.
fn resolve_private_key(flag: Option<String>, config: &TokenConfig) -> anyhow::Result<KeyPair> {
    let text = match flag {
        Some(value) => read_key_text(&value)?,
        None => resolve_key(&config.private_key)?.context(
            "Private key not provided. Either pass --private-key or set GATEKEEP_PRIVATE_KEY",
        )?,
    };
    KeyPair::from_private_key_base64(&text)
        .context("Failed to parse private key. Expected base64-encoded Ed25519 private key")
}

/// Resolve the verification key from `--public-key` or the configured key source.
fn resolve_public_key(
    flag: Option<String>,
    config: &TokenConfig,
) -> anyhow::Result<gatekeep_token::PublicKey> {
    let text = match flag {
        Some(value) => read_key_text(&value)?,
        None => resolve_key(&config.public_key)?.context(
            "Public key not provided. Either pass --public-key or set GATEKEEP_PUBLIC_KEY",
        )?,
    };
    load_public_key_base64(&text)
        .context("Failed to parse public key. Expected base64-encoded Ed25519 public key")
}

/// Parse a duration string like "24h", "7d", "30m" or "90s".
fn parse_duration(s: &str) -> anyhow::Result<chrono::Duration> {
    let s = s.trim().to_lowercase();
    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s.as_str(), 'h'),
    };
    let n: i64 = digits
        .parse()
        .with_context(|| format!("Invalid duration: {s}"))?;
    if n <= 0 {
        anyhow::bail!("Duration must be positive: {s}");
    }

    let duration = match unit {
        'd' => chrono::Duration::try_days(n),
        'h' => chrono::Duration::try_hours(n),
        'm' => chrono::Duration::try_minutes(n),
        's' => chrono::Duration::try_seconds(n),
        other => anyhow::bail!("Unknown duration unit '{other}' (use d, h, m or s)"),
    };
    duration.with_context(|| format!("Duration out of range: {s}"))
}

/// Read a token given either inline or as a path to a file holding it.
fn read_token(token: String) -> anyhow::Result<String> {
    if Path::new(&token).is_file() {
        return Ok(fs::read_to_string(&token)?.trim().to_string());
    }
    Ok(token.trim().to_string())
}

/// Issue a token for `principal`.
pub fn issue(
    config: &GatekeepConfig,
    private_key: Option<String>,
    principal: u32,
    ttl: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<IssuedToken> {
    let mut token_config = config.token.clone();
    if let Some(ttl) = ttl {
        let duration = parse_duration(&ttl)?;
        token_config.ttl_secs = u64::try_from(duration.num_seconds())?;
    }

    let keypair = resolve_private_key(private_key, &token_config)?;
    let manager = TokenManager::new(keypair, &token_config);
    let issued = manager.issue(PrincipalId(principal))?;
    tracing::info!(principal, expires_at = %issued.expires_at(), "issued token");

    if let Some(output_path) = output {
        fs::write(&output_path, &issued.token)?;
        println!("✔ Token written to: {}", output_path.display());
        println!("  Principal: {}", issued.principal_id());
        println!("  Expires:   {}", issued.expires_at().to_rfc3339());
    } else {
        println!("{}", issued.token);
    }

    Ok(issued)
}

/// Verify a token. Prints its claims as JSON when valid.
pub fn verify(
    config: &GatekeepConfig,
    public_key: Option<String>,
    token: String,
) -> anyhow::Result<Option<TokenClaims>> {
    let public_key = resolve_public_key(public_key, &config.token)?;
    let manager = TokenManager::verify_only(public_key, &config.token);
    let token = read_token(token)?;

    match manager.verify_claims(&token) {
        Ok(claims) => {
            let details = json!({
                "valid": true,
                "principal_id": claims.principal_id,
                "issued_at": claims.issued_at.to_rfc3339(),
                "expires_at": claims.expires_at.to_rfc3339(),
            });
            println!("{}", serde_json::to_string_pretty(&details)?);
            Ok(Some(claims))
        }
        Err(e) => {
            println!("✖ Token verification failed: {e}");
            Ok(None)
        }
    }
}
