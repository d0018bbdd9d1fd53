// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Args;

use crate::config::VaultConfig;
use crate::crypto::signer::{LocalKeySigner, WalletSigner};
use crate::threshold::keyserver::SessionCertificate;
use crate::vault::ContextVault;

/// Arguments for seal command
#[derive(Args, Debug)]
pub struct SealArgs {
    /// Recipient address (0x-prefixed hex)
    #[arg(long = "for")]
    pub recipient: String,

    /// Text to seal
    #[arg(long)]
    pub text: String,
}

/// Arguments for open command
#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Blob id the sealed context is stored under
    #[arg(long)]
    pub blob: String,

    /// Private key of the principal (can also be set via VAULT_PRIVATE_KEY env var)
    #[arg(long, env = "VAULT_PRIVATE_KEY")]
    pub private_key: Option<String>,

    /// Session lifetime in minutes
    #[arg(long)]
    pub ttl_min: Option<u32>,
}

/// Arguments for session command
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Private key of the principal (can also be set via VAULT_PRIVATE_KEY env var)
    #[arg(long, env = "VAULT_PRIVATE_KEY")]
    pub private_key: Option<String>,

    /// Session lifetime in minutes
    #[arg(long)]
    pub ttl_min: Option<u32>,
}

/// Arguments for demo command
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Text to run through the pipeline
    #[arg(long, default_value = "hello world")]
    pub text: String,
}

fn signer_from(private_key: Option<String>) -> Result<LocalKeySigner> {
    let key = private_key.ok_or_else(|| {
        anyhow!("Private key required. Use --private-key or set VAULT_PRIVATE_KEY env var")
    })?;
    LocalKeySigner::from_hex(&key)
}

/// Seal text for a recipient and store it
pub async fn seal(args: SealArgs) -> Result<()> {
    dotenv::dotenv().ok();

    let vault = ContextVault::connect(VaultConfig::from_env()?)?;
    let sealed = vault.seal_text(&args.recipient, &args.text).await?;

    println!("\n📋 Sealed Context:");
    println!("  Policy:  {}", sealed.policy_id);
    println!("  Blob ID: {}", sealed.blob_id);
    println!("\n✅ Open it later with: vault-cli open --blob {}", sealed.blob_id);
    Ok(())
}

/// Retrieve a sealed context and decrypt it
pub async fn open(args: OpenArgs) -> Result<()> {
    dotenv::dotenv().ok();

    let signer = signer_from(args.private_key)?;
    let vault = ContextVault::connect(VaultConfig::from_env()?)?;

    println!("🔑 Requesting session for {}...", signer.address());
    let session = vault.create_session(&signer, args.ttl_min).await?;

    let text = vault.open_text(&args.blob, &session).await?;
    println!("\n📄 Decrypted context:");
    println!("{}", text);
    Ok(())
}

/// Mint a session key and print its certificate
pub async fn session(args: SessionArgs) -> Result<()> {
    dotenv::dotenv().ok();

    let signer = signer_from(args.private_key)?;
    let vault = ContextVault::connect(VaultConfig::from_env()?)?;

    let session = vault.create_session(&signer, args.ttl_min).await?;
    println!("\n🔑 Session approved:");
    println!("  Address: {}", session.address);
    println!("  Expires: {}", session.expires_at());

    println!("\n⚠️  The certificate below is a live credential until it expires.");
    println!("    Anyone holding it can open contexts sealed for this address.");

    let certificate = SessionCertificate::from(&session);
    println!("\n{}", serde_json::to_string_pretty(&certificate)?);
    Ok(())
}

/// Run the whole pipeline in memory
pub async fn demo(args: DemoArgs) -> Result<()> {
    dotenv::dotenv().ok();

    println!("🚀 Running in-memory pipeline demo...\n");

    let config = VaultConfig::testnet();
    let vault = ContextVault::in_memory(config)?;

    let owner = LocalKeySigner::random()?;
    println!("1. Generated wallet {}", owner.address());

    let sealed = vault.seal_text(owner.address().as_str(), &args.text).await?;
    println!("2. Sealed \"{}\" into blob {}", args.text, sealed.blob_id);

    let session = vault.create_session(&owner, Some(60)).await?;
    println!("3. Session approved, expires {}", session.expires_at());

    let text = vault.open_text(&sealed.blob_id, &session).await?;
    println!("4. Opened blob: \"{}\"", text);

    if text != args.text {
        return Err(anyhow!("round trip mismatch: got \"{}\"", text));
    }

    // A different wallet gets the uniform refusal
    let stranger = LocalKeySigner::random()?;
    let stranger_session = vault.create_session(&stranger, Some(60)).await?;
    match vault.open_text(&sealed.blob_id, &stranger_session).await {
        Err(e) => println!("5. Stranger {} was refused: {}", stranger.address(), e),
        Ok(_) => return Err(anyhow!("stranger was able to open the context")),
    }

    println!("\n✅ Round trip verified");
    Ok(())
}
