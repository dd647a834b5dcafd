//! `docqa login|register|logout|whoami`.

use anyhow::{Context, Result};
use std::io::{self, BufRead};

use docqa_core::api::{BackendApi, Credentials};
use docqa_core::context::AppContext;
use docqa_core::retry::run_with_retry;
use docqa_core::session::{authorized, StoredToken};

use super::report::{failure, request_failed};

const PASSWORD_ENV: &str = "DOCQA_PASSWORD";

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("empty password (set {} or type it on stdin)", PASSWORD_ENV);
    }
    Ok(password)
}

fn credentials(email: &str) -> Result<Credentials> {
    Ok(Credentials {
        email: email.trim().to_string(),
        password: read_password()?,
    })
}

pub async fn run_login(ctx: &AppContext, email: &str) -> Result<()> {
    let creds = credentials(email)?;
    ctx.ensure_reachable().await.map_err(|info| failure(&info))?;

    let login = run_with_retry(&ctx.retry, || ctx.backend.login(&creds))
        .await
        .map_err(request_failed)?;
    let token = StoredToken::from_login(&login);
    ctx.tokens
        .set_token(token.clone())
        .context("failed to store access token")?;

    match token.expires_at {
        Some(at) => println!("Signed in as {} (session expires {}).", creds.email, at),
        None => println!("Signed in as {}.", creds.email),
    }
    Ok(())
}

pub async fn run_register(ctx: &AppContext, email: &str) -> Result<()> {
    let creds = credentials(email)?;
    ctx.ensure_reachable().await.map_err(|info| failure(&info))?;

    let user = run_with_retry(&ctx.retry, || ctx.backend.register(&creds))
        .await
        .map_err(request_failed)?;
    println!("Registered {}. Run `docqa login {}` to sign in.", user.email, user.email);
    Ok(())
}

pub fn run_logout(ctx: &AppContext) -> Result<()> {
    if ctx.tokens.get_token().is_none() {
        println!("Not signed in.");
        return Ok(());
    }
    ctx.tokens
        .clear_token()
        .context("failed to remove stored token")?;
    println!("Signed out.");
    Ok(())
}

pub async fn run_whoami(ctx: &AppContext) -> Result<()> {
    if !ctx.tokens.has_valid_token() {
        anyhow::bail!("Not signed in. Run `docqa login <email>` first.");
    }
    ctx.ensure_reachable().await.map_err(|info| failure(&info))?;

    let user = authorized(ctx.tokens.as_ref(), &ctx.retry, |token| async move {
        ctx.backend.current_user(&token).await
    })
    .await
    .map_err(request_failed)?;

    println!("{:<10} {}", "EMAIL", user.email);
    println!("{:<10} {}", "ID", user.id);
    println!("{:<10} {}", "ACTIVE", user.is_active);
    if let Some(at) = ctx.tokens.token_expiry() {
        println!("{:<10} {}", "EXPIRES", at);
    }
    Ok(())
}
