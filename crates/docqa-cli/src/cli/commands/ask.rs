//! `docqa ask <query>`.

use anyhow::Result;
use std::time::Duration;

use docqa_core::api::BackendApi;
use docqa_core::context::AppContext;
use docqa_core::retry::RequestError;
use docqa_core::session::authorized;

use super::report::{failure, request_failed};

pub async fn run_ask(ctx: &AppContext, query: &str, timeout_secs: Option<u64>) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        return Err(failure(&docqa_core::retry::analyze(&RequestError::Validation(
            "the question is empty".to_string(),
        ))));
    }
    if !ctx.tokens.has_valid_token() {
        anyhow::bail!("Not signed in. Run `docqa login <email>` first.");
    }
    ctx.ensure_reachable().await.map_err(|info| failure(&info))?;

    let timeout = timeout_secs.map(Duration::from_secs);
    let response = authorized(ctx.tokens.as_ref(), &ctx.retry, |token| async move {
        ctx.backend.ask(&token, query, timeout).await
    })
    .await
    .map_err(request_failed)?;

    println!("{}", response.answer);
    if !response.source_documents.is_empty() {
        println!();
        println!("{:<40} {:<8} {}", "SOURCE", "CHUNK", "SCORE");
        for doc in &response.source_documents {
            println!("{:<40} {:<8} {:.3}", doc.filename, doc.chunk_index, doc.score);
        }
    }
    Ok(())
}
