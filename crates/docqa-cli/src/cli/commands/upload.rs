//! `docqa upload <path>`.

use anyhow::Result;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use docqa_core::api::{BackendApi, ProgressFn, UploadProgress};
use docqa_core::context::AppContext;
use docqa_core::session::authorized;

use super::report::{failure, request_failed};

/// Prints whole-percent steps to stderr, skipping repeats.
fn progress_printer() -> ProgressFn {
    let last = Arc::new(AtomicU64::new(u64::MAX));
    Arc::new(move |p: UploadProgress| {
        let pct = (p.fraction() * 100.0) as u64;
        if last.swap(pct, Ordering::Relaxed) != pct {
            eprint!("\ruploading... {:>3}%", pct);
        }
    })
}

pub async fn run_upload(ctx: &AppContext, path: &Path) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("{} is not a readable file", path.display());
    }
    if !ctx.tokens.has_valid_token() {
        anyhow::bail!("Not signed in. Run `docqa login <email>` first.");
    }
    ctx.ensure_reachable().await.map_err(|info| failure(&info))?;

    let progress = progress_printer();
    let result = authorized(ctx.tokens.as_ref(), &ctx.retry, |token| {
        let progress = Arc::clone(&progress);
        async move { ctx.backend.upload(&token, path, Some(progress)).await }
    })
    .await;
    eprintln!();

    let uploaded = result.map_err(request_failed)?;
    println!(
        "Uploaded {} ({} chunks indexed).",
        uploaded.filename, uploaded.num_chunks_stored
    );
    Ok(())
}
