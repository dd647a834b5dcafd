//! `docqa health` – one forced probe, per-service table.

use anyhow::Result;

use docqa_core::context::AppContext;
use docqa_core::monitor::HealthSnapshot;

use super::report::failure;

pub async fn run_health(ctx: &AppContext) -> Result<()> {
    ctx.ensure_reachable().await.map_err(|info| failure(&info))?;
    match ctx.monitor.health_snapshot() {
        Some(snapshot) => print_snapshot(&ctx.config.api_base_url, &snapshot),
        None => println!("{}: no health report", ctx.config.api_base_url),
    }
    Ok(())
}

pub(crate) fn print_snapshot(base_url: &str, snapshot: &HealthSnapshot) {
    println!(
        "{}: {} (reported {})",
        base_url,
        format!("{:?}", snapshot.overall).to_lowercase(),
        snapshot.timestamp.as_deref().unwrap_or("-")
    );
    if snapshot.services.is_empty() {
        return;
    }
    println!("{:<20} {:<10} {:<10} {}", "SERVICE", "STATUS", "MS", "ERROR");
    for (name, svc) in &snapshot.services {
        let ms = svc
            .response_time_ms
            .map(|ms| format!("{ms:.0}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<10} {:<10} {}",
            name,
            format!("{:?}", svc.status).to_lowercase(),
            ms,
            svc.error.as_deref().unwrap_or("")
        );
    }
}
