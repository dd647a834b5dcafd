//! `docqa watch` – run the poll loop and print transitions until Ctrl-C.

use anyhow::{Context, Result};
use chrono::Local;

use docqa_core::context::AppContext;
use docqa_core::monitor::{ServerStatus, StatusView};

use super::health::print_snapshot;

fn stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub async fn run_watch(ctx: &AppContext, simple: bool) -> Result<()> {
    let Some(poller) = ctx.monitor.spawn_polling() else {
        anyhow::bail!("monitor is already polling");
    };

    let _subscriptions = if simple {
        let view = StatusView::new(ctx.monitor.clone());
        vec![view.subscribe(|status| {
            println!("{} {}", stamp(), format!("{:?}", status).to_lowercase());
        })]
    } else {
        let base_url = ctx.config.api_base_url.clone();
        let monitor = ctx.monitor.clone();
        vec![
            ctx.monitor.subscribe_connectivity(|c| {
                println!("{} connectivity {}", stamp(), format!("{:?}", c).to_lowercase());
            }),
            ctx.monitor.subscribe_health(move |view| {
                let status = format!("{:?}", view.status).to_lowercase();
                match (&view.snapshot, view.status) {
                    (Some(snapshot), _) => {
                        println!("{} server {}", stamp(), status);
                        print_snapshot(&base_url, snapshot);
                    }
                    (None, ServerStatus::Offline) => {
                        let reason = monitor
                            .last_probe_error()
                            .map(|e| e.user_message)
                            .unwrap_or_default();
                        println!(
                            "{} server offline (next probe in {}s) {}",
                            stamp(),
                            monitor.next_poll_interval().as_secs(),
                            reason
                        );
                    }
                    (None, _) => println!("{} server {}", stamp(), status),
                }
            }),
        ]
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::debug!("watch interrupted, stopping poll loop");
    poller.shutdown().await;
    Ok(())
}
