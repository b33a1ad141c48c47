use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tutor_alerts::client::{
    HttpNotificationClient, ReconcileConfig, StudentSession, ViewState, WsPushTransport,
};
use url::Url;

/// Follow a student's notifications from a running server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Student identity to watch
    student_id: String,

    /// Server root URL
    #[arg(long, env = "TUTOR_ALERTS_SERVER", default_value = "http://localhost:12580")]
    server: Url,

    /// Poll interval in seconds, the staleness bound when a push is missed
    #[arg(
        long,
        env = "RECONCILE_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,

    /// Show the full history instead of unread notifications only
    #[arg(long)]
    all: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutor_alerts=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    watch(args).await
}

async fn watch(args: Args) -> anyhow::Result<()> {
    let mut config = ReconcileConfig::with_interval(Duration::from_secs(args.interval))?;
    config.unread_only = !args.all;

    let feed = Arc::new(HttpNotificationClient::new(args.server.clone())?);
    let push = Arc::new(WsPushTransport::new(&args.server)?);
    let session = StudentSession::new(feed, push, config);
    session
        .start(args.student_id.clone())
        .await
        .with_context(|| format!("Failed to start session for {}", args.student_id))?;

    let mut updates = session.view().subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                print_view(&args.student_id, &state);
            }
        }
    }

    session.end().await;
    Ok(())
}

fn print_view(student_id: &str, state: &ViewState) {
    println!(
        "[rev {}] {} notification(s) for {}, {} unread",
        state.revision,
        state.notifications.len(),
        student_id,
        state.unread_count()
    );
    for n in &state.notifications {
        let marker = match (n.read, n.responded) {
            (_, true) => "responded",
            (true, false) => "read",
            (false, false) => "new",
        };
        println!(
            "  {} {:<9} {} (tutor {}, group {})",
            n.created_at.format("%Y-%m-%d %H:%M:%S"),
            marker,
            n.message,
            n.tutor_id,
            n.group_id
        );
    }
}
