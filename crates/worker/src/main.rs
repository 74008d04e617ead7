use anyhow::Result;
use backoff::{backoff::Backoff, ExponentialBackoff};
use clap::Parser;
use signage_core::config::Settings;
use signage_core::middleware::{HttpTransport, MiddlewareClient};
use signage_db::PgStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};

mod jobs;

use jobs::push::PushReconciler;

#[derive(Debug, Parser)]
#[command(name = "signage-worker")]
#[command(about = "Pushes channel content to the screen middleware", version)]
struct Args {
    /// Run a single push cycle and exit.
    #[arg(long)]
    once: bool,
    /// Push every channel on the first cycle, even if unchanged.
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    let transport = HttpTransport::new(settings.middleware.timeout())?;
    let client = MiddlewareClient::new(Arc::new(transport), settings.middleware.base_url());
    let reconciler = PushReconciler::new(
        Arc::new(PgStore::new(db)),
        client,
        settings.middleware.api_key.clone(),
    );

    if args.once {
        let report = reconciler.push_to_screens(args.force).await?;
        info!(?report, "single push cycle done");
        return Ok(());
    }

    info!(interval = ?settings.push_interval(), "worker starting");
    run_loop(&reconciler, &settings, args.force).await;
    Ok(())
}

async fn run_loop(reconciler: &PushReconciler, settings: &Settings, mut force: bool) {
    let interval = settings.push_interval();
    let mut backoff = ExponentialBackoff {
        max_interval: interval,
        max_elapsed_time: None,
        ..Default::default()
    };

    loop {
        let delay = match reconciler.push_to_screens(force).await {
            Ok(_) => {
                force = false;
                backoff.reset();
                interval
            }
            Err(err) => {
                let delay = backoff.next_backoff().unwrap_or(interval);
                error!(error = %err, ?delay, "push cycle failed");
                delay
            }
        };
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_to_loop() {
        let args = Args::try_parse_from(["signage-worker"]).unwrap();
        assert!(!args.once);
        assert!(!args.force);
    }

    #[test]
    fn test_args_with_all_flags() {
        let args = Args::try_parse_from(["signage-worker", "--once", "--force"]).unwrap();
        assert!(args.once);
        assert!(args.force);
    }

    #[test]
    fn test_args_unknown_flag_fails() {
        let result = Args::try_parse_from(["signage-worker", "--forever"]);
        assert!(result.is_err());
    }
}
