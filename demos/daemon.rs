//! Run a task manager until SIGTERM/SIGINT.
//!
//! ```text
//! APP_ENV=local cargo run --example daemon -- [--config config.json] URL...
//! ```
//!
//! All given URLs are submitted as one task. Unfinished tasks from an earlier
//! run are resumed automatically.

use task_dl::{Config, TaskManager, run_with_shutdown};
use tracing_subscriber::EnvFilter;

fn init_logging(env: &str) {
    let level = match env {
        "prod" => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("task_dl={level},daemon={level}")));

    match env {
        "debug" | "prod" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .init(),
    }
}

fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
    init_logging(&env);

    let mut args = std::env::args().skip(1).peekable();
    let config_path = if args.peek().map(String::as_str) == Some("--config") {
        args.next();
        args.next()
    } else {
        None
    };
    let urls: Vec<String> = args.collect();

    let config = load_config(config_path.as_deref())?;
    tracing::info!(env = %env, workers = config.worker_count, "Configuration loaded");

    let manager = TaskManager::new(config).await?;

    if !urls.is_empty() {
        let id = manager.submit(urls).await?;
        println!("submitted task {}", id);
    }

    let db = manager.db.clone();
    run_with_shutdown(manager).await?;
    db.close().await;

    Ok(())
}
