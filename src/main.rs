//! ERP Calls - signaling relay and call history tools
//!
//! Usage:
//!   erp-calls --server              run the relay and call history API
//!   erp-calls history [limit]       print the signed-in user's call history
//!   erp-calls token <id> <name>     mint a bearer token for local testing

use anyhow::{bail, Context};

use erp_calls::api::{calls, ApiClient};
use erp_calls::config::{ClientConfig, ServerConfig};
use erp_calls::server;
use erp_calls::ui::HistoryEntry;

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("erp_calls=info".parse()?))
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match args.first().map(String::as_str) {
        Some("--server") => runtime.block_on(run_server()),
        Some("history") => {
            let limit = args.get(1).map(|l| l.parse()).transpose().context("limit must be a number")?;
            runtime.block_on(print_history(limit))
        }
        Some("token") => {
            let (Some(id), Some(name)) = (args.get(1), args.get(2)) else {
                bail!("usage: erp-calls token <user-id> <name>");
            };
            let user_id: i64 = id.parse().context("user id must be a number")?;
            let config = ServerConfig::from_env();
            println!("{}", server::auth::create_token(user_id, name, &config.jwt_secret)?);
            Ok(())
        }
        _ => bail!("usage: erp-calls --server | history [limit] | token <user-id> <name>"),
    }
}

async fn run_server() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    tracing::info!("Starting ERP Calls relay on port {}", config.port);

    server::run_server(config).await
}

async fn print_history(limit: Option<u32>) -> anyhow::Result<()> {
    let config = ClientConfig::from_env()?;
    let client = ApiClient::with_token(&config.api_url, &config.token)?;

    let records = calls::get_call_history(&client, limit).await?;
    if records.is_empty() {
        println!("No calls yet");
    }
    for record in &records {
        let entry = HistoryEntry::from_record(record, config.user_id);
        let marker = if entry.is_missed_by_me() { "!" } else { " " };
        println!("{} {}", marker, entry.summary());
    }
    Ok(())
}
