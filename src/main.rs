//! Brokerage QA harness: session bootstrap.
//!
//! Prepares the shared config file before a test run:
//! - `login` (default): log in with `api.username`/`api.password` and
//!   persist the session token, then probe the bank balance for `api.nin`
//! - `logout`: clear the stored session token
//! - `show`: print the resolved configuration (secrets masked)
//!
//! The config file is picked by `CONFIG_FILE`, or by `TEST_ENV`/`ENV`
//! (`config/config-<env>.properties`, default `qa`).

use tracing::{error, info, warn};

use brokerage_qa_harness::api::TradingClient;
use brokerage_qa_harness::auth::Credentials;
use brokerage_qa_harness::config::{keys, ConfigStore, RunSettings, SESSION_TOKEN_KEY};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "login".to_string());
    let environment = args.next();

    // Load run settings.
    let settings = match environment.as_deref() {
        Some(env) => RunSettings::for_environment(env),
        None => RunSettings::from_env(),
    };

    // Initialize logging.
    init_logging(&settings);

    let store = ConfigStore::open(settings.source());
    info!(
        environment = %store.environment_name(),
        path = %store.backing_path().display(),
        loaded_from = ?store.loaded_from(),
        "Configuration loaded"
    );

    match command.as_str() {
        "login" => login(store).await,
        "logout" => {
            if store.clear_session_token() {
                info!("Session token cleared");
                Ok(())
            } else {
                anyhow::bail!("Failed to persist cleared session token")
            }
        }
        "show" => {
            show(&store);
            Ok(())
        }
        other => {
            error!(command = %other, "Unknown command (expected login, logout or show)");
            anyhow::bail!("Unknown command: {other}")
        }
    }
}

async fn login(store: ConfigStore) -> anyhow::Result<()> {
    let credentials = Credentials::from_store(&store)?;
    let client = TradingClient::from_store(store.clone())?;

    info!(base_url = %store.base_url(), username = %credentials.username, "Logging in");
    client.login(&credentials).await?;

    // Probe an authenticated endpoint to verify the session.
    match credentials.nin.as_deref() {
        Some(nin) => match client.bank_balance(nin).await {
            Ok(balance) => info!(
                nin = %balance.nin,
                currency = %balance.currency,
                available = %balance.available,
                "Bank balance probe OK"
            ),
            Err(e) => warn!(error = %e, "Bank balance probe failed"),
        },
        None => info!("No api.nin configured, skipping balance probe"),
    }

    Ok(())
}

fn show(store: &ConfigStore) {
    for key in store.keys() {
        let value = store.get_or(&key, "");
        let secret = key == SESSION_TOKEN_KEY || key == keys::PASSWORD;
        let shown = match (secret, value.is_empty()) {
            (true, true) => "<empty>".to_string(),
            (true, false) => "<set>".to_string(),
            (false, _) => value,
        };
        println!("{key}={shown}");
    }
}

fn init_logging(settings: &RunSettings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
