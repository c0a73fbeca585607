use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use policyhub::config::AppConfig;

const USAGE: &str = "policyhub\n\nUSAGE:\n  policyhub [--http-port N]\n\nOPTIONS:\n  --http-port N   HTTP port (env: POLICYHUB_HTTP_PORT, default 8080)\n\nENVIRONMENT:\n  POLICYHUB_IDENTITY_API_KEY     identity toolkit web API key (required)\n  POLICYHUB_STORE                firestore (default) or memory\n  POLICYHUB_FIRESTORE_PROJECT    Firestore project (else project_id from the key file)\n  GOOGLE_APPLICATION_CREDENTIALS service-account key file; Firestore tokens are minted from it\n  POLICYHUB_FIRESTORE_TOKEN      fixed bearer token for Firestore (overrides the key file)\n  FIRESTORE_EMULATOR_HOST        host:port of a Firestore emulator (no credentials needed)\n  POLICYHUB_MEMORY_SEED          JSON seed file for the memory store\n  RUST_LOG                       log filter (default info)\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let mut config = AppConfig::from_env()?;
    config.apply_args(&args)?;

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "policyhub",
        "policyhub starting: RUST_LOG='{}', bind='{}', store={:?}, identity_base='{}', timeout_ms={}",
        rust_log,
        config.bind_addr(),
        config.store,
        config.identity.base_url,
        config.request_timeout.as_millis()
    );

    policyhub::server::run(config).await
}
