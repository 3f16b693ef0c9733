pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod estimate;
pub mod gateway;
pub mod quote;
pub mod store;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use config::WorkflowConfig;
use estimate::{ChannelNotifier, LogNotifier, Notifier};
use gateway::WorkflowGateway;
use store::{RecordStore, SqliteStore};

/// Return the platform-standard data directory for RepairDesk.
///
/// - macOS: `~/Library/Application Support/com.repairdesk/`
/// - Windows: `{FOLDERID_RoamingAppData}\com.repairdesk\`
/// - Linux: `$XDG_DATA_HOME/com.repairdesk/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.repairdesk/` only if none of the above can be resolved.
pub fn data_dir() -> std::path::PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("com.repairdesk");
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".repairdesk")
}

/// Initialize the tracing subscriber on stderr.
///
/// stdout carries gateway responses, so logs never go there. `RUST_LOG`
/// overrides the default filter; `REPAIRDESK_LOG_JSON=1` switches to
/// JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("repairdesk=info,warn"));

    let json = std::env::var("REPAIRDESK_LOG_JSON").is_ok_and(|v| v == "1");
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);

    // try_init: a second call (e.g. from tests) keeps the first subscriber.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %data_dir().display(),
        pid = std::process::id(),
        "=== RepairDesk starting ==="
    );
}

/// Serve the gateway over stdin/stdout, one JSON request per line.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    let config = WorkflowConfig::load_or_default();
    let db_path = config.resolve_database_path();
    let store = Arc::new(SqliteStore::open(&db_path.to_string_lossy())?);
    tracing::info!(db_path = %db_path.display(), "workflow database initialized");

    store.purge_expired(chrono::Utc::now())?;

    // Drain notifications into the log until every sender is gone.
    let (notifier, mut rx) = ChannelNotifier::new();
    let drain = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let _ = LogNotifier.notify(&event);
        }
    });

    let gateway = WorkflowGateway::with_store(store, Arc::new(notifier), config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = gateway.handle_line(&line);
        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
        handled += 1;
    }

    drop(gateway);
    drain.await?;
    tracing::info!(handled, "stdin closed, shutting down");
    Ok(())
}
