//! # Caixa Register Library
//!
//! The register application: wires storage, sync and the operator protocol
//! around the pure logic in `caixa-core`.
//!
//! ## Module Organization
//! ```text
//! caixa_register/
//! ├── lib.rs          ◄─── You are here (startup & run loop)
//! ├── cli.rs          ◄─── Startup args, line protocol, dispatcher
//! ├── state/
//! │   ├── mod.rs      ◄─── State type exports
//! │   ├── register.rs ◄─── Arc<Mutex<Register>>
//! │   ├── store.rs    ◄─── Snapshot persistence, degraded mode
//! │   ├── sync.rs     ◄─── Outbox queueing, backend mirror
//! │   └── config.rs   ◄─── Catalog, reopen policy, db path
//! ├── commands/
//! │   ├── cart.rs     ◄─── Cart Engine commands
//! │   ├── sale.rs     ◄─── Payment and sale finalization
//! │   ├── shift.rs    ◄─── Shift Manager commands and reports
//! │   ├── supplier.rs ◄─── Supplier payments
//! │   ├── withdrawal.rs ◄─ Sangria
//! │   └── sync.rs     ◄─── Sync status
//! └── error.rs        ◄─── API error type for commands
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;

use caixa_db::{Database, DbConfig};
use caixa_sync::{RemoteBackend, RestBackend, SyncAgent, SyncConfig, SyncMode};
use directories::ProjectDirs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use cli::{dispatch, parse_line, Cli, Command, Response};
use state::{AppState, ConfigState, RegisterState, StoreState, SyncState};

/// Runs the register until `quit`, end of input or Ctrl-C.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                       Register Startup                                  │
/// │                                                                         │
/// │  1. Initialize Logging ───────────────────────────────────────────────► │
/// │     • tracing-subscriber with env filter, to stderr                     │
/// │     • Default: info,caixa=debug,sqlx=warn; override with RUST_LOG       │
/// │                                                                         │
/// │  2. Load Configuration ───────────────────────────────────────────────► │
/// │     • register.toml + CAIXA_DB_PATH / CAIXA_REOPEN_POLICY               │
/// │     • sync.toml + CAIXA_SYNC_* / CAIXA_BACKEND_*                        │
/// │                                                                         │
/// │  3. Open Database ────────────────────────────────────────────────────► │
/// │     • SQLite with WAL mode, migrations                                  │
/// │     • Failure: in-memory session, sync disabled, degraded               │
/// │                                                                         │
/// │  4. Restore Register ─────────────────────────────────────────────────► │
/// │     • Last snapshot: cart, payment, ledgers, active shift               │
/// │                                                                         │
/// │  5. Start Sync Agent ─────────────────────────────────────────────────► │
/// │     • Initial pass, interval, reconnect, trigger after enqueue          │
/// │                                                                         │
/// │  6. Read Commands ────────────────────────────────────────────────────► │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Caixa Freitas register");

    let mut config = ConfigState::load(cli.config.clone())?;
    if let Some(db) = &cli.db {
        config.db_path = Some(db.clone());
    }

    let mut sync_config = SyncConfig::load_or_default(cli.sync_config.clone());
    if let Some(endpoint) = &cli.endpoint {
        sync_config.sync.endpoint = Some(endpoint.clone());
    }
    if cli.offline {
        sync_config.sync.mode = SyncMode::Offline;
    }

    let state = build_state(config, sync_config).await;
    info!(degraded = state.store.is_degraded(), "Register ready");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = serve(&state, stdin, stdout) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    state.sync.shutdown().await;
    if let Some(db) = state.store.database() {
        db.close().await;
    }

    info!("Register stopped");
    Ok(())
}

/// Opens storage, restores the register and starts sync.
///
/// Never fails: without a database the session runs in memory.
pub async fn build_state(config: ConfigState, sync_config: SyncConfig) -> AppState {
    let db = match open_database(&config).await {
        Ok(db) => Some(db),
        Err(e) => {
            error!(error = %e, "Could not open local database, running in memory");
            None
        }
    };

    let Some(db) = db else {
        return AppState {
            register: RegisterState::new(config.reopen_policy),
            store: StoreState::in_memory(),
            sync: SyncState::disabled(),
            config: Arc::new(config),
        };
    };

    let store = StoreState::new(db.clone());
    let register = match store.load().await {
        Ok(Some(snapshot)) => {
            info!(saved_at = %snapshot.saved_at, "Register state restored");
            RegisterState::restore(snapshot, config.reopen_policy)
        }
        Ok(None) => {
            debug!("No saved register state");
            RegisterState::new(config.reopen_policy)
        }
        Err(e) => {
            warn!(error = %e, "Saved register state unreadable, starting empty");
            RegisterState::new(config.reopen_policy)
        }
    };

    let sync = start_sync(sync_config, db).await;

    AppState {
        register,
        store,
        sync,
        config: Arc::new(config),
    }
}

async fn open_database(config: &ConfigState) -> anyhow::Result<Database> {
    let path = match &config.db_path {
        Some(path) => path.clone(),
        None => default_database_path()?,
    };
    info!(?path, "Database path determined");

    Ok(Database::new(DbConfig::new(path)).await?)
}

async fn start_sync(config: SyncConfig, db: Database) -> SyncState {
    let backend: Option<Arc<dyn RemoteBackend>> = if config.is_sync_enabled() {
        match RestBackend::from_settings(&config.backend, config.request_timeout()) {
            Ok(Some(backend)) => Some(Arc::new(backend)),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Backend mirror disabled");
                None
            }
        }
    } else {
        None
    };

    let agent = match SyncAgent::new(config, db) {
        Ok(agent) => agent.start().await,
        Err(e) => Err(e),
    };

    match agent {
        Ok(handle) => SyncState::new(Some(handle), backend),
        Err(e) => {
            warn!(error = %e, "Sync agent not started");
            SyncState::new(None, backend)
        }
    }
}

/// Reads commands from `input` and writes one JSON response per line.
pub async fn serve<R, W>(state: &AppState, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let result = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => dispatch(state, command).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            debug!(code = ?e.code, message = %e.message, "Command rejected");
        }

        let response = Response::build(state, result).await;
        output.write_all(response.to_line().as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr; stdout carries only command responses.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caixa=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Platform data directory path for the database.
///
/// - **Linux**: `~/.local/share/caixa/caixa.db`
/// - **macOS**: `~/Library/Application Support/br.freitas.caixa/caixa.db`
/// - **Windows**: `%APPDATA%\freitas\caixa\data\caixa.db`
fn default_database_path() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from("br", "freitas", "caixa")
        .ok_or_else(|| anyhow::anyhow!("Could not determine app data directory"))?;
    Ok(dirs.data_dir().join("caixa.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use caixa_core::{Money, ShiftType, SupplierPaymentSource};
    use caixa_sync::{RemoteSale, RemoteShift, SyncResult};
    use serde_json::Value;
    use std::sync::Mutex;
    use std::time::Duration;

    fn temp_db_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("caixa-register-{}-{}.db", name, std::process::id()))
    }

    fn offline() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.sync.mode = SyncMode::Offline;
        config
    }

    async fn run_script(state: &AppState, script: &str) -> Vec<Value> {
        let mut output = Vec::new();
        serve(state, script.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_serve_script() {
        let (state, _db) = state::tests::test_state().await;

        let responses = run_script(
            &state,
            "start morning\n\nadd Pão de Sal\nqty 1 3\npay cash\nreceive 5,00\nfinalize\nnonsense\nquit\ncart\n",
        )
        .await;

        // Blank line skipped, nothing after quit
        assert_eq!(responses.len(), 7);
        assert!(responses[..6].iter().all(|r| r["ok"] == true));
        assert_eq!(responses[5]["data"]["notice"], "Venda finalizada! Troco: R$ 2,90");
        assert_eq!(responses[6]["ok"], false);
        assert_eq!(responses[6]["error"]["code"], "INVALID_COMMAND");
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let path = temp_db_path("restart");
        let _ = std::fs::remove_file(&path);
        let config = ConfigState {
            db_path: Some(path.clone()),
            ..Default::default()
        };

        let state = build_state(config.clone(), offline()).await;
        assert!(!state.store.is_degraded());
        run_script(&state, "start afternoon\nitem 10,00 Bolo\npay cash\nreceive 10\nfinalize\nadd 1\n").await;
        state.sync.shutdown().await;
        state.store.database().unwrap().close().await;

        let state = build_state(config, offline()).await;
        let responses = run_script(&state, "shift\ncart\npending\n").await;

        assert_eq!(responses[0]["data"]["active"]["shift_type"], "afternoon");
        assert_eq!(responses[0]["data"]["cashBalance"], 1000);
        assert_eq!(responses[1]["data"]["items"][0]["name"], "Pão de Sal");
        assert_eq!(responses[2]["data"].as_array().unwrap().len(), 1);

        state.store.database().unwrap().close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unopenable_database_runs_in_memory() {
        // The parent "directory" is a regular file.
        let blocker = temp_db_path("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let config = ConfigState {
            db_path: Some(blocker.join("caixa.db")),
            ..Default::default()
        };

        let state = build_state(config, offline()).await;
        let responses = run_script(&state, "start morning\nother 2,50\npay card\nfinalize\nstatus\n").await;

        assert!(responses.iter().all(|r| r["degraded"] == true));
        assert_eq!(responses[3]["ok"], true);
        assert!(responses[3]["data"]["outboxId"].is_null());
        assert_eq!(responses[4]["data"]["enabled"], false);

        let _ = std::fs::remove_file(&blocker);
    }

    // -------------------------------------------------------------------------
    // Backend mirroring
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<String>>,
        open: Mutex<Option<RemoteShift>>,
    }

    impl RecordingBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteBackend for RecordingBackend {
        async fn create_shift(&self, shift: ShiftType, _opening: Money) -> SyncResult<RemoteShift> {
            let created = RemoteShift {
                id: "1".into(),
                shift_code: shift.remote_code().into(),
                status: Some("aberto".into()),
            };
            *self.open.lock().unwrap() = Some(created.clone());
            self.calls.lock().unwrap().push(format!("shift:{}", shift.remote_code()));
            Ok(created)
        }

        async fn find_open_shift(&self) -> SyncResult<Option<RemoteShift>> {
            Ok(self.open.lock().unwrap().clone())
        }

        async fn close_shift(&self, _id: &str, closing: Money, _notes: Option<&str>) -> SyncResult<()> {
            *self.open.lock().unwrap() = None;
            self.calls.lock().unwrap().push(format!("close:{}", closing.cents()));
            Ok(())
        }

        async fn create_sale(&self, _shift_id: &str, sale: RemoteSale<'_>) -> SyncResult<String> {
            self.calls.lock().unwrap().push(format!("sale:{}", sale.total.cents()));
            Ok("10".into())
        }

        async fn create_withdrawal(&self, _shift_id: &str, amount: Money, _reason: &str) -> SyncResult<()> {
            self.calls.lock().unwrap().push(format!("withdrawal:{}", amount.cents()));
            Ok(())
        }

        async fn create_supplier_payment(
            &self,
            _shift_id: &str,
            _supplier: &str,
            amount: Money,
            _source: SupplierPaymentSource,
        ) -> SyncResult<()> {
            self.calls.lock().unwrap().push(format!("payment:{}", amount.cents()));
            Ok(())
        }
    }

    async fn wait_for_calls(backend: &RecordingBackend, count: usize) -> Vec<String> {
        for _ in 0..200 {
            if backend.calls().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        backend.calls()
    }

    #[tokio::test]
    async fn test_transactions_are_mirrored() {
        let (mut state, _db) = state::tests::test_state().await;
        let backend = Arc::new(RecordingBackend::default());
        state.sync = SyncState::new(
            state.sync.agent().cloned(),
            Some(backend.clone() as Arc<dyn RemoteBackend>),
        );

        // No waiting between commands: the sale right after start must still
        // find the remote shift that start opened.
        run_script(
            &state,
            "start morning\nitem 8,00 Torta\npay cash\nreceive 8\nfinalize\nwithdraw 3\nclose --yes\n",
        )
        .await;
        let calls = wait_for_calls(&backend, 4).await;

        assert_eq!(
            calls,
            vec!["shift:manha", "sale:800", "withdrawal:300", "close:500"]
        );
    }
}
