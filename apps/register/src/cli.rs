//! # Command Line
//!
//! Startup arguments and the line-oriented operator protocol.
//!
//! ## Operator Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stdin (one command per line)        stdout (one JSON object per line) │
//! │  ─────────────────────────────        ───────────────────────────────── │
//! │  start morning                  ──►  {"ok":true,"data":{...},          │
//! │  add Pão de Sal                       "degraded":false,"online":true}  │
//! │  qty 1 3                                                                │
//! │  pay cash                                                               │
//! │  receive 5,00                                                           │
//! │  finalize                       ──►  {"ok":true,"data":{"notice":      │
//! │                                        "Venda finalizada! Troco: ..."}}│
//! │  withdraw 15,00 troco           ──►  {"ok":false,"error":{"code":      │
//! │                                        "VALIDATION_ERROR",...}}        │
//! │  close --yes                                                            │
//! │  quit                                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cart lines are numbered from 1, top of the cart first.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use crate::commands::{cart, sale, shift, supplier, sync, withdrawal};
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Startup Arguments
// =============================================================================

/// Caixa Freitas register.
#[derive(Debug, Clone, Parser)]
#[command(name = "caixa-register", version, about)]
pub struct Cli {
    /// SQLite database file (overrides register.toml)
    #[arg(long, env = "CAIXA_DB_PATH")]
    pub db: Option<PathBuf>,

    /// Register config file (register.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Sync config file (sync.toml)
    #[arg(long)]
    pub sync_config: Option<PathBuf>,

    /// Sync endpoint (overrides sync.toml)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Start with sync disabled; the outbox still fills up
    #[arg(long)]
    pub offline: bool,
}

// =============================================================================
// Operator Commands
// =============================================================================

#[derive(Debug, Parser)]
#[command(multicall = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Show the cart and payment panel
    Cart,
    /// List catalog products
    Catalog,
    /// Add a catalog product by name or number
    Add {
        #[arg(required = true, num_args = 1..)]
        product: Vec<String>,
    },
    /// Add a line with explicit price (name "Outros" makes it ad-hoc)
    Item {
        price: String,
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Add an ad-hoc "Outros" line
    Other { price: String },
    /// Remove a cart line
    Remove { line: usize },
    /// Set a line's quantity (0 removes it)
    Qty {
        line: usize,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Rename an ad-hoc line
    Rename {
        line: usize,
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Change an ad-hoc line's price
    Reprice { line: usize, price: String },
    /// Empty the cart and payment selection
    Clear,
    /// Choose the payment method (cash, card, pix)
    Pay { method: String },
    /// Cash handed over by the customer
    Receive { amount: String },
    /// Finalize the sale
    Finalize,
    /// Open a shift (morning, afternoon)
    Start { shift: String },
    /// Close the active shift
    Close {
        #[arg(long)]
        yes: bool,
    },
    /// Wipe one shift's data
    Reset {
        shift: String,
        #[arg(long)]
        yes: bool,
    },
    /// Active shift and cash balance
    Shift,
    /// Report for a shift (default: active)
    Summary { shift: Option<String> },
    /// Sales per shift
    Overview,
    /// Event history for a shift (default: active)
    History { shift: Option<String> },
    /// Take cash out of the till
    Withdraw {
        amount: String,
        #[arg(num_args = 0..)]
        reason: Vec<String>,
    },
    /// Pay a supplier
    Supplier {
        amount: String,
        /// cash, external or mixed
        #[arg(long, default_value = "cash")]
        source: String,
        /// Cash part of a mixed payment
        #[arg(long)]
        cash: Option<String>,
        /// External part of a mixed payment
        #[arg(long)]
        external: Option<String>,
        #[arg(num_args = 0..)]
        name: Vec<String>,
    },
    /// Sync status
    Status,
    /// Run a sync pass now
    Sync,
    /// Outbox entries waiting for delivery
    Pending,
    /// Leave the register
    #[command(alias = "exit")]
    Quit,
}

/// Parses one operator line. Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ApiError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }

    Line::try_parse_from(words)
        .map(|l| Some(l.command))
        .map_err(|e| ApiError::invalid_command(e.to_string().trim().to_string()))
}

/// 1-based line number to cart index.
fn line_index(line: usize) -> Result<usize, ApiError> {
    line.checked_sub(1)
        .ok_or_else(|| ApiError::validation("cart lines are numbered from 1"))
}

fn joined(words: &[String]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(e.to_string()))
}

// =============================================================================
// Dispatch
// =============================================================================

/// Runs one command against the register.
pub async fn dispatch(state: &AppState, command: Command) -> Result<Value, ApiError> {
    let AppState {
        register,
        store,
        sync,
        config,
    } = state;

    match command {
        Command::Cart => to_value(cart::get_cart(register).await),
        Command::Catalog => to_value(&config.catalog),
        Command::Add { product } => {
            to_value(cart::add_product(register, store, config, &product.join(" ")).await?)
        }
        Command::Item { price, name } => {
            to_value(cart::add_item(register, store, &name.join(" "), &price).await?)
        }
        Command::Other { price } => to_value(cart::add_ad_hoc(register, store, &price).await?),
        Command::Remove { line } => {
            to_value(cart::remove_item(register, store, line_index(line)?).await?)
        }
        Command::Qty { line, quantity } => {
            to_value(cart::set_quantity(register, store, line_index(line)?, quantity).await?)
        }
        Command::Rename { line, name } => to_value(
            cart::rename_item(register, store, line_index(line)?, &name.join(" ")).await?,
        ),
        Command::Reprice { line, price } => {
            to_value(cart::reprice_item(register, store, line_index(line)?, &price).await?)
        }
        Command::Clear => to_value(cart::clear_cart(register, store).await?),

        Command::Pay { method } => to_value(sale::select_payment(register, store, &method).await?),
        Command::Receive { amount } => {
            to_value(sale::set_received(register, store, &amount).await?)
        }
        Command::Finalize => to_value(sale::finalize_sale(register, store, sync).await?),

        Command::Start { shift } => {
            to_value(shift::start_shift(register, store, sync, &shift).await?)
        }
        Command::Close { yes } => to_value(shift::close_shift(register, store, sync, yes).await?),
        Command::Reset { shift, yes } => {
            to_value(shift::reset_shift_data(register, store, &shift, yes).await?)
        }
        Command::Shift => to_value(shift::get_shift(register).await),
        Command::Summary { shift } => {
            to_value(shift::get_summary(register, shift.as_deref()).await?)
        }
        Command::Overview => to_value(shift::get_overview(register).await),
        Command::History { shift } => {
            to_value(shift::get_history(register, shift.as_deref()).await?)
        }

        Command::Withdraw { amount, reason } => {
            let reason = joined(&reason);
            to_value(
                withdrawal::withdraw(register, store, sync, &amount, reason.as_deref()).await?,
            )
        }
        Command::Supplier {
            amount,
            source,
            cash,
            external,
            name,
        } => {
            let name = joined(&name);
            let funding = supplier::FundingInput {
                source: &source,
                cash: cash.as_deref(),
                external: external.as_deref(),
            };
            to_value(
                supplier::pay_supplier(register, store, sync, name.as_deref(), &amount, funding)
                    .await?,
            )
        }

        Command::Status => to_value(sync::get_sync_status(sync).await),
        Command::Sync => to_value(serde_json::json!({ "requested": sync::sync_now(sync) })),
        Command::Pending => to_value(sync::get_pending(store).await?),

        Command::Quit => Ok(Value::Null),
    }
}

// =============================================================================
// Response Envelope
// =============================================================================

/// What gets printed for every command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    /// Local storage failed; the session runs in memory until restart.
    pub degraded: bool,
    /// Last known reachability of the sync endpoint (absent without sync).
    pub online: Option<bool>,
}

impl Response {
    pub async fn build(state: &AppState, result: Result<Value, ApiError>) -> Self {
        let (ok, data, error) = match result {
            Ok(data) => (true, Some(data), None),
            Err(err) => (false, None, Some(err)),
        };
        Response {
            ok,
            data,
            error,
            degraded: state.store.is_degraded(),
            online: state.sync.is_online().await,
        }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"ok":false,"error":{{"code":"INTERNAL","message":"{}"}}}}"#,
                e
            )
        })
    }
}
