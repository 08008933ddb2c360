//! # Relational Backend Mirror
//!
//! Mirrors shifts and transactions into a PostgREST backend (tables
//! `turnos`, `vendas`, `itens_venda`, `sangrias`, `pagamentos_fornecedor`).
//! This runs beside the outbox, never instead of it: the outbox is the
//! durable path, the mirror is best-effort.
//!
//! ## Mirror Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ShiftOpened(morning)                                                   │
//! │     GET turnos?status=eq.aberto&order=data_abertura.desc&limit=1        │
//! │       ├── open row with tipo "manha" → reuse it                         │
//! │       └── otherwise → POST turnos {tipo, valor_inicial, status}         │
//! │                                                                         │
//! │  Event(sale | payment | withdrawal)                                     │
//! │     GET open turno ── none, or other tipo → skipped (logged)            │
//! │       └── POST vendas (+ itens_venda) | pagamentos_fornecedor |         │
//! │           sangrias   with turno_id                                      │
//! │                                                                         │
//! │  ShiftClosed                                                            │
//! │     GET open turno ── same tipo → PATCH turnos?id=eq.{id}               │
//! │                                                                         │
//! │  Actions go through one MirrorQueue task, in the order pushed.          │
//! │  Failures are logged at warn and never reach the operator.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use caixa_core::{
    LedgerEvent, Money, PaymentMethod, SaleLine, ShiftType, SupplierPaymentSource,
};

use crate::config::{parse_http_url, BackendSettings};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Remote Records
// =============================================================================

/// A `turnos` row as returned by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteShift {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,

    /// `manha` or `tarde`.
    #[serde(rename = "tipo")]
    pub shift_code: String,

    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedRow {
    #[serde(deserialize_with = "id_from_any")]
    id: String,
}

/// Row ids may be serial integers or uuids depending on the schema.
fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AnyId {
        Int(i64),
        Text(String),
    }

    Ok(match AnyId::deserialize(deserializer)? {
        AnyId::Int(n) => n.to_string(),
        AnyId::Text(s) => s,
    })
}

/// A sale as the backend stores it.
#[derive(Debug, Clone, Copy)]
pub struct RemoteSale<'a> {
    pub total: Money,
    pub method: PaymentMethod,
    pub received: Money,
    pub change: Money,
    pub items: &'a [SaleLine],
}

// -----------------------------------------------------------------------------
// Request bodies (column names are the backend's)
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct NewShiftRow<'a> {
    tipo: &'a str,
    valor_inicial: f64,
    status: &'a str,
}

#[derive(Debug, Serialize)]
struct CloseShiftRow<'a> {
    status: &'a str,
    data_fechamento: DateTime<Utc>,
    valor_final: f64,
    observacoes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct NewSaleRow<'a> {
    turno_id: &'a str,
    total: f64,
    metodo_pagamento: &'a str,
    valor_recebido: Option<f64>,
    troco: Option<f64>,
    valor_dinheiro: Option<f64>,
    valor_cartao: Option<f64>,
    observacoes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct NewSaleItemRow<'a> {
    venda_id: &'a str,
    produto_nome: &'a str,
    quantidade: i64,
    preco_unitario: f64,
    total: f64,
}

#[derive(Debug, Serialize)]
struct NewWithdrawalRow<'a> {
    turno_id: &'a str,
    valor: f64,
    motivo: &'a str,
}

#[derive(Debug, Serialize)]
struct NewSupplierPaymentRow<'a> {
    turno_id: &'a str,
    fornecedor: &'a str,
    valor: f64,
    tipo_pagamento: &'a str,
    observacoes: Option<&'a str>,
}

/// The backend stores numeric reais.
fn decimal(amount: Money) -> f64 {
    amount.cents() as f64 / 100.0
}

// =============================================================================
// Backend Trait
// =============================================================================

/// Operations the mirror needs from a relational backend.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn create_shift(&self, shift: ShiftType, opening: Money) -> SyncResult<RemoteShift>;

    /// Most recently opened shift still marked open, if any.
    async fn find_open_shift(&self) -> SyncResult<Option<RemoteShift>>;

    async fn close_shift(
        &self,
        remote_id: &str,
        closing: Money,
        notes: Option<&str>,
    ) -> SyncResult<()>;

    /// Creates the sale and its line items; returns the sale's remote id.
    async fn create_sale(&self, remote_shift_id: &str, sale: RemoteSale<'_>) -> SyncResult<String>;

    async fn create_withdrawal(
        &self,
        remote_shift_id: &str,
        amount: Money,
        reason: &str,
    ) -> SyncResult<()>;

    async fn create_supplier_payment(
        &self,
        remote_shift_id: &str,
        supplier: &str,
        amount: Money,
        source: SupplierPaymentSource,
    ) -> SyncResult<()>;
}

// =============================================================================
// PostgREST Implementation
// =============================================================================

pub struct RestBackend {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: &str, timeout: Option<Duration>) -> SyncResult<Self> {
        let mut base_url = parse_http_url(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(RestBackend {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Builds a backend from settings; `None` when mirroring is not configured.
    pub fn from_settings(
        settings: &BackendSettings,
        timeout: Option<Duration>,
    ) -> SyncResult<Option<Self>> {
        match (&settings.url, &settings.api_key) {
            (Some(url), Some(key)) if settings.is_configured() => {
                Ok(Some(Self::new(url, key, timeout)?))
            }
            _ => Ok(None),
        }
    }

    /// `{base}/rest/v1/{table_and_query}`
    pub fn table_url(&self, table_and_query: &str) -> SyncResult<Url> {
        Ok(self.base_url.join("rest/v1/")?.join(table_and_query)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| SyncError::DeserializationFailed(e.to_string()))
    }

    /// POSTs rows and returns the first row echoed back.
    async fn insert<B: Serialize + ?Sized>(&self, table: &str, body: &B) -> SyncResult<CreatedRow> {
        let url = self.table_url(table)?;
        let rows: Vec<CreatedRow> = self.send(self.request(Method::POST, url).json(body)).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SyncError::UnexpectedResponse(format!("{} insert returned no rows", table)))
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn create_shift(&self, shift: ShiftType, opening: Money) -> SyncResult<RemoteShift> {
        let url = self.table_url("turnos")?;
        let body = NewShiftRow {
            tipo: shift.remote_code(),
            valor_inicial: decimal(opening),
            status: "aberto",
        };

        let rows: Vec<RemoteShift> = self.send(self.request(Method::POST, url).json(&body)).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SyncError::UnexpectedResponse("turnos insert returned no rows".into()))
    }

    async fn find_open_shift(&self) -> SyncResult<Option<RemoteShift>> {
        let url = self.table_url("turnos?status=eq.aberto&order=data_abertura.desc&limit=1")?;
        let rows: Vec<RemoteShift> = self.send(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next())
    }

    async fn close_shift(
        &self,
        remote_id: &str,
        closing: Money,
        notes: Option<&str>,
    ) -> SyncResult<()> {
        let url = self.table_url(&format!("turnos?id=eq.{}", remote_id))?;
        let body = CloseShiftRow {
            status: "fechado",
            data_fechamento: Utc::now(),
            valor_final: decimal(closing),
            observacoes: notes,
        };

        let _: serde_json::Value = self.send(self.request(Method::PATCH, url).json(&body)).await?;
        Ok(())
    }

    async fn create_sale(&self, remote_shift_id: &str, sale: RemoteSale<'_>) -> SyncResult<String> {
        let is_cash = sale.method == PaymentMethod::Cash;
        let row = NewSaleRow {
            turno_id: remote_shift_id,
            total: decimal(sale.total),
            metodo_pagamento: sale.method.remote_code(),
            valor_recebido: is_cash.then(|| decimal(sale.received)),
            troco: is_cash.then(|| decimal(sale.change)),
            valor_dinheiro: is_cash.then(|| decimal(sale.total)),
            valor_cartao: (!is_cash).then(|| decimal(sale.total)),
            observacoes: None,
        };

        let created = self.insert("vendas", &row).await?;

        if !sale.items.is_empty() {
            let items: Vec<NewSaleItemRow<'_>> = sale
                .items
                .iter()
                .map(|line| NewSaleItemRow {
                    venda_id: &created.id,
                    produto_nome: &line.name,
                    quantidade: line.quantity,
                    preco_unitario: decimal(line.unit_price),
                    total: decimal(line.total),
                })
                .collect();
            self.insert("itens_venda", &items).await?;
        }

        Ok(created.id)
    }

    async fn create_withdrawal(
        &self,
        remote_shift_id: &str,
        amount: Money,
        reason: &str,
    ) -> SyncResult<()> {
        let row = NewWithdrawalRow {
            turno_id: remote_shift_id,
            valor: decimal(amount),
            motivo: reason,
        };
        self.insert("sangrias", &row).await?;
        Ok(())
    }

    async fn create_supplier_payment(
        &self,
        remote_shift_id: &str,
        supplier: &str,
        amount: Money,
        source: SupplierPaymentSource,
    ) -> SyncResult<()> {
        let row = NewSupplierPaymentRow {
            turno_id: remote_shift_id,
            fornecedor: supplier,
            valor: decimal(amount),
            tipo_pagamento: source.remote_code(),
            observacoes: None,
        };
        self.insert("pagamentos_fornecedor", &row).await?;
        Ok(())
    }
}

// =============================================================================
// Mirroring
// =============================================================================

/// Something the register did that the backend should reflect.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorAction {
    ShiftOpened(ShiftType),
    ShiftClosed {
        shift: ShiftType,
        cash_balance: Money,
    },
    Event(LedgerEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Mirrored,
    /// The matching remote shift was already open.
    AlreadyOpen,
    /// No open remote shift of the event's type to attach the record to.
    NoOpenShift,
}

/// Applies one action against the backend.
pub async fn mirror(backend: &dyn RemoteBackend, action: &MirrorAction) -> SyncResult<MirrorOutcome> {
    match action {
        MirrorAction::ShiftOpened(shift) => {
            if let Some(open) = backend.find_open_shift().await? {
                if open.shift_code == shift.remote_code() {
                    debug!(remote_id = %open.id, "Remote shift already open");
                    return Ok(MirrorOutcome::AlreadyOpen);
                }
            }
            let created = backend.create_shift(*shift, Money::zero()).await?;
            info!(remote_id = %created.id, shift = %shift, "Remote shift opened");
            Ok(MirrorOutcome::Mirrored)
        }

        MirrorAction::ShiftClosed {
            shift,
            cash_balance,
        } => match backend.find_open_shift().await? {
            Some(open) if open.shift_code == shift.remote_code() => {
                backend.close_shift(&open.id, *cash_balance, None).await?;
                info!(remote_id = %open.id, shift = %shift, "Remote shift closed");
                Ok(MirrorOutcome::Mirrored)
            }
            _ => Ok(MirrorOutcome::NoOpenShift),
        },

        MirrorAction::Event(event) => {
            let open = match backend.find_open_shift().await? {
                Some(open) if open.shift_code == event.shift().remote_code() => open,
                _ => return Ok(MirrorOutcome::NoOpenShift),
            };

            match event {
                LedgerEvent::Sale {
                    items,
                    total,
                    method,
                    received,
                    change,
                    ..
                } => {
                    let sale = RemoteSale {
                        total: *total,
                        method: *method,
                        received: *received,
                        change: *change,
                        items,
                    };
                    let remote_id = backend.create_sale(&open.id, sale).await?;
                    debug!(remote_id = %remote_id, "Sale mirrored");
                }
                LedgerEvent::SupplierPayment {
                    supplier,
                    amount,
                    source,
                    ..
                } => {
                    backend
                        .create_supplier_payment(&open.id, supplier, *amount, *source)
                        .await?;
                }
                LedgerEvent::Withdrawal { amount, reason, .. } => {
                    backend.create_withdrawal(&open.id, *amount, reason).await?;
                }
            }
            Ok(MirrorOutcome::Mirrored)
        }
    }
}

/// Ordered, best-effort mirroring.
///
/// One background task applies actions in the order they were pushed, so a
/// sale rung up right after `start` sees the remote shift the start created.
/// Failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct MirrorQueue {
    tx: mpsc::UnboundedSender<MirrorAction>,
}

impl MirrorQueue {
    /// Starts the mirror task. It ends when every queue clone is dropped.
    pub fn spawn(backend: Arc<dyn RemoteBackend>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<MirrorAction>();

        tokio::spawn(async move {
            while let Some(action) = rx.recv().await {
                match mirror(backend.as_ref(), &action).await {
                    Ok(MirrorOutcome::NoOpenShift) => {
                        warn!(?action, "No matching open remote shift, record not mirrored");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, ?action, "Backend mirror failed");
                    }
                }
            }
            debug!("Mirror queue closed");
        });

        MirrorQueue { tx }
    }

    /// Queues an action behind everything pushed before it.
    pub fn push(&self, action: MirrorAction) {
        if let Err(e) = self.tx.send(action) {
            warn!(action = ?e.0, "Mirror task stopped, action dropped");
        }
    }
}
