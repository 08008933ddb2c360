//! # State Module
//!
//! Application state for the register.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌────────────┐  │
//! │  │RegisterState │  │  StoreState  │  │  SyncState   │  │ConfigState │  │
//! │  │              │  │              │  │              │  │            │  │
//! │  │  Arc<Mutex<  │  │  Database +  │  │  agent handle│  │  catalog   │  │
//! │  │   Register   │  │  degraded    │  │  + backend   │  │  reopen    │  │
//! │  │  >>          │  │  flag        │  │  mirror      │  │  policy    │  │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └────────────┘  │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • RegisterState: every mutation holds the mutex through persist       │
//! │  • StoreState: pool is thread-safe, degraded flag is atomic            │
//! │  • SyncState: handle is Clone + Send, agent runs on its own task       │
//! │  • ConfigState: read-only after initialization                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod register;
mod store;
mod sync;

pub use config::ConfigState;
pub use register::RegisterState;
pub use store::{PersistOutcome, StoreState};
pub use sync::SyncState;

/// Everything a command may need, bundled for the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub register: RegisterState,
    pub store: StoreState,
    pub sync: SyncState,
    pub config: std::sync::Arc<ConfigState>,
}
