//! # Repository Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Register command                                                       │
//! │       │                                                                 │
//! │       │  db.state().save(&snapshot)                                     │
//! │       │  db.outbox().enqueue(kind, &payload)                            │
//! │       ▼                                                                 │
//! │  StateRepository              OutboxRepository                          │
//! │  ├── save(snapshot)           ├── enqueue(kind, payload)                │
//! │  ├── load()                   ├── pending()                             │
//! │  └── clear()                  ├── delete(id)                            │
//! │                               ├── mark_failed(id, error)                │
//! │                               └── count_pending()                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (app_state, sync_outbox)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod outbox;
pub mod state;
