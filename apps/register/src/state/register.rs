//! # Register State
//!
//! The single `Register` shared by every command.
//!
//! ## Why a tokio Mutex?
//! Validation reads the cash balance and mutation changes it. Both, plus the
//! snapshot write, happen under one lock, so two rapid withdrawals can never
//! both see the pre-mutation balance. The lock is held across the snapshot
//! `.await`, which a `std::sync::Mutex` guard cannot be.

use std::sync::Arc;

use caixa_core::{Register, RegisterSnapshot, ReopenPolicy};
use tokio::sync::{Mutex, MutexGuard};

/// Shared handle to the register.
#[derive(Debug, Clone, Default)]
pub struct RegisterState {
    register: Arc<Mutex<Register>>,
}

impl RegisterState {
    /// Creates an empty register.
    pub fn new(policy: ReopenPolicy) -> Self {
        RegisterState {
            register: Arc::new(Mutex::new(Register::new().with_reopen_policy(policy))),
        }
    }

    /// Restores a register from the last saved snapshot.
    pub fn restore(snapshot: RegisterSnapshot, policy: ReopenPolicy) -> Self {
        RegisterState {
            register: Arc::new(Mutex::new(Register::from_snapshot(snapshot, policy))),
        }
    }

    /// Exclusive access to the register until the guard drops.
    pub async fn lock(&self) -> MutexGuard<'_, Register> {
        self.register.lock().await
    }

    /// Read-only access for queries.
    pub async fn with_register<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Register) -> R,
    {
        let register = self.register.lock().await;
        f(&register)
    }
}
