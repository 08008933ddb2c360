//! # Caixa Freitas Register
//!
//! Entry point. Reads one command per line from stdin and answers with one
//! JSON object per line on stdout; logs go to stderr.
//!
//! ```text
//! $ caixa-register --offline
//! start morning
//! add Pão de Sal
//! qty 1 3
//! pay cash
//! receive 5,00
//! finalize
//! ```

use clap::Parser;

use caixa_register::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    caixa_register::run(Cli::parse()).await
}
