// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Zenwallet — Core Library
//!
//! A signed token ledger. Clients credit or debit an `(owner, token)`
//! balance by sending a JSON body together with a detached Ed25519
//! signature; the ledger keeps every accepted operation forever and
//! derives balances from them on demand.
//!
//! ## Architecture
//!
//! - **config** — protocol constants, authentication modes, timeouts.
//! - **crypto** — keys, detached signatures, the verification engine.
//! - **identity** — where signer keys come from (directory or DID).
//! - **auth** — resolve key, then ask the engine for a verdict.
//! - **transaction** — the ledger record and the credit request body.
//! - **storage** — sled persistence and the `LedgerStore` on top of it.
//! - **service** — the three ledger operations, composed from the above.
//!
//! ## Rules
//!
//! 1. Nothing is appended unless its signature was verified first.
//! 2. Records are never updated or deleted.
//! 3. Amounts are `i64`. No floats.
//! 4. The only retry in the system is the startup connection loop.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod service;
pub mod storage;
pub mod transaction;
