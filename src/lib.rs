//! ForgeChain - state-transition core of a proof-of-stake chain
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Blockchain
//! - [`blockchain`] - Blocks, retargeting, forging rights, acceptance and chain state
//! - [`transaction`] - Transaction variants, validation, duplicates and the reserve/apply lifecycle
//!
//! ## Economics
//! - [`fees`] - Fee schedules per variant and per protocol era
//! - [`ledger`] - Account balances the core mutates
//!
//! ## Cryptography & Encoding
//! - [`crypto`] - Hashing, identifiers and Schnorr signatures (secp256k1)
//! - [`codec`] - Little-endian wire encoding
//!
//! ## Configuration & Utilities
//! - [`config`] - Protocol parameters and era tables
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Blockchain
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Economics
// ============================================================================
pub mod fees;
pub mod ledger;

// ============================================================================
// Cryptography & Encoding
// ============================================================================
pub mod codec;
pub mod crypto;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
