//! Hashing primitives for the proofmint issuance engine.
//!
//! - **Blake2b-256** for every digest
//! - Domain-separated helpers for mint transaction ids, proof references and
//!   audit-chain links, so a digest of one kind can never collide with another

pub mod hash;

pub use hash::{
    audit_link_hash, blake2b_256, blake2b_256_multi, proof_reference, transaction_id,
};
