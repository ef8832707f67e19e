//! Hashing and secp256k1 signature primitives. The spec treats these as
//! abstract, swappable collaborators (`Hasher`, `Signer`); this crate is
//! the concrete implementation the gateway binds to by default.

pub mod hasher;
pub mod receipt;
pub mod signer;

pub use hasher::{hash_pair, sha256};
pub use receipt::{sign_receipt, Receipt, ReceiptRequest};
pub use signer::{verify, CryptoError, Keypair};
