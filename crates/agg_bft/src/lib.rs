//! The BFT anchor client abstraction the round manager submits SMT
//! roots through, plus the mock backend used outside production
//! deployments (`USE_MOCK_BFT`).

mod client;
mod mock;

pub use client::{AnchorError, AnchorReceipt, BftAnchorClient};
pub use mock::MockBftAnchorClient;
