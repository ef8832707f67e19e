//! TTL-fenced leader election: the `LeaderElector` task for HA
//! deployments, and a permanently-leader role channel for standalone mode.

mod elector;
mod role;

pub use elector::LeaderElector;
pub use role::{static_leader, LeaderRole};
