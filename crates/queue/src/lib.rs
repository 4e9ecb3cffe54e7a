//! Job dispatch for activity-relay-rs.
//!
//! This crate bootstraps the Redis-backed job queue from a validated
//! [`relay_common::RelayConfig`]:
//!
//! - **Tasks**: `relay` fan-out and `register` subscription responses
//! - **Jobs**: serializable payloads stored in Redis by apalis
//! - **Dispatch**: [`JobDispatchServer`], the shared producer handle
//!
//! Workers that execute the jobs attach to the same storages through
//! [`JobDispatchServer::relay_storage`] and
//! [`JobDispatchServer::register_storage`].

pub mod dispatch;
pub mod jobs;

pub use dispatch::JobDispatchServer;
pub use jobs::{RegisterJob, RelayJob, Task};
