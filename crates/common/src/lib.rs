//! Configuration and shared types for activity-relay-rs.
//!
//! This crate is the startup gate every other relay component goes through:
//!
//! - **Settings**: raw key/value sources via [`SettingsSource`]
//! - **Configuration**: validated, immutable [`RelayConfig`]
//! - **Error handling**: unified error types via [`RelayError`] and [`RelayResult`]
//! - **Cryptography**: RSA actor key loading and generation
//! - **Broker**: Redis URL validation and reachability probe
//!
//! # Example
//!
//! ```no_run
//! use relay_common::{FileSettings, RelayConfig, RelayResult};
//!
//! async fn example() -> RelayResult<()> {
//!     let settings = FileSettings::from_file("config.yml")?;
//!     let config = RelayConfig::load(&settings).await?;
//!     println!("{}", config.dump_welcome_message("server"));
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod config;
pub mod crypto;
pub mod error;
pub mod settings;

pub use config::{DEFAULT_JOB_CONCURRENCY, RelayConfig, RelaySettings};
pub use crypto::{generate_actor_key, load_actor_key, parse_actor_key, write_actor_key};
pub use error::{RelayError, RelayResult};
pub use settings::{FileSettings, MemorySettings, SettingKey, SettingsSource};
