//! Broker URL validation and reachability probe.

use std::time::Duration;

use redis::aio::ConnectionLike;
use tracing::debug;
use url::Url;

use crate::settings::SettingKey;
use crate::{RelayError, RelayResult};

/// Upper bound on connecting to the broker and receiving `PONG`.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// URL schemes understood by the Redis client.
pub const BROKER_SCHEMES: &[&str] = &["redis", "rediss", "redis+unix", "unix"];

/// Check that `raw` is a usable broker connection string without touching the network.
pub fn validate_broker_url(raw: &str) -> RelayResult<()> {
    let key = SettingKey::RedisUrl.as_str();

    if raw.trim().is_empty() {
        return Err(RelayError::syntax(key, "broker URL is empty"));
    }

    let url = Url::parse(raw).map_err(|e| RelayError::syntax(key, e.to_string()))?;

    if !BROKER_SCHEMES.contains(&url.scheme()) {
        return Err(RelayError::syntax(
            key,
            format!("unsupported scheme {:?}", url.scheme()),
        ));
    }

    let is_socket = url.scheme().ends_with("unix");
    if !is_socket && url.host_str().is_none_or(str::is_empty) {
        return Err(RelayError::syntax(key, "broker URL has no host"));
    }

    Ok(())
}

/// Send `PING` over an established connection.
pub async fn ping<C: ConnectionLike + Send>(conn: &mut C) -> RelayResult<()> {
    let pong: String = redis::cmd("PING")
        .query_async(conn)
        .await
        .map_err(|e| RelayError::BrokerConnection(format!("PING failed: {e}")))?;

    if pong != "PONG" {
        return Err(RelayError::BrokerConnection(format!(
            "unexpected PING reply {pong:?}"
        )));
    }

    Ok(())
}

/// Connect to the broker at `redis_url` and confirm it answers `PING`.
///
/// # Errors
///
/// Returns [`RelayError::ConfigSyntax`] if the client rejects the URL and
/// [`RelayError::BrokerConnection`] if the broker refuses the connection,
/// does not answer within [`PROBE_TIMEOUT`], or replies with an error.
pub async fn probe_broker(redis_url: &str) -> RelayResult<()> {
    let client = redis::Client::open(redis_url)
        .map_err(|e| RelayError::syntax(SettingKey::RedisUrl.as_str(), e.to_string()))?;

    let probe = async {
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RelayError::BrokerConnection(format!("cannot connect: {e}")))?;
        ping(&mut conn).await
    };

    tokio::time::timeout(PROBE_TIMEOUT, probe)
        .await
        .map_err(|_| {
            RelayError::BrokerConnection(format!(
                "no answer within {}s",
                PROBE_TIMEOUT.as_secs()
            ))
        })??;

    debug!("Broker answered PING");
    Ok(())
}
