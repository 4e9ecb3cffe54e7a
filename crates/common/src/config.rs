//! Relay configuration.
//!
//! Loading happens in two stages. [`RelaySettings::from_source`] checks the
//! syntax of every value without any I/O. [`RelayConfig::load`] then reads
//! the actor key from disk and probes the broker, and only returns a
//! configuration when every step succeeded.

use std::net::SocketAddr;
use std::path::PathBuf;

use rsa::RsaPrivateKey;
use tracing::info;
use url::Url;

use crate::settings::{SettingKey, SettingsSource};
use crate::{RelayError, RelayResult, broker, crypto};

/// Worker concurrency used when `JOB_CONCURRENCY` is unset.
pub const DEFAULT_JOB_CONCURRENCY: usize = 50;

/// Syntactically validated settings.
///
/// Produced without touching the filesystem or network. The only way to get
/// one is [`RelaySettings::from_source`], and the only way to turn one into a
/// [`RelayConfig`] is [`RelayConfig::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Listener address, verbatim.
    pub(crate) server_bind: String,
    /// Public origin of the relay actor.
    pub(crate) domain: Url,
    /// Display name.
    pub(crate) service_name: String,
    /// Display summary.
    pub(crate) service_summary: String,
    /// Icon URL.
    pub(crate) service_icon_url: Url,
    /// Header image URL.
    pub(crate) service_image_url: Url,
    /// Path of the actor key file.
    pub(crate) actor_key_path: PathBuf,
    /// Broker connection string, verbatim.
    pub(crate) redis_url: String,
    /// Worker concurrency.
    pub(crate) job_concurrency: usize,
}

impl RelaySettings {
    /// Read and check every setting from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Key`] when no actor key path is set and
    /// [`RelayError::ConfigSyntax`] for the first malformed value.
    pub fn from_source<S: SettingsSource + ?Sized>(source: &S) -> RelayResult<Self> {
        let value = |key: SettingKey| source.get(key).unwrap_or_default();

        let actor_key_path = value(SettingKey::ActorPem);
        if actor_key_path.trim().is_empty() {
            return Err(RelayError::Key(format!(
                "{} is not set",
                SettingKey::ActorPem
            )));
        }

        let redis_url = value(SettingKey::RedisUrl);
        broker::validate_broker_url(&redis_url)?;

        let service_icon_url =
            parse_absolute_url(SettingKey::RelayIcon, &value(SettingKey::RelayIcon))?;
        let service_image_url =
            parse_absolute_url(SettingKey::RelayImage, &value(SettingKey::RelayImage))?;
        let domain = parse_domain(&value(SettingKey::RelayDomain))?;
        let server_bind = parse_bind_address(&value(SettingKey::RelayBind))?;
        let job_concurrency = parse_job_concurrency(source.get(SettingKey::JobConcurrency))?;

        Ok(Self {
            server_bind,
            domain,
            service_name: value(SettingKey::RelayServiceName),
            service_summary: value(SettingKey::RelaySummary),
            service_icon_url,
            service_image_url,
            actor_key_path: PathBuf::from(actor_key_path),
            redis_url,
            job_concurrency,
        })
    }
}

fn parse_absolute_url(key: SettingKey, raw: &str) -> RelayResult<Url> {
    if raw.trim().is_empty() {
        return Err(RelayError::syntax(key.as_str(), "URL is empty"));
    }

    let url = Url::parse(raw).map_err(|e| RelayError::syntax(key.as_str(), e.to_string()))?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(RelayError::syntax(key.as_str(), "URL has no host"));
    }

    Ok(url)
}

/// Accepts `relay.example.org`, `relay.example.org:8443` or a full
/// `https://relay.example.org` origin. Anything past the origin is rejected.
fn parse_domain(raw: &str) -> RelayResult<Url> {
    let key = SettingKey::RelayDomain.as_str();
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(RelayError::syntax(key, "domain is empty"));
    }

    let url = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("https://{raw}"))
    }
    .map_err(|e| RelayError::syntax(key, e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RelayError::syntax(
            key,
            format!("unsupported scheme {:?}", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(RelayError::syntax(key, "domain has no host"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(RelayError::syntax(key, "domain must not contain a path"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(RelayError::syntax(key, "domain must not contain credentials"));
    }

    Ok(url)
}

fn parse_bind_address(raw: &str) -> RelayResult<String> {
    let key = SettingKey::RelayBind.as_str();

    if raw.parse::<SocketAddr>().is_ok() {
        return Ok(raw.to_string());
    }

    let (host, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| RelayError::syntax(key, format!("{raw:?} is not host:port")))?;

    if host.is_empty() || host.contains(|c: char| c.is_whitespace() || c == ':' || c == '/') {
        return Err(RelayError::syntax(key, format!("invalid host {host:?}")));
    }
    port.parse::<u16>()
        .map_err(|_| RelayError::syntax(key, format!("invalid port {port:?}")))?;

    Ok(raw.to_string())
}

fn parse_job_concurrency(raw: Option<String>) -> RelayResult<usize> {
    let key = SettingKey::JobConcurrency.as_str();

    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(DEFAULT_JOB_CONCURRENCY),
        Some(value) => match value.parse::<usize>() {
            Ok(0) => Err(RelayError::syntax(key, "must be at least 1")),
            Ok(n) => Ok(n),
            Err(e) => Err(RelayError::syntax(key, e.to_string())),
        },
    }
}

/// Validated relay configuration.
///
/// Built once at startup and never mutated. Share it with `Arc` or plain
/// references; every accessor is a read-only projection.
///
/// [`RelayConfig::load`] is the only public constructor:
///
/// ```compile_fail
/// # fn build(settings: relay_common::RelaySettings, key: rsa::RsaPrivateKey) {
/// let config = relay_common::RelayConfig::from_parts(settings, key);
/// # }
/// ```
///
/// ```compile_fail
/// let settings = relay_common::RelaySettings {
///     server_bind: String::new(),
///     ..todo!()
/// };
/// ```
#[derive(Clone)]
pub struct RelayConfig {
    server_bind: String,
    domain: Url,
    service_name: String,
    service_summary: String,
    service_icon_url: Url,
    service_image_url: Url,
    actor_key: RsaPrivateKey,
    redis_url: String,
    job_concurrency: usize,
}

impl RelayConfig {
    /// Build the configuration from `source`.
    ///
    /// Values are checked first, then the actor key is loaded, then the
    /// broker is asked to answer `PING`. The first failure is returned.
    ///
    /// # Errors
    ///
    /// - [`RelayError::ConfigSyntax`] for malformed or empty values
    /// - [`RelayError::Key`] when the actor key is missing, unreadable or not RSA
    /// - [`RelayError::BrokerConnection`] when the broker cannot be reached
    pub async fn load<S: SettingsSource + ?Sized>(source: &S) -> RelayResult<Self> {
        let settings = RelaySettings::from_source(source)?;
        let actor_key = crypto::load_actor_key(&settings.actor_key_path).await?;
        broker::probe_broker(&settings.redis_url).await?;

        let config = Self::from_parts(settings, actor_key);
        info!(
            domain = %config.domain_host(),
            bind = %config.server_bind,
            "Relay configuration loaded"
        );

        Ok(config)
    }

    /// Combine checked settings with an already loaded key.
    #[must_use]
    pub(crate) fn from_parts(settings: RelaySettings, actor_key: RsaPrivateKey) -> Self {
        Self {
            server_bind: settings.server_bind,
            domain: settings.domain,
            service_name: settings.service_name,
            service_summary: settings.service_summary,
            service_icon_url: settings.service_icon_url,
            service_image_url: settings.service_image_url,
            actor_key,
            redis_url: settings.redis_url,
            job_concurrency: settings.job_concurrency,
        }
    }

    /// Listener address, exactly as configured.
    #[must_use]
    pub fn server_bind(&self) -> &str {
        &self.server_bind
    }

    /// Public origin of the relay actor.
    #[must_use]
    pub const fn server_hostname(&self) -> &Url {
        &self.domain
    }

    /// Host component of [`RelayConfig::server_hostname`].
    #[must_use]
    pub fn domain_host(&self) -> &str {
        self.domain.host_str().unwrap_or_default()
    }

    /// Display name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Display summary.
    #[must_use]
    pub fn service_summary(&self) -> &str {
        &self.service_summary
    }

    /// Icon URL.
    #[must_use]
    pub const fn service_icon_url(&self) -> &Url {
        &self.service_icon_url
    }

    /// Header image URL.
    #[must_use]
    pub const fn service_image_url(&self) -> &Url {
        &self.service_image_url
    }

    /// Private key used to sign outgoing requests.
    #[must_use]
    pub const fn actor_key(&self) -> &RsaPrivateKey {
        &self.actor_key
    }

    /// SPKI PEM of the actor's public key.
    pub fn actor_public_key_pem(&self) -> RelayResult<String> {
        crypto::public_key_pem(&self.actor_key)
    }

    /// Broker connection string, exactly as configured.
    #[must_use]
    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    /// Worker concurrency.
    #[must_use]
    pub const fn job_concurrency(&self) -> usize {
        self.job_concurrency
    }

    /// Human readable startup banner for `module_name`.
    #[must_use]
    pub fn dump_welcome_message(&self, module_name: &str) -> String {
        format!(
            "Welcome to Activity-Relay [{module_name}]\n\
             - Configuration\n\
             RELAY NAME      : {}\n\
             RELAY DOMAIN    : {}\n\
             REDIS URL       : {}\n\
             BIND ADDRESS    : {}\n\
             JOB CONCURRENCY : {}\n",
            self.service_name,
            self.domain_host(),
            self.redis_url,
            self.server_bind,
            self.job_concurrency,
        )
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("server_bind", &self.server_bind)
            .field("domain", &self.domain.as_str())
            .field("service_name", &self.service_name)
            .field("service_icon_url", &self.service_icon_url.as_str())
            .field("service_image_url", &self.service_image_url.as_str())
            .field("redis_url", &self.redis_url)
            .field("job_concurrency", &self.job_concurrency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::settings::MemorySettings;

    fn valid_settings() -> MemorySettings {
        MemorySettings::new()
            .with(SettingKey::ActorPem, "actor.pem")
            .with(SettingKey::RedisUrl, "redis://localhost:6379")
            .with(SettingKey::RelayBind, "0.0.0.0:8080")
            .with(SettingKey::RelayDomain, "relay.example.org")
            .with(SettingKey::RelayServiceName, "Example Relay")
            .with(SettingKey::RelaySummary, "Example Relay is running")
            .with(SettingKey::RelayIcon, "https://example.com/example_icon.png")
            .with(SettingKey::RelayImage, "https://example.com/example_image.png")
    }

    fn test_key() -> RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| {
            crypto::parse_actor_key(include_str!("../tests/fixtures/actor.pem")).unwrap()
        })
        .clone()
    }

    fn test_config() -> RelayConfig {
        let settings = RelaySettings::from_source(&valid_settings()).unwrap();
        RelayConfig::from_parts(settings, test_key())
    }

    fn syntax_key(err: &RelayError) -> Option<&'static str> {
        match err {
            RelayError::ConfigSyntax { key, .. } => Some(key),
            _ => None,
        }
    }

    #[test]
    fn test_valid_settings() {
        let settings = RelaySettings::from_source(&valid_settings()).unwrap();

        assert_eq!(settings.server_bind, "0.0.0.0:8080");
        assert_eq!(settings.domain.host_str(), Some("relay.example.org"));
        assert_eq!(settings.service_name, "Example Relay");
        assert_eq!(settings.service_summary, "Example Relay is running");
        assert_eq!(
            settings.service_icon_url.as_str(),
            "https://example.com/example_icon.png"
        );
        assert_eq!(
            settings.service_image_url.as_str(),
            "https://example.com/example_image.png"
        );
        assert_eq!(settings.actor_key_path, PathBuf::from("actor.pem"));
        assert_eq!(settings.redis_url, "redis://localhost:6379");
        assert_eq!(settings.job_concurrency, DEFAULT_JOB_CONCURRENCY);
    }

    #[test]
    fn test_display_strings_may_be_empty() {
        let mut source = valid_settings();
        source.remove(SettingKey::RelayServiceName);
        source.set(SettingKey::RelaySummary, "");

        let settings = RelaySettings::from_source(&source).unwrap();
        assert_eq!(settings.service_name, "");
        assert_eq!(settings.service_summary, "");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = [
            (SettingKey::RedisUrl, ""),
            (SettingKey::RedisUrl, "not a url"),
            (SettingKey::RelayIcon, ""),
            (SettingKey::RelayIcon, "/relative/icon.png"),
            (SettingKey::RelayImage, ""),
            (SettingKey::RelayImage, "example_image.png"),
            (SettingKey::RelayDomain, ""),
            (SettingKey::RelayDomain, "relay.example.org/inbox"),
            (SettingKey::RelayDomain, "ftp://relay.example.org"),
            (SettingKey::RelayBind, ""),
            (SettingKey::RelayBind, "0.0.0.0"),
            (SettingKey::RelayBind, "0.0.0.0:http"),
            (SettingKey::RelayBind, "0.0.0.0:70000"),
            (SettingKey::RelayBind, ":8080"),
            (SettingKey::JobConcurrency, "0"),
            (SettingKey::JobConcurrency, "many"),
        ];

        for (key, value) in cases {
            let mut source = valid_settings();
            let original = source.set(key, value).unwrap_or_default();

            let err = RelaySettings::from_source(&source).unwrap_err();
            assert_eq!(syntax_key(&err), Some(key.as_str()), "{key}={value:?}: {err:?}");

            source.set(key, original);
            assert!(RelaySettings::from_source(&source).is_ok(), "{key} restore failed");
        }
    }

    #[test]
    fn test_missing_actor_key_path() {
        let mut source = valid_settings();
        source.remove(SettingKey::ActorPem);

        let err = RelaySettings::from_source(&source).unwrap_err();
        assert!(matches!(err, RelayError::Key(_)));
    }

    #[test]
    fn test_domain_forms() {
        for (raw, host) in [
            ("relay.example.org", "relay.example.org"),
            ("relay.example.org:8443", "relay.example.org"),
            ("https://relay.example.org", "relay.example.org"),
            ("https://relay.example.org/", "relay.example.org"),
        ] {
            let source = valid_settings().with(SettingKey::RelayDomain, raw);
            let settings = RelaySettings::from_source(&source).unwrap();
            assert_eq!(settings.domain.host_str(), Some(host), "{raw}");
        }
    }

    #[test]
    fn test_bind_address_forms() {
        for raw in ["0.0.0.0:8080", "[::1]:8080", "localhost:3000", "relay-web:80"] {
            let source = valid_settings().with(SettingKey::RelayBind, raw);
            let settings = RelaySettings::from_source(&source).unwrap();
            assert_eq!(settings.server_bind, raw);
        }
    }

    #[test]
    fn test_job_concurrency_setting() {
        let source = valid_settings().with(SettingKey::JobConcurrency, " 8 ");
        let settings = RelaySettings::from_source(&source).unwrap();
        assert_eq!(settings.job_concurrency, 8);
    }

    #[test]
    fn test_accessors() {
        let config = test_config();

        assert_eq!(config.server_bind(), "0.0.0.0:8080");
        assert_eq!(config.server_hostname().host_str(), Some("relay.example.org"));
        assert_eq!(config.domain_host(), "relay.example.org");
        assert_eq!(config.service_name(), "Example Relay");
        assert_eq!(config.service_summary(), "Example Relay is running");
        assert_eq!(config.redis_url(), "redis://localhost:6379");
        assert_eq!(config.job_concurrency(), DEFAULT_JOB_CONCURRENCY);
        assert!(
            config
                .actor_public_key_pem()
                .unwrap()
                .contains("BEGIN PUBLIC KEY")
        );
    }

    #[test]
    fn test_dump_welcome_message() {
        let config = test_config();
        let message = config.dump_welcome_message("worker");

        for expected in [
            "worker",
            "Example Relay",
            "relay.example.org",
            "redis://localhost:6379",
            "0.0.0.0:8080",
        ] {
            assert!(message.contains(expected), "missing {expected:?} in {message}");
        }
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", test_config());
        assert!(rendered.contains("relay.example.org"));
        assert!(!rendered.contains("actor_key"));
    }

    #[test]
    fn test_config_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RelayConfig>();
    }
}
