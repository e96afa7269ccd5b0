//! Server configuration.

use std::time::Duration;

use crate::error::Error;

const ENV_ADDR: &str = "KASANE_ADDR";
const ENV_DRAIN: &str = "KASANE_DRAIN_TIMEOUT_SECS";
const ENV_HTTP1_ONLY: &str = "KASANE_HTTP1_ONLY";

/// HTTP server configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// `host:port` to listen on. Hostnames are resolved at bind time.
    pub addr: String,
    /// Upper bound on how long shutdown waits for in-flight connections.
    /// `None` waits for all of them.
    pub drain_timeout: Option<Duration>,
    /// Serve HTTP/1.1 only instead of negotiating HTTP/1.1 or HTTP/2.
    pub http1_only: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            drain_timeout: None,
            http1_only: false,
        }
    }
}

impl ServerConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), ..Self::default() }
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = Some(timeout);
        self
    }

    pub fn http1_only(mut self, on: bool) -> Self {
        self.http1_only = on;
        self
    }

    /// Defaults overridden by `KASANE_ADDR`, `KASANE_DRAIN_TIMEOUT_SECS`
    /// and `KASANE_HTTP1_ONLY` when set.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_ADDR) {
            config.addr = addr;
        }
        if let Some(secs) = lookup(ENV_DRAIN) {
            let secs: u64 = secs.trim().parse()
                .map_err(|_| Error::config(format!("{ENV_DRAIN} must be whole seconds, got `{secs}`")))?;
            config.drain_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(flag) = lookup(ENV_HTTP1_ONLY) {
            config.http1_only = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => return Err(Error::config(format!("{ENV_HTTP1_ONLY} must be a boolean, got `{other}`"))),
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that `addr` has a numeric port.
    pub fn validate(&self) -> Result<(), Error> {
        let port = self.addr.rsplit_once(':').map(|(_, port)| port);
        match port.map(str::parse::<u16>) {
            Some(Ok(_)) => Ok(()),
            _ => Err(Error::config(format!("invalid listen address `{}`", self.addr))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ENV_ADDR, "127.0.0.1:8080"),
            (ENV_DRAIN, "15"),
            (ENV_HTTP1_ONLY, "TRUE"),
        ]))
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080");
        assert_eq!(config.drain_timeout, Some(Duration::from_secs(15)));
        assert!(config.http1_only);
    }

    #[test]
    fn rejects_bad_values() {
        for pairs in [
            [(ENV_DRAIN, "soon")],
            [(ENV_HTTP1_ONLY, "maybe")],
            [(ENV_ADDR, "localhost")],
            [(ENV_ADDR, "localhost:http")],
        ] {
            let result = ServerConfig::from_lookup(lookup(&pairs));
            assert!(matches!(result, Err(Error::Configuration(_))), "{pairs:?}");
        }
    }

    #[test]
    fn ipv6_addresses_validate() {
        assert!(ServerConfig::new("[::1]:3000").validate().is_ok());
    }
}
