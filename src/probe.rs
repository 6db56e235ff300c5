//! Binary DNS health probe.
//!
//! Every way a query can go wrong (timeout, refused, malformed reply,
//! NXDOMAIN, empty answer) maps to [`ProbeOutcome::Failure`]. The caller
//! only needs to know whether the nameserver is usable right now.

use hickory_resolver::config::{NameServerConfig, ResolveHosts, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::Resolver;
use std::fmt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Standard DNS port.
pub const DNS_PORT: u16 = 53;

/// Why a probe failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// No nameserver was configured; nothing was sent.
    NoNameservers,
    /// The primary is not an IP literal.
    InvalidAddress(String),
    /// The query completed with no records.
    EmptyAnswer,
    /// The query itself failed.
    Query(String),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNameservers => f.write_str("no nameservers configured"),
            Self::InvalidAddress(addr) => write!(f, "invalid nameserver address {addr:?}"),
            Self::EmptyAnswer => f.write_str("empty answer"),
            Self::Query(e) => write!(f, "query failed: {e}"),
        }
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The nameserver answered with at least one record.
    Success,
    /// The nameserver is not usable.
    Failure(ProbeFailure),
}

impl ProbeOutcome {
    /// Returns `true` for [`ProbeOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Checks whether a nameserver answers queries.
pub trait HealthProbe {
    /// Queries `dns_name` against `nameservers[0]` only.
    ///
    /// Implementations must return [`ProbeFailure::NoNameservers`] without
    /// any network I/O when `nameservers` is empty.
    fn probe(&self, dns_name: &str, nameservers: &[String]) -> impl Future<Output = ProbeOutcome>;
}

impl<P: HealthProbe> HealthProbe for &P {
    fn probe(&self, dns_name: &str, nameservers: &[String]) -> impl Future<Output = ProbeOutcome> {
        (**self).probe(dns_name, nameservers)
    }
}

/// [`HealthProbe`] backed by `hickory-resolver`.
///
/// A fresh resolver is built for every probe, so there is no answer cache
/// and the primary is always the one currently on disk.
#[derive(Debug, Clone)]
pub struct HickoryProbe {
    port: u16,
    timeout: Option<Duration>,
}

impl HickoryProbe {
    /// Creates a probe that queries port 53.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            port: DNS_PORT,
            timeout: None,
        }
    }

    /// Overrides the destination port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the per-query timeout. The library default applies
    /// otherwise.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn resolver_for(&self, ip: IpAddr) -> Resolver<TokioConnectionProvider> {
        let addr = SocketAddr::new(ip, self.port);
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));
        config.add_name_server(NameServerConfig::new(addr, Protocol::Tcp));

        // The answer must come from the nameserver, not /etc/hosts.
        let mut opts = ResolverOpts::default();
        opts.use_hosts_file = ResolveHosts::Never;
        opts.cache_size = 0;
        if let Some(timeout) = self.timeout {
            opts.timeout = timeout;
        }

        Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build()
    }
}

impl Default for HickoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthProbe for HickoryProbe {
    async fn probe(&self, dns_name: &str, nameservers: &[String]) -> ProbeOutcome {
        let Some(primary) = nameservers.first() else {
            return ProbeOutcome::Failure(ProbeFailure::NoNameservers);
        };
        let Ok(ip) = primary.parse::<IpAddr>() else {
            return ProbeOutcome::Failure(ProbeFailure::InvalidAddress(primary.clone()));
        };

        tracing::debug!(name = %dns_name, nameserver = %ip, port = self.port, "Probing");
        match self.resolver_for(ip).lookup_ip(dns_name).await {
            Ok(lookup) if lookup.iter().next().is_some() => ProbeOutcome::Success,
            Ok(_) => ProbeOutcome::Failure(ProbeFailure::EmptyAnswer),
            Err(e) => ProbeOutcome::Failure(ProbeFailure::Query(e.to_string())),
        }
    }
}
