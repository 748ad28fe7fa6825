//! DNS resolver initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

use crate::error_handling::InitializationError;

/// Initializes the DNS resolver used for reverse (PTR) lookups.
///
/// With no override, the default resolver configuration is used. A
/// configured `host:port` endpoint replaces the name servers with a single
/// UDP upstream, the analogue of the original deployment's resolver
/// override setting.
///
/// Timeouts are aggressive: enrichment runs one PTR query per record and a
/// slow DNS server must not stall the whole report.
pub fn init_resolver(
    endpoint: Option<&str>,
) -> Result<Arc<TokioAsyncResolver>, InitializationError> {
    let mut opts = ResolverOpts::default();
    opts.timeout = Duration::from_secs(crate::config::DNS_TIMEOUT_SECS);
    opts.attempts = crate::config::DNS_ATTEMPTS;
    // Prevent search-domain appending; every query here is an absolute
    // reverse name
    opts.ndots = 0;

    let config = match endpoint {
        Some(endpoint) => {
            let addr: SocketAddr = endpoint.parse().map_err(|e| {
                InitializationError::DnsResolverError(format!(
                    "invalid resolver endpoint \"{endpoint}\": {e}"
                ))
            })?;
            let mut config = ResolverConfig::new();
            config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));
            config
        }
        None => ResolverConfig::default(),
    };

    Ok(Arc::new(TokioAsyncResolver::tokio(config, opts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolver_initializes() {
        assert!(init_resolver(None).is_ok());
    }

    #[test]
    fn test_endpoint_override_accepted() {
        assert!(init_resolver(Some("192.0.2.53:53")).is_ok());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let err = init_resolver(Some("not a socket addr")).unwrap_err();
        assert!(matches!(err, InitializationError::DnsResolverError(_)));
    }
}
