//! Where `tabula serve` listens.
//!
//! The gateway has no authentication, so it stays on loopback unless the
//! server config is marked public.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServerConfig;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("Cannot resolve [server] bind {bind:?}: {source}")]
    Unresolved {
        bind: String,
        #[source]
        source: io::Error,
    },

    #[error("[server] bind {bind:?} resolved to no addresses")]
    NoAddresses { bind: String },

    #[error(
        "Refusing to bind to non-loopback address {addr} ([server] bind {bind:?}) without --public; the gateway has no authentication"
    )]
    NotLoopback { bind: String, addr: SocketAddr },

    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Resolves `server.bind`, IPv4 addresses first.
///
/// Runs before anything is loaded so a refused address fails fast.
pub(crate) async fn resolve(server: &ServerConfig) -> Result<Vec<SocketAddr>, BindError> {
    let mut addrs: Vec<SocketAddr> = tokio::net::lookup_host(server.bind.as_str())
        .await
        .map_err(|source| BindError::Unresolved {
            bind: server.bind.clone(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(BindError::NoAddresses {
            bind: server.bind.clone(),
        });
    }
    if !server.public {
        if let Some(addr) = addrs.iter().find(|addr| !addr.ip().is_loopback()) {
            return Err(BindError::NotLoopback {
                bind: server.bind.clone(),
                addr: *addr,
            });
        }
    }
    addrs.sort_by_key(|addr| !addr.is_ipv4());
    addrs.dedup();
    Ok(addrs)
}

/// Listens on the first resolved address that accepts.
pub(crate) async fn listen(
    server: &ServerConfig,
    addrs: &[SocketAddr],
) -> Result<TcpListener, BindError> {
    let mut failure = None;
    for &addr in addrs {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(source) => {
                log::debug!("Cannot listen on {addr}: {source}");
                failure = Some(BindError::Listen { addr, source });
            }
        }
    }
    Err(failure.unwrap_or_else(|| BindError::NoAddresses {
        bind: server.bind.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(bind: &str, public: bool) -> ServerConfig {
        ServerConfig {
            bind: bind.to_string(),
            public,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn loopback_needs_no_opt_in() {
        let addrs = resolve(&server("127.0.0.1:0", false)).await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:0".parse::<SocketAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn wildcard_requires_public() {
        let err = resolve(&server("0.0.0.0:0", false)).await.unwrap_err();
        assert!(matches!(err, BindError::NotLoopback { .. }), "{err}");
        assert!(err.to_string().contains("[server] bind \"0.0.0.0:0\""));

        resolve(&server("0.0.0.0:0", true)).await.unwrap();
    }

    #[tokio::test]
    async fn unresolvable_bind_names_the_setting() {
        let err = resolve(&server("not an address", false)).await.unwrap_err();
        assert!(matches!(err, BindError::Unresolved { .. }), "{err}");
    }

    #[tokio::test]
    async fn localhost_prefers_ipv4() {
        let addrs = resolve(&server("localhost:0", false)).await.unwrap();
        assert!(addrs.iter().all(|addr| addr.ip().is_loopback()));
        if addrs.iter().any(SocketAddr::is_ipv4) {
            assert!(addrs[0].is_ipv4());
        }
    }

    #[tokio::test]
    async fn listens_on_a_resolved_address() {
        let config = server("127.0.0.1:0", false);
        let addrs = resolve(&config).await.unwrap();
        let listener = listen(&config, &addrs).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());

        let err = listen(&config, &[]).await.unwrap_err();
        assert!(matches!(err, BindError::NoAddresses { .. }));
    }
}
