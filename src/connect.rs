//! Creating DNS-over-TLS connections.
//!
//! A [DotConnect] knows the name a DNS-over-TLS provider’s certificate is
//! issued for and the addresses the provider can be reached under. It
//! implements [AsyncConnect], so it can be handed to the stream based
//! client transports of `domain`, most notably
//! [multi_stream][domain::net::client::multi_stream], which will call it
//! whenever they need a new connection.
//!
//! Each connection is created by picking one of the addresses at random,
//! connecting via TCP, enabling TCP keepalive, and finally performing a TLS
//! handshake that verifies the server’s certificate against the configured
//! name. Sessions are kept in a [SessionCache] shared by all connections
//! created through the same [DotConnect] (including its clones) so that
//! later connections can resume them.
//!
//! Since [AsyncConnect::connect] takes no destination, a transport using a
//! [DotConnect] will always talk to the configured provider.
//!
//! ```no_run
//! # use domain::net::client::multi_stream;
//! # use domain::net::client::request::RequestMessage;
//! # use domain_dot::connect::DotConnect;
//! # async fn _test() {
//! let connect = DotConnect::new(
//!     "dns.google",
//!     ["8.8.8.8:853", "8.8.4.4:853"],
//! );
//! let (conn, transport) =
//!     multi_stream::Connection::<RequestMessage<Vec<u8>>>::new(connect);
//! tokio::spawn(transport.run());
//! # drop(conn);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt;
use std::future::{ready, Future};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use domain::net::client::protocol::AsyncConnect;
use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::{debug, trace};

use crate::dial::RandomDial;
use crate::session::{self, SessionCache};
use crate::tls::TlsSettings;

//------------ Configuration Constants ----------------------------------------

/// Default TCP keepalive idle time and probe interval.
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(3 * 60);

/// Smallest accepted keepalive period.
const MIN_KEEPALIVE_PERIOD: Duration = Duration::from_secs(1);

/// Largest accepted keepalive period.
const MAX_KEEPALIVE_PERIOD: Duration = Duration::from_secs(2 * 60 * 60);

/// Largest accepted session cache size.
const MAX_SESSION_CACHE_SIZE: usize = 65536;

//------------ Config ---------------------------------------------------------

/// Configuration for a [DotConnect].
#[derive(Clone)]
pub struct Config {
    /// TCP keepalive idle time and probe interval.
    keepalive_period: Duration,

    /// Number of servers to keep TLS sessions for.
    session_cache_size: usize,

    /// Trust anchors for verifying server certificates.
    ///
    /// If `None`, the platform’s trust store is used.
    root_store: Option<Arc<RootCertStore>>,
}

impl Config {
    /// Creates a new, default config.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the keepalive period.
    pub fn keepalive_period(&self) -> Duration {
        self.keepalive_period
    }

    /// Sets the keepalive period.
    ///
    /// The period is used both as the idle time before the first probe and
    /// as the interval between probes. It is limited to the range from one
    /// second to two hours.
    pub fn set_keepalive_period(&mut self, period: Duration) {
        self.keepalive_period =
            period.clamp(MIN_KEEPALIVE_PERIOD, MAX_KEEPALIVE_PERIOD);
    }

    /// Returns the size of the TLS session cache.
    pub fn session_cache_size(&self) -> usize {
        self.session_cache_size
    }

    /// Sets the size of the TLS session cache.
    ///
    /// The size is the number of servers sessions are kept for. It is
    /// limited to the range from 1 to 65536.
    pub fn set_session_cache_size(&mut self, size: usize) {
        self.session_cache_size = size.clamp(1, MAX_SESSION_CACHE_SIZE);
    }

    /// Returns the root store if one was set.
    pub fn root_store(&self) -> Option<&Arc<RootCertStore>> {
        self.root_store.as_ref()
    }

    /// Sets the trust anchors for verifying server certificates.
    ///
    /// Without this, the platform’s trust store is used.
    pub fn set_root_store(&mut self, roots: impl Into<Arc<RootCertStore>>) {
        self.root_store = Some(roots.into())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keepalive_period: KEEPALIVE_PERIOD,
            session_cache_size: session::DEF_CAPACITY,
            root_store: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("keepalive_period", &self.keepalive_period)
            .field("session_cache_size", &self.session_cache_size)
            .field(
                "root_store",
                &self.root_store.as_ref().map(|roots| roots.len()),
            )
            .finish()
    }
}

//------------ DotConnect -----------------------------------------------------

/// Create new DNS-over-TLS connections to a provider.
///
/// The value is immutable once created. Cloning is cheap and the clone
/// shares the session cache with the value it was cloned from.
#[derive(Clone, Debug)]
pub struct DotConnect {
    /// The name the server certificate has to be valid for.
    server_name: Arc<str>,

    /// Picks an address and connects to it.
    dial: RandomDial,

    /// Upgrades connections to TLS.
    tls: TlsSettings,
}

impl DotConnect {
    /// Creates a new connector with default configuration.
    ///
    /// The server certificate has to be valid for `server_name`. Each
    /// address in `addrs` has the form `host:port`, e.g., `"1.1.1.1:853"`.
    ///
    /// # Panics
    ///
    /// Panics if `server_name` or `addrs` is empty. A connector without a
    /// name to verify or without an address to connect to could never
    /// produce a connection.
    pub fn new<A: Into<String>>(
        server_name: &str,
        addrs: impl IntoIterator<Item = A>,
    ) -> Self {
        Self::with_config(server_name, addrs, Config::default())
    }

    /// Creates a new connector with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if `server_name` or `addrs` is empty.
    pub fn with_config<A: Into<String>>(
        server_name: &str,
        addrs: impl IntoIterator<Item = A>,
        config: Config,
    ) -> Self {
        assert!(!server_name.is_empty(), "server name cannot be empty");
        let addrs: Vec<String> = addrs.into_iter().map(Into::into).collect();
        assert!(!addrs.is_empty(), "addrs cannot be empty");

        let session_cache =
            Arc::new(SessionCache::new(config.session_cache_size));
        let tls = match config.root_store {
            Some(roots) => TlsSettings::new(roots, session_cache),
            None => TlsSettings::with_native_roots(session_cache),
        };
        Self {
            server_name: server_name.into(),
            dial: RandomDial::new(addrs, config.keepalive_period),
            tls,
        }
    }

    /// Returns the name the server certificate is verified against.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Returns the server addresses.
    pub fn addrs(&self) -> &[String] {
        self.dial.addrs()
    }

    /// Returns the keepalive period of created connections.
    pub fn keepalive_period(&self) -> Duration {
        self.dial.keepalive()
    }

    /// Returns the TLS session cache.
    pub fn session_cache(&self) -> &Arc<SessionCache> {
        self.tls.session_cache()
    }
}

//--- AsyncConnect

impl AsyncConnect for DotConnect {
    type Connection = TlsStream<TcpStream>;
    type Fut = Pin<
        Box<
            dyn Future<Output = Result<Self::Connection, io::Error>>
                + Send
                + Sync,
        >,
    >;

    fn connect(&self) -> Self::Fut {
        let server_name = match ServerName::try_from(&*self.server_name) {
            Ok(name) => name.to_owned(),
            Err(_) => {
                return Box::pin(ready(Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "invalid server name",
                ))));
            }
        };
        let dial = self.dial.dial();
        let tls = self.tls.clone();
        Box::pin(async move {
            let tcp = dial.await?;
            trace!(?server_name, "starting TLS handshake");
            match tls.upgrade(server_name.clone(), tcp).await {
                Ok(stream) => {
                    debug!(
                        ?server_name,
                        handshake = ?stream.get_ref().1.handshake_kind(),
                        "TLS connection established"
                    );
                    Ok(stream)
                }
                Err(err) => {
                    debug!(?server_name, %err, "TLS handshake failed");
                    Err(err)
                }
            }
        })
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::new();
        config.set_root_store(RootCertStore::empty());
        config
    }

    #[test]
    #[should_panic(expected = "server name cannot be empty")]
    fn empty_server_name() {
        let _ = DotConnect::with_config("", ["192.0.2.1:853"], test_config());
    }

    #[test]
    #[should_panic(expected = "addrs cannot be empty")]
    fn empty_addrs() {
        let _ = DotConnect::with_config(
            "dns.test",
            Vec::<String>::new(),
            test_config(),
        );
    }

    #[test]
    fn keeps_name_and_addrs() {
        let connect = DotConnect::with_config(
            "dns.test",
            ["192.0.2.1:853", "192.0.2.2:853"],
            test_config(),
        );
        assert_eq!(connect.server_name(), "dns.test");
        assert_eq!(connect.addrs(), ["192.0.2.1:853", "192.0.2.2:853"]);
        assert_eq!(connect.keepalive_period(), KEEPALIVE_PERIOD);
        assert_eq!(connect.session_cache().capacity(), session::DEF_CAPACITY);
    }

    #[test]
    fn clones_share_session_cache() {
        let connect = DotConnect::with_config(
            "dns.test",
            ["192.0.2.1:853"],
            test_config(),
        );
        let clone = connect.clone();
        assert!(Arc::ptr_eq(connect.session_cache(), clone.session_cache()));
    }

    #[test]
    fn config_limits() {
        let mut config = Config::new();
        config.set_keepalive_period(Duration::ZERO);
        assert_eq!(config.keepalive_period(), MIN_KEEPALIVE_PERIOD);
        config.set_keepalive_period(Duration::from_secs(86400));
        assert_eq!(config.keepalive_period(), MAX_KEEPALIVE_PERIOD);
        config.set_session_cache_size(0);
        assert_eq!(config.session_cache_size(), 1);
        config.set_session_cache_size(usize::MAX);
        assert_eq!(config.session_cache_size(), MAX_SESSION_CACHE_SIZE);
    }

    #[tokio::test]
    async fn invalid_server_name_fails_connect() {
        let connect = DotConnect::with_config(
            "not a name",
            ["127.0.0.1:1"],
            test_config(),
        );
        let err = connect.connect().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
