//! Upgrading TCP connections to TLS.
//!
//! [TlsSettings] bundles the rustls client configuration used for all
//! connections to one provider together with the [SessionCache] that
//! configuration stores its sessions in. Its [upgrade][TlsSettings::upgrade]
//! method turns an established TCP connection into a TLS connection whose
//! certificate has been verified against the expected server name.
//!
//! There is no fallback. If the handshake fails, for instance because the
//! certificate was issued for a different name, the connection is dropped
//! and the error returned.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::io;
use std::sync::{Arc, OnceLock};

use rustls::client::Resumption;
use rustls::crypto::ring;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::session::SessionCache;

//------------ TlsSettings ----------------------------------------------------

/// The TLS side of a DNS-over-TLS connector.
#[derive(Clone, Debug)]
pub struct TlsSettings {
    /// The rustls configuration.
    client_config: Arc<ClientConfig>,

    /// The session cache referenced by `client_config`.
    session_cache: Arc<SessionCache>,
}

impl TlsSettings {
    /// Creates new settings.
    ///
    /// Server certificates are verified against `root_store`. Sessions are
    /// stored in and resumed from `session_cache`.
    pub fn new(
        root_store: impl Into<Arc<RootCertStore>>,
        session_cache: Arc<SessionCache>,
    ) -> Self {
        // The ring provider supports all default protocol versions, so
        // this can only fail if rustls itself is broken.
        let builder = ClientConfig::builder_with_provider(Arc::new(
            ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .expect("ring provider supports the default protocol versions");
        let mut client_config = builder
            .with_root_certificates(root_store)
            .with_no_client_auth();
        client_config.resumption = Resumption::store(session_cache.clone());
        Self {
            client_config: Arc::new(client_config),
            session_cache,
        }
    }

    /// Creates new settings using the platform's trust store.
    pub fn with_native_roots(session_cache: Arc<SessionCache>) -> Self {
        Self::new(native_roots(), session_cache)
    }

    /// Returns the rustls client configuration.
    pub fn client_config(&self) -> &Arc<ClientConfig> {
        &self.client_config
    }

    /// Returns the session cache.
    pub fn session_cache(&self) -> &Arc<SessionCache> {
        &self.session_cache
    }

    /// Upgrades a TCP connection to TLS.
    ///
    /// The server has to present a certificate valid for `server_name`.
    pub async fn upgrade(
        &self,
        server_name: ServerName<'static>,
        tcp: TcpStream,
    ) -> Result<TlsStream<TcpStream>, io::Error> {
        TlsConnector::from(self.client_config.clone())
            .connect(server_name, tcp)
            .await
    }
}

//------------ native_roots ---------------------------------------------------

/// Returns the root certificates of the platform's trust store.
///
/// The store is loaded on first use and shared afterwards. Certificates
/// that cannot be loaded or parsed are skipped.
pub fn native_roots() -> Arc<RootCertStore> {
    static ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();
    ROOTS
        .get_or_init(|| {
            let loaded = rustls_native_certs::load_native_certs();
            for err in &loaded.errors {
                warn!(%err, "failed to load native root certificate");
            }
            let mut roots = RootCertStore::empty();
            let (added, ignored) =
                roots.add_parsable_certificates(loaded.certs);
            if ignored > 0 {
                warn!(ignored, "ignored unparsable native root certificates");
            }
            debug!(added, "loaded native root certificates");
            Arc::new(roots)
        })
        .clone()
}

//============ Tests =========================================================
