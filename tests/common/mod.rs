//! A local DNS-over-TLS server for the integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use domain::base::iana::{Class, Rcode};
use domain::base::{Message, MessageBuilder, Record, Rtype, Ttl};
use domain::rdata::{Aaaa, A};
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use rustls::{RootCertStore, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tracing_subscriber::EnvFilter;

use domain_dot::connect::Config;

/// Name that the test server answers with NXDOMAIN.
pub const NXDOMAIN_NAME: &str = "nxdomain.test";

/// The address returned for A queries.
pub const TEST_A: [u8; 4] = [192, 0, 2, 1];

/// The address returned for AAAA queries.
pub const TEST_AAAA: &str = "2001:db8::1";

/// Setup logging of events reported by the crate and the test suite.
///
/// Use the RUST_LOG environment variable to override the defaults.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}

//------------ Certificates ---------------------------------------------------

/// A self-signed certificate and its key.
pub struct TestCert {
    /// The certificate.
    pub cert: CertificateDer<'static>,

    /// The private key in PKCS#8 format.
    pub key: PrivatePkcs8KeyDer<'static>,
}

impl TestCert {
    /// Creates a certificate valid for `name`.
    pub fn new(name: &str) -> Self {
        let certified =
            rcgen::generate_simple_self_signed(vec![name.to_string()])
                .unwrap();
        TestCert {
            cert: certified.cert.der().clone(),
            key: PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()),
        }
    }

    /// Returns a root store trusting this certificate.
    pub fn roots(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.cert.clone()).unwrap();
        roots
    }

    /// Returns a connector config trusting this certificate.
    pub fn client_config(&self) -> Config {
        let mut config = Config::new();
        config.set_root_store(self.roots());
        config
    }

    /// Returns a server config presenting this certificate.
    fn server_config(&self) -> ServerConfig {
        let provider = Arc::new(ring::default_provider());
        ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(
                vec![self.cert.clone()],
                self.key.clone_key().into(),
            )
            .unwrap()
    }
}

//------------ TestServer -----------------------------------------------------

/// What the server does after a successful handshake.
#[derive(Clone, Copy, Debug)]
pub enum Mode {
    /// Write `ok` and wait for the client to close the connection.
    Greet,

    /// Answer DNS queries.
    Dns,
}

/// A running test server.
pub struct TestServer {
    /// The address the server listens on.
    pub addr: SocketAddr,

    /// Number of completed TLS handshakes.
    handshakes: Arc<AtomicUsize>,
}

impl TestServer {
    /// Starts a server presenting `cert`.
    pub async fn start(cert: &TestCert, mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(cert.server_config()));
        let handshakes = Arc::new(AtomicUsize::new(0));
        let counter = handshakes.clone();
        tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    return;
                };
                let acceptor = acceptor.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    let Ok(stream) = acceptor.accept(tcp).await else {
                        return;
                    };
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = match mode {
                        Mode::Greet => greet(stream).await,
                        Mode::Dns => serve_dns(stream).await,
                    };
                });
            }
        });
        TestServer { addr, handshakes }
    }

    /// Returns the number of completed handshakes.
    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }
}

/// Greets the client and waits for it to go away.
async fn greet(mut stream: TlsStream<TcpStream>) -> io::Result<()> {
    stream.write_all(b"ok").await?;
    stream.flush().await?;
    let mut buf = [0u8; 64];
    while stream.read(&mut buf).await? > 0 {}
    Ok(())
}

/// Answers DNS queries until the client closes the connection.
async fn serve_dns(mut stream: TlsStream<TcpStream>) -> io::Result<()> {
    loop {
        let len = match stream.read_u16().await {
            Ok(len) => len,
            Err(_) => return Ok(()),
        };
        let mut buf = vec![0; usize::from(len)];
        stream.read_exact(&mut buf).await?;
        let request = Message::from_octets(buf)
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?;
        let answer = answer(&request);
        stream.write_u16(u16::try_from(answer.len()).unwrap()).await?;
        stream.write_all(&answer).await?;
        stream.flush().await?;
    }
}

/// Creates the answer for a request.
fn answer(request: &Message<Vec<u8>>) -> Vec<u8> {
    let question = request.sole_question().unwrap();
    let qname = question.qname().to_string();
    let rcode = if qname.trim_end_matches('.') == NXDOMAIN_NAME {
        Rcode::NXDOMAIN
    } else {
        Rcode::NOERROR
    };
    let mut answer = MessageBuilder::new_vec()
        .start_answer(request, rcode)
        .unwrap();
    answer.header_mut().set_ra(true);
    if rcode == Rcode::NOERROR {
        let ttl = Ttl::from_secs(300);
        if question.qtype() == Rtype::A {
            let [a, b, c, d] = TEST_A;
            let data = A::from_octets(a, b, c, d);
            answer
                .push(Record::new(question.qname(), Class::IN, ttl, data))
                .unwrap();
        } else if question.qtype() == Rtype::AAAA {
            let data = Aaaa::new(TEST_AAAA.parse().unwrap());
            answer
                .push(Record::new(question.qname(), Class::IN, ttl, data))
                .unwrap();
        }
    }
    answer.finish()
}
