//! A resolver sending all its queries over DNS-over-TLS.
//!
//! The [Resolver] combines a [DotConnect] with the
//! [multi_stream][domain::net::client::multi_stream] client transport of
//! `domain`. The transport speaks the DNS wire protocol over TLS
//! connections it obtains from the [DotConnect] and sets up a new
//! connection when the previous one is closed. The resolver adds
//! convenience methods for sending a single query and for looking up the
//! addresses of a host.
//!
//! The transport keeps trying to connect when dialing or the TLS handshake
//! fails. Each query is therefore limited by an overall timeout, after which
//! it fails with [Error::Timeout].
//!
//! The resolver does not cache responses and does not validate DNSSEC.
//!
//! ```no_run
//! # async fn _test() -> Result<(), domain_dot::Error> {
//! use domain_dot::{providers, Resolver};
//!
//! let resolver = Resolver::new(providers::quad9());
//! for addr in resolver.lookup_ip("example.com").await? {
//!     println!("{addr}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use domain::base::iana::Rcode;
use domain::base::{Message, MessageBuilder, Name, Rtype, ToName};
use domain::net::client::request::{self, RequestMessage, SendRequest};
use domain::net::client::{multi_stream, stream};
use domain::rdata::{Aaaa, A};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::connect::DotConnect;
use crate::error::Error;

//------------ Configuration Constants ----------------------------------------

/// Default response timeout.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Smallest accepted response timeout.
const MIN_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1);

/// Largest accepted response timeout.
const MAX_RESPONSE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default query timeout.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Smallest accepted query timeout.
const MIN_QUERY_TIMEOUT: Duration = Duration::from_millis(1);

/// Largest accepted query timeout.
const MAX_QUERY_TIMEOUT: Duration = Duration::from_secs(3600);

//------------ Config ---------------------------------------------------------

/// Configuration for a [Resolver].
#[derive(Clone, Debug)]
pub struct Config {
    /// How long to wait for a response.
    response_timeout: Duration,

    /// How long a query may take overall.
    query_timeout: Duration,
}

impl Config {
    /// Creates a new, default config.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the response timeout.
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Sets the response timeout.
    ///
    /// This is the time to wait for a response once a request has been
    /// sent over an established connection. The value is limited to the
    /// range from one millisecond to ten minutes.
    pub fn set_response_timeout(&mut self, timeout: Duration) {
        self.response_timeout =
            timeout.clamp(MIN_RESPONSE_TIMEOUT, MAX_RESPONSE_TIMEOUT);
    }

    /// Returns the query timeout.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Sets the query timeout.
    ///
    /// This is the time a query may take overall, including setting up
    /// the connection and the TLS handshake. The value is limited to the
    /// range from one millisecond to one hour.
    pub fn set_query_timeout(&mut self, timeout: Duration) {
        self.query_timeout =
            timeout.clamp(MIN_QUERY_TIMEOUT, MAX_QUERY_TIMEOUT);
    }

    /// Converts the config into the transport’s config.
    fn transport_config(&self) -> multi_stream::Config {
        let mut stream_config = stream::Config::new();
        stream_config.set_response_timeout(self.response_timeout);
        multi_stream::Config::from(stream_config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            response_timeout: RESPONSE_TIMEOUT,
            query_timeout: QUERY_TIMEOUT,
        }
    }
}

//------------ Resolver -------------------------------------------------------

/// A DNS resolver using DNS-over-TLS.
///
/// Creating a resolver spawns the task running the underlying transport.
/// The task ends when the resolver and all its clones are dropped.
#[derive(Clone)]
pub struct Resolver {
    /// The client transport.
    conn: Arc<multi_stream::Connection<RequestMessage<Vec<u8>>>>,

    /// The provider the transport connects to.
    connect: DotConnect,

    /// How long a query may take overall.
    query_timeout: Duration,
}

impl Resolver {
    /// Creates a new resolver with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(connect: DotConnect) -> Self {
        Self::with_config(connect, Config::default())
    }

    /// Creates a new resolver with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn with_config(connect: DotConnect, config: Config) -> Self {
        let (conn, transport) = multi_stream::Connection::with_config(
            connect.clone(),
            config.transport_config(),
        );
        let server_name = String::from(connect.server_name());
        tokio::spawn(async move {
            transport.run().await;
            trace!(%server_name, "transport terminated");
        });
        Self {
            conn: Arc::new(conn),
            connect,
            query_timeout: config.query_timeout,
        }
    }

    /// Returns the connector used by the resolver.
    pub fn connect(&self) -> &DotConnect {
        &self.connect
    }

    /// Sends a query and returns the response.
    ///
    /// The query asks for recursion. The response is returned whatever its
    /// response code. If no response arrives within the query timeout,
    /// including when no connection to the provider can be established,
    /// [Error::Timeout] is returned.
    pub async fn query(
        &self,
        qname: impl ToName,
        qtype: Rtype,
    ) -> Result<Message<Bytes>, Error> {
        let mut msg = MessageBuilder::new_vec();
        msg.header_mut().set_rd(true);
        let mut msg = msg.question();
        msg.push((qname, qtype))
            .map_err(|_| request::Error::MessageBuilderPushError)?;
        let mut request = self.conn.send_request(RequestMessage::new(msg)?);
        match timeout(self.query_timeout, request.get_response()).await {
            Ok(res) => Ok(res?),
            Err(_) => {
                debug!(
                    server_name = %self.connect.server_name(),
                    "query timed out"
                );
                Err(Error::Timeout)
            }
        }
    }

    /// Looks up the IPv4 and IPv6 addresses of a host.
    ///
    /// The A and AAAA queries are sent at the same time. IPv4 addresses
    /// come first in the result.
    pub async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        let qname = Name::<Vec<u8>>::from_str(host)?;
        debug!(%qname, server_name = %self.connect.server_name(), "lookup");

        let (v4, v6) = tokio::join!(
            self.query(&qname, Rtype::A),
            self.query(&qname, Rtype::AAAA),
        );
        let (v4, v6) = (v4?, v6?);

        let rcode = v4.header().rcode();
        if rcode != Rcode::NOERROR && v6.header().rcode() != Rcode::NOERROR {
            return Err(Error::Rcode(rcode));
        }

        let mut addrs = Vec::new();
        for record in v4.answer()?.limit_to::<A>() {
            addrs.push(IpAddr::V4(record?.data().addr()));
        }
        for record in v6.answer()?.limit_to::<Aaaa>() {
            addrs.push(IpAddr::V6(record?.data().addr()));
        }
        if addrs.is_empty() {
            return Err(Error::NoAddresses);
        }
        Ok(addrs)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("connect", &self.connect)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

//============ Tests =========================================================
