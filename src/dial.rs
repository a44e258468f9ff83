//! Dialing one of a fixed set of server addresses.
//!
//! A DNS-over-TLS provider is usually reachable under a small number of
//! addresses, all of which serve the same purpose. [RandomDial] spreads
//! connections over them by picking one address at random for each new
//! connection. There is no stickiness and no health tracking: an address
//! that failed last time is just as likely to be picked again.
//!
//! A failed connection attempt is reported to the caller as is. No other
//! address is tried. Retrying, possibly with another random pick, is up to
//! the caller.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

//------------ RandomDial -----------------------------------------------------

/// Creates TCP connections to a randomly picked address.
#[derive(Clone, Debug)]
pub struct RandomDial {
    /// The addresses to pick from.
    ///
    /// Never empty.
    addrs: Arc<[String]>,

    /// Idle time and probe interval for TCP keepalive.
    keepalive: Duration,
}

impl RandomDial {
    /// Creates a new dialer.
    ///
    /// Each address is a string of the form `host:port`. The host is
    /// normally an IP address. Connections get TCP keepalive enabled with
    /// `keepalive` as both idle time and probe interval.
    ///
    /// # Panics
    ///
    /// Panics if `addrs` is empty.
    pub fn new(addrs: impl Into<Arc<[String]>>, keepalive: Duration) -> Self {
        let addrs = addrs.into();
        assert!(!addrs.is_empty(), "addrs cannot be empty");
        Self { addrs, keepalive }
    }

    /// Returns the addresses.
    pub fn addrs(&self) -> &[String] {
        &self.addrs
    }

    /// Returns the keepalive period.
    pub fn keepalive(&self) -> Duration {
        self.keepalive
    }

    /// Picks an address.
    ///
    /// Every address has the same chance of being picked and every call
    /// picks anew.
    pub fn pick(&self) -> &str {
        let idx = rand::thread_rng().gen_range(0..self.addrs.len());
        &self.addrs[idx]
    }

    /// Connects to a randomly picked address.
    ///
    /// The address is picked when this method is called. Dropping the
    /// returned future abandons the connection attempt.
    pub fn dial(
        &self,
    ) -> impl Future<Output = io::Result<TcpStream>> + Send + Sync + 'static
    {
        let addr = String::from(self.pick());
        let keepalive = self.keepalive;
        async move {
            trace!(%addr, "connecting");
            let tcp = match TcpStream::connect(addr.as_str()).await {
                Ok(tcp) => tcp,
                Err(err) => {
                    debug!(%addr, %err, "connect failed");
                    return Err(err);
                }
            };
            if let Err(err) = set_keepalive(&tcp, keepalive) {
                warn!(%addr, %err, "failed to set TCP keepalive");
            }
            Ok(tcp)
        }
    }
}

//------------ Helper Functions -----------------------------------------------

/// Enables keepalive probing on a TCP connection.
fn set_keepalive(tcp: &TcpStream, period: Duration) -> Result<(), io::Error> {
    let keepalive = TcpKeepalive::new().with_time(period);
    #[cfg(any(
        target_os = "android",
        target_os = "freebsd",
        target_os = "ios",
        target_os = "linux",
        target_os = "macos",
        target_os = "netbsd",
        target_os = "windows",
    ))]
    let keepalive = keepalive.with_interval(period);
    SockRef::from(tcp).set_tcp_keepalive(&keepalive)
}

//============ Tests =========================================================
