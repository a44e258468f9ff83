//! A bounded cache of TLS session parameters.
//!
//! Setting up a TLS connection is expensive. Servers allow clients to
//! resume an earlier session, skipping most of the full handshake, if the
//! client kept the session parameters from that earlier connection. The
//! [SessionCache] keeps those parameters for a limited number of servers.
//!
//! The cache is handed to rustls as its
//! [`ClientSessionStore`][rustls::client::ClientSessionStore]. It is owned
//! explicitly by whoever creates it, normally the
//! [TlsSettings][crate::tls::TlsSettings] of a single
//! [DotConnect][crate::connect::DotConnect], and is shared by all
//! connections made through it. All access goes through an internal lock
//! so the cache can be used from any number of tasks at the same time.
//!
//! When the cache is full and parameters for a new server arrive, the
//! entry of the server that was used least recently is evicted.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::{HashMap, VecDeque};
use std::fmt;

use parking_lot::Mutex;
use rustls::client::{
    ClientSessionStore, Tls12ClientSessionValue, Tls13ClientSessionValue,
};
use rustls::pki_types::ServerName;
use rustls::NamedGroup;
use tracing::trace;

//------------ Configuration Constants ----------------------------------------

/// Number of servers kept if no capacity was given.
pub const DEF_CAPACITY: usize = 64;

/// Number of TLS 1.3 tickets kept per server.
const MAX_TLS13_TICKETS: usize = 8;

//------------ SessionCache ---------------------------------------------------

/// A least-recently-used cache of TLS client sessions.
///
/// The capacity is the number of servers for which session parameters are
/// kept. For each server, the cache holds the key exchange group that
/// worked last time, at most one TLS 1.2 session, and a handful of TLS 1.3
/// tickets.
pub struct SessionCache {
    /// The maximum number of servers.
    capacity: usize,

    /// The cached data.
    entries: Mutex<Entries>,
}

impl SessionCache {
    /// Creates a new cache for up to `capacity` servers.
    ///
    /// A capacity of zero selects [DEF_CAPACITY].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEF_CAPACITY } else { capacity };
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Returns the maximum number of servers kept in the cache.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of servers currently in the cache.
    pub fn len(&self) -> usize {
        self.entries.lock().servers.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().servers.is_empty()
    }

    /// Drops all cached sessions.
    ///
    /// The next connection to any server will use a full handshake.
    pub fn clear(&self) {
        self.entries.lock().servers.clear();
    }

    /// Drops the cached sessions for a single server.
    ///
    /// Returns whether there was an entry for the server. Names that are not
    /// valid server names never have an entry.
    pub fn forget(&self, server_name: &str) -> bool {
        let Ok(server_name) = ServerName::try_from(server_name) else {
            return false;
        };
        self.entries
            .lock()
            .servers
            .remove(&server_name.to_owned())
            .is_some()
    }

    /// Runs `op` on the entry for a server, creating the entry if needed.
    fn edit(
        &self,
        server_name: ServerName<'static>,
        op: impl FnOnce(&mut ServerData),
    ) {
        let mut entries = self.entries.lock();
        let tick = entries.next_tick();
        if !entries.servers.contains_key(&server_name) {
            if entries.servers.len() >= self.capacity {
                entries.evict_lru();
            }
            entries.servers.insert(server_name.clone(), ServerData::default());
        }
        if let Some(data) = entries.servers.get_mut(&server_name) {
            data.last_used = tick;
            op(data);
        }
    }

    /// Runs `op` on an existing entry for a server.
    ///
    /// Accessing the entry marks it as recently used.
    fn with<T>(
        &self,
        server_name: &ServerName<'_>,
        op: impl FnOnce(&mut ServerData) -> Option<T>,
    ) -> Option<T> {
        let server_name = server_name.to_owned();
        let mut entries = self.entries.lock();
        let tick = entries.next_tick();
        let data = entries.servers.get_mut(&server_name)?;
        data.last_used = tick;
        op(data)
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEF_CAPACITY)
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

//--- ClientSessionStore

impl ClientSessionStore for SessionCache {
    fn set_kx_hint(
        &self,
        server_name: ServerName<'static>,
        group: NamedGroup,
    ) {
        self.edit(server_name, |data| data.kx_hint = Some(group));
    }

    fn kx_hint(&self, server_name: &ServerName<'_>) -> Option<NamedGroup> {
        self.with(server_name, |data| data.kx_hint)
    }

    fn set_tls12_session(
        &self,
        server_name: ServerName<'static>,
        value: Tls12ClientSessionValue,
    ) {
        self.edit(server_name, |data| data.tls12 = Some(value));
    }

    fn tls12_session(
        &self,
        server_name: &ServerName<'_>,
    ) -> Option<Tls12ClientSessionValue> {
        self.with(server_name, |data| data.tls12.clone())
    }

    fn remove_tls12_session(&self, server_name: &ServerName<'static>) {
        self.with(server_name, |data| data.tls12.take());
    }

    fn insert_tls13_ticket(
        &self,
        server_name: ServerName<'static>,
        value: Tls13ClientSessionValue,
    ) {
        trace!(?server_name, "storing TLS 1.3 ticket");
        self.edit(server_name, |data| {
            if data.tls13.len() >= MAX_TLS13_TICKETS {
                data.tls13.pop_front();
            }
            data.tls13.push_back(value);
        });
    }

    fn take_tls13_ticket(
        &self,
        server_name: &ServerName<'static>,
    ) -> Option<Tls13ClientSessionValue> {
        self.with(server_name, |data| data.tls13.pop_back())
    }
}

//------------ Entries --------------------------------------------------------

/// The lock-protected content of the cache.
#[derive(Default)]
struct Entries {
    /// The data per server.
    servers: HashMap<ServerName<'static>, ServerData>,

    /// Logical clock for recency.
    tick: u64,
}

impl Entries {
    /// Advances the clock and returns the new value.
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Removes the least recently used server.
    fn evict_lru(&mut self) {
        let lru = self
            .servers
            .iter()
            .min_by_key(|(_, data)| data.last_used)
            .map(|(name, _)| name.clone());
        if let Some(name) = lru {
            trace!(server_name = ?name, "evicting TLS sessions");
            self.servers.remove(&name);
        }
    }
}

//------------ ServerData -----------------------------------------------------

/// The session parameters for one server.
#[derive(Default)]
struct ServerData {
    /// Logical time of the last access.
    last_used: u64,

    /// The key exchange group the server accepted.
    kx_hint: Option<NamedGroup>,

    /// The TLS 1.2 session.
    tls12: Option<Tls12ClientSessionValue>,

    /// TLS 1.3 tickets, oldest first.
    tls13: VecDeque<Tls13ClientSessionValue>,
}

//============ Tests =========================================================
