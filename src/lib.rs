//! DNS-over-TLS for the `domain` client transports.
//!
//! This crate provides connectors that let the client transports of the
//! [domain](https://docs.rs/domain) crate send all their queries over TLS
//! as described in [RFC 7858](https://www.rfc-editor.org/info/rfc7858),
//! protecting DNS traffic from on-path eavesdropping and tampering.
//!
//! The central type is [DotConnect][connect::DotConnect]. It is created
//! from the name the provider’s certificate is issued for and one or more
//! addresses of the provider. Every time a transport asks it for a new
//! connection, it picks one of the addresses at random, connects to it via
//! TCP with keepalive enabled, and performs a TLS handshake verifying the
//! certificate against the name. TLS sessions are cached so that later
//! connections can be resumed cheaply.
//!
//! The [providers] module contains ready-made connectors for a few
//! well-known public services. The [Resolver] ties a connector to a
//! `domain` transport and offers simple lookups.
//!
//! ```no_run
//! # async fn _test() -> Result<(), domain_dot::Error> {
//! use domain_dot::{providers, Resolver};
//!
//! let resolver = Resolver::new(providers::cloudflare());
//! let addrs = resolver.lookup_ip("example.com").await?;
//! # drop(addrs);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! * [dial] picks server addresses and creates TCP connections,
//! * [tls] upgrades TCP connections to TLS,
//! * [session] contains the TLS session cache,
//! * [connect] combines these into [DotConnect][connect::DotConnect],
//! * [providers] has connectors for public services, and
//! * [resolver] provides the [Resolver].

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

pub mod connect;
pub mod dial;
pub mod error;
pub mod providers;
pub mod resolver;
pub mod session;
pub mod tls;

pub use self::connect::DotConnect;
pub use self::error::Error;
pub use self::resolver::Resolver;
