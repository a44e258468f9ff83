//! Well-known public DNS-over-TLS providers.
//!
//! Each function returns a [DotConnect] for one provider using the default
//! configuration, i.e., verifying certificates against the platform’s trust
//! store. Use [DotConnect::with_config] with the constants in this module to
//! change that.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::connect::DotConnect;

/// The standard DNS-over-TLS port.
pub const DOT_PORT: u16 = 853;

/// The certificate name of Cloudflare’s service.
pub const CLOUDFLARE_NAME: &str = "cloudflare-dns.com";

/// The addresses of Cloudflare’s service.
pub const CLOUDFLARE_IPS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
    IpAddr::V4(Ipv4Addr::new(1, 0, 0, 1)),
];

/// The certificate name of Quad9.
pub const QUAD9_NAME: &str = "dns.quad9.net";

/// The addresses of Quad9.
pub const QUAD9_IPS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)),
    IpAddr::V4(Ipv4Addr::new(149, 112, 112, 112)),
];

/// The certificate name of Google Public DNS.
pub const GOOGLE_NAME: &str = "dns.google";

/// The addresses of Google Public DNS.
pub const GOOGLE_IPS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
    IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
];

/// The certificate name of LibreDNS.
pub const LIBREOPS_NAME: &str = "dot.libredns.gr";

/// The addresses of LibreDNS.
pub const LIBREOPS_IPS: [IpAddr; 1] =
    [IpAddr::V4(Ipv4Addr::new(116, 203, 115, 192))];

/// Cloudflare’s service on 1.1.1.1 and 1.0.0.1.
///
/// See <https://developers.cloudflare.com/1.1.1.1/dns-over-tls/>.
pub fn cloudflare() -> DotConnect {
    DotConnect::new(CLOUDFLARE_NAME, dot_addrs(&CLOUDFLARE_IPS))
}

/// Quad9 on 9.9.9.9 and 149.112.112.112.
///
/// See <https://quad9.net/faq/>.
pub fn quad9() -> DotConnect {
    DotConnect::new(QUAD9_NAME, dot_addrs(&QUAD9_IPS))
}

/// Google Public DNS on 8.8.8.8 and 8.8.4.4.
///
/// See <https://developers.google.com/speed/public-dns/>.
pub fn google() -> DotConnect {
    DotConnect::new(GOOGLE_NAME, dot_addrs(&GOOGLE_IPS))
}

/// LibreDNS, operated by LibreOps, on 116.203.115.192.
///
/// See <https://libredns.gr/>.
pub fn libreops() -> DotConnect {
    DotConnect::new(LIBREOPS_NAME, dot_addrs(&LIBREOPS_IPS))
}

/// Returns the DNS-over-TLS socket addresses for `ips`.
pub fn dot_addrs(ips: &[IpAddr]) -> Vec<String> {
    ips.iter()
        .map(|ip| SocketAddr::new(*ip, DOT_PORT).to_string())
        .collect()
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::cloudflare(
        cloudflare(),
        "cloudflare-dns.com",
        &["1.1.1.1", "1.0.0.1"]
    )]
    #[case::quad9(quad9(), "dns.quad9.net", &["9.9.9.9", "149.112.112.112"])]
    #[case::google(google(), "dns.google", &["8.8.8.8", "8.8.4.4"])]
    #[case::libreops(libreops(), "dot.libredns.gr", &["116.203.115.192"])]
    fn provider(
        #[case] connect: DotConnect,
        #[case] name: &str,
        #[case] ips: &[&str],
    ) {
        assert_eq!(connect.server_name(), name);
        assert_eq!(connect.addrs().len(), ips.len());
        for (addr, ip) in connect.addrs().iter().zip(ips) {
            let addr: SocketAddr = addr.parse().unwrap();
            assert_eq!(addr.ip().to_string(), *ip);
            assert_eq!(addr.port(), DOT_PORT);
        }
    }

    #[test]
    fn dot_addrs_use_dot_port() {
        let ips = [
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
            "2001:db8::1".parse().unwrap(),
        ];
        assert_eq!(dot_addrs(&ips), ["192.0.2.1:853", "[2001:db8::1]:853"]);
    }

    #[test]
    fn providers_do_not_share_session_caches() {
        let a = google();
        let b = google();
        let (a, b) = (a.session_cache(), b.session_cache());
        assert!(!std::sync::Arc::ptr_eq(a, b));
    }
}
