//! HTTP asset fetcher for image `src` values.
//!
//! DESIGN
//! ======
//! `data:` URLs are decoded locally. `http(s)` URLs go through a shared
//! `reqwest` client with a request timeout. Bodies are read chunk by chunk and
//! abandoned as soon as they exceed the configured byte cap.
//!
//! HOST POLICY
//! ===========
//! Sources come from client-posted designs and CSV cells, so by default only
//! public addresses are reachable. The host of every URL is checked before the
//! request; the client's resolver drops the connection if a name resolves to
//! a loopback, private, link-local, or otherwise reserved address at connect
//! time, and redirects to such literal addresses are refused.
//! `ALLOW_PRIVATE_ASSET_HOSTS` lifts the policy for local development.

#[cfg(test)]
#[path = "assets_test.rs"]
mod assets_test;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canvas::raster::{AssetError, AssetFetcher, decode_data_url};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect;
use tracing::{debug, warn};

const MAX_REDIRECTS: usize = 5;

pub struct HttpAssetFetcher {
    client: reqwest::Client,
    max_bytes: usize,
    allow_private_hosts: bool,
}

impl HttpAssetFetcher {
    /// # Errors
    ///
    /// Returns the builder error when the TLS backend cannot be initialised.
    pub fn new(timeout: Duration, max_bytes: usize, allow_private_hosts: bool) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if allow_private_hosts {
            warn!("asset fetches may reach private and loopback addresses");
        } else {
            builder = builder.dns_resolver(Arc::new(PublicOnlyResolver)).redirect(redirect::Policy::custom(|attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if attempt.url().host_str().and_then(literal_ip).is_some_and(|ip| !is_public(ip)) {
                    attempt.error("redirect to a non-public address")
                } else {
                    attempt.follow()
                }
            }));
        }
        let client = builder.build()?;
        Ok(Self { client, max_bytes, allow_private_hosts })
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    async fn fetch_http(&self, src: &str) -> Result<Vec<u8>, AssetError> {
        if !self.allow_private_hosts {
            check_host(src).await?;
        }

        let mut response = self
            .client
            .get(src)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AssetError::Fetch(e.to_string()))?;

        if response.content_length().is_some_and(|len| exceeds(len, self.max_bytes)) {
            return Err(AssetError::TooLarge { limit: self.max_bytes });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| AssetError::Fetch(e.to_string()))? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(AssetError::TooLarge { limit: self.max_bytes });
            }
            body.extend_from_slice(&chunk);
        }
        debug!(bytes = body.len(), "asset fetched");
        Ok(body)
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, src: &str) -> Result<Vec<u8>, AssetError> {
        match scheme(src) {
            Some(Scheme::Data) => {
                let bytes = decode_data_url(src)?;
                if bytes.len() > self.max_bytes {
                    return Err(AssetError::TooLarge { limit: self.max_bytes });
                }
                Ok(bytes)
            }
            Some(Scheme::Http) => self.fetch_http(src).await,
            None => Err(AssetError::UnsupportedSource(src.to_owned())),
        }
    }
}

/// DNS resolver that refuses names resolving to any non-public address.
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_owned();
        Box::pin(async move {
            match public_addrs(&host).await {
                Ok(addrs) => Ok(Box::new(addrs.into_iter()) as Addrs),
                Err(e) => Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            }
        })
    }
}

/// Reject `src` unless its host is public.
async fn check_host(src: &str) -> Result<(), AssetError> {
    let url = reqwest::Url::parse(src).map_err(|_| AssetError::UnsupportedSource(src.to_owned()))?;
    let host = url.host_str().ok_or_else(|| AssetError::UnsupportedSource(src.to_owned()))?;
    match literal_ip(host) {
        Some(ip) if is_public(ip) => Ok(()),
        Some(_) => Err(forbidden(host)),
        None => public_addrs(host).await.map(|_| ()),
    }
}

/// Resolve `host`, failing if any address it maps to is non-public.
async fn public_addrs(host: &str) -> Result<Vec<SocketAddr>, AssetError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| AssetError::Fetch(format!("resolve {host}: {e}")))?
        .collect();
    if addrs.is_empty() {
        return Err(AssetError::Fetch(format!("resolve {host}: no addresses")));
    }
    if addrs.iter().any(|addr| !is_public(addr.ip())) {
        return Err(forbidden(host));
    }
    Ok(addrs)
}

fn forbidden(host: &str) -> AssetError {
    warn!(host, "asset host is not public; refusing");
    AssetError::ForbiddenHost(host.to_owned())
}

/// The host as an IP address when it is a literal (IPv6 may be bracketed).
fn literal_ip(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[').trim_end_matches(']').parse().ok()
}

/// Whether `ip` is globally routable: not loopback, private, link-local,
/// shared, documentation, benchmarking, multicast, or reserved.
fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || a == 0
        || (a == 100 && (64..128).contains(&b))
        || (a == 192 && b == 0 && c == 0)
        || (a == 198 && (18..20).contains(&b))
        || a >= 240)
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
        || (first == 0x2001 && ip.segments()[1] == 0x0db8))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Data,
    Http,
}

fn scheme(src: &str) -> Option<Scheme> {
    let lower = src.get(..8).unwrap_or(src).to_ascii_lowercase();
    if lower.starts_with("data:") {
        Some(Scheme::Data)
    } else if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(Scheme::Http)
    } else {
        None
    }
}

fn exceeds(len: u64, max_bytes: usize) -> bool {
    usize::try_from(len).map_or(true, |len| len > max_bytes)
}
