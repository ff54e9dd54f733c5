//! TLS connector setup for the hyper transport.
//!
//! TLS support requires both a crypto provider and root certificates:
//!
//! - **Crypto providers** (choose one): `tls-ring` (default with `tls`) or
//!   `tls-aws-lc`. Without either, a process-wide provider installed with
//!   `CryptoProvider::install_default()` is used.
//! - **Root certificates** (choose one): `tls-native-roots` (default with
//!   `tls`) or `tls-webpki-roots`.

use std::sync::Arc;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};

use crate::error::BuildError;

static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// TLS protocol versions a transport may negotiate.
///
/// rustls implements TLS 1.2 and 1.3 only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsVersions {
    /// TLS 1.2 and TLS 1.3.
    #[default]
    Tls12And13,
    /// TLS 1.3 only.
    Tls13Only,
}

impl TlsVersions {
    fn protocol_versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            TlsVersions::Tls12And13 => rustls::ALL_VERSIONS,
            TlsVersions::Tls13Only => TLS13_ONLY,
        }
    }
}

/// Check if TLS features are properly configured.
///
/// Returns true if both a crypto provider AND root certificates are available.
#[inline]
pub const fn has_tls_support() -> bool {
    cfg!(any(feature = "tls-ring", feature = "tls-aws-lc"))
        && cfg!(any(
            feature = "tls-native-roots",
            feature = "tls-webpki-roots"
        ))
}

/// Crypto provider selection.
///
/// Priority:
/// 1. Feature-gated provider (tls-ring or tls-aws-lc)
/// 2. User-installed global default provider
fn crypto_provider() -> Option<Arc<CryptoProvider>> {
    #[cfg(feature = "tls-ring")]
    return Some(Arc::new(rustls::crypto::ring::default_provider()));

    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    return Some(Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    #[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
    CryptoProvider::get_default().cloned()
}

/// Build the default TLS configuration for the given protocol versions.
pub fn default_tls_config(versions: TlsVersions) -> Result<ClientConfig, BuildError> {
    let provider = crypto_provider().ok_or(BuildError::NoCryptoProvider)?;
    let config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(versions.protocol_versions())?
        .with_root_certificates(root_store())
        .with_no_client_auth();
    Ok(config)
}

/// Build the root certificate store from enabled features.
///
/// Native roots win when both root features are enabled. With neither, the
/// store is empty and HTTPS peers cannot be verified.
#[cfg_attr(
    not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")),
    allow(unused_mut)
)]
fn root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();

    #[cfg(feature = "tls-native-roots")]
    {
        let native_certs = rustls_native_certs::load_native_certs();
        if !native_certs.errors.is_empty() {
            // Some certs may still have loaded.
            tracing::debug!("errors loading native certs: {:?}", native_certs.errors);
        }
        roots.add_parsable_certificates(native_certs.certs);
    }

    #[cfg(all(feature = "tls-webpki-roots", not(feature = "tls-native-roots")))]
    {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    #[cfg(not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")))]
    tracing::debug!("no root certificate feature enabled; HTTPS peers cannot be verified");

    roots
}

/// Build a connector that speaks plain HTTP and HTTPS with `config`.
pub fn build_https_connector(config: ClientConfig) -> HttpsConnector<HttpConnector> {
    HttpsConnectorBuilder::new()
        .with_tls_config(config)
        .https_or_http()
        .enable_all_versions()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_versions() {
        assert_eq!(TlsVersions::default(), TlsVersions::Tls12And13);
        assert_eq!(TlsVersions::Tls12And13.protocol_versions().len(), 2);

        let only = TlsVersions::Tls13Only.protocol_versions();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].version, rustls::ProtocolVersion::TLSv1_3);
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[test]
    fn test_default_tls_config() {
        for versions in [TlsVersions::Tls12And13, TlsVersions::Tls13Only] {
            let config = default_tls_config(versions).unwrap();
            assert!(config.alpn_protocols.is_empty());
        }
    }

    #[cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]
    #[test]
    fn test_build_https_connector() {
        let config = default_tls_config(TlsVersions::default()).unwrap();
        let _ = build_https_connector(config);
    }
}
