//! TLS configuration from PEM material.

use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;

use crate::net::listener::TransportError;

/// ALPN offered by the multiplexed listener, most preferred first.
pub const ALPN_MULTIPLEXED: &[&[u8]] = &[b"h2", b"http/1.1"];

/// ALPN offered by the plain TLS listener.
pub const ALPN_HTTP1: &[&[u8]] = &[b"http/1.1"];

/// Build a rustls config from PEM certificate chain and private key.
///
/// Encrypted keys are not decrypted; rustls needs the key in clear.
pub fn load_tls_config(
    cert_pem: &str,
    key_pem: &str,
    passphrase: Option<&str>,
    alpn: &[&[u8]],
) -> Result<RustlsConfig, TransportError> {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_pem.as_bytes())
        .collect::<Result<_, _>>()
        .map_err(|e| TransportError::Tls(format!("invalid certificate: {e}")))?;
    if certs.is_empty() {
        return Err(TransportError::Tls("no certificate found in PEM material".into()));
    }

    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_pem.as_bytes())
        .map_err(|e| TransportError::Tls(format!("invalid private key: {e}")))?
        .ok_or_else(|| {
            if passphrase.is_some() {
                TransportError::Tls("no usable private key; passphrase-protected keys must be decrypted".into())
            } else {
                TransportError::Tls("no private key found in PEM material".into())
            }
        })?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    config.alpn_protocols = alpn.iter().map(|protocol| protocol.to_vec()).collect();

    Ok(RustlsConfig::from_config(Arc::new(config)))
}
