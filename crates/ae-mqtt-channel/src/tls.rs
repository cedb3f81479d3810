//! TLS configuration for mTLS connections to AWS IoT Core.
//!
//! Loads the X.509 device certificate, private key, and (optionally) a CA
//! certificate from PEM files and builds a rustls client configuration for
//! rumqttc's TLS transport.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use rumqttc::{TlsConfiguration, Transport};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{self, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::config::ConnectionConfig;
use crate::error::{MqttError, MqttResult};

/// Build a TLS transport from the certificate file paths in the config.
pub fn load_tls_transport(config: &ConnectionConfig) -> MqttResult<Transport> {
    let client_config = load_client_config(config)?;
    Ok(Transport::tls_with_config(TlsConfiguration::Rustls(
        Arc::new(client_config),
    )))
}

/// Build the rustls client configuration.
///
/// Client authentication is always required: an empty, missing, or
/// unparseable certificate or key is an error. `skip_server_verification`
/// only replaces the server chain check.
pub fn load_client_config(config: &ConnectionConfig) -> MqttResult<ClientConfig> {
    let certs = read_certificates(&config.certificate_file_path, "client cert")?;
    let key = read_private_key(&config.private_key_file_path)?;

    let builder = if config.skip_server_verification {
        tracing::warn!(
            host = %config.broker_host,
            "server certificate verification disabled"
        );
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification::new()))
    } else {
        ClientConfig::builder().with_root_certificates(root_store(config)?)
    };

    builder
        .with_client_auth_cert(certs, key)
        .map_err(|e| MqttError::Tls(format!("invalid client cert/key pair: {e}")))
}

fn root_store(config: &ConnectionConfig) -> MqttResult<RootCertStore> {
    let mut roots = RootCertStore::empty();

    match config.ca_certificate_file_path.as_deref() {
        Some(path) if !path.is_empty() => {
            for cert in read_certificates(path, "CA cert")? {
                roots
                    .add(cert)
                    .map_err(|e| MqttError::Tls(format!("invalid CA cert '{path}': {e}")))?;
            }
        }
        _ => {
            let native = rustls_native_certs::load_native_certs()
                .map_err(|e| MqttError::Tls(format!("failed to load native roots: {e}")))?;
            let (added, ignored) = roots.add_parsable_certificates(native);
            tracing::debug!(added, ignored, "loaded native root certificates");
        }
    }

    if roots.is_empty() {
        return Err(MqttError::Tls("no trusted root certificates".into()));
    }
    Ok(roots)
}

fn read_certificates(path: &str, what: &str) -> MqttResult<Vec<CertificateDer<'static>>> {
    if path.is_empty() {
        return Err(MqttError::Tls(format!("{what} path is not configured")));
    }

    let file = File::open(path)
        .map_err(|e| MqttError::Tls(format!("failed to read {what} '{path}': {e}")))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MqttError::Tls(format!("failed to parse {what} '{path}': {e}")))?;

    if certs.is_empty() {
        return Err(MqttError::Tls(format!(
            "no PEM certificates found in {what} '{path}'"
        )));
    }
    Ok(certs)
}

// Error messages name the path only, never key material.
fn read_private_key(path: &str) -> MqttResult<PrivateKeyDer<'static>> {
    if path.is_empty() {
        return Err(MqttError::Tls("client key path is not configured".into()));
    }

    let file = File::open(path)
        .map_err(|e| MqttError::Tls(format!("failed to read client key '{path}': {e}")))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| MqttError::Tls(format!("failed to parse client key '{path}': {e}")))?
        .ok_or_else(|| MqttError::Tls(format!("no private key found in '{path}'")))
}

/// Accepts any server certificate chain while still checking handshake
/// signatures against the presented certificate.
#[derive(Debug)]
struct SkipServerVerification {
    algorithms: WebPkiSupportedAlgorithms,
}

impl SkipServerVerification {
    fn new() -> Self {
        Self {
            algorithms: crypto::ring::default_provider().signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
