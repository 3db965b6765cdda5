//! TLS configuration for the PostgreSQL session.
//!
//! MySQL TLS is handled by sqlx itself (see `drivers/mysql`), so only the
//! PostgreSQL side needs a rustls connector.

use std::str::FromStr;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};

use crate::error::{Result, VerifyError};

/// PostgreSQL `sslmode` values supported by the target connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Plain TCP.
    #[default]
    Disable,
    /// TLS without certificate verification.
    Require,
    /// Verify the certificate chain.
    VerifyCa,
    /// Verify the certificate chain and host name.
    VerifyFull,
}

impl SslMode {
    /// Check if this mode requires TLS.
    pub fn requires_tls(&self) -> bool {
        !matches!(self, SslMode::Disable)
    }
}

impl FromStr for SslMode {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disable" | "" => Ok(SslMode::Disable),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(VerifyError::Config(format!(
                "Invalid ssl_mode '{}'. Valid values: disable, require, verify-ca, verify-full",
                other
            ))),
        }
    }
}

/// Builds the rustls connector for tokio-postgres.
pub struct TlsBuilder {
    ssl_mode: SslMode,
}

impl TlsBuilder {
    pub fn new(ssl_mode: SslMode) -> Self {
        Self { ssl_mode }
    }

    /// Connector for the configured mode, or `None` when TLS is disabled.
    pub fn build(&self) -> Result<Option<MakeRustlsConnect>> {
        if !self.ssl_mode.requires_tls() {
            return Ok(None);
        }
        Ok(Some(MakeRustlsConnect::new(self.client_config()?)))
    }

    fn client_config(&self) -> Result<ClientConfig> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| VerifyError::Config(format!("TLS setup failed: {}", e)))?;

        let config = match self.ssl_mode {
            SslMode::Disable => {
                return Err(VerifyError::Config(
                    "Cannot build TLS config for ssl_mode=disable".into(),
                ));
            }
            SslMode::Require => {
                warn!(
                    "ssl_mode=require encrypts the PostgreSQL session but does NOT verify the \
                     server certificate; use verify-full outside trusted networks"
                );
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyCert { provider }))
                    .with_no_client_auth()
            }
            SslMode::VerifyCa | SslMode::VerifyFull => {
                if self.ssl_mode == SslMode::VerifyCa {
                    warn!("ssl_mode=verify-ca also verifies the host name with rustls");
                } else {
                    info!("ssl_mode=verify-full: certificate and host name verification enabled");
                }
                let mut roots = rustls::RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                builder.with_root_certificates(roots).with_no_client_auth()
            }
        };

        Ok(config)
    }
}

/// Verifier for `ssl_mode=require`: any certificate is accepted, handshake
/// signatures are still checked.
#[derive(Debug)]
struct AcceptAnyCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
