use pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::client::danger::HandshakeSignatureValid;
use rustls::client::danger::ServerCertVerified;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::DigitallySignedStruct;
use rustls::Error;
use rustls::RootCertStore;
use rustls::SignatureScheme;
use std::sync::Arc;
use x509_parser::parse_x509_certificate;

/// Webpki verification that logs the presented certificate and can be told
/// to accept anything (`--skip-verify`). Handshake signatures are always
/// checked.
#[derive(Debug)]
pub struct FetchCertVerifier {
    verifier: Arc<dyn ServerCertVerifier>,
    skip_verify: bool,
}

impl FetchCertVerifier {
    pub fn new(
        skip_verify: bool,
        provider: Arc<CryptoProvider>,
        root_store: &RootCertStore,
    ) -> Result<Self, anyhow::Error> {
        let verifier = rustls::client::WebPkiServerVerifier::builder_with_provider(
            root_store.clone().into(),
            provider,
        )
        .build()?;

        Ok(Self {
            verifier,
            skip_verify,
        })
    }
}

fn log_certificate(end_entity: &CertificateDer<'_>) {
    match parse_x509_certificate(end_entity.as_ref()) {
        Ok((_, cert)) => {
            debug!("Server certificate subject: {}", cert.subject());
            debug!("Server certificate issuer: {}", cert.issuer());
            debug!(
                "Server certificate validity: {} - {}",
                cert.validity().not_before,
                cert.validity().not_after
            );
            if let Ok(Some(san)) = cert.tbs_certificate.subject_alternative_name() {
                for name in &san.value.general_names {
                    debug!("Server certificate SAN: {}", name);
                }
            }
        }
        Err(e) => debug!("Failed to parse server certificate: {}", e),
    }
}

impl ServerCertVerifier for FetchCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            log_certificate(end_entity);
        }

        if self.skip_verify {
            debug!("Certificate verification skipped for {:?}", server_name);
            Ok(ServerCertVerified::assertion())
        } else {
            self.verifier
                .verify_server_cert(end_entity, intermediates, server_name, ocsp, now)
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.verifier.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.verifier.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.verifier.supported_verify_schemes()
    }
}
