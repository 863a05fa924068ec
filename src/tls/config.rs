use crate::tls::verifier::FetchCertVerifier;
use anyhow::Context;
use rustls::crypto::ring::{default_provider, DEFAULT_CIPHER_SUITES};
use rustls::{ClientConfig, RootCertStore};
use std::path::PathBuf;
use std::sync::Arc;

/// How the client should treat server certificates.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Accept any certificate.
    pub skip_verify: bool,
    /// PEM bundle that replaces the built-in webpki roots.
    pub ca_file: Option<PathBuf>,
}

impl TlsOptions {
    pub fn build(&self) -> Result<ClientConfig, anyhow::Error> {
        let mut root_store = RootCertStore::empty();
        if let Some(file_path) = self.ca_file.as_ref() {
            let f = std::fs::File::open(file_path)
                .with_context(|| format!("Failed to open CA file {}", file_path.display()))?;
            let mut rd = std::io::BufReader::new(f);
            for cert in rustls_pemfile::certs(&mut rd) {
                root_store.add(cert?)?;
            }
            ensure!(
                !root_store.is_empty(),
                "No certificates found in {}",
                file_path.display()
            );
        } else {
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        };

        let provider = Arc::new(rustls::crypto::CryptoProvider {
            cipher_suites: DEFAULT_CIPHER_SUITES.to_vec(),
            ..default_provider()
        });

        let verifier = FetchCertVerifier::new(self.skip_verify, provider.clone(), &root_store)?;

        let mut tls_config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(rustls::DEFAULT_VERSIONS)?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        tls_config
            .dangerous()
            .set_certificate_verifier(Arc::new(verifier));

        Ok(tls_config)
    }
}
