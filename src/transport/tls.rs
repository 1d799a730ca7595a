//! Server-side TLS configuration via rustls.
//!
//! The server core only holds a shared reference to a config; building one
//! (certificate chain, private key) happens up front, and the config is
//! immutable while the server is running.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{Error, Result};

/// A shared server TLS configuration.
///
/// Cloning is cheap; all clones refer to the same underlying
/// [`rustls::ServerConfig`].
#[derive(Clone)]
pub struct TlsConfig {
    inner: Arc<rustls::ServerConfig>,
}

impl TlsConfig {
    /// Build a configuration from PEM-encoded certificate chain and
    /// private key files.
    pub fn from_pem_files(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let certs = load_certs(cert_path.as_ref())?;
        let key = load_key(key_path.as_ref())?;
        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        Ok(Self {
            inner: Arc::new(config),
        })
    }

    /// Wrap an existing rustls configuration.
    pub fn from_server_config(config: Arc<rustls::ServerConfig>) -> Self {
        Self { inner: config }
    }

    pub(crate) fn server_config(&self) -> Arc<rustls::ServerConfig> {
        self.inner.clone()
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig").finish_non_exhaustive()
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader).collect::<io::Result<_>>()?;
    if certs.is_empty() {
        return Err(Error::Invalid("no certificates in PEM file"));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?.ok_or(Error::Invalid("no private key in PEM file"))
}
