//! HTTP client for S3 endpoints whose certificates cannot be verified
//!
//! Self-hosted S3-compatible services often run with self-signed
//! certificates. When `skip_ssl_verification` is set the S3 client is built
//! on this connector, which still negotiates TLS but accepts any server
//! certificate.

use crate::error::{Result, SemverStoreError};
use aws_config::retry::ErrorKind::TransientError;
use aws_smithy_runtime_api::client::http::{
    HttpClient, HttpConnector, HttpConnectorFuture, HttpConnectorSettings, SharedHttpConnector,
};
use aws_smithy_runtime_api::client::orchestrator::HttpRequest;
use aws_smithy_runtime_api::client::result::ConnectorError;
use aws_smithy_runtime_api::client::runtime_components::RuntimeComponents;
use aws_smithy_runtime_api::http::Response;
use aws_smithy_types::body::SdkBody;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector as LegacyHttpConnector;
use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::rt::TokioExecutor;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;

/// Smithy HTTP client that skips server certificate verification
#[derive(Clone)]
pub struct InsecureTlsClient {
    client: LegacyClient<HttpsConnector<LegacyHttpConnector>, SdkBody>,
}

impl InsecureTlsClient {
    pub fn new() -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls_config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| SemverStoreError::config(format!("unable to configure TLS: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth();

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();

        Ok(InsecureTlsClient {
            client: LegacyClient::builder(TokioExecutor::new()).build(connector),
        })
    }
}

impl std::fmt::Debug for InsecureTlsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsecureTlsClient").finish_non_exhaustive()
    }
}

impl HttpClient for InsecureTlsClient {
    fn http_connector(
        &self,
        _settings: &HttpConnectorSettings,
        _components: &RuntimeComponents,
    ) -> SharedHttpConnector {
        SharedHttpConnector::new(self.clone())
    }
}

impl HttpConnector for InsecureTlsClient {
    fn call(&self, request: HttpRequest) -> HttpConnectorFuture {
        let client = self.client.clone();

        HttpConnectorFuture::new(Box::pin(async move {
            let request = request.try_into_http1x().map_err(|e| {
                ConnectorError::other(
                    format!("failed to convert to HTTP request: {}", e).into(),
                    None,
                )
            })?;

            let response = client.request(request).await.map_err(|e| {
                ConnectorError::other(
                    format!("request failed: {}", e).into(),
                    Some(TransientError),
                )
            })?;

            let (parts, body) = response.into_parts();
            let mut smithy_response = Response::new(parts.status.into(), SdkBody::from_body_1_x(body));
            for (name, value) in parts.headers.iter() {
                if let Ok(value) = value.to_str() {
                    smithy_response
                        .headers_mut()
                        .insert(name.as_str().to_owned(), value.to_owned());
                }
            }
            Ok(smithy_response)
        }))
    }
}

/// Accepts every server certificate; handshake signatures are still checked
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_unknown_certificate() {
        let verifier = AcceptAnyCertificate(Arc::new(rustls::crypto::ring::default_provider()));
        let certificate = CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01, 0x00]);
        let server_name = ServerName::try_from("minio.local").unwrap();

        assert!(verifier
            .verify_server_cert(&certificate, &[], &server_name, &[], UnixTime::now())
            .is_ok());
    }

    #[test]
    fn test_offers_provider_signature_schemes() {
        let verifier = AcceptAnyCertificate(Arc::new(rustls::crypto::ring::default_provider()));
        let schemes = verifier.supported_verify_schemes();

        assert!(!schemes.is_empty());
        assert!(schemes.contains(&SignatureScheme::ECDSA_NISTP256_SHA256));
    }

    #[test]
    fn test_client_builds_without_a_runtime() {
        assert!(InsecureTlsClient::new().is_ok());
    }
}
