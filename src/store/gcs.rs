use crate::domain::SemanticVersion;
use crate::error::{SemverStoreError, Result};
use crate::store::{Snapshot, VersionStore, WriteOutcome};
use google_cloud_storage::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Generation value meaning "no live object"; also the create-only precondition
pub const NO_GENERATION: i64 = 0;

const STATUS_NOT_FOUND: u16 = 404;
const STATUS_PRECONDITION_FAILED: u16 = 412;

/// Times a read restarts when the object is replaced between fetching its
/// metadata and downloading that generation
const READ_ATTEMPTS: usize = 3;

/// Validated settings for the managed-storage driver
#[derive(Debug, Clone, PartialEq)]
pub struct GcsSpec {
    pub bucket: String,
    pub key: String,
    /// Service account JSON, or `None` for ambient Google credentials
    pub json_key: Option<String>,
    pub endpoint: Option<String>,
}

/// Version stored as a Google Cloud Storage object, guarded by its generation
pub struct GcsStore {
    runtime: Runtime,
    client: Client,
    bucket: String,
    key: String,
}

impl GcsStore {
    /// Build a storage client from `spec`
    pub fn connect(spec: GcsSpec) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let mut config = runtime.block_on(async {
            match &spec.json_key {
                Some(json) => match CredentialsFile::new_from_str(json).await {
                    Ok(credentials) => ClientConfig::default().with_credentials(credentials).await,
                    Err(e) => Err(e),
                },
                None => {
                    info!("Using default Google credentials for authentication.");
                    ClientConfig::default().with_auth().await
                }
            }
        })
        .map_err(|e| SemverStoreError::config(format!("unable to load gcs credentials: {}", e)))?;

        if let Some(endpoint) = &spec.endpoint {
            config.storage_endpoint = endpoint.clone();
        }

        Ok(Self::from_parts(runtime, Client::new(config), &spec))
    }

    /// Use an already configured client (e.g. an anonymous one pointed at a
    /// local server)
    pub fn with_client(client: Client, spec: &GcsSpec) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self::from_parts(runtime, client, spec))
    }

    fn from_parts(runtime: Runtime, client: Client, spec: &GcsSpec) -> Self {
        GcsStore {
            runtime,
            client,
            bucket: spec.bucket.clone(),
            key: spec.key.clone(),
        }
    }

    fn object_request(&self, generation: Option<i64>) -> GetObjectRequest {
        GetObjectRequest {
            bucket: self.bucket.clone(),
            object: self.key.clone(),
            generation,
            ..Default::default()
        }
    }

    fn upload(&self, version: &SemanticVersion, if_generation_match: Option<i64>) -> Result<WriteOutcome> {
        let request = UploadObjectRequest {
            bucket: self.bucket.clone(),
            if_generation_match,
            ..Default::default()
        };
        let upload_type = UploadType::Simple(Media::new(self.key.clone()));
        let body = version.to_string().into_bytes();

        match self
            .runtime
            .block_on(self.client.upload_object(&request, body, &upload_type))
        {
            Ok(object) => {
                debug!(generation = object.generation, "uploaded version object");
                Ok(WriteOutcome::Written)
            }
            Err(err) if status_code(&err) == Some(STATUS_PRECONDITION_FAILED) => {
                debug!(bucket = %self.bucket, key = %self.key, "generation precondition failed");
                Ok(WriteOutcome::Conflict)
            }
            Err(err) => Err(self.storage_error("write", err)),
        }
    }

    fn storage_error(&self, action: &str, err: GcsError) -> SemverStoreError {
        SemverStoreError::storage(format!(
            "failed to {} gs://{}/{}: {}",
            action, self.bucket, self.key, err
        ))
    }
}

impl VersionStore for GcsStore {
    type Token = i64;

    fn read(&self) -> Result<Snapshot<i64>> {
        for _ in 0..READ_ATTEMPTS {
            let object = match self
                .runtime
                .block_on(self.client.get_object(&self.object_request(None)))
            {
                Ok(object) => object,
                Err(err) if status_code(&err) == Some(STATUS_NOT_FOUND) => {
                    return Ok(Snapshot {
                        version: None,
                        token: NO_GENERATION,
                    })
                }
                Err(err) => return Err(self.storage_error("read", err)),
            };

            let pinned = self.object_request(Some(object.generation));
            let data = match self
                .runtime
                .block_on(self.client.download_object(&pinned, &Range::default()))
            {
                Ok(data) => data,
                Err(err) if status_code(&err) == Some(STATUS_NOT_FOUND) => {
                    debug!(generation = object.generation, "object replaced while reading, restarting");
                    continue;
                }
                Err(err) => return Err(self.storage_error("read", err)),
            };

            let text = String::from_utf8(data)
                .map_err(|_| SemverStoreError::version("stored version is not valid UTF-8"))?;
            return Ok(Snapshot {
                version: Some(SemanticVersion::parse(&text)?),
                token: object.generation,
            });
        }

        Err(SemverStoreError::storage(format!(
            "gs://{}/{} kept changing while being read",
            self.bucket, self.key
        )))
    }

    fn write_if(&self, version: &SemanticVersion, expected: &i64) -> Result<WriteOutcome> {
        self.upload(version, Some(*expected))
    }

    fn write(&self, version: &SemanticVersion) -> Result<()> {
        match self.upload(version, None)? {
            WriteOutcome::Written => Ok(()),
            WriteOutcome::Conflict => Err(SemverStoreError::storage(
                "unconditional upload was rejected by a precondition",
            )),
        }
    }
}

/// HTTP status behind a storage error, whether or not the body was a JSON error
fn status_code(err: &GcsError) -> Option<u16> {
    match err {
        GcsError::Response(response) => Some(response.code),
        GcsError::HttpClient(err) | GcsError::RawResponse(err, _) => {
            err.status().map(|status| status.as_u16())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_cloud_storage::http::error::ErrorResponse;

    fn response(code: u16) -> GcsError {
        GcsError::Response(ErrorResponse {
            code,
            errors: Vec::new(),
            message: "error".to_string(),
        })
    }

    #[test]
    fn test_status_code_of_service_error() {
        assert_eq!(status_code(&response(STATUS_PRECONDITION_FAILED)), Some(412));
        assert_eq!(status_code(&response(STATUS_NOT_FOUND)), Some(404));
        assert_eq!(status_code(&response(503)), Some(503));
    }

    #[test]
    fn test_status_code_without_response() {
        assert_eq!(
            status_code(&GcsError::InvalidRangeHeader("bytes=x".to_string())),
            None
        );
        assert_eq!(
            status_code(&GcsError::TokenSource("no credentials".into())),
            None
        );
    }
}
