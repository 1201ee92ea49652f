use crate::domain::SemanticVersion;
use crate::error::{SemverStoreError, Result};
use crate::store::tls::InsecureTlsClient;
use crate::store::{Snapshot, VersionStore, WriteOutcome};
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Attempts the S3 client makes for a single request before giving up on a
/// transport error.
const CLIENT_MAX_ATTEMPTS: u32 = 12;

/// Static access keys for S3
#[derive(Debug, Clone, PartialEq)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Validated settings for the object-storage driver
#[derive(Debug, Clone, PartialEq)]
pub struct S3Spec {
    pub bucket: String,
    pub key: String,
    pub region: String,
    /// Custom S3-compatible endpoint; path-style addressing is used with it
    pub endpoint: Option<String>,
    /// Static keys, or `None` for the ambient credential chain
    pub credentials: Option<S3Credentials>,
    pub disable_ssl: bool,
    /// Accept any server certificate on HTTPS endpoints
    pub skip_ssl_verification: bool,
    pub server_side_encryption: Option<String>,
}

impl S3Spec {
    /// Endpoint URL with a scheme, honouring `disable_ssl` for bare host names
    pub fn endpoint_url(&self) -> Option<String> {
        self.endpoint.as_ref().map(|endpoint| {
            if endpoint.contains("://") {
                endpoint.clone()
            } else if self.disable_ssl {
                format!("http://{}", endpoint)
            } else {
                format!("https://{}", endpoint)
            }
        })
    }
}

/// Version stored as an S3 object, guarded by its ETag
///
/// Conditional writes use `If-Match: <etag>`, or `If-None-Match: *` when the
/// object does not exist yet. The SDK is async; the store owns a
/// single-threaded runtime and blocks on each request.
pub struct S3Store {
    runtime: Runtime,
    client: Client,
    bucket: String,
    key: String,
    server_side_encryption: Option<ServerSideEncryption>,
}

impl S3Store {
    /// Build an S3 client from `spec`
    pub fn connect(spec: S3Spec) -> Result<Self> {
        let runtime = new_runtime()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(spec.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(CLIENT_MAX_ATTEMPTS));

        match &spec.credentials {
            Some(creds) => {
                loader = loader.credentials_provider(Credentials::new(
                    creds.access_key_id.clone(),
                    creds.secret_access_key.clone(),
                    creds.session_token.clone(),
                    None,
                    "semver-store",
                ));
            }
            None => info!("Using default credential chain for authentication."),
        }

        if spec.skip_ssl_verification {
            warn!(bucket = %spec.bucket, "TLS certificate verification is disabled");
            loader = loader.http_client(InsecureTlsClient::new()?);
        }

        let shared_config = runtime.block_on(loader.load());
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config).force_path_style(true);
        if let Some(endpoint) = spec.endpoint_url() {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        Ok(Self::from_parts(runtime, client, &spec))
    }

    /// Use an already configured client (e.g. one backed by a test HTTP client)
    pub fn with_client(client: Client, spec: &S3Spec) -> Result<Self> {
        Ok(Self::from_parts(new_runtime()?, client, spec))
    }

    fn from_parts(runtime: Runtime, client: Client, spec: &S3Spec) -> Self {
        S3Store {
            runtime,
            client,
            bucket: spec.bucket.clone(),
            key: spec.key.clone(),
            server_side_encryption: spec
                .server_side_encryption
                .as_deref()
                .map(ServerSideEncryption::from),
        }
    }

    fn put(&self, version: &SemanticVersion, precondition: Precondition<'_>) -> Result<WriteOutcome> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type("text/plain")
            .body(ByteStream::from(version.to_string().into_bytes()))
            .set_server_side_encryption(self.server_side_encryption.clone());

        request = match precondition {
            Precondition::None => request,
            Precondition::Absent => request.if_none_match("*"),
            Precondition::ETag(etag) => request.if_match(etag),
        };

        match self.runtime.block_on(request.send()) {
            Ok(_) => Ok(WriteOutcome::Written),
            Err(err) if is_precondition_failure(&err) => {
                debug!(bucket = %self.bucket, key = %self.key, "conditional put rejected");
                Ok(WriteOutcome::Conflict)
            }
            Err(err) => Err(SemverStoreError::storage(format!(
                "failed to write s3://{}/{}: {}",
                self.bucket,
                self.key,
                err.into_service_error()
            ))),
        }
    }
}

enum Precondition<'a> {
    None,
    Absent,
    ETag(&'a str),
}

impl VersionStore for S3Store {
    type Token = Option<String>;

    fn read(&self) -> Result<Snapshot<Option<String>>> {
        let request = self.client.get_object().bucket(&self.bucket).key(&self.key);

        let output = match self.runtime.block_on(request.send()) {
            Ok(output) => output,
            Err(err) => {
                return match err.into_service_error() {
                    GetObjectError::NoSuchKey(_) => Ok(Snapshot {
                        version: None,
                        token: None,
                    }),
                    other => Err(SemverStoreError::storage(format!(
                        "failed to read s3://{}/{}: {}",
                        self.bucket, self.key, other
                    ))),
                }
            }
        };

        let etag = output.e_tag().map(str::to_string);
        let bytes = self
            .runtime
            .block_on(output.body.collect())
            .map_err(|e| SemverStoreError::storage(format!("failed to read object body: {}", e)))?
            .into_bytes();
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| SemverStoreError::version("stored version is not valid UTF-8"))?;

        Ok(Snapshot {
            version: Some(SemanticVersion::parse(&text)?),
            token: etag,
        })
    }

    fn write_if(&self, version: &SemanticVersion, expected: &Option<String>) -> Result<WriteOutcome> {
        let precondition = match expected {
            Some(etag) => Precondition::ETag(etag),
            None => Precondition::Absent,
        };
        self.put(version, precondition)
    }

    fn write(&self, version: &SemanticVersion) -> Result<()> {
        match self.put(version, Precondition::None)? {
            WriteOutcome::Written => Ok(()),
            WriteOutcome::Conflict => Err(SemverStoreError::storage(
                "unconditional put was rejected by a precondition",
            )),
        }
    }
}

fn new_runtime() -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// 412 Precondition Failed, or 409 when S3 sees two conditional writes at once
fn is_precondition_failure<E>(err: &SdkError<E>) -> bool {
    err.raw_response()
        .map(|response| matches!(response.status().as_u16(), 409 | 412))
        .unwrap_or(false)
}
