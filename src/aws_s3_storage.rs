use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use pin_project::pin_project;
use tokio::io::AsyncReadExt;
use tokio_stream::Stream;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::{
    BlobInfo, ContainerInfo, Error, Result, Segment, StorageBackend, StorageOptions,
};

/// A storage backend over AWS S3.
///
/// Containers are buckets and blobs are objects. Bucket creation is made
/// idempotent by treating `BucketAlreadyOwnedByYou` and
/// `BucketAlreadyExists` as success.
pub struct AwsS3Storage {
    client: aws_sdk_s3::Client,
}

impl AwsS3Storage {
    /// Connects using the SDK's environment configuration chain.
    pub async fn new() -> Self {
        let config = aws_config::load_from_env().await;
        let client = aws_sdk_s3::Client::new(&config);

        Self { client }
    }

    /// Connects with the specified options.
    ///
    /// When the options carry explicit credentials, the account name maps to
    /// the access key id and the account key to the secret key; everything
    /// else (region, endpoint) still comes from the environment. Without
    /// explicit credentials this is equivalent to `new`.
    pub async fn with_options(options: &StorageOptions) -> Result<Self> {
        if !options.has_explicit_credentials() {
            return Ok(Self::new().await);
        }

        let credentials = options.resolve_credentials()?;

        let config = aws_config::from_env()
            .credentials_provider(aws_sdk_s3::Credentials::new(
                credentials.account,
                credentials.access_key,
                None,
                None,
                "blob-store-options",
            ))
            .load()
            .await;

        Ok(Self {
            client: aws_sdk_s3::Client::new(&config),
        })
    }

    /// Wraps an existing S3 client.
    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    async fn blob_exists(&self, container: &str, path: &str) -> Result<bool> {
        // We fetch the ACL to know whether the object exists.
        let req = self.client.get_object_acl().bucket(container).key(path);

        match req.send().await {
            Ok(_acl) => Ok(true),
            Err(aws_sdk_s3::types::SdkError::ServiceError { err, raw: _ }) => {
                if let aws_sdk_s3::error::GetObjectAclErrorKind::NoSuchKey(_) = err.kind {
                    Ok(false)
                } else if err.code() == Some("NoSuchBucket") {
                    Ok(false)
                } else {
                    Err(Error::forward_with_context(
                        err,
                        format!("could not fetch AWS S3 ACL for object: {}/{}", container, path),
                    ))
                }
            }
            Err(err) => Err(Error::forward_with_context(
                err,
                format!(
                    "unexpected SDK error while fetching AWS S3 ACL for object: {}/{}",
                    container, path
                ),
            )),
        }
    }
}

#[pin_project]
#[derive(Debug)]
struct ByteStreamReader(#[pin] aws_sdk_s3::types::ByteStream);

impl Stream for ByteStreamReader {
    type Item = std::result::Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project()
            .0
            .poll_next(cx)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

#[async_trait]
impl StorageBackend for AwsS3Storage {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<()> {
        debug!("creating AWS S3 bucket if absent: {}", container);

        let req = self.client.create_bucket().bucket(container);

        match req.send().await {
            Ok(_output) => Ok(()),
            Err(aws_sdk_s3::types::SdkError::ServiceError { err, raw: _ }) => match &err.kind {
                aws_sdk_s3::error::CreateBucketErrorKind::BucketAlreadyOwnedByYou(_)
                | aws_sdk_s3::error::CreateBucketErrorKind::BucketAlreadyExists(_) => Ok(()),
                _ => Err(Error::forward_with_context(
                    err,
                    format!("could not create AWS S3 bucket: {}", container),
                )),
            },
            Err(err) => Err(Error::forward_with_context(
                err,
                format!(
                    "unexpected SDK error while creating AWS S3 bucket: {}",
                    container
                ),
            )),
        }
    }

    async fn write_text(&self, container: &str, path: &str, content: &str) -> Result<()> {
        let body = aws_sdk_s3::types::ByteStream::from(content.as_bytes().to_vec());

        let req = self
            .client
            .put_object()
            .bucket(container)
            .key(path)
            .body(body);

        match req.send().await {
            Ok(_output) => Ok(()),
            Err(aws_sdk_s3::types::SdkError::ServiceError { err, raw: _ }) => {
                if err.code() == Some("NoSuchBucket") {
                    Err(Error::NoSuchContainer(container.to_owned()))
                } else {
                    Err(Error::forward_with_context(
                        err,
                        format!("could not upload blob to AWS S3: {}/{}", container, path),
                    ))
                }
            }
            Err(err) => Err(Error::forward_with_context(
                err,
                format!(
                    "unexpected SDK error while uploading blob to AWS S3: {}/{}",
                    container, path
                ),
            )),
        }
    }

    async fn read_text(&self, container: &str, path: &str) -> Result<String> {
        let req = self.client.get_object().bucket(container).key(path);

        let object = match req.send().await {
            Ok(object) => object,
            Err(aws_sdk_s3::types::SdkError::ServiceError { err, raw: _ }) => {
                return if let aws_sdk_s3::error::GetObjectErrorKind::NoSuchKey(_) = err.kind {
                    Err(Error::no_such_blob(container, path))
                } else if err.code() == Some("NoSuchBucket") {
                    Err(Error::NoSuchContainer(container.to_owned()))
                } else {
                    Err(Error::forward_with_context(
                        err,
                        format!("could not download blob from AWS S3: {}/{}", container, path),
                    ))
                };
            }
            Err(err) => {
                return Err(Error::forward_with_context(
                    err,
                    format!(
                        "unexpected SDK error while downloading blob from AWS S3: {}/{}",
                        container, path
                    ),
                ));
            }
        };

        let bytestream = ByteStreamReader(object.body);
        let mut reader = Box::pin(StreamReader::new(bytestream));
        let mut content = String::new();

        reader.read_to_string(&mut content).await.map_err(|err| {
            Error::forward_with_context(
                err,
                format!("could not read blob content: {}/{}", container, path),
            )
        })?;

        Ok(content)
    }

    async fn list_containers(&self) -> Result<Segment<ContainerInfo>> {
        let output = self.client.list_buckets().send().await.map_err(|err| {
            Error::forward_with_context(err, "could not list AWS S3 buckets")
        })?;

        let items = output
            .buckets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|bucket| bucket.name)
            .map(|name| ContainerInfo { name })
            .collect();

        // ListBuckets is not paginated: the response is always complete.
        Ok(Segment::complete(items))
    }

    async fn list_blobs(&self, container: &str) -> Result<Segment<BlobInfo>> {
        let req = self.client.list_objects_v2().bucket(container);

        let output = match req.send().await {
            Ok(output) => output,
            Err(aws_sdk_s3::types::SdkError::ServiceError { err, raw: _ }) => {
                return if let aws_sdk_s3::error::ListObjectsV2ErrorKind::NoSuchBucket(_) = err.kind
                {
                    Err(Error::NoSuchContainer(container.to_owned()))
                } else {
                    Err(Error::forward_with_context(
                        err,
                        format!("could not list AWS S3 bucket: {}", container),
                    ))
                };
            }
            Err(err) => {
                return Err(Error::forward_with_context(
                    err,
                    format!(
                        "unexpected SDK error while listing AWS S3 bucket: {}",
                        container
                    ),
                ));
            }
        };

        let items = output
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|object| {
                object.key.map(|path| BlobInfo {
                    path,
                    size: object.size as u64,
                })
            })
            .collect();

        Ok(Segment {
            items,
            continuation: output.next_continuation_token,
        })
    }

    async fn delete_blob_if_exists(&self, container: &str, path: &str) -> Result<bool> {
        if !self.blob_exists(container, path).await? {
            return Ok(false);
        }

        debug!("deleting AWS S3 object: {}/{}", container, path);

        self.client
            .delete_object()
            .bucket(container)
            .key(path)
            .send()
            .await
            .map_err(|err| {
                Error::forward_with_context(
                    err,
                    format!("could not delete AWS S3 object: {}/{}", container, path),
                )
            })?;

        Ok(true)
    }
}
