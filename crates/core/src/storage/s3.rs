//! S3 transport built on the AWS SDK.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use tracing::debug;

use super::client::{ObjectMeta, ObjectStoreClient};
use super::config::TransportOptions;
use super::error::StorageError;
use super::key::ObjectKey;
use super::multipart::PartRecord;

/// S3-compatible object store client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Wrap an existing SDK client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from transport options.
    ///
    /// Region and credentials fall back to the SDK's default provider chains
    /// when not set.
    pub async fn from_options(bucket: impl Into<String>, options: &TransportOptions) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(access_key_id), Some(secret_access_key)) =
            (&options.access_key_id, &options.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "stowage-static",
            ));
        }
        let shared = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(options.force_path_style);
        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self::new(Client::from_conf(builder.build()), bucket)
    }

    /// Bucket this client writes to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Map an SDK error, turning 404 responses into `NotFound`.
fn map_sdk_error<E>(err: SdkError<E>, key: &ObjectKey) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let SdkError::ServiceError(service_err) = &err
        && service_err.raw().status().as_u16() == 404
    {
        return StorageError::not_found(key.as_str());
    }
    StorageError::operation(format!("{key}: {}", DisplayErrorContext(&err)))
}

fn sdk_part_number(part_number: u32) -> Result<i32, StorageError> {
    i32::try_from(part_number)
        .map_err(|_| StorageError::invalid_argument(format!("part number {part_number} out of range")))
}

impl ObjectStoreClient for S3Client {
    async fn put_object(
        &self,
        key: &ObjectKey,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let len = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .set_content_type(content_type.map(String::from))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        debug!(key = %key, bytes = len, "Put object");
        Ok(())
    }

    async fn head_object(&self, key: &ObjectKey) -> Result<ObjectMeta, StorageError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(ObjectMeta {
            content_length: output
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or(0),
            content_type: output.content_type().map(String::from),
            etag: output.e_tag().map(String::from),
        })
    }

    async fn delete_object(&self, key: &ObjectKey) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        debug!(key = %key, "Deleted object");
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        key: &ObjectKey,
        content_type: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key.as_str())
            .set_content_type(content_type.map(String::from))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(output.upload_id().map(String::from))
    }

    async fn upload_part(
        &self,
        key: &ObjectKey,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<Option<String>, StorageError> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key.as_str())
            .upload_id(upload_id)
            .part_number(sdk_part_number(part_number)?)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(output.e_tag().map(String::from))
    }

    async fn complete_multipart_upload(
        &self,
        key: &ObjectKey,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<(), StorageError> {
        let completed_parts = parts
            .iter()
            .map(|part| {
                Ok(CompletedPart::builder()
                    .part_number(sdk_part_number(part.part_number)?)
                    .e_tag(&part.etag)
                    .build())
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key.as_str())
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        key: &ObjectKey,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key.as_str())
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(())
    }
}
