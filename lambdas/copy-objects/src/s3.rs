use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use aws_types::SdkConfig;
use custom_resource::Error;
use lambda_runtime::tracing;

use crate::copier::{ObjectStore, SourceObject};

// S3 accepts parts of 5 MiB and up, except the last one.
const PART_SIZE: usize = 8 * 1024 * 1024;

pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        length: u64,
    ) -> Result<(), Error> {
        let length = i64::try_from(length)
            .map_err(|e| Error::io(format!("content length of s3://{bucket}/{key}"), e))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(length)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                Error::io(
                    format!("uploading s3://{bucket}/{key}"),
                    DisplayErrorContext(e).to_string(),
                )
            })?;

        Ok(())
    }

    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        first: Vec<u8>,
        parts: PartReader,
    ) -> Result<(), Error> {
        let upload = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                Error::io(
                    format!("starting upload of s3://{bucket}/{key}"),
                    DisplayErrorContext(e).to_string(),
                )
            })?;
        let upload_id = upload
            .upload_id()
            .ok_or_else(|| Error::io(format!("starting upload of s3://{bucket}/{key}"), "no upload id"))?
            .to_owned();

        let completed = match self.upload_parts(bucket, key, &upload_id, first, parts).await {
            Ok(completed) => completed,
            Err(e) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::error!(
                        "failed to abort upload of s3://{bucket}/{key}: {}",
                        DisplayErrorContext(abort)
                    );
                }
                return Err(e);
            }
        };

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                Error::io(
                    format!("completing upload of s3://{bucket}/{key}"),
                    DisplayErrorContext(e).to_string(),
                )
            })?;

        Ok(())
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first: Vec<u8>,
        mut parts: PartReader,
    ) -> Result<Vec<CompletedPart>, Error> {
        let mut completed = Vec::new();
        let mut next = Some(first);
        let mut part_number = 1;

        while let Some(part) = next {
            let resp = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(|e| {
                    Error::io(
                        format!("uploading part {part_number} of s3://{bucket}/{key}"),
                        DisplayErrorContext(e).to_string(),
                    )
                })?;

            completed.push(
                CompletedPart::builder()
                    .set_e_tag(resp.e_tag().map(str::to_owned))
                    .part_number(part_number)
                    .build(),
            );
            part_number += 1;
            next = parts.next_part().await?;
        }

        Ok(completed)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, bucket: &str, key: &str, object: SourceObject) -> Result<(), Error> {
        if let Some(length) = object.content_length {
            return self.put_single(bucket, key, object.body, length).await;
        }

        // Unknown length: PutObject needs one, so read a part at a time.
        let mut parts = PartReader::new(object.body, PART_SIZE);
        let first = parts.next_part().await?.unwrap_or_default();
        if parts.is_exhausted() {
            let length = first.len() as u64;
            return self
                .put_single(bucket, key, ByteStream::from(first), length)
                .await;
        }
        self.put_multipart(bucket, key, first, parts).await
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), Error> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::io("building delete request", e))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| Error::io("building delete request", e))?;

        let resp = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                Error::io(
                    format!("deleting objects from s3://{bucket}"),
                    DisplayErrorContext(e).to_string(),
                )
            })?;

        if let Some(failed) = resp.errors().first() {
            return Err(Error::io(
                format!(
                    "deleting s3://{bucket}/{}",
                    failed.key().unwrap_or_default()
                ),
                failed.message().unwrap_or("unknown error").to_owned(),
            ));
        }

        Ok(())
    }
}

/// Cuts a body stream into parts of `part_size` bytes, holding at most one
/// part plus one incoming chunk.
struct PartReader {
    body: ByteStream,
    pending: Vec<u8>,
    part_size: usize,
    done: bool,
}

impl PartReader {
    fn new(body: ByteStream, part_size: usize) -> Self {
        Self {
            body,
            pending: Vec::new(),
            part_size,
            done: false,
        }
    }

    async fn next_part(&mut self) -> Result<Option<Vec<u8>>, Error> {
        while !self.done && self.pending.len() < self.part_size {
            match self.body.next().await {
                Some(chunk) => {
                    let chunk = chunk.map_err(|e| Error::io("reading source body", e))?;
                    self.pending.extend_from_slice(&chunk);
                }
                None => self.done = true,
            }
        }

        if self.pending.is_empty() {
            return Ok(None);
        }
        let rest = self
            .pending
            .split_off(self.part_size.min(self.pending.len()));
        Ok(Some(std::mem::replace(&mut self.pending, rest)))
    }

    fn is_exhausted(&self) -> bool {
        self.done && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parts_are_cut_to_size() {
        let mut parts = PartReader::new(ByteStream::from(b"0123456789".to_vec()), 4);

        assert_eq!(parts.next_part().await.unwrap(), Some(b"0123".to_vec()));
        assert_eq!(parts.next_part().await.unwrap(), Some(b"4567".to_vec()));
        assert_eq!(parts.next_part().await.unwrap(), Some(b"89".to_vec()));
        assert!(parts.is_exhausted());
        assert_eq!(parts.next_part().await.unwrap(), None);
    }

    #[tokio::test]
    async fn small_body_fits_in_first_part() {
        let mut parts = PartReader::new(ByteStream::from(b"tiny".to_vec()), PART_SIZE);

        assert_eq!(parts.next_part().await.unwrap(), Some(b"tiny".to_vec()));
        assert!(parts.is_exhausted());
    }

    #[tokio::test]
    async fn empty_body_has_no_parts() {
        let mut parts = PartReader::new(ByteStream::from(Vec::new()), PART_SIZE);

        assert_eq!(parts.next_part().await.unwrap(), None);
        assert!(parts.is_exhausted());
    }

    #[tokio::test]
    async fn exact_multiple_leaves_reader_open_until_next_read() {
        let mut parts = PartReader::new(ByteStream::from(b"01234567".to_vec()), 4);

        assert_eq!(parts.next_part().await.unwrap(), Some(b"0123".to_vec()));
        assert_eq!(parts.next_part().await.unwrap(), Some(b"4567".to_vec()));
        assert_eq!(parts.next_part().await.unwrap(), None);
        assert!(parts.is_exhausted());
    }
}
