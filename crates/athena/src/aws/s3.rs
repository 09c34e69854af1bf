use async_trait::async_trait;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use dbtools_core::S3Uri;
use tracing::{info, warn};

use crate::error::{DbToolsError, Result};
use crate::services::ObjectStore;

/// `DeleteObjects` accepts at most this many keys per call.
const DELETE_BATCH: usize = 1000;

fn sdk_err(e: impl std::fmt::Display) -> DbToolsError {
    DbToolsError::AwsSdk(e.to_string())
}

/// [`ObjectStore`] over the S3 API.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    async fn list_keys(&self, uri: &S3Uri) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&uri.bucket)
                .prefix(&uri.key)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(sdk_err)?;

            keys.extend(resp.contents().iter().filter_map(|o| o.key().map(String::from)));

            token = resp.next_continuation_token().map(String::from);
            if token.is_none() {
                break;
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn delete_prefix(&self, uri: &str) -> Result<usize> {
        let uri = S3Uri::parse(uri)?;
        if uri.key.is_empty() {
            return Err(DbToolsError::validation(format!(
                "refusing to delete the whole bucket {}",
                uri.bucket
            )));
        }

        let keys = self.list_keys(&uri).await?;
        let mut deleted = 0usize;
        let mut failed: Vec<String> = Vec::new();

        for batch in keys.chunks(DELETE_BATCH) {
            let objects = batch
                .iter()
                .map(|k| ObjectIdentifier::builder().key(k).build().map_err(sdk_err))
                .collect::<Result<Vec<_>>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(sdk_err)?;

            let resp = self
                .client
                .delete_objects()
                .bucket(&uri.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(sdk_err)?;

            let errors = resp.errors();
            for error in errors {
                warn!(
                    bucket = %uri.bucket,
                    key = error.key().unwrap_or_default(),
                    code = error.code().unwrap_or_default(),
                    "Object could not be deleted"
                );
            }
            failed.extend(errors.iter().map(|e| e.key().unwrap_or("<unknown>").to_string()));
            deleted += batch.len() - errors.len().min(batch.len());
        }

        if !failed.is_empty() {
            return Err(undeleted_objects(&uri, &failed));
        }

        info!(uri = %uri, deleted, "Deleted objects under prefix");
        Ok(deleted)
    }
}

fn undeleted_objects(uri: &S3Uri, keys: &[String]) -> DbToolsError {
    DbToolsError::AwsSdk(format!(
        "could not delete {} object(s) under {uri}: {}",
        keys.len(),
        keys.join(", ")
    ))
}
