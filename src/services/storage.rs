use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

/// Object storage operations the pipeline relies on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Server-side copy within one bucket.
    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StorageError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// All object keys under `prefix`, across every result page.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Client for S3-compatible object storage.
pub struct S3Storage {
    region: Region,
    credentials: Credentials,
}

impl S3Storage {
    pub fn new(
        region: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            region,
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, StorageError> {
        Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| StorageError::Config(e.to_string()))
    }
}

/// Map a response status to an error, treating 404 as a missing key.
fn check_status(key: &str, status: u16) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(key.to_string())),
        code => Err(StorageError::Status {
            key: key.to_string(),
            code,
        }),
    }
}

fn s3_error(key: &str, error: S3Error) -> StorageError {
    match error {
        S3Error::HttpFailWithBody(404, _) => StorageError::NotFound(key.to_string()),
        other => StorageError::S3(other),
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .bucket(bucket)?
            .get_object(key)
            .await
            .map_err(|e| s3_error(key, e))?;
        check_status(key, response.status_code())?;
        Ok(response.bytes().to_vec())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .bucket(bucket)?
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(|e| s3_error(key, e))?;
        check_status(key, response.status_code())
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StorageError> {
        let status = self
            .bucket(bucket)?
            .copy_object_internal(from, to)
            .await
            .map_err(|e| s3_error(from, e))?;
        check_status(from, status)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let response = self
            .bucket(bucket)?
            .delete_object(key)
            .await
            .map_err(|e| s3_error(key, e))?;
        // Deleting a missing key is not an error for S3.
        match check_status(key, response.status_code()) {
            Err(StorageError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        match self.bucket(bucket)?.head_object(key).await {
            Ok((_, status)) => match check_status(key, status) {
                Ok(()) => Ok(true),
                Err(StorageError::NotFound(_)) => Ok(false),
                Err(e) => Err(e),
            },
            Err(e) => match s3_error(key, e) {
                StorageError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let pages = self
            .bucket(bucket)?
            .list(prefix.to_string(), None)
            .await
            .map_err(|e| s3_error(prefix, e))?;

        Ok(pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| object.key)
            .collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] S3Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("S3 returned status {code} for {key}")]
    Status { key: String, code: u16 },

    #[error("Storage configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(check_status("k", 200).is_ok());
        assert!(check_status("k", 204).is_ok());
        assert!(matches!(
            check_status("k", 404),
            Err(StorageError::NotFound(key)) if key == "k"
        ));
        assert!(matches!(
            check_status("k", 503),
            Err(StorageError::Status { code: 503, .. })
        ));
    }

    #[test]
    fn test_http_404_body_is_not_found() {
        let err = s3_error("k", S3Error::HttpFailWithBody(404, "NoSuchKey".to_string()));
        assert!(matches!(err, StorageError::NotFound(_)));
        let err = s3_error("k", S3Error::HttpFailWithBody(500, "boom".to_string()));
        assert!(matches!(err, StorageError::S3(_)));
    }
}
