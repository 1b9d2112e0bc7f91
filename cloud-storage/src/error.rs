use cloud_profile::ConfigError;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Bucket not found: {message}")]
    BucketNotFound { message: String },

    #[error("Access denied. Check credentials and bucket policy. ({message})")]
    AccessDenied { message: String },

    #[error("Invalid access key. ({message})")]
    InvalidAccessKey { message: String },

    #[error("S3 error [{code}]: {message}")]
    Service { code: String, message: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Media error: {message}")]
    Media { message: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },
}

impl StorageError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<B: Into<String>, K: Into<String>>(bucket: B, key: K) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create a media encoding/decoding error
    pub fn media<S: Into<String>>(message: S) -> Self {
        Self::Media {
            message: message.into(),
        }
    }

    /// Classify an S3 service error code into a user-facing error.
    pub fn from_service(bucket: &str, key: &str, code: &str, message: &str) -> Self {
        let message = message.to_string();
        match code {
            "NoSuchKey" | "NotFound" | "404" => Self::not_found(bucket, key),
            "NoSuchBucket" => Self::BucketNotFound { message },
            "AccessDenied" | "Forbidden" | "403" => Self::AccessDenied { message },
            "InvalidAccessKeyId" => Self::InvalidAccessKey { message },
            _ => Self::Service {
                code: code.to_string(),
                message,
            },
        }
    }

    /// Classify a service error that carried no code, such as the
    /// body-less reply to a HEAD request, by its HTTP status.
    pub fn from_status(bucket: &str, key: &str, status: u16, message: &str) -> Self {
        let message = if message.is_empty() {
            format!("HTTP {status}")
        } else {
            message.to_string()
        };
        match status {
            403 => Self::AccessDenied { message },
            404 => Self::not_found(bucket, key),
            _ => Self::Service {
                code: status.to_string(),
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Errors that mean the credentials themselves are wrong, as opposed to
    /// a transient or connectivity failure.
    pub fn is_credential_error(&self) -> bool {
        match self {
            Self::AccessDenied { .. } | Self::InvalidAccessKey { .. } | Self::Config(_) => true,
            Self::Service { code, .. } => code == "SignatureDoesNotMatch",
            _ => false,
        }
    }
}
