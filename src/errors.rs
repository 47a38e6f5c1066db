use rusoto_core::RusotoError;
use rusoto_s3::{DeleteObjectError, PutObjectError};
use thiserror::Error;

use crate::entities::Id;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents an SQL error. The storage layer is unreachable or
    /// rejected the statement; nothing is retried.
    #[error("storage fault")]
    Sqlx { source: sqlx::Error },

    #[error("user does not exist")]
    UserNotFound,

    #[error("video {0} does not exist")]
    VideoNotFound(Id),

    #[error("schedule {0} does not exist")]
    ScheduleNotFound(Id),

    #[error("stadium {0} does not exist")]
    StadiumNotFound(Id),

    #[error("video {0} is not liked")]
    LikeNotFound(Id),

    #[error("video {0} is not stored")]
    StoreNotFound(Id),

    #[error("video {0} is already liked")]
    AlreadyLiked(Id),

    #[error("video {0} is already stored")]
    AlreadyStored(Id),

    /// Represents a reference that must resolve by referential
    /// integrity but did not.
    #[error("broken reference to {entity} {id}")]
    BrokenReference { entity: &'static str, id: Id },

    /// Represents an `Authorization` header that is not a bearer credential.
    #[error("authorization must be a bearer credential")]
    MalformedCredential,

    #[error("amount must be positive (got {0})")]
    InvalidAmount(i32),

    /// Represents an error caused by missing parts in a form submission.
    #[error("missing parts")]
    PartsMissing,

    #[error("malformed form submission")]
    MalformedFormSubmission,

    #[error("malformed metadata: {0}")]
    MalformedUploadMetadata(serde_json::Error),

    #[error("unsupported image type: {0}")]
    UnsupportedImageType(String),

    #[error("failed to upload to object storage")]
    UploadFailed { source: RusotoError<PutObjectError> },

    #[error("failed to delete from object storage")]
    DeleteFailed { source: RusotoError<DeleteObjectError> },

    #[error("failed to generate object URL")]
    FailedToGenerateUrl { source: url::ParseError },
}

impl BackendError {
    /// Whether this error is one of the expected "absent" outcomes.
    pub fn is_not_found(&self) -> bool {
        use BackendError::*;

        matches!(
            self,
            UserNotFound
                | VideoNotFound(_)
                | ScheduleNotFound(_)
                | StadiumNotFound(_)
                | LikeNotFound(_)
                | StoreNotFound(_)
                | BrokenReference { .. }
        )
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(source: sqlx::Error) -> Self {
        BackendError::Sqlx { source }
    }
}
