//! Likes and stores: at most one of each per user and video, with the
//! video's like counter kept equal to its number of likes.

use log::{debug, error, Logger};

use crate::db::{CounterUpdate, SafeDb};
use crate::entities::Id;
use crate::errors::BackendError;

/// Likes a video on behalf of a user.
pub async fn like(
    logger: &Logger,
    db: &SafeDb,
    user_id: Id,
    video_id: Id,
) -> Result<(), BackendError> {
    require_user(db, user_id).await?;
    require_video(db, video_id).await?;

    if db.like_exists(user_id, video_id).await? {
        return Err(BackendError::AlreadyLiked(video_id));
    }

    // a concurrent like of the same pair loses on the unique constraint
    db.add_like(user_id, video_id).await?;
    debug!(logger, "Liked video"; "user_id" => user_id, "video_id" => video_id);

    Ok(())
}

/// Withdraws a like.
pub async fn unlike(
    logger: &Logger,
    db: &SafeDb,
    user_id: Id,
    video_id: Id,
) -> Result<(), BackendError> {
    require_user(db, user_id).await?;
    require_video(db, video_id).await?;

    match db.remove_like(user_id, video_id).await? {
        CounterUpdate::Decremented(like_count) => {
            debug!(logger, "Unliked video"; "user_id" => user_id, "video_id" => video_id, "like_count" => like_count);
        }
        CounterUpdate::Clamped => {
            error!(logger, "Like counter was already zero while a like existed"; "user_id" => user_id, "video_id" => video_id);
        }
    }

    Ok(())
}

/// Bookmarks a video for a user.
pub async fn store(
    logger: &Logger,
    db: &SafeDb,
    user_id: Id,
    video_id: Id,
) -> Result<(), BackendError> {
    require_user(db, user_id).await?;
    require_video(db, video_id).await?;

    if db.store_exists(user_id, video_id).await? {
        return Err(BackendError::AlreadyStored(video_id));
    }

    db.add_store(user_id, video_id).await?;
    debug!(logger, "Stored video"; "user_id" => user_id, "video_id" => video_id);

    Ok(())
}

/// Removes a bookmark.
pub async fn unstore(
    logger: &Logger,
    db: &SafeDb,
    user_id: Id,
    video_id: Id,
) -> Result<(), BackendError> {
    require_user(db, user_id).await?;
    require_video(db, video_id).await?;

    db.remove_store(user_id, video_id).await?;
    debug!(logger, "Unstored video"; "user_id" => user_id, "video_id" => video_id);

    Ok(())
}

/// Whether the user likes the video. Callers validate both IDs first.
pub async fn is_liked(db: &SafeDb, user_id: Id, video_id: Id) -> Result<bool, BackendError> {
    db.like_exists(user_id, video_id).await
}

/// Whether the user stored the video. Callers validate both IDs first.
pub async fn is_stored(db: &SafeDb, user_id: Id, video_id: Id) -> Result<bool, BackendError> {
    db.store_exists(user_id, video_id).await
}

async fn require_user(db: &SafeDb, user_id: Id) -> Result<(), BackendError> {
    db.retrieve_user(user_id)
        .await?
        .map(|_| ())
        .ok_or(BackendError::UserNotFound)
}

async fn require_video(db: &SafeDb, video_id: Id) -> Result<(), BackendError> {
    db.retrieve_video(video_id)
        .await?
        .map(|_| ())
        .ok_or(BackendError::VideoNotFound(video_id))
}
