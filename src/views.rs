//! Read-only projections of videos, shaped for the client.

use std::collections::HashMap;

use futures::try_join;
use log::{error, Logger};
use serde::Serialize;
use time::PrimitiveDateTime;

use crate::db::SafeDb;
use crate::engagement::{is_liked, is_stored};
use crate::entities::{Id, Video};
use crate::errors::BackendError;
use crate::venue::{self, broken_reference, VenueCache};

/// A video in a schedule listing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduleVideo {
    pub video_id: Id,
    pub name: String,
    pub image: String,
    pub stadium_name: String,
    pub date: String,
    pub hour: String,
}

/// A video in the popularity ranking.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PopularVideo {
    pub video_id: Id,
    pub name: String,
    pub image: String,
    pub stadium_name: String,
    pub date: String,
    pub like_count: i32,
}

/// A video in a user's saved collection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredVideo {
    pub video_id: Id,
    pub image: String,
}

/// A single video with the requesting user's engagement flags.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VideoDetail {
    pub name: String,
    pub image: String,
    pub video: String,
    pub stadium_name: String,
    pub is_liked: bool,
    pub is_stored: bool,
}

/// Ordering of the saved collection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SortKey {
    /// Most recently ended schedule first.
    Latest,

    /// Most liked first.
    Popularity,
}

impl SortKey {
    /// `"latest"` selects [`SortKey::Latest`]; any other value, including
    /// none, sorts by popularity.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("latest") => SortKey::Latest,
            _ => SortKey::Popularity,
        }
    }
}

/// Lists every video of a schedule with its venue.
pub async fn schedule_view(
    logger: &Logger,
    db: &SafeDb,
    schedule_id: Id,
) -> Result<Vec<ScheduleVideo>, BackendError> {
    let (schedule, videos) = venue::videos_for_schedule(db, schedule_id).await?;

    if videos.is_empty() {
        return Ok(vec![]);
    }

    let venue = venue::venue_for_schedule(logger, db, &schedule).await?;

    Ok(videos
        .into_iter()
        .map(|video| ScheduleVideo {
            video_id: video.id,
            name: video.name,
            image: video.image,
            stadium_name: venue.stadium_name.clone(),
            date: venue.date.clone(),
            hour: venue.hour.clone(),
        })
        .collect())
}

/// The `limit` most liked videos across all schedules.
pub async fn popular_view(
    logger: &Logger,
    db: &SafeDb,
    limit: i64,
) -> Result<Vec<PopularVideo>, BackendError> {
    let videos = db.most_liked_videos(limit).await?;
    let mut venues = VenueCache::new(logger, db);
    let mut result = Vec::with_capacity(videos.len());

    for video in videos {
        let venue = venues.get(&video).await?;

        result.push(PopularVideo {
            video_id: video.id,
            name: video.name,
            image: video.image,
            stadium_name: venue.stadium_name,
            date: venue.date,
            like_count: video.like_count,
        });
    }

    Ok(result)
}

/// The videos a user stored, ordered by `sort`. Ties keep the order in
/// which the videos were stored.
pub async fn saved_collection_view(
    logger: &Logger,
    db: &SafeDb,
    user_id: Id,
    sort: SortKey,
) -> Result<Vec<StoredVideo>, BackendError> {
    db.retrieve_user(user_id)
        .await?
        .ok_or(BackendError::UserNotFound)?;

    let mut videos = Vec::new();

    for video_id in db.stored_video_ids(user_id).await? {
        match db.retrieve_video(video_id).await? {
            Some(video) => videos.push(video),
            None => {
                error!(logger, "Stored video is missing"; "user_id" => user_id, "video_id" => video_id);
                return Err(BackendError::VideoNotFound(video_id));
            }
        }
    }

    match sort {
        SortKey::Latest => {
            let mut decorated = with_end_dates(logger, db, videos).await?;
            decorated.sort_by(|(a, _), (b, _)| b.cmp(a));
            videos = decorated.into_iter().map(|(_, video)| video).collect();
        }
        SortKey::Popularity => {
            videos.sort_by(|a, b| b.like_count.cmp(&a.like_count));
        }
    }

    Ok(videos
        .into_iter()
        .map(|video| StoredVideo {
            video_id: video.id,
            image: video.image,
        })
        .collect())
}

/// Pairs each video with the end of its schedule, looking each schedule up once.
async fn with_end_dates(
    logger: &Logger,
    db: &SafeDb,
    videos: Vec<Video>,
) -> Result<Vec<(PrimitiveDateTime, Video)>, BackendError> {
    let mut end_dates: HashMap<Id, PrimitiveDateTime> = HashMap::new();
    let mut decorated = Vec::with_capacity(videos.len());

    for video in videos {
        let end_date = match end_dates.get(&video.schedule_id) {
            Some(end_date) => *end_date,
            None => {
                let schedule = db
                    .retrieve_schedule(video.schedule_id)
                    .await?
                    .ok_or_else(|| broken_reference(logger, "schedule", video.schedule_id))?;
                end_dates.insert(schedule.id, schedule.end_date);
                schedule.end_date
            }
        };

        decorated.push((end_date, video));
    }

    Ok(decorated)
}

/// A single video as seen by the requesting user.
pub async fn video_detail(
    logger: &Logger,
    db: &SafeDb,
    user_id: Id,
    video_id: Id,
) -> Result<VideoDetail, BackendError> {
    let video = db
        .retrieve_video(video_id)
        .await?
        .ok_or(BackendError::VideoNotFound(video_id))?;

    db.retrieve_user(user_id)
        .await?
        .ok_or(BackendError::UserNotFound)?;

    let (venue, is_liked, is_stored) = try_join!(
        venue::resolve_venue(logger, db, &video),
        is_liked(db, user_id, video_id),
        is_stored(db, user_id, video_id),
    )?;

    Ok(VideoDetail {
        name: video.name,
        image: video.image,
        video: video.video,
        stadium_name: venue.stadium_name,
        is_liked,
        is_stored,
    })
}
