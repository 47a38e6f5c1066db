//! Resolves where and when a video was recorded by walking
//! video → schedule → field → stadium.

use std::collections::HashMap;

use log::{error, Logger};
use serde::Serialize;

use crate::db::SafeDb;
use crate::entities::{Id, Schedule, Video};
use crate::errors::BackendError;

/// The flattened place and time of a video.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Venue {
    pub stadium_name: String,

    /// The day of the schedule, `MM.DD`.
    pub date: String,

    /// The span of the schedule, `HH:MM ~ HH:MM`.
    pub hour: String,
}

/// Resolves the venue of a single video.
pub async fn resolve_venue(
    logger: &Logger,
    db: &SafeDb,
    video: &Video,
) -> Result<Venue, BackendError> {
    let schedule = db
        .retrieve_schedule(video.schedule_id)
        .await?
        .ok_or_else(|| broken_reference(logger, "schedule", video.schedule_id))?;

    venue_for_schedule(logger, db, &schedule).await
}

/// Resolves the venue shared by every video of a schedule.
pub async fn venue_for_schedule(
    logger: &Logger,
    db: &SafeDb,
    schedule: &Schedule,
) -> Result<Venue, BackendError> {
    let field = db
        .retrieve_field(schedule.field_id)
        .await?
        .ok_or_else(|| broken_reference(logger, "field", schedule.field_id))?;

    let stadium = db
        .retrieve_stadium(field.stadium_id)
        .await?
        .ok_or_else(|| broken_reference(logger, "stadium", field.stadium_id))?;

    Ok(Venue {
        stadium_name: stadium.name,
        date: schedule.formatted_date(),
        hour: schedule.formatted_hours(),
    })
}

/// Returns a schedule together with its videos in insertion order.
pub async fn videos_for_schedule(
    db: &SafeDb,
    schedule_id: Id,
) -> Result<(Schedule, Vec<Video>), BackendError> {
    let schedule = db
        .retrieve_schedule(schedule_id)
        .await?
        .ok_or(BackendError::ScheduleNotFound(schedule_id))?;

    let videos = db.videos_for_schedule(schedule_id).await?;

    Ok((schedule, videos))
}

/// Memoizes venues by schedule so that a listing spanning many videos
/// walks each schedule's chain once.
pub struct VenueCache<'a> {
    logger: &'a Logger,
    db: &'a SafeDb,
    venues: HashMap<Id, Venue>,
}

impl<'a> VenueCache<'a> {
    pub fn new(logger: &'a Logger, db: &'a SafeDb) -> Self {
        VenueCache {
            logger,
            db,
            venues: HashMap::new(),
        }
    }

    pub async fn get(&mut self, video: &Video) -> Result<Venue, BackendError> {
        if let Some(venue) = self.venues.get(&video.schedule_id) {
            return Ok(venue.clone());
        }

        let venue = resolve_venue(self.logger, self.db, video).await?;
        self.venues.insert(video.schedule_id, venue.clone());

        Ok(venue)
    }
}

pub(crate) fn broken_reference(logger: &Logger, entity: &'static str, id: Id) -> BackendError {
    error!(logger, "Broken reference"; "entity" => entity, "id" => id);

    BackendError::BrokenReference { entity, id }
}
