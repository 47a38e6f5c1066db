//! Writes that populate the catalog: clips for a schedule and stadiums
//! with their fields and photos.

use futures::try_join;
use log::{debug, error, info, Logger};
use serde::Serialize;
use uuid::Uuid;

use crate::db::SafeDb;
use crate::entities::{Id, NewStadium, VideoSubmission};
use crate::environment::VecStore;
use crate::errors::BackendError;

/// An image part of a stadium registration.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ImageUpload {
    fn is_image(&self) -> bool {
        mime_type(&self.content_type)
            .map(|m| m.type_() == mime::IMAGE)
            .unwrap_or(false)
    }
}

fn mime_type(content_type: &str) -> Option<mime::Mime> {
    content_type.parse().ok()
}

/// A registered stadium with its fields and photos.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StadiumDetail {
    pub stadium_id: Id,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<String>,
    pub images: Vec<String>,
}

pub async fn stadium_detail(db: &SafeDb, stadium_id: Id) -> Result<StadiumDetail, BackendError> {
    let stadium = db
        .retrieve_stadium(stadium_id)
        .await?
        .ok_or(BackendError::StadiumNotFound(stadium_id))?;

    let (fields, images) = try_join!(
        db.fields_for_stadium(stadium_id),
        db.images_for_stadium(stadium_id)
    )?;

    Ok(StadiumDetail {
        stadium_id,
        name: stadium.name,
        location: stadium.location,
        description: stadium.description,
        fields: fields.into_iter().map(|f| f.name).collect(),
        images,
    })
}

/// Attaches a batch of clips to a schedule. Every clip starts with no likes.
pub async fn create_videos(
    logger: &Logger,
    db: &SafeDb,
    submission: VideoSubmission,
) -> Result<Vec<Id>, BackendError> {
    let VideoSubmission { schedule_id, data } = submission;

    db.retrieve_schedule(schedule_id)
        .await?
        .ok_or(BackendError::ScheduleNotFound(schedule_id))?;

    let ids = db.insert_videos(schedule_id, data).await?;
    info!(logger, "Created videos"; "schedule_id" => schedule_id, "count" => ids.len());

    Ok(ids)
}

/// Uploads the stadium's photos and records the stadium with its fields.
/// Photos already uploaded are deleted again if a later step fails.
pub async fn register_stadium<O>(
    logger: &Logger,
    db: &SafeDb,
    store: &VecStore<O>,
    stadium: NewStadium,
    images: Vec<ImageUpload>,
) -> Result<Id, BackendError> {
    if let Some(image) = images.iter().find(|i| !i.is_image()) {
        return Err(BackendError::UnsupportedImageType(
            image.content_type.clone(),
        ));
    }

    let mut keys = Vec::with_capacity(images.len());
    let result = upload_and_insert(logger, db, store, stadium, images, &mut keys).await;

    match result {
        Ok(id) => {
            info!(logger, "Registered stadium"; "stadium_id" => id, "images" => keys.len());
            Ok(id)
        }
        Err(e) => {
            discard_uploads(logger, store, &keys).await;
            Err(e)
        }
    }
}

async fn upload_and_insert<O>(
    logger: &Logger,
    db: &SafeDb,
    store: &VecStore<O>,
    stadium: NewStadium,
    images: Vec<ImageUpload>,
    keys: &mut Vec<Uuid>,
) -> Result<Id, BackendError> {
    let mut urls = Vec::with_capacity(images.len());

    for image in images {
        let key = Uuid::new_v4();
        debug!(logger, "Uploading stadium image..."; "key" => %key);

        store.save(&key, image.content_type, image.data).await?;
        keys.push(key);

        let url = store
            .get_url(&key)
            .map_err(|source| BackendError::FailedToGenerateUrl { source })?;
        urls.push(url);
    }

    db.insert_stadium(stadium, urls).await
}

async fn discard_uploads<O>(logger: &Logger, store: &VecStore<O>, keys: &[Uuid]) {
    for key in keys {
        if let Err(e) = store.delete(key).await {
            error!(logger, "Failed to delete orphaned image"; "key" => %key, "error" => %e);
        }
    }
}
