use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::entities::Id;

/// The body of every response, successful or not.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub data: Option<T>,
    pub message: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(status: StatusCode, data: Option<T>, message: impl Into<String>) -> Self {
        Envelope {
            status: status.as_u16(),
            data,
            message: message.into(),
        }
    }

    pub fn into_reply(self) -> WithStatus<Json> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        with_status(json(&self), status)
    }
}

/// A reply carrying `data`.
pub fn with_data<T: Serialize>(
    status: StatusCode,
    data: T,
    message: impl Into<String>,
) -> WithStatus<Json> {
    Envelope::new(status, Some(data), message).into_reply()
}

/// A reply with no payload.
pub fn without_data(status: StatusCode, message: impl Into<String>) -> WithStatus<Json> {
    Envelope::<()>::new(status, None, message).into_reply()
}

#[derive(Debug, Serialize)]
pub struct Created {
    pub stadium_id: Id,
}

#[derive(Debug, Serialize)]
pub struct CreatedVideos {
    pub video_ids: Vec<Id>,
}

#[derive(Debug, Serialize)]
pub struct Healthz<'a> {
    pub revision: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub version: &'a str,
}
