use serde::Deserialize;
use time::PrimitiveDateTime;

use crate::normalization;

/// An ID in the database.
pub type Id = i64;

const DATE_FORMAT: &str = "%m.%d";
const HOUR_FORMAT: &str = "%H:%M";

/// A short clip recorded during a schedule.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Video {
    pub id: Id,

    /// The schedule during which it was recorded.
    pub schedule_id: Id,

    /// The display name.
    pub name: String,

    /// The URL of the thumbnail.
    pub image: String,

    /// The URL of the playable media.
    pub video: String,

    /// Cached number of likes. Only the engagement operations change it.
    pub like_count: i32,
}

/// A booked time slot on a field.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Schedule {
    pub id: Id,
    pub field_id: Id,
    pub start_date: PrimitiveDateTime,
    pub end_date: PrimitiveDateTime,
}

impl Schedule {
    /// The start day as `MM.DD`.
    pub fn formatted_date(&self) -> String {
        self.start_date.format(DATE_FORMAT)
    }

    /// The time span as `HH:MM ~ HH:MM`.
    pub fn formatted_hours(&self) -> String {
        format!(
            "{} ~ {}",
            self.start_date.format(HOUR_FORMAT),
            self.end_date.format(HOUR_FORMAT)
        )
    }
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Field {
    pub id: Id,
    pub stadium_id: Id,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Stadium {
    pub id: Id,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// A user linked to a social identity provider.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub provider: String,
    pub provider_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,

    /// The banana balance.
    pub bananas: i32,
}

/// A profile reported by a social identity provider at sign-in.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderProfile {
    pub provider: String,
    pub provider_id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub image: Option<String>,
}

/// A batch of clips to attach to one schedule.
#[derive(Clone, Debug, Deserialize)]
pub struct VideoSubmission {
    pub schedule_id: Id,
    pub data: Vec<NewVideo>,
}

/// A clip before it is written to the database.
#[derive(Clone, Debug, Deserialize)]
pub struct NewVideo {
    #[serde(deserialize_with = "normalization::deserialize")]
    pub name: String,
    pub image: String,
    pub video: String,
}

/// The metadata part of a stadium registration.
#[derive(Clone, Debug, Deserialize)]
pub struct NewStadium {
    #[serde(deserialize_with = "normalization::deserialize")]
    pub name: String,

    #[serde(default)]
    #[serde(deserialize_with = "normalization::deserialize_option")]
    pub location: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Names of the fields to create under the stadium.
    #[serde(default)]
    pub fields: Vec<String>,
}
