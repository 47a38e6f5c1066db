//! Shared fixtures for unit tests.

use log::Logger;
use time::{Date, PrimitiveDateTime};

use crate::db::memory::MemoryDb;
use crate::entities::{Field, Schedule, Stadium};

pub fn datetime(month: u8, day: u8, hour: u8, minute: u8) -> PrimitiveDateTime {
    Date::try_from_ymd(2024, month, day)
        .and_then(|date| date.try_with_hms(hour, minute, 0))
        .expect("build test datetime")
}

/// One stadium with one field and one schedule on 2024-05-03, 18:00 to 20:00.
pub struct Fixture {
    pub logger: Logger,
    pub db: MemoryDb,
    pub stadium: Stadium,
    pub field: Field,
    pub schedule: Schedule,
}

impl Fixture {
    pub fn new() -> Self {
        let db = MemoryDb::new();
        let stadium = db.add_stadium("Riverside Arena");
        let field = db.add_field(stadium.id, "Pitch A");
        let schedule = db.add_schedule(field.id, datetime(5, 3, 18, 0), datetime(5, 3, 20, 0));

        Fixture {
            logger: log::discard(),
            db,
            stadium,
            field,
            schedule,
        }
    }

    /// Adds another schedule on the same field, ending at the given day and hour.
    pub fn schedule_ending(&self, month: u8, day: u8, hour: u8) -> Schedule {
        self.db.add_schedule(
            self.field.id,
            datetime(month, day, hour - 1, 0),
            datetime(month, day, hour, 0),
        )
    }
}
