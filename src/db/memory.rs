//! An in-process implementation of [`Db`] for tests and local runs.
//!
//! All tables sit behind a single lock, so every operation is atomic.
//! The seeding helpers insert rows as given and do not check references,
//! and the removal helpers do not cascade; this is what lets tests stage
//! broken references.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{ready, BoxFuture, FutureExt};
use time::PrimitiveDateTime;
use url::Url;
use uuid::Uuid;

use super::{CounterUpdate, Db};
use crate::entities::{
    Field, Id, NewStadium, NewVideo, ProviderProfile, Schedule, Stadium, User, Video,
};
use crate::errors::BackendError;

#[derive(Default)]
struct Tables {
    last_id: Id,
    stadiums: Vec<Stadium>,
    stadium_images: Vec<(Id, String)>,
    fields: Vec<Field>,
    schedules: Vec<Schedule>,
    videos: Vec<Video>,
    users: Vec<User>,
    sessions: HashMap<Uuid, Id>,
    likes: Vec<(Id, Id)>,
    stores: Vec<(Id, Id)>,
}

impl Tables {
    fn next_id(&mut self) -> Id {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, id: Id) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn video_mut(&mut self, id: Id) -> Option<&mut Video> {
        self.videos.iter_mut().find(|v| v.id == id)
    }

    fn has_video(&self, id: Id) -> bool {
        self.videos.iter().any(|v| v.id == id)
    }
}

#[derive(Default)]
pub struct MemoryDb {
    tables: RwLock<Tables>,
    reject_stadium_inserts: AtomicBool,
}

impl MemoryDb {
    pub fn new() -> Self {
        Default::default()
    }

    fn read(&self) -> RwLockReadGuard<Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_stadium(&self, name: impl Into<String>) -> Stadium {
        let mut tables = self.write();
        let stadium = Stadium {
            id: tables.next_id(),
            name: name.into(),
            location: None,
            description: None,
        };
        tables.stadiums.push(stadium.clone());
        stadium
    }

    pub fn add_field(&self, stadium_id: Id, name: impl Into<String>) -> Field {
        let mut tables = self.write();
        let field = Field {
            id: tables.next_id(),
            stadium_id,
            name: name.into(),
        };
        tables.fields.push(field.clone());
        field
    }

    pub fn add_schedule(
        &self,
        field_id: Id,
        start_date: PrimitiveDateTime,
        end_date: PrimitiveDateTime,
    ) -> Schedule {
        let mut tables = self.write();
        let schedule = Schedule {
            id: tables.next_id(),
            field_id,
            start_date,
            end_date,
        };
        tables.schedules.push(schedule.clone());
        schedule
    }

    /// Inserts a video with a preset counter. No like rows back the
    /// counter, so only use non-zero values for read-side tests.
    pub fn add_video(&self, schedule_id: Id, name: impl Into<String>, like_count: i32) -> Video {
        let mut tables = self.write();
        let id = tables.next_id();
        let video = Video {
            id,
            schedule_id,
            name: name.into(),
            image: format!("https://images.example.com/{}.jpg", id),
            video: format!("https://videos.example.com/{}.mp4", id),
            like_count,
        };
        tables.videos.push(video.clone());
        video
    }

    pub fn add_user(&self, name: impl Into<String>) -> User {
        let mut tables = self.write();
        let id = tables.next_id();
        let name = name.into();
        let user = User {
            id,
            provider: String::from("google"),
            provider_id: format!("provider-{}", id),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            name: Some(name),
            image: None,
            bananas: 0,
        };
        tables.users.push(user.clone());
        user
    }

    /// Makes every later stadium insert fail with a storage fault.
    pub fn reject_stadium_inserts(&self) {
        self.reject_stadium_inserts.store(true, Ordering::SeqCst);
    }

    pub fn remove_video(&self, id: Id) {
        self.write().videos.retain(|v| v.id != id);
    }

    pub fn remove_schedule(&self, id: Id) {
        self.write().schedules.retain(|s| s.id != id);
    }

    pub fn remove_field(&self, id: Id) {
        self.write().fields.retain(|f| f.id != id);
    }

    pub fn remove_stadium(&self, id: Id) {
        self.write().stadiums.retain(|s| s.id != id);
    }

    /// Overwrites a video's counter without touching like rows.
    pub fn set_like_count(&self, video_id: Id, like_count: i32) {
        if let Some(video) = self.write().video_mut(video_id) {
            video.like_count = like_count;
        }
    }

    /// Number of like rows for a video.
    pub fn count_likes(&self, video_id: Id) -> usize {
        self.read().likes.iter().filter(|(_, v)| *v == video_id).count()
    }

    pub fn fields_of(&self, stadium_id: Id) -> Vec<Field> {
        self.read()
            .fields
            .iter()
            .filter(|f| f.stadium_id == stadium_id)
            .cloned()
            .collect()
    }

    pub fn images_of(&self, stadium_id: Id) -> Vec<String> {
        self.read()
            .stadium_images
            .iter()
            .filter(|(s, _)| *s == stadium_id)
            .map(|(_, url)| url.clone())
            .collect()
    }
}

impl Db for MemoryDb {
    fn retrieve_user(&self, id: Id) -> BoxFuture<Result<Option<User>, BackendError>> {
        ready(Ok(self.read().user(id).cloned())).boxed()
    }

    fn retrieve_user_by_session(
        &self,
        token: &Uuid,
    ) -> BoxFuture<Result<Option<User>, BackendError>> {
        let tables = self.read();
        let user = tables
            .sessions
            .get(token)
            .and_then(|id| tables.user(*id))
            .cloned();

        ready(Ok(user)).boxed()
    }

    fn upsert_user_by_provider(
        &self,
        profile: ProviderProfile,
    ) -> BoxFuture<Result<User, BackendError>> {
        let mut tables = self.write();

        let existing = tables
            .users
            .iter()
            .position(|u| u.provider == profile.provider && u.provider_id == profile.provider_id);

        let user = match existing {
            Some(position) => {
                let user = &mut tables.users[position];
                user.name = profile.name;
                user.email = profile.email;
                user.image = profile.image;
                user.clone()
            }
            None => {
                let user = User {
                    id: tables.next_id(),
                    provider: profile.provider,
                    provider_id: profile.provider_id,
                    name: profile.name,
                    email: profile.email,
                    image: profile.image,
                    bananas: 0,
                };
                tables.users.push(user.clone());
                user
            }
        };

        ready(Ok(user)).boxed()
    }

    fn create_session(&self, user_id: Id) -> BoxFuture<Result<Uuid, BackendError>> {
        let mut tables = self.write();

        let result = if tables.user(user_id).is_some() {
            let token = Uuid::new_v4();
            tables.sessions.insert(token, user_id);
            Ok(token)
        } else {
            Err(BackendError::UserNotFound)
        };

        ready(result).boxed()
    }

    fn add_bananas(&self, user_id: Id, amount: i32) -> BoxFuture<Result<i32, BackendError>> {
        let mut tables = self.write();

        let result = match tables.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => match user.bananas.checked_add(amount) {
                Some(balance) => {
                    user.bananas = balance;
                    Ok(balance)
                }
                None => Err(BackendError::InvalidAmount(amount)),
            },
            None => Err(BackendError::UserNotFound),
        };

        ready(result).boxed()
    }

    fn retrieve_video(&self, id: Id) -> BoxFuture<Result<Option<Video>, BackendError>> {
        let video = self.read().videos.iter().find(|v| v.id == id).cloned();

        ready(Ok(video)).boxed()
    }

    fn videos_for_schedule(&self, schedule_id: Id) -> BoxFuture<Result<Vec<Video>, BackendError>> {
        let videos = self
            .read()
            .videos
            .iter()
            .filter(|v| v.schedule_id == schedule_id)
            .cloned()
            .collect();

        ready(Ok(videos)).boxed()
    }

    fn most_liked_videos(&self, limit: i64) -> BoxFuture<Result<Vec<Video>, BackendError>> {
        let mut videos = self.read().videos.clone();

        // stable, so equal counts stay in insertion order
        videos.sort_by(|a, b| b.like_count.cmp(&a.like_count));
        videos.truncate(limit.max(0) as usize);

        ready(Ok(videos)).boxed()
    }

    fn insert_videos(
        &self,
        schedule_id: Id,
        videos: Vec<NewVideo>,
    ) -> BoxFuture<Result<Vec<Id>, BackendError>> {
        let mut tables = self.write();

        if !tables.schedules.iter().any(|s| s.id == schedule_id) {
            return ready(Err(BackendError::ScheduleNotFound(schedule_id))).boxed();
        }

        let mut ids = Vec::with_capacity(videos.len());

        for video in videos {
            let id = tables.next_id();
            tables.videos.push(Video {
                id,
                schedule_id,
                name: video.name,
                image: video.image,
                video: video.video,
                like_count: 0,
            });
            ids.push(id);
        }

        ready(Ok(ids)).boxed()
    }

    fn retrieve_schedule(&self, id: Id) -> BoxFuture<Result<Option<Schedule>, BackendError>> {
        let schedule = self.read().schedules.iter().find(|s| s.id == id).cloned();

        ready(Ok(schedule)).boxed()
    }

    fn retrieve_field(&self, id: Id) -> BoxFuture<Result<Option<Field>, BackendError>> {
        let field = self.read().fields.iter().find(|f| f.id == id).cloned();

        ready(Ok(field)).boxed()
    }

    fn retrieve_stadium(&self, id: Id) -> BoxFuture<Result<Option<Stadium>, BackendError>> {
        let stadium = self.read().stadiums.iter().find(|s| s.id == id).cloned();

        ready(Ok(stadium)).boxed()
    }

    fn fields_for_stadium(&self, stadium_id: Id) -> BoxFuture<Result<Vec<Field>, BackendError>> {
        ready(Ok(self.fields_of(stadium_id))).boxed()
    }

    fn images_for_stadium(&self, stadium_id: Id) -> BoxFuture<Result<Vec<String>, BackendError>> {
        ready(Ok(self.images_of(stadium_id))).boxed()
    }

    fn insert_stadium(
        &self,
        stadium: NewStadium,
        images: Vec<Url>,
    ) -> BoxFuture<Result<Id, BackendError>> {
        if self.reject_stadium_inserts.load(Ordering::SeqCst) {
            let source = sqlx::Error::PoolClosed;
            return ready(Err(BackendError::Sqlx { source })).boxed();
        }

        let mut tables = self.write();
        let id = tables.next_id();

        tables.stadiums.push(Stadium {
            id,
            name: stadium.name,
            location: stadium.location,
            description: stadium.description,
        });

        for name in stadium.fields {
            let field_id = tables.next_id();
            tables.fields.push(Field {
                id: field_id,
                stadium_id: id,
                name,
            });
        }

        for url in images {
            tables.stadium_images.push((id, url.to_string()));
        }

        ready(Ok(id)).boxed()
    }

    fn like_exists(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<bool, BackendError>> {
        let exists = self.read().likes.contains(&(user_id, video_id));

        ready(Ok(exists)).boxed()
    }

    fn add_like(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<(), BackendError>> {
        let mut tables = self.write();

        let result = if tables.likes.contains(&(user_id, video_id)) {
            Err(BackendError::AlreadyLiked(video_id))
        } else if tables.user(user_id).is_none() {
            Err(BackendError::UserNotFound)
        } else if let Some(video) = tables.video_mut(video_id) {
            video.like_count += 1;
            Ok(())
        } else {
            Err(BackendError::VideoNotFound(video_id))
        };

        if result.is_ok() {
            tables.likes.push((user_id, video_id));
        }

        ready(result).boxed()
    }

    fn remove_like(
        &self,
        user_id: Id,
        video_id: Id,
    ) -> BoxFuture<Result<CounterUpdate, BackendError>> {
        let mut tables = self.write();

        let position = tables.likes.iter().position(|l| *l == (user_id, video_id));

        let result = match position {
            None => Err(BackendError::LikeNotFound(video_id)),
            Some(position) => {
                tables.likes.remove(position);

                Ok(match tables.video_mut(video_id) {
                    Some(video) if video.like_count > 0 => {
                        video.like_count -= 1;
                        CounterUpdate::Decremented(video.like_count)
                    }
                    _ => CounterUpdate::Clamped,
                })
            }
        };

        ready(result).boxed()
    }

    fn store_exists(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<bool, BackendError>> {
        let exists = self.read().stores.contains(&(user_id, video_id));

        ready(Ok(exists)).boxed()
    }

    fn add_store(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<(), BackendError>> {
        let mut tables = self.write();

        let result = if tables.stores.contains(&(user_id, video_id)) {
            Err(BackendError::AlreadyStored(video_id))
        } else if tables.user(user_id).is_none() {
            Err(BackendError::UserNotFound)
        } else if !tables.has_video(video_id) {
            Err(BackendError::VideoNotFound(video_id))
        } else {
            tables.stores.push((user_id, video_id));
            Ok(())
        };

        ready(result).boxed()
    }

    fn remove_store(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<(), BackendError>> {
        let mut tables = self.write();

        let position = tables.stores.iter().position(|s| *s == (user_id, video_id));

        let result = match position {
            Some(position) => {
                tables.stores.remove(position);
                Ok(())
            }
            None => Err(BackendError::StoreNotFound(video_id)),
        };

        ready(result).boxed()
    }

    fn stored_video_ids(&self, user_id: Id) -> BoxFuture<Result<Vec<Id>, BackendError>> {
        let ids = self
            .read()
            .stores
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, v)| *v)
            .collect();

        ready(Ok(ids)).boxed()
    }
}
