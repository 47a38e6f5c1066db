use futures::future::BoxFuture;
use url::Url;
use uuid::Uuid;

use crate::entities::{
    Field, Id, NewStadium, NewVideo, ProviderProfile, Schedule, Stadium, User, Video,
};
use crate::errors::BackendError;

pub mod memory;

/// The effect of removing a like on the cached like counter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CounterUpdate {
    /// The counter was decremented to the given value.
    Decremented(i32),

    /// The counter was already zero and was left there.
    Clamped,
}

/// A database handle that can be shared across request handlers.
pub type SafeDb = dyn Db + Send + Sync;

/// Access patterns over the relational store. Every write that touches
/// more than one row happens atomically.
pub trait Db {
    fn retrieve_user(&self, id: Id) -> BoxFuture<Result<Option<User>, BackendError>>;

    fn retrieve_user_by_session(
        &self,
        token: &Uuid,
    ) -> BoxFuture<Result<Option<User>, BackendError>>;

    /// Creates the user behind a provider identity, or refreshes the
    /// profile of the existing one. The balance is never touched.
    fn upsert_user_by_provider(
        &self,
        profile: ProviderProfile,
    ) -> BoxFuture<Result<User, BackendError>>;

    fn create_session(&self, user_id: Id) -> BoxFuture<Result<Uuid, BackendError>>;

    /// Adds to a user's balance and returns the new balance. A sum that
    /// does not fit the balance is [`BackendError::InvalidAmount`].
    fn add_bananas(&self, user_id: Id, amount: i32) -> BoxFuture<Result<i32, BackendError>>;

    fn retrieve_video(&self, id: Id) -> BoxFuture<Result<Option<Video>, BackendError>>;

    /// All videos of a schedule, in insertion order.
    fn videos_for_schedule(&self, schedule_id: Id) -> BoxFuture<Result<Vec<Video>, BackendError>>;

    /// The `limit` most liked videos; equal counts keep insertion order.
    fn most_liked_videos(&self, limit: i64) -> BoxFuture<Result<Vec<Video>, BackendError>>;

    fn insert_videos(
        &self,
        schedule_id: Id,
        videos: Vec<NewVideo>,
    ) -> BoxFuture<Result<Vec<Id>, BackendError>>;

    fn retrieve_schedule(&self, id: Id) -> BoxFuture<Result<Option<Schedule>, BackendError>>;

    fn retrieve_field(&self, id: Id) -> BoxFuture<Result<Option<Field>, BackendError>>;

    fn retrieve_stadium(&self, id: Id) -> BoxFuture<Result<Option<Stadium>, BackendError>>;

    fn fields_for_stadium(&self, stadium_id: Id) -> BoxFuture<Result<Vec<Field>, BackendError>>;

    /// Image URLs of a stadium, in upload order.
    fn images_for_stadium(&self, stadium_id: Id) -> BoxFuture<Result<Vec<String>, BackendError>>;

    /// Creates a stadium along with its fields and image URLs.
    fn insert_stadium(
        &self,
        stadium: NewStadium,
        images: Vec<Url>,
    ) -> BoxFuture<Result<Id, BackendError>>;

    fn like_exists(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<bool, BackendError>>;

    /// Creates the like and increments the video's counter together.
    fn add_like(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<(), BackendError>>;

    /// Deletes the like and decrements the video's counter together.
    fn remove_like(
        &self,
        user_id: Id,
        video_id: Id,
    ) -> BoxFuture<Result<CounterUpdate, BackendError>>;

    fn store_exists(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<bool, BackendError>>;

    fn add_store(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<(), BackendError>>;

    fn remove_store(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<(), BackendError>>;

    /// IDs of the videos a user stored, in the order they were stored.
    fn stored_video_ids(&self, user_id: Id) -> BoxFuture<Result<Vec<Id>, BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{self, postgres::PgPool};
    use url::Url;
    use uuid::Uuid;

    use super::CounterUpdate;
    use crate::entities::{
    Field, Id, NewStadium, NewVideo, ProviderProfile, Schedule, Stadium, User, Video,
};
    use crate::errors::BackendError;

    const LIKES_PAIR_CONSTRAINT: &str = "video_likes_pair";
    const STORES_PAIR_CONSTRAINT: &str = "stores_pair";
    const USER_FOREIGN_KEYS: [&str; 3] = [
        "video_likes_user_id_fkey",
        "stores_user_id_fkey",
        "sessions_user_id_fkey",
    ];
    const VIDEO_FOREIGN_KEYS: [&str; 2] = ["video_likes_video_id_fkey", "stores_video_id_fkey"];
    const SCHEDULE_FOREIGN_KEY: &str = "videos_schedule_id_fkey";
    const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn retrieve_user(&self, id: Id) -> BoxFuture<Result<Option<User>, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, User>(include_str!("queries/retrieve_user.sql"));

                let user = query
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(user)
            }
            .boxed()
        }

        fn retrieve_user_by_session(
            &self,
            token: &Uuid,
        ) -> BoxFuture<Result<Option<User>, BackendError>> {
            let token = *token;

            async move {
                let query = sqlx::query_as::<_, User>(include_str!(
                    "queries/retrieve_user_by_session.sql"
                ));

                let user = query
                    .bind(token)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(user)
            }
            .boxed()
        }

        fn upsert_user_by_provider(
            &self,
            profile: ProviderProfile,
        ) -> BoxFuture<Result<User, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, User>(include_str!("queries/upsert_user.sql"));

                let user = query
                    .bind(&profile.provider)
                    .bind(&profile.provider_id)
                    .bind(&profile.name)
                    .bind(&profile.email)
                    .bind(&profile.image)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(user)
            }
            .boxed()
        }

        fn create_session(&self, user_id: Id) -> BoxFuture<Result<Uuid, BackendError>> {
            async move {
                let query = sqlx::query_as(include_str!("queries/create_session.sql"));

                let (token,): (Uuid,) = query
                    .bind(user_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| map_relation_error(e, user_id))?;

                Ok(token)
            }
            .boxed()
        }

        fn add_bananas(&self, user_id: Id, amount: i32) -> BoxFuture<Result<i32, BackendError>> {
            async move {
                let query = sqlx::query_as(include_str!("queries/add_bananas.sql"));

                let balance: Option<(i32,)> = query
                    .bind(user_id)
                    .bind(amount)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| {
                        if is_out_of_range(&e) {
                            BackendError::InvalidAmount(amount)
                        } else {
                            map_sqlx_error(e)
                        }
                    })?;

                balance
                    .map(|(balance,)| balance)
                    .ok_or(BackendError::UserNotFound)
            }
            .boxed()
        }

        fn retrieve_video(&self, id: Id) -> BoxFuture<Result<Option<Video>, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, Video>(include_str!("queries/retrieve_video.sql"));

                let video = query
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(video)
            }
            .boxed()
        }

        fn videos_for_schedule(
            &self,
            schedule_id: Id,
        ) -> BoxFuture<Result<Vec<Video>, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, Video>(include_str!(
                    "queries/retrieve_schedule_videos.sql"
                ));

                let videos = query
                    .bind(schedule_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(videos)
            }
            .boxed()
        }

        fn most_liked_videos(&self, limit: i64) -> BoxFuture<Result<Vec<Video>, BackendError>> {
            async move {
                let query =
                    sqlx::query_as::<_, Video>(include_str!("queries/retrieve_most_liked.sql"));

                let videos = query
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(videos)
            }
            .boxed()
        }

        fn insert_videos(
            &self,
            schedule_id: Id,
            videos: Vec<NewVideo>,
        ) -> BoxFuture<Result<Vec<Id>, BackendError>> {
            async move {
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
                let mut ids = Vec::with_capacity(videos.len());

                for video in videos {
                    let (id,): (Id,) = sqlx::query_as(include_str!("queries/create_video.sql"))
                        .bind(schedule_id)
                        .bind(&video.name)
                        .bind(&video.image)
                        .bind(&video.video)
                        .fetch_one(&mut tx)
                        .await
                        .map_err(|e| map_relation_error(e, schedule_id))?;

                    ids.push(id);
                }

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(ids)
            }
            .boxed()
        }

        fn retrieve_schedule(&self, id: Id) -> BoxFuture<Result<Option<Schedule>, BackendError>> {
            async move {
                let query =
                    sqlx::query_as::<_, Schedule>(include_str!("queries/retrieve_schedule.sql"));

                let schedule = query
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(schedule)
            }
            .boxed()
        }

        fn retrieve_field(&self, id: Id) -> BoxFuture<Result<Option<Field>, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, Field>(include_str!("queries/retrieve_field.sql"));

                let field = query
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(field)
            }
            .boxed()
        }

        fn retrieve_stadium(&self, id: Id) -> BoxFuture<Result<Option<Stadium>, BackendError>> {
            async move {
                let query =
                    sqlx::query_as::<_, Stadium>(include_str!("queries/retrieve_stadium.sql"));

                let stadium = query
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(stadium)
            }
            .boxed()
        }

        fn fields_for_stadium(
            &self,
            stadium_id: Id,
        ) -> BoxFuture<Result<Vec<Field>, BackendError>> {
            async move {
                let query =
                    sqlx::query_as::<_, Field>(include_str!("queries/retrieve_stadium_fields.sql"));

                let fields = query
                    .bind(stadium_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(fields)
            }
            .boxed()
        }

        fn images_for_stadium(
            &self,
            stadium_id: Id,
        ) -> BoxFuture<Result<Vec<String>, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, (String,)>(include_str!(
                    "queries/retrieve_stadium_images.sql"
                ));

                let urls = query
                    .bind(stadium_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .into_iter()
                    .map(|(url,)| url)
                    .collect();

                Ok(urls)
            }
            .boxed()
        }

        fn insert_stadium(
            &self,
            stadium: NewStadium,
            images: Vec<Url>,
        ) -> BoxFuture<Result<Id, BackendError>> {
            async move {
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                let (id,): (Id,) = sqlx::query_as(include_str!("queries/create_stadium.sql"))
                    .bind(&stadium.name)
                    .bind(&stadium.location)
                    .bind(&stadium.description)
                    .fetch_one(&mut tx)
                    .await
                    .map_err(map_sqlx_error)?;

                for field in &stadium.fields {
                    sqlx::query(include_str!("queries/create_field.sql"))
                        .bind(id)
                        .bind(field)
                        .execute(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }

                for url in &images {
                    sqlx::query(include_str!("queries/create_stadium_image.sql"))
                        .bind(id)
                        .bind(url.as_str())
                        .execute(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn like_exists(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<bool, BackendError>> {
            async move {
                let query = sqlx::query_as(include_str!("queries/check_like.sql"));

                let (exists,): (bool,) = query
                    .bind(user_id)
                    .bind(video_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(exists)
            }
            .boxed()
        }

        fn add_like(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                sqlx::query(include_str!("queries/create_like.sql"))
                    .bind(user_id)
                    .bind(video_id)
                    .execute(&mut tx)
                    .await
                    .map_err(|e| map_relation_error(e, video_id))?;

                let updated = sqlx::query(include_str!("queries/increment_like_count.sql"))
                    .bind(video_id)
                    .execute(&mut tx)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                // dropping the transaction rolls back the relation
                if updated == 0 {
                    return Err(BackendError::VideoNotFound(video_id));
                }

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn remove_like(
            &self,
            user_id: Id,
            video_id: Id,
        ) -> BoxFuture<Result<CounterUpdate, BackendError>> {
            async move {
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                let deleted = sqlx::query(include_str!("queries/delete_like.sql"))
                    .bind(user_id)
                    .bind(video_id)
                    .execute(&mut tx)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if deleted == 0 {
                    return Err(BackendError::LikeNotFound(video_id));
                }

                let remaining: Option<(i32,)> =
                    sqlx::query_as(include_str!("queries/decrement_like_count.sql"))
                        .bind(video_id)
                        .fetch_optional(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(match remaining {
                    Some((count,)) => CounterUpdate::Decremented(count),
                    None => CounterUpdate::Clamped,
                })
            }
            .boxed()
        }

        fn store_exists(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<bool, BackendError>> {
            async move {
                let query = sqlx::query_as(include_str!("queries/check_store.sql"));

                let (exists,): (bool,) = query
                    .bind(user_id)
                    .bind(video_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(exists)
            }
            .boxed()
        }

        fn add_store(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<(), BackendError>> {
            async move {
                sqlx::query(include_str!("queries/create_store.sql"))
                    .bind(user_id)
                    .bind(video_id)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| map_relation_error(e, video_id))?;

                Ok(())
            }
            .boxed()
        }

        fn remove_store(&self, user_id: Id, video_id: Id) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let deleted = sqlx::query(include_str!("queries/delete_store.sql"))
                    .bind(user_id)
                    .bind(video_id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if deleted == 0 {
                    Err(BackendError::StoreNotFound(video_id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn stored_video_ids(&self, user_id: Id) -> BoxFuture<Result<Vec<Id>, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, (Id,)>(include_str!(
                    "queries/retrieve_stored_video_ids.sql"
                ));

                let ids = query
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .into_iter()
                    .map(|(id,)| id)
                    .collect();

                Ok(ids)
            }
            .boxed()
        }
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        BackendError::Sqlx { source: error }
    }

    fn is_out_of_range(error: &sqlx::Error) -> bool {
        match error {
            sqlx::Error::Database(e) => e.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE),
            _ => false,
        }
    }

    /// Maps constraint violations raised while writing a row that
    /// references `id` to the matching domain error.
    fn map_relation_error(error: sqlx::Error, id: Id) -> BackendError {
        use sqlx::Error;

        let constraint = match error {
            Error::Database(ref e) => e.constraint().map(str::to_owned),
            _ => None,
        };

        match constraint.as_deref() {
            Some(LIKES_PAIR_CONSTRAINT) => BackendError::AlreadyLiked(id),
            Some(STORES_PAIR_CONSTRAINT) => BackendError::AlreadyStored(id),
            Some(SCHEDULE_FOREIGN_KEY) => BackendError::ScheduleNotFound(id),
            Some(c) if USER_FOREIGN_KEYS.contains(&c) => BackendError::UserNotFound,
            Some(c) if VIDEO_FOREIGN_KEYS.contains(&c) => BackendError::VideoNotFound(id),
            _ => map_sqlx_error(error),
        }
    }
}
