use std::time::{Duration, Instant};

use log::{debug, o};
use warp::{
    filters::multipart::FormData,
    http::StatusCode,
    reject,
    reply::{with_header, Reply},
};

use crate::accounts::{self, Balance, Profile};
use crate::catalog;
use crate::engagement;
use crate::entities::{Id, VideoSubmission};
use crate::environment::{Environment, SafeStore};
use crate::errors::BackendError;
use crate::identity;
use crate::io::parse_stadium_submission;
use crate::routes::{
    query::{BananaTopUp, StoredQuery},
    rejection::{Context, Rejection},
    response::{with_data, without_data, Created, CreatedVideos},
};
use crate::views::{self, SortKey};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn create_videos<O: SafeStore>(
    environment: Environment<O>,
    submission: VideoSubmission,
) -> RouteResult {
    timed! {
        let schedule_id = submission.schedule_id;
        let logger = environment.logger.new(o!("schedule_id" => schedule_id));

        let video_ids = catalog::create_videos(&logger, environment.db.as_ref(), submission)
            .await
            .map_err(|e| Rejection::new(Context::create_videos(schedule_id), e))?;

        with_data(StatusCode::CREATED, CreatedVideos { video_ids }, "videos created")
    }
}

pub async fn schedule_videos<O: SafeStore>(
    environment: Environment<O>,
    schedule_id: Id,
) -> RouteResult {
    timed! {
        let logger = environment.logger.new(o!("schedule_id" => schedule_id));

        let videos = views::schedule_view(&logger, environment.db.as_ref(), schedule_id)
            .await
            .map_err(|e| Rejection::new(Context::schedule_videos(schedule_id), e))?;

        with_data(StatusCode::OK, videos, "schedule videos retrieved")
    }
}

pub async fn popular<O: SafeStore>(environment: Environment<O>) -> RouteResult {
    timed! {
        let videos = views::popular_view(
            &environment.logger,
            environment.db.as_ref(),
            environment.config.popular_count,
        )
        .await
        .map_err(|e| Rejection::new(Context::popular(), e))?;

        with_data(StatusCode::OK, videos, "popular videos retrieved")
    }
}

pub async fn stored<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
    query: StoredQuery,
) -> RouteResult {
    timed! {
        let StoredQuery { sort } = query;
        let error_handler = |e: BackendError| Rejection::new(Context::stored(sort.clone()), e);

        let db = environment.db.as_ref();
        let user = identity::resolve(db, authorization.as_deref())
            .await
            .map_err(error_handler)?;
        let logger = environment.logger.new(o!("user_id" => user.id));

        let sort_key = SortKey::from_query(sort.as_deref());
        debug!(logger, "Listing stored videos..."; "sort" => ?sort_key);

        let videos = views::saved_collection_view(&logger, db, user.id, sort_key)
            .await
            .map_err(error_handler)?;

        with_data(StatusCode::OK, videos, "stored videos retrieved")
    }
}

pub async fn video_detail<O: SafeStore>(
    environment: Environment<O>,
    video_id: Id,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::video_detail(video_id), e);

        let db = environment.db.as_ref();
        let user = identity::resolve(db, authorization.as_deref())
            .await
            .map_err(error_handler)?;
        let logger = environment
            .logger
            .new(o!("user_id" => user.id, "video_id" => video_id));

        let detail = views::video_detail(&logger, db, user.id, video_id)
            .await
            .map_err(error_handler)?;

        with_data(StatusCode::OK, detail, "video retrieved")
    }
}

pub async fn like<O: SafeStore>(
    environment: Environment<O>,
    video_id: Id,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::like(video_id), e);

        let db = environment.db.as_ref();
        let user = identity::resolve(db, authorization.as_deref())
            .await
            .map_err(error_handler)?;

        engagement::like(&environment.logger, db, user.id, video_id)
            .await
            .map_err(error_handler)?;

        without_data(StatusCode::CREATED, "video liked")
    }
}

pub async fn unlike<O: SafeStore>(
    environment: Environment<O>,
    video_id: Id,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::unlike(video_id), e);

        let db = environment.db.as_ref();
        let user = identity::resolve(db, authorization.as_deref())
            .await
            .map_err(error_handler)?;

        engagement::unlike(&environment.logger, db, user.id, video_id)
            .await
            .map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn store<O: SafeStore>(
    environment: Environment<O>,
    video_id: Id,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::store(video_id), e);

        let db = environment.db.as_ref();
        let user = identity::resolve(db, authorization.as_deref())
            .await
            .map_err(error_handler)?;

        engagement::store(&environment.logger, db, user.id, video_id)
            .await
            .map_err(error_handler)?;

        without_data(StatusCode::CREATED, "video stored")
    }
}

pub async fn unstore<O: SafeStore>(
    environment: Environment<O>,
    video_id: Id,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::unstore(video_id), e);

        let db = environment.db.as_ref();
        let user = identity::resolve(db, authorization.as_deref())
            .await
            .map_err(error_handler)?;

        engagement::unstore(&environment.logger, db, user.id, video_id)
            .await
            .map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn register_stadium<O: SafeStore>(
    environment: Environment<O>,
    content: FormData,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::register_stadium(), e);
        let logger = &environment.logger;

        debug!(logger, "Parsing submission...");
        let submission = parse_stadium_submission(content)
            .await
            .map_err(error_handler)?;

        let id = catalog::register_stadium(
            logger,
            environment.db.as_ref(),
            environment.store.as_ref(),
            submission.metadata,
            submission.images,
        )
        .await
        .map_err(error_handler)?;

        with_header(
            with_data(StatusCode::CREATED, Created { stadium_id: id }, "stadium registered"),
            "location",
            environment.urls.stadium(id).as_str(),
        )
    }
}

pub async fn stadium<O: SafeStore>(environment: Environment<O>, stadium_id: Id) -> RouteResult {
    timed! {
        let detail = catalog::stadium_detail(environment.db.as_ref(), stadium_id)
            .await
            .map_err(|e| Rejection::new(Context::stadium(stadium_id), e))?;

        with_data(StatusCode::OK, detail, "stadium retrieved")
    }
}

pub async fn profile<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let user = identity::resolve(environment.db.as_ref(), authorization.as_deref())
            .await
            .map_err(|e| Rejection::new(Context::profile(), e))?;

        with_data(StatusCode::OK, Profile::from(user), "profile retrieved")
    }
}

pub async fn balance<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let user = identity::resolve(environment.db.as_ref(), authorization.as_deref())
            .await
            .map_err(|e| Rejection::new(Context::balance(), e))?;

        with_data(StatusCode::OK, Balance::from(&user), "balance retrieved")
    }
}

pub async fn add_bananas<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
    top_up: BananaTopUp,
) -> RouteResult {
    timed! {
        let BananaTopUp { amount } = top_up;
        let error_handler = |e: BackendError| Rejection::new(Context::add_bananas(amount), e);

        let db = environment.db.as_ref();
        let user = identity::resolve(db, authorization.as_deref())
            .await
            .map_err(error_handler)?;

        let balance = accounts::add_bananas(&environment.logger, db, &user, amount)
            .await
            .map_err(error_handler)?;

        with_data(StatusCode::OK, balance, "bananas added")
    }
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
