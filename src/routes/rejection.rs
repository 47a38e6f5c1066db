use warp::reject;

use crate::entities::Id;
use crate::errors::BackendError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }
}

impl reject::Reject for Rejection {}

/// The operation a failed request was attempting.
#[derive(Clone, Debug)]
pub enum Context {
    AddBananas { amount: i32 },
    Balance,
    CreateVideos { schedule_id: Id },
    Like { video_id: Id },
    Popular,
    Profile,
    RegisterStadium,
    ScheduleVideos { schedule_id: Id },
    Stadium { stadium_id: Id },
    Store { video_id: Id },
    Stored { sort: Option<String> },
    Unlike { video_id: Id },
    Unstore { video_id: Id },
    VideoDetail { video_id: Id },
}

impl Context {
    pub fn add_bananas(amount: i32) -> Context {
        Context::AddBananas { amount }
    }

    pub fn balance() -> Context {
        Context::Balance
    }

    pub fn create_videos(schedule_id: Id) -> Context {
        Context::CreateVideos { schedule_id }
    }

    pub fn like(video_id: Id) -> Context {
        Context::Like { video_id }
    }

    pub fn popular() -> Context {
        Context::Popular
    }

    pub fn profile() -> Context {
        Context::Profile
    }

    pub fn register_stadium() -> Context {
        Context::RegisterStadium
    }

    pub fn schedule_videos(schedule_id: Id) -> Context {
        Context::ScheduleVideos { schedule_id }
    }

    pub fn stadium(stadium_id: Id) -> Context {
        Context::Stadium { stadium_id }
    }

    pub fn store(video_id: Id) -> Context {
        Context::Store { video_id }
    }

    pub fn stored(sort: Option<String>) -> Context {
        Context::Stored { sort }
    }

    pub fn unlike(video_id: Id) -> Context {
        Context::Unlike { video_id }
    }

    pub fn unstore(video_id: Id) -> Context {
        Context::Unstore { video_id }
    }

    pub fn video_detail(video_id: Id) -> Context {
        Context::VideoDetail { video_id }
    }
}
