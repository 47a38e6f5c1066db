use std::convert::Infallible;
use std::sync::Arc;

use log::{error, warn, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{Json, WithStatus};

use self::response::without_data;
use crate::errors::BackendError;

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// The maximum form data size to accept. This should be enforced by
/// the HTTP gateway, so on the Rust side it’s set to an unreasonably
/// large number.
const MAX_CONTENT_LENGTH: u64 = 256 * 1024 * 1024;

/// Renders every rejection in the response envelope.
pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, Infallible> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            warn!(logger, "Request failed"; "context" => ?r.context, "status" => %status, "message" => %r.error);
        }

        return Ok(without_data(status, e.to_string()));
    }

    let (status, message) = if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "path not found")
    } else if rej.find::<reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else if rej.find::<reject::InvalidQuery>().is_some()
        || rej.find::<reject::InvalidHeader>().is_some()
        || rej.find::<reject::MissingHeader>().is_some()
        || rej.find::<reject::PayloadTooLarge>().is_some()
        || rej.find::<reject::UnsupportedMediaType>().is_some()
        || rej.find::<reject::LengthRequired>().is_some()
        || rej.find::<warp::body::BodyDeserializeError>().is_some()
    {
        (StatusCode::BAD_REQUEST, "bad request")
    } else {
        error!(logger, "Unhandled rejection"; "rejection" => ?rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "unknown error")
    };

    Ok(without_data(status, message))
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        _ if e.is_not_found() => StatusCode::NOT_FOUND,
        AlreadyLiked(..) | AlreadyStored(..) => StatusCode::CONFLICT,
        MalformedCredential
        | InvalidAmount(..)
        | PartsMissing
        | MalformedUploadMetadata(..)
        | MalformedFormSubmission => StatusCode::BAD_REQUEST,
        UnsupportedImageType(..) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use std::sync::Arc;

    use warp::filters::multipart::form;
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{body::json, delete, get as g, header, path as p, path::param as par, post, query};

    use super::{handlers, query as q, MAX_CONTENT_LENGTH};
    use crate::entities::Id;
    use crate::environment::{Environment, SafeStore};

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    const AUTHORIZATION_HEADER: &str = "authorization";

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name<O: SafeStore + 'static>(environment: Environment<O>) -> Route {
            let r = environment.urls.api_path.clone();

            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p(r));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    fn auth() -> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone {
        header::optional::<String>(AUTHORIZATION_HEADER)
    }

    route!(make_create_videos_route => create_videos, rt; p("videos"), end(), post(), json());
    route!(make_popular_route => popular, rt; p!("videos" / "popular"), end(), g());
    route!(make_stored_route => stored, rt; p!("videos" / "stored"), end(), g(), auth(), query::<q::StoredQuery>());
    route!(make_video_detail_route => video_detail, rt; p("videos"), par::<Id>(), end(), g(), auth());
    route!(make_like_route => like, rt; p("videos"), par::<Id>(), p("like"), end(), post(), auth());
    route!(make_unlike_route => unlike, rt; p("videos"), par::<Id>(), p("like"), end(), delete(), auth());
    route!(make_store_route => store, rt; p("videos"), par::<Id>(), p("store"), end(), post(), auth());
    route!(make_unstore_route => unstore, rt; p("videos"), par::<Id>(), p("store"), end(), delete(), auth());
    route!(make_schedule_videos_route => schedule_videos, rt; p("schedules"), par::<Id>(), p("videos"), end(), g());
    route!(make_register_stadium_route => register_stadium, rt; p("stadiums"), end(), post(), form().max_length(MAX_CONTENT_LENGTH));
    route!(make_stadium_route => stadium, rt; p("stadiums"), par::<Id>(), end(), g());
    route!(make_profile_route => profile, rt; p!("user" / "profile"), end(), g(), auth());
    route!(make_balance_route => balance, rt; p!("user" / "bananas"), end(), g(), auth());
    route!(make_add_bananas_route => add_bananas, rt; p!("user" / "bananas"), end(), post(), auth(), json::<q::BananaTopUp>());

    /// Every API route, with rejections rendered in the response envelope.
    pub fn make_api_routes<O: SafeStore + 'static>(environment: Environment<O>) -> Route {
        let logger = environment.logger.clone();

        make_create_videos_route(environment.clone())
            .or(make_popular_route(environment.clone()))
            .unify()
            .or(make_stored_route(environment.clone()))
            .unify()
            .or(make_video_detail_route(environment.clone()))
            .unify()
            .or(make_like_route(environment.clone()))
            .unify()
            .or(make_unlike_route(environment.clone()))
            .unify()
            .or(make_store_route(environment.clone()))
            .unify()
            .or(make_unstore_route(environment.clone()))
            .unify()
            .or(make_schedule_videos_route(environment.clone()))
            .unify()
            .or(make_register_stadium_route(environment.clone()))
            .unify()
            .or(make_stadium_route(environment.clone()))
            .unify()
            .or(make_profile_route(environment.clone()))
            .unify()
            .or(make_balance_route(environment.clone()))
            .unify()
            .or(make_add_bananas_route(environment))
            .unify()
            .recover(move |r| super::format_rejection(Arc::clone(&logger), r))
            .map(|reply| Box::new(reply) as Box<dyn Reply>)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_statuses() {
        let cases = vec![
            (BackendError::UserNotFound, StatusCode::NOT_FOUND),
            (BackendError::VideoNotFound(1), StatusCode::NOT_FOUND),
            (BackendError::LikeNotFound(1), StatusCode::NOT_FOUND),
            (BackendError::StadiumNotFound(1), StatusCode::NOT_FOUND),
            (
                BackendError::BrokenReference {
                    entity: "field",
                    id: 1,
                },
                StatusCode::NOT_FOUND,
            ),
            (BackendError::AlreadyLiked(1), StatusCode::CONFLICT),
            (BackendError::AlreadyStored(1), StatusCode::CONFLICT),
            (BackendError::MalformedCredential, StatusCode::BAD_REQUEST),
            (BackendError::InvalidAmount(0), StatusCode::BAD_REQUEST),
            (BackendError::PartsMissing, StatusCode::BAD_REQUEST),
            (
                BackendError::UnsupportedImageType("text/plain".to_owned()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                BackendError::Sqlx {
                    source: sqlx::Error::RowNotFound,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(status_code_for(&error), status, "{:?}", error);
        }
    }
}
