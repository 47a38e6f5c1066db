use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use time::{Date, PrimitiveDateTime};
use url::Url;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::Reply;

use scapture::db::memory::MemoryDb;
use scapture::db::{Db, SafeDb};
use scapture::entities::{Schedule, User, Video};
use scapture::environment::{Config, Environment, VecStore};
use scapture::routes;
use scapture::store::mock::MockStore;
use scapture::urls::Urls;

const BOUNDARY: &str = "thisisaboundary1234";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    status: u16,
    data: Value,
    message: String,
}

struct Harness {
    db: Arc<MemoryDb>,
    store: Arc<MockStore>,
    routes: BoxedFilter<(Box<dyn Reply>,)>,
    stadium_id: i64,
    schedule: Schedule,
}

impl Harness {
    fn new(popular_count: i64) -> Self {
        let db = Arc::new(MemoryDb::new());
        let store = Arc::new(MockStore::new(
            Url::parse("https://objects.example.com/").unwrap(),
        ));

        let stadium = db.add_stadium("Riverside Arena");
        let field = db.add_field(stadium.id, "Pitch A");
        let schedule = db.add_schedule(field.id, datetime(3, 18), datetime(3, 20));

        let shared_db: Arc<SafeDb> = db.clone();
        let shared_store: Arc<VecStore<()>> = store.clone();
        let environment = Environment::new(
            Arc::new(log::discard()),
            shared_db,
            Arc::new(Urls::new("https://www.example.com/", "api")),
            shared_store,
            Config::new(popular_count),
        );

        Harness {
            db,
            store,
            routes: routes::make_api_routes(environment),
            stadium_id: stadium.id,
            schedule,
        }
    }

    async fn user_with_session(&self, name: &str) -> (User, String) {
        let user = self.db.add_user(name);
        let token = self
            .db
            .create_session(user.id)
            .await
            .expect("create session");

        (user, format!("Bearer {}", token))
    }

    fn video(&self, name: &str, like_count: i32) -> Video {
        self.db.add_video(self.schedule.id, name, like_count)
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Option<Envelope>) {
        let mut request = warp::test::request().method(method).path(path);

        if let Some(authorization) = authorization {
            request = request.header("authorization", authorization);
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.reply(&self.routes).await;

        (response.status(), parse_envelope(response.body()))
    }
}

fn datetime(day: u8, hour: u8) -> PrimitiveDateTime {
    Date::try_from_ymd(2024, 5, day)
        .and_then(|d| d.try_with_hms(hour, 0, 0))
        .expect("build datetime")
}

fn parse_envelope(body: &Bytes) -> Option<Envelope> {
    if body.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(body).expect("parse response envelope"))
    }
}

fn ids_of(data: &Value) -> Vec<i64> {
    data.as_array()
        .expect("data is an array")
        .iter()
        .map(|v| v["video_id"].as_i64().expect("video_id is a number"))
        .collect()
}

#[tokio::test]
async fn like_lifecycle() {
    let harness = Harness::new(10);
    let (_, auth) = harness.user_with_session("Mina").await;
    let video = harness.video("Opening goal", 0);
    let like_path = format!("/api/videos/{}/like", video.id);
    let detail_path = format!("/api/videos/{}", video.id);

    let (status, envelope) = harness.send("POST", &like_path, Some(&auth), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let envelope = envelope.expect("envelope");
    assert_eq!(envelope.status, 201);
    assert!(envelope.data.is_null());

    let (status, envelope) = harness.send("POST", &like_path, Some(&auth), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(envelope.expect("envelope").status, 409);

    let (status, envelope) = harness.send("GET", &detail_path, Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    let data = envelope.expect("envelope").data;
    assert_eq!(data["is_liked"], json!(true));
    assert_eq!(data["is_stored"], json!(false));
    assert_eq!(data["stadium_name"], json!("Riverside Arena"));

    let stored = harness.db.retrieve_video(video.id).await.unwrap().unwrap();
    assert_eq!(stored.like_count, 1);

    let (status, envelope) = harness.send("DELETE", &like_path, Some(&auth), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(envelope.is_none());

    let (status, _) = harness.send("DELETE", &like_path, Some(&auth), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let stored = harness.db.retrieve_video(video.id).await.unwrap().unwrap();
    assert_eq!(stored.like_count, 0);
}

#[tokio::test]
async fn handlers_report_server_timing() {
    let harness = Harness::new(10);

    let response = warp::test::request()
        .method("GET")
        .path("/api/videos/popular")
        .reply(&harness.routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let timing = response
        .headers()
        .get("server-timing")
        .expect("get server-timing header")
        .to_str()
        .expect("convert server-timing header to string");
    assert!(timing.starts_with("handler;dur="));
}

#[tokio::test]
async fn credentials_are_checked() {
    let harness = Harness::new(10);
    let video = harness.video("Opening goal", 0);
    let path = format!("/api/videos/{}", video.id);

    let (status, envelope) = harness.send("GET", &path, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let envelope = envelope.expect("envelope");
    assert!(envelope.data.is_null());
    assert_eq!(envelope.message, "user does not exist");

    let (status, _) = harness
        .send("GET", &path, Some("Basic dXNlcjpwYXNz"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = format!("Bearer {}", uuid::Uuid::new_v4());
    let (status, _) = harness.send("GET", &path, Some(&unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn popular_videos_are_ranked_and_capped() {
    let harness = Harness::new(3);
    let counts = [5, 1, 9, 5, 7];
    let videos: Vec<Video> = counts
        .iter()
        .enumerate()
        .map(|(i, count)| harness.video(&format!("clip {}", i), *count))
        .collect();

    let (status, envelope) = harness.send("GET", "/api/videos/popular", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let data = envelope.expect("envelope").data;
    assert_eq!(ids_of(&data), vec![videos[2].id, videos[4].id, videos[0].id]);
    assert_eq!(data[0]["like_count"], json!(9));
    assert_eq!(data[0]["date"], json!("05.03"));
}

#[tokio::test]
async fn stored_videos_follow_the_sort_key() {
    let harness = Harness::new(10);
    let (user, auth) = harness.user_with_session("Mina").await;

    let field = harness.db.add_field(harness.stadium_id, "Pitch B");
    let later = harness
        .db
        .add_schedule(field.id, datetime(10, 9), datetime(10, 11));

    let older_popular = harness.video("older", 8);
    let newer_quiet = harness.db.add_video(later.id, "newer", 2);

    for video in &[&older_popular, &newer_quiet] {
        let path = format!("/api/videos/{}/store", video.id);
        let (status, _) = harness.send("POST", &path, Some(&auth), None).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, envelope) = harness
        .send("GET", "/api/videos/stored?sort=latest", Some(&auth), None)
        .await;
    let data = envelope.expect("envelope").data;
    assert_eq!(ids_of(&data), vec![newer_quiet.id, older_popular.id]);

    for path in &["/api/videos/stored?sort=popular", "/api/videos/stored"] {
        let (status, envelope) = harness.send("GET", path, Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        let data = envelope.expect("envelope").data;
        assert_eq!(ids_of(&data), vec![older_popular.id, newer_quiet.id]);
    }

    assert!(harness.db.store_exists(user.id, newer_quiet.id).await.unwrap());
}

#[tokio::test]
async fn videos_are_created_and_listed_by_schedule() {
    let harness = Harness::new(10);

    let body = json!({
        "schedule_id": harness.schedule.id,
        "data": [
            {"name": " Corner kick ", "image": "https://images.example.com/a.jpg", "video": "https://videos.example.com/a.mp4"},
            {"name": "Header", "image": "https://images.example.com/b.jpg", "video": "https://videos.example.com/b.mp4"}
        ]
    });

    let (status, envelope) = harness.send("POST", "/api/videos", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let created: Vec<i64> = envelope.expect("envelope").data["video_ids"]
        .as_array()
        .expect("video_ids is an array")
        .iter()
        .map(|id| id.as_i64().expect("id is a number"))
        .collect();
    assert_eq!(created.len(), 2);
    assert!(created[0] < created[1]);

    let path = format!("/api/schedules/{}/videos", harness.schedule.id);
    let (status, envelope) = harness.send("GET", &path, None, None).await;
    assert_eq!(status, StatusCode::OK);

    let data = envelope.expect("envelope").data;
    assert_eq!(ids_of(&data), created);
    let entries = data.as_array().expect("array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], json!("Corner kick"));
    assert_eq!(entries[1]["hour"], json!("18:00 ~ 20:00"));

    let (status, _) = harness
        .send("GET", "/api/schedules/999/videos", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let orphaned = json!({"schedule_id": 999, "data": []});
    let (status, _) = harness
        .send("POST", "/api/videos", None, Some(orphaned))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bananas_can_be_topped_up() {
    let harness = Harness::new(10);
    let (_, auth) = harness.user_with_session("Mina").await;

    let (status, envelope) = harness
        .send("POST", "/api/user/bananas", Some(&auth), Some(json!({"amount": 7})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope.expect("envelope").data["balance"], json!(7));

    let (status, _) = harness
        .send("POST", "/api/user/bananas", Some(&auth), Some(json!({"amount": 0})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, envelope) = harness
        .send("GET", "/api/user/bananas", Some(&auth), None)
        .await;
    assert_eq!(envelope.expect("envelope").data["balance"], json!(7));

    let (_, envelope) = harness
        .send("GET", "/api/user/profile", Some(&auth), None)
        .await;
    let data = envelope.expect("envelope").data;
    assert_eq!(data["name"], json!("Mina"));
    assert_eq!(data["email"], json!("mina@example.com"));
}

#[tokio::test]
async fn unknown_routes_use_the_envelope() {
    let harness = Harness::new(10);

    let (status, envelope) = harness.send("GET", "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let envelope = envelope.expect("envelope");
    assert_eq!(envelope.status, 404);
    assert_eq!(envelope.message, "path not found");

    let (status, envelope) = harness.send("PUT", "/api/videos/popular", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(envelope.expect("envelope").status, 405);
}

#[tokio::test]
async fn stadiums_are_registered_from_forms() {
    let harness = Harness::new(10);
    let metadata = br#"{"name": "Harbor Dome", "location": "Busan", "fields": ["North"]}"#;

    let response = multipart_request(&[
        Part::field("data", metadata),
        Part::file("images", "image/png", b"\x89PNG"),
        Part::file("images", "image/jpeg", b"\xff\xd8\xff"),
    ])
    .reply(&harness.routes)
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get("location")
        .expect("get location header")
        .to_str()
        .expect("convert location header to string")
        .to_owned();

    let envelope = parse_envelope(response.body()).expect("envelope");
    let id = envelope.data["stadium_id"].as_i64().expect("stadium id");
    assert_eq!(location, format!("https://www.example.com/api/stadiums/{}", id));
    assert_eq!(harness.store.len(), 2);
    assert_eq!(harness.db.images_of(id).len(), 2);
    assert_eq!(harness.db.fields_of(id).len(), 1);

    let location = Url::parse(&location).expect("parse location header");
    let (status, envelope) = harness.send("GET", location.path(), None, None).await;
    assert_eq!(status, StatusCode::OK);

    let data = envelope.expect("envelope").data;
    assert_eq!(data["stadium_id"], json!(id));
    assert_eq!(data["name"], json!("Harbor Dome"));
    assert_eq!(data["location"], json!("Busan"));
    assert_eq!(data["fields"], json!(["North"]));
    assert_eq!(data["images"].as_array().expect("images").len(), 2);
}

#[tokio::test]
async fn stadiums_can_be_registered_without_images() {
    let harness = Harness::new(10);

    let response = multipart_request(&[Part::field(
        "data",
        br#"{"name": "Harbor Dome", "fields": ["North"]}"#,
    )])
    .reply(&harness.routes)
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let envelope = parse_envelope(response.body()).expect("envelope");
    assert_eq!(envelope.message, "stadium registered");

    let id = envelope.data["stadium_id"].as_i64().expect("stadium id");
    assert!(harness.db.images_of(id).is_empty());
    assert!(harness.store.is_empty());

    let (status, envelope) = harness
        .send("GET", &format!("/api/stadiums/{}", id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope.expect("envelope").data["images"], json!([]));

    let (status, _) = harness.send("GET", "/api/stadiums/9000", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_stadium_forms_fail() {
    let harness = Harness::new(10);

    let response = multipart_request(&[Part::file("images", "image/png", b"\x89PNG")])
        .reply(&harness.routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = multipart_request(&[Part::field("data", b"{not json")])
        .reply(&harness.routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = multipart_request(&[
        Part::field("data", br#"{"name": "Harbor Dome"}"#),
        Part::file("images", "text/plain", b"hello"),
    ])
    .reply(&harness.routes)
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(harness.store.is_empty());
}

struct Part<'a> {
    name: &'a str,
    content_type: Option<&'a str>,
    content: &'a [u8],
}

impl<'a> Part<'a> {
    fn field(name: &'a str, content: &'a [u8]) -> Self {
        Part {
            name,
            content_type: None,
            content,
        }
    }

    fn file(name: &'a str, content_type: &'a str, content: &'a [u8]) -> Self {
        Part {
            name,
            content_type: Some(content_type),
            content,
        }
    }
}

fn multipart_request(parts: &[Part]) -> warp::test::RequestBuilder {
    warp::test::request()
        .method("POST")
        .path("/api/stadiums")
        .header("content-type", multipart_content_type(BOUNDARY))
        .body(make_multipart_body(BOUNDARY.as_bytes(), parts))
}

fn make_multipart_body(boundary: &[u8], parts: &[Part]) -> Vec<u8> {
    const NEWLINE: &[u8] = b"\r\n";

    let boundary = boundary_with_leader(boundary);
    let mut body = vec![];

    for part in parts {
        body.extend_from_slice(&boundary);
        body.extend_from_slice(NEWLINE);

        match part.content_type {
            Some(content_type) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"upload\"\r\nContent-Type: {}\r\n\r\n",
                    part.name, content_type
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
            ),
        }

        body.extend_from_slice(part.content);
        body.extend_from_slice(NEWLINE);
    }

    body.extend_from_slice(&boundary);
    body.extend_from_slice(b"--");
    body.extend_from_slice(NEWLINE);

    body
}

fn boundary_with_leader(boundary: &[u8]) -> Vec<u8> {
    const BOUNDARY_LEADER: &[u8] = &[b'-', b'-'];

    let parts = &[BOUNDARY_LEADER, boundary];
    parts.concat()
}

fn multipart_content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={}", boundary)
}
