use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use student_service::{
    Student, StudentService,
    routes::routes,
    stores::in_memory::{InMemoryPhotoStore, InMemorySnapshotCache, InMemoryStudentRepository},
};
use tower::ServiceExt;

const BOUNDARY: &str = "student-service-test-boundary";
const BUCKET: &str = "student-photos";

struct TestApp {
    router: Router,
    repo: InMemoryStudentRepository,
    cache: InMemorySnapshotCache,
    photos: InMemoryPhotoStore,
}

fn test_app() -> TestApp {
    test_app_with_limit(10 * 1024 * 1024)
}

fn test_app_with_limit(max_upload_bytes: usize) -> TestApp {
    let repo = InMemoryStudentRepository::new();
    let cache = InMemorySnapshotCache::new();
    let photos = InMemoryPhotoStore::new(BUCKET, "s3.amazonaws.com");
    let service = StudentService::new(
        Arc::new(repo.clone()),
        Arc::new(cache.clone()),
        Arc::new(photos.clone()),
        Duration::from_secs(5),
    );
    TestApp {
        router: routes::app(service, max_upload_bytes),
        repo,
        cache,
        photos,
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: image/jpeg\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(method: &str, uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("failed to build request")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router
        .clone()
        .oneshot(request)
        .await
        .expect("request failed")
}

async fn body_text(resp: Response<Body>) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("response body was not utf-8")
}

async fn body_json(resp: Response<Body>) -> Value {
    serde_json::from_str(&body_text(resp).await).expect("response body was not json")
}

async fn create(app: &TestApp, name: &str, school: &str, file_name: &str) -> Student {
    let resp = send(
        app,
        multipart_request(
            "POST",
            "/students",
            &[
                Part::Text("name", name),
                Part::Text("school", school),
                Part::File {
                    name: "photo",
                    file_name,
                    bytes: b"\xff\xd8\xff\xe0",
                },
            ],
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    serde_json::from_value(body_json(resp).await).expect("response was not a student")
}

#[tokio::test]
async fn create_get_cache_delete_round_trip() {
    let app = test_app();

    let created = create(&app, "Ada", "MIT", "p.jpg").await;
    assert_eq!(
        created,
        Student {
            id: 1,
            name: "Ada".into(),
            school: "MIT".into(),
            photo: format!("https://{BUCKET}.s3.amazonaws.com/p.jpg"),
        }
    );
    assert!(app.photos.object("p.jpg").await.is_some());

    let resp = send(&app, empty_request("GET", "/students/1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Student = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(fetched, created);

    let resp = send(&app, empty_request("GET", "/students/cache/1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert_eq!(
        body_text(resp).await,
        serde_json::to_string(&created).unwrap()
    );

    let resp = send(&app, empty_request("DELETE", "/students/1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["message"], "Student deleted");

    let resp = send(&app, empty_request("GET", "/students/1")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "Student not found");

    let resp = send(&app, empty_request("GET", "/students/cache/1")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "Student not found in cache");

    // The photo object outlives the student.
    assert!(app.photos.object("p.jpg").await.is_some());
}

#[tokio::test]
async fn create_without_photo_is_rejected_and_writes_nothing() {
    let app = test_app();

    let resp = send(
        &app,
        multipart_request(
            "POST",
            "/students",
            &[Part::Text("name", "Ada"), Part::Text("school", "MIT")],
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Photo is required");
    assert_eq!(body["status"], 400);

    // A text part named `photo` is not a file either.
    let resp = send(
        &app,
        multipart_request("POST", "/students", &[Part::Text("photo", "p.jpg")]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, empty_request("GET", "/students")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, serde_json::json!([]));
    assert!(app.repo.is_empty().await);
    assert!(app.cache.is_empty().await);
    assert!(app.photos.is_empty().await);
}

#[tokio::test]
async fn failed_upload_is_a_server_error() {
    let app = test_app();
    app.photos.set_failing(true);

    let resp = send(
        &app,
        multipart_request(
            "POST",
            "/students",
            &[
                Part::Text("name", "Ada"),
                Part::File {
                    name: "photo",
                    file_name: "p.jpg",
                    bytes: b"x",
                },
            ],
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["error"], "Failed to upload photo");
    assert!(app.repo.is_empty().await);
    assert!(app.cache.is_empty().await);
}

#[tokio::test]
async fn create_with_non_multipart_body_is_missing_photo() {
    let app = test_app();

    let urlencoded = Request::builder()
        .method("POST")
        .uri("/students")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("name=Ada&school=MIT"))
        .unwrap();
    let no_content_type = Request::builder()
        .method("POST")
        .uri("/students")
        .body(Body::from("name=Ada&school=MIT"))
        .unwrap();
    let no_boundary = Request::builder()
        .method("POST")
        .uri("/students")
        .header(header::CONTENT_TYPE, "multipart/form-data")
        .body(Body::from("name=Ada"))
        .unwrap();

    for request in [urlencoded, no_content_type, no_boundary] {
        let resp = send(&app, request).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Photo is required");
        assert_eq!(body["status"], 400);
    }

    assert!(app.repo.is_empty().await);
    assert!(app.cache.is_empty().await);
    assert!(app.photos.is_empty().await);
}

#[tokio::test]
async fn failed_insert_is_a_server_error_and_keeps_photo() {
    let app = test_app();
    app.repo.set_failing(true);

    let resp = send(
        &app,
        multipart_request(
            "POST",
            "/students",
            &[
                Part::Text("name", "Ada"),
                Part::Text("school", "MIT"),
                Part::File {
                    name: "photo",
                    file_name: "p.jpg",
                    bytes: b"x",
                },
            ],
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["status"], 500);

    assert!(app.cache.is_empty().await);
    assert_eq!(app.photos.object("p.jpg").await.as_deref(), Some(&b"x"[..]));
}

#[tokio::test]
async fn list_with_database_down_is_a_server_error() {
    let app = test_app();
    create(&app, "Ada", "MIT", "p.jpg").await;
    app.repo.set_failing(true);

    let resp = send(&app, empty_request("GET", "/students")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["status"], 500);
}

#[tokio::test]
async fn failed_row_delete_keeps_snapshot() {
    let app = test_app();
    let created = create(&app, "Ada", "MIT", "p.jpg").await;
    app.repo.set_failing(true);

    let resp = send(&app, empty_request("DELETE", "/students/1")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.cache.contains("student:1").await);

    let resp = send(&app, empty_request("GET", "/students/cache/1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, serde_json::to_string(&created).unwrap());
}

#[tokio::test]
async fn uploaded_file_name_loses_directories() {
    let app = test_app();
    let created = create(&app, "Ada", "MIT", "../../etc/p.jpg").await;
    assert_eq!(
        created.photo,
        format!("https://{BUCKET}.s3.amazonaws.com/p.jpg")
    );
}

#[tokio::test]
async fn list_returns_all_students() {
    let app = test_app();
    let ada = create(&app, "Ada", "MIT", "a.jpg").await;
    let grace = create(&app, "Grace", "Yale", "g.jpg").await;

    let resp = send(&app, empty_request("GET", "/students")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let students: Vec<Student> = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(students, vec![ada, grace]);
}

#[tokio::test]
async fn update_with_multipart_changes_only_non_empty_fields() {
    let app = test_app();
    let created = create(&app, "Ada", "MIT", "p.jpg").await;

    let resp = send(
        &app,
        multipart_request(
            "PUT",
            "/students/1",
            &[Part::Text("name", "Ada Lovelace"), Part::Text("school", "")],
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Student = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(updated.name, "Ada Lovelace");
    assert_eq!(updated.school, "MIT");
    assert_eq!(updated.photo, created.photo);

    let resp = send(&app, empty_request("GET", "/students/cache/1")).await;
    assert_eq!(body_text(resp).await, serde_json::to_string(&updated).unwrap());
}

#[tokio::test]
async fn update_with_urlencoded_form() {
    let app = test_app();
    create(&app, "Ada", "MIT", "p.jpg").await;

    let resp = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/students/1")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("school=Cambridge"))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Student = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(updated.name, "Ada");
    assert_eq!(updated.school, "Cambridge");
}

#[tokio::test]
async fn update_without_fields_leaves_student_unchanged() {
    let app = test_app();
    let created = create(&app, "Ada", "MIT", "p.jpg").await;

    let resp = send(&app, empty_request("PUT", "/students/1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Student = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(updated, created);
}

#[tokio::test]
async fn update_of_missing_student_is_not_found() {
    let app = test_app();
    let resp = send(
        &app,
        multipart_request("PUT", "/students/9", &[Part::Text("name", "Nobody")]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(app.cache.is_empty().await);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let app = test_app();
    create(&app, "Ada", "MIT", "p.jpg").await;

    for _ in 0..2 {
        let resp = send(&app, empty_request("DELETE", "/students/1")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = send(&app, empty_request("DELETE", "/students/404")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(app.repo.is_empty().await);
    assert!(!app.cache.contains("student:1").await);
}

#[tokio::test]
async fn non_numeric_ids_never_match() {
    let app = test_app();
    create(&app, "Ada", "MIT", "p.jpg").await;

    for uri in ["/students/abc", "/students/cache/abc"] {
        let resp = send(&app, empty_request("GET", uri)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
    let resp = send(&app, empty_request("DELETE", "/students/abc")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(app.repo.len().await, 1);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = test_app_with_limit(1024);
    let big = vec![0u8; 4096];

    let resp = send(
        &app,
        multipart_request(
            "POST",
            "/students",
            &[Part::File {
                name: "photo",
                file_name: "big.jpg",
                bytes: &big,
            }],
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.photos.is_empty().await);
}

#[tokio::test]
async fn cors_preflight_allows_any_origin_with_credentials() {
    let app = test_app();
    let resp = send(
        &app,
        Request::builder()
            .method("OPTIONS")
            .uri("/students")
            .header(header::ORIGIN, "https://frontend.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://frontend.example"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
        assert!(methods.contains(method), "{methods}");
    }
}

#[tokio::test]
async fn health_and_readiness() {
    let app = test_app();

    let resp = send(&app, empty_request("GET", "/healthz")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");

    let resp = send(&app, empty_request("GET", "/readyz")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    app.cache.set_failing(true);
    let resp = send(&app, empty_request("GET", "/readyz")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(resp).await;
    assert_eq!(body["checks"]["cache"]["ok"], false);
    assert_eq!(body["checks"]["database"]["ok"], true);
}
