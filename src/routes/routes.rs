//! Defines routes for all student operations.
//!
//! ## Structure
//! - **Student endpoints**
//!   - `POST   /students`            — create (multipart with photo)
//!   - `GET    /students`            — list all
//!   - `GET    /students/{id}`       — fetch one
//!   - `PUT    /students/{id}`       — update name/school
//!   - `DELETE /students/{id}`       — delete row and cached snapshot
//!   - `GET    /students/cache/{id}` — raw cached snapshot
//!
//! - **Probes**: `GET /healthz`, `GET /readyz`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        student_handlers::{
            create_student, delete_student, get_cached_student, get_student, list_students,
            update_student,
        },
    },
    services::student_service::StudentService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Build and return the router for all student routes.
///
/// The router carries shared state (`StudentService`) to all handlers.
pub fn routes() -> Router<StudentService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/students", get(list_students).post(create_student))
        .route(
            "/students/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/students/cache/{id}", get(get_cached_student))
}

/// Any origin may call the API, with credentials.
///
/// The request origin is mirrored back because browsers reject a literal `*`
/// when credentials are allowed.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
}

/// The complete application: routes, state and middleware.
pub fn app(service: StudentService, max_upload_bytes: usize) -> Router {
    routes()
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
