//! HTTP handlers for student operations.
//! Parses form input and path IDs, and delegates every workflow to
//! `StudentService`.

use crate::{
    errors::AppError,
    models::student::{CreateStudent, PhotoUpload, Student, UpdateStudent, sanitize_file_name},
    services::student_service::{ServiceError, StudentService},
};
use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Path, Request, State, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;

/// Parse a path ID. Anything that is not an unsigned integer cannot name a
/// student.
fn parse_id(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok()
}

/// `POST /students` — multipart `name`, `school` and file `photo`.
///
/// A body that is not multipart cannot carry a file, so it is answered the
/// same way as a multipart body without one.
pub async fn create_student(
    State(service): State<StudentService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Student>, AppError> {
    let Ok(mut multipart) = multipart else {
        return Err(ServiceError::MissingPhoto.into());
    };
    let mut input = CreateStudent::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("name") => input.name = field.text().await?,
            Some("school") => input.school = field.text().await?,
            Some("photo") => {
                let Some(file_name) = field.file_name().and_then(sanitize_file_name) else {
                    // A plain text part named `photo` is not a file.
                    continue;
                };
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                input.photo = Some(PhotoUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let student = service.create_student(input).await?;
    Ok(Json(student))
}

/// `GET /students`
pub async fn list_students(
    State(service): State<StudentService>,
) -> Result<Json<Vec<Student>>, AppError> {
    Ok(Json(service.list_students().await?))
}

/// `GET /students/{id}`
pub async fn get_student(
    State(service): State<StudentService>,
    Path(id): Path<String>,
) -> Result<Json<Student>, AppError> {
    let id = parse_id(&id).ok_or_else(|| AppError::not_found("Student not found"))?;
    Ok(Json(service.get_student(id).await?))
}

/// `PUT /students/{id}` — form `name` and/or `school`; empty values keep the
/// current field.
pub async fn update_student(
    State(service): State<StudentService>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Student>, AppError> {
    let id = parse_id(&id).ok_or_else(|| AppError::not_found("Student not found"))?;
    let changes = read_update_form(request).await?;
    Ok(Json(service.update_student(id, changes).await?))
}

/// `DELETE /students/{id}` — succeeds whether or not the student existed.
pub async fn delete_student(
    State(service): State<StudentService>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(id) = parse_id(&id) {
        service.delete_student(id).await?;
    }
    Ok((StatusCode::OK, Json(json!({ "message": "Student deleted" }))))
}

/// `GET /students/cache/{id}` — the cached snapshot as plain text, verbatim.
pub async fn get_cached_student(
    State(service): State<StudentService>,
    Path(id): Path<String>,
) -> Result<String, AppError> {
    let id = parse_id(&id).ok_or_else(|| AppError::not_found("Student not found in cache"))?;
    Ok(service.get_cached_student(id).await?)
}

/// Read update fields from either a multipart or a urlencoded body.
/// Any other body (or none) carries no changes.
async fn read_update_form(request: Request) -> Result<UpdateStudent, AppError> {
    match form_kind(request.headers()) {
        Some(FormKind::Multipart) => {
            let mut multipart = Multipart::from_request(request, &())
                .await
                .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
            let mut changes = UpdateStudent::default();
            while let Some(field) = multipart.next_field().await? {
                let name = field.name().map(str::to_string);
                match name.as_deref() {
                    Some("name") => changes.name = field.text().await?,
                    Some("school") => changes.school = field.text().await?,
                    _ => {}
                }
            }
            Ok(changes)
        }
        Some(FormKind::UrlEncoded) => {
            let Form(changes) = Form::<UpdateStudent>::from_request(request, &())
                .await
                .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
            Ok(changes)
        }
        None => Ok(UpdateStudent::default()),
    }
}

enum FormKind {
    Multipart,
    UrlEncoded,
}

fn form_kind(headers: &HeaderMap) -> Option<FormKind> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())?
        .to_ascii_lowercase();
    if content_type.starts_with("multipart/form-data") {
        Some(FormKind::Multipart)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Some(FormKind::UrlEncoded)
    } else {
        None
    }
}
