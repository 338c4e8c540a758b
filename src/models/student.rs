//! Represents a student record and the inputs used to create one.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A student row as stored in the `students` table.
///
/// Field order is the JSON order, and the cache snapshot is exactly this
/// serialization.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Student {
    /// Generated by the relational store on insert; never changes.
    pub id: u64,

    pub name: String,

    pub school: String,

    /// Public URL of the uploaded photo, set once at creation.
    pub photo: String,
}

/// Column values for a row that has not been assigned an ID yet.
#[derive(Clone, Debug)]
pub struct NewStudent {
    pub name: String,
    pub school: String,
    pub photo: String,
}

/// A photo file received with a create request.
#[derive(Clone, Debug)]
pub struct PhotoUpload {
    /// Client-supplied filename with any directory components removed.
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Input to the create workflow.
#[derive(Clone, Debug, Default)]
pub struct CreateStudent {
    pub name: String,
    pub school: String,
    pub photo: Option<PhotoUpload>,
}

/// Input to the update workflow. Empty strings mean "leave unchanged".
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateStudent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub school: String,
}

impl UpdateStudent {
    /// Apply non-empty fields to `student`.
    pub fn apply_to(&self, student: &mut Student) {
        if !self.name.is_empty() {
            student.name = self.name.clone();
        }
        if !self.school.is_empty() {
            student.school = self.school.clone();
        }
    }
}

/// Strip directory components from a client-supplied filename.
///
/// Returns `None` when nothing usable remains, which callers treat the same as
/// a missing file.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}
