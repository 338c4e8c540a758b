//! Core data models for the student service.
//!
//! `Student` maps to the `students` table via `sqlx::FromRow` and serializes
//! as JSON via `serde`; the same JSON is what the cache holds.

pub mod student;
