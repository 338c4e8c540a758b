pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod stores;

pub use errors::AppError;
pub use models::student::Student;
pub use services::student_service::{ServiceError, StudentService};
