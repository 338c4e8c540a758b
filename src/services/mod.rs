pub mod student_service;
