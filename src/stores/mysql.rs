//! MySQL-backed student repository.

use super::{StoreError, StoreResult, StudentRepository};
use crate::models::student::{NewStudent, Student};
use async_trait::async_trait;
use sqlx::MySqlPool;
use std::sync::Arc;
use tracing::debug;

const CREATE_STUDENTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS students (
        id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,
        name LONGTEXT NOT NULL,
        school LONGTEXT NOT NULL,
        photo LONGTEXT NOT NULL,
        PRIMARY KEY (id)
    ) DEFAULT CHARSET = utf8mb4
"#;

#[derive(Clone)]
pub struct MySqlStudentRepository {
    db: Arc<MySqlPool>,
}

impl MySqlStudentRepository {
    pub fn new(db: Arc<MySqlPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StudentRepository for MySqlStudentRepository {
    async fn ensure_schema(&self) -> StoreResult<()> {
        debug!("Executing schema SQL: {}", CREATE_STUDENTS_TABLE.trim());
        sqlx::query(CREATE_STUDENTS_TABLE).execute(&*self.db).await?;
        Ok(())
    }

    async fn insert(&self, student: NewStudent) -> StoreResult<Student> {
        let result = sqlx::query("INSERT INTO students (name, school, photo) VALUES (?, ?, ?)")
            .bind(&student.name)
            .bind(&student.school)
            .bind(&student.photo)
            .execute(&*self.db)
            .await?;

        Ok(Student {
            id: result.last_insert_id(),
            name: student.name,
            school: student.school,
            photo: student.photo,
        })
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Student> {
        sqlx::query_as::<_, Student>("SELECT id, name, school, photo FROM students WHERE id = ?")
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => StoreError::NotFound,
                other => StoreError::Sqlx(other),
            })
    }

    async fn list(&self) -> StoreResult<Vec<Student>> {
        let rows = sqlx::query_as::<_, Student>("SELECT id, name, school, photo FROM students")
            .fetch_all(&*self.db)
            .await?;
        Ok(rows)
    }

    async fn save(&self, student: &Student) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO students (id, name, school, photo) VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                name = VALUES(name),
                school = VALUES(school),
                photo = VALUES(photo)
            "#,
        )
        .bind(student.id)
        .bind(&student.name)
        .bind(&student.school)
        .bind(&student.photo)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn delete_by_id(&self, id: u64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            debug!(student_id = id, "delete matched no rows");
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
