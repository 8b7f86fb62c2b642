use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool, types::Json};
use tracing::info;

use crate::student_operations::grade::Grade;

/// Roll number a record carries between its insert and the resequence pass.
pub const PLACEHOLDER_ROLL_NUMBER: i64 = 0;

const SELECT_STUDENT: &str =
    "SELECT id, roll_number, name, age, gender, course, mark, avg, grade FROM student_result";

// --- Persisted Row ---
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentRecord {
    pub id: i64,
    pub roll_number: i64,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub course: String,
    pub mark: Json<BTreeMap<String, i64>>,
    pub avg: f64,
    pub grade: String,
}

/// Just enough of a row to rank it within its course.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CourseMember {
    pub id: i64,
    pub name: String,
    pub roll_number: i64,
}

// --- Wire Shapes ---
#[derive(Debug, Clone, Deserialize)]
pub struct StudentIn {
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub course: String,
    pub mark: BTreeMap<String, i64>,
    // Accepted for compatibility with edit forms; the query string decides the target.
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudentOut {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub course: String,
    pub mark: BTreeMap<String, i64>,
    pub roll_number: i64,
    pub avg: f64,
    pub grade: String,
}

impl From<StudentRecord> for StudentOut {
    fn from(record: StudentRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            age: record.age,
            gender: record.gender,
            course: record.course,
            mark: record.mark.0,
            roll_number: record.roll_number,
            avg: record.avg,
            grade: record.grade,
        }
    }
}

/// Validated caller fields together with the values derived from them at write time.
#[derive(Debug, Clone)]
pub struct StudentFields {
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub course: String,
    pub mark: BTreeMap<String, i64>,
    pub avg: f64,
    pub grade: Grade,
}

// --- Schema ---
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    info!("Starting database initialization and schema setup...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS student_result (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            roll_number      INTEGER NOT NULL DEFAULT 0,
            name             TEXT NOT NULL,
            age              INTEGER NOT NULL,
            gender           TEXT NOT NULL,
            course           TEXT NOT NULL,
            mark             TEXT NOT NULL,
            avg              REAL NOT NULL,
            grade            TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_student_course ON student_result (course, roll_number);
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create student_result table")?;

    Ok(())
}

// --- Queries ---
pub async fn insert_student(
    conn: &mut SqliteConnection,
    fields: &StudentFields,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO student_result (roll_number, name, age, gender, course, mark, avg, grade)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(PLACEHOLDER_ROLL_NUMBER)
    .bind(&fields.name)
    .bind(fields.age)
    .bind(&fields.gender)
    .bind(&fields.course)
    .bind(Json(fields.mark.clone()))
    .bind(fields.avg)
    .bind(fields.grade.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_student(
    conn: &mut SqliteConnection,
    id: i64,
) -> sqlx::Result<Option<StudentRecord>> {
    sqlx::query_as::<_, StudentRecord>(&format!("{SELECT_STUDENT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Overwrites the record addressed by the `(id, course)` compound key.
/// Returns the number of rows touched, so zero means no such record.
pub async fn update_student(
    conn: &mut SqliteConnection,
    id: i64,
    course: &str,
    fields: &StudentFields,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE student_result
        SET name = ?, age = ?, gender = ?, course = ?, mark = ?, avg = ?, grade = ?
        WHERE id = ? AND course = ?
        "#,
    )
    .bind(&fields.name)
    .bind(fields.age)
    .bind(&fields.gender)
    .bind(&fields.course)
    .bind(Json(fields.mark.clone()))
    .bind(fields.avg)
    .bind(fields.grade.as_str())
    .bind(id)
    .bind(course)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_student(
    conn: &mut SqliteConnection,
    id: i64,
    course: &str,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM student_result WHERE id = ? AND course = ?")
        .bind(id)
        .bind(course)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn course_members(
    conn: &mut SqliteConnection,
    course: &str,
) -> sqlx::Result<Vec<CourseMember>> {
    sqlx::query_as::<_, CourseMember>(
        "SELECT id, name, roll_number FROM student_result WHERE course = ?",
    )
    .bind(course)
    .fetch_all(&mut *conn)
    .await
}

pub async fn set_roll_number(
    conn: &mut SqliteConnection,
    id: i64,
    roll_number: i64,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE student_result SET roll_number = ? WHERE id = ?")
        .bind(roll_number)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// All records matching the optional filters, ordered by course then roll number.
pub async fn list_students(
    conn: &mut SqliteConnection,
    course: Option<&str>,
    gender: Option<&str>,
) -> sqlx::Result<Vec<StudentRecord>> {
    let mut query = QueryBuilder::<Sqlite>::new(SELECT_STUDENT);
    let mut separator = " WHERE ";

    if let Some(course) = course {
        query.push(separator).push("course = ").push_bind(course.to_string());
        separator = " AND ";
    }
    if let Some(gender) = gender {
        query.push(separator).push("gender = ").push_bind(gender.to_string());
    }
    query.push(" ORDER BY course, roll_number, id");

    query
        .build_query_as::<StudentRecord>()
        .fetch_all(&mut *conn)
        .await
}
