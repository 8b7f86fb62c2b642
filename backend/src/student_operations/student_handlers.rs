use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::Deserialize;
use tracing::info;

use crate::{
    AppState,
    student_operations::{
        handler_utils::{AppError, MessageResponse},
        service::{create_student, list_all_students, remove_student, update_existing_student},
        student_models::{StudentIn, StudentOut},
    },
};

// ====================================================================
// Query Parameters
// ====================================================================
#[derive(Deserialize, Debug)]
pub struct UpdateParams {
    pub course: String,
    pub student_id: i64,
}

#[derive(Deserialize, Debug)]
pub struct DeleteParams {
    pub student_id: i64,
    pub course: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct FilterParams {
    pub course: Option<String>,
    pub gender: Option<String>,
}

// ====================================================================
// Handlers
// ====================================================================

/// POST /insert/
pub async fn insert_student(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StudentIn>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(student) = payload?;
    let created = create_student(&state, student).await?;

    Ok(Json(MessageResponse::with_student(
        "Student added and roll numbers updated alphabetically",
        created,
    )))
}

/// GET /view/
pub async fn view_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StudentOut>>, AppError> {
    let students = list_all_students(&state, None, None).await?;
    info!("View: returning {} students", students.len());
    Ok(Json(students))
}

/// PUT /update/?course=&student_id=
pub async fn update_student(
    State(state): State<Arc<AppState>>,
    params: Result<Query<UpdateParams>, QueryRejection>,
    payload: Result<Json<StudentIn>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Query(params) = params?;
    let Json(student) = payload?;

    let updated =
        update_existing_student(&state, &params.course, params.student_id, student).await?;

    Ok(Json(MessageResponse::with_student(
        "Student updated with alphabetical roll number",
        updated,
    )))
}

/// DELETE /delete/?student_id=&course=
pub async fn delete_student(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Query(params) = params?;
    remove_student(&state, params.student_id, &params.course).await?;

    Ok(Json(MessageResponse::new("Student deleted")))
}

/// GET /students/filter?course=&gender=
pub async fn filter_students(
    State(state): State<Arc<AppState>>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<Vec<StudentOut>>, AppError> {
    let Query(params) = params?;
    let students =
        list_all_students(&state, params.course.as_deref(), params.gender.as_deref()).await?;

    info!(
        "Filter course={:?} gender={:?}: {} students",
        params.course,
        params.gender,
        students.len()
    );
    Ok(Json(students))
}
