// service.rs
use anyhow::anyhow;
use tracing::{info, warn};

use crate::{
    AppState,
    student_operations::{
        grade::{Grade, average},
        handler_utils::AppError,
        sequencer::resequence,
        student_models::{
            StudentFields, StudentIn, StudentOut, delete_student, get_student, insert_student,
            list_students, update_student,
        },
    },
};

const MAX_NAME_CHARS: usize = 50;
const MAX_GENDER_CHARS: usize = 10;
const MAX_COURSE_CHARS: usize = 20;

// ====================================================================
// Validation
// ====================================================================
fn validate(input: StudentIn) -> Result<StudentFields, AppError> {
    check_text("name", &input.name, MAX_NAME_CHARS, true)?;
    check_text("gender", &input.gender, MAX_GENDER_CHARS, false)?;
    check_text("course", &input.course, MAX_COURSE_CHARS, true)?;

    if input.age < 0 {
        return Err(AppError::Validation(format!(
            "age must not be negative, got {}",
            input.age
        )));
    }

    let avg = average(&input.mark).ok_or_else(|| {
        AppError::Validation("mark must contain at least one subject".into())
    })?;

    Ok(StudentFields {
        name: input.name,
        age: input.age,
        gender: input.gender,
        course: input.course,
        mark: input.mark,
        avg,
        grade: Grade::from_average(avg),
    })
}

fn check_text(field: &str, value: &str, max_chars: usize, required: bool) -> Result<(), AppError> {
    if required && value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    let len = value.chars().count();
    if len > max_chars {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max_chars} characters, got {len}"
        )));
    }
    Ok(())
}

fn student_not_found(id: i64, course: &str) -> AppError {
    warn!("Student {} not found in course '{}'", id, course);
    AppError::NotFound("Student not found".into())
}

// ====================================================================
// Operations
// ====================================================================

/// Inserts a student with a placeholder roll number, then resequences its course.
pub async fn create_student(state: &AppState, input: StudentIn) -> Result<StudentOut, AppError> {
    let fields = validate(input)?;
    info!("Create student: name='{}', course='{}'", fields.name, fields.course);

    let _guard = state.course_locks.lock(&fields.course).await;
    let mut tx = state.pool.begin().await?;

    let id = insert_student(&mut tx, &fields).await?;
    let outcome = resequence(&mut tx, &fields.course).await?;
    let created = get_student(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow!("Student {id} missing after insert")))?;

    tx.commit().await?;

    info!(
        "Student {} added to '{}' as roll {} ({} members, {} ranks moved)",
        id, created.course, created.roll_number, outcome.members, outcome.changed
    );
    Ok(created.into())
}

/// Overwrites the student addressed by `(id, course)`. Both the old and the new
/// course are resequenced when the course changes.
pub async fn update_existing_student(
    state: &AppState,
    course: &str,
    id: i64,
    input: StudentIn,
) -> Result<StudentOut, AppError> {
    if let Some(body_id) = input.id.filter(|body_id| *body_id != id) {
        warn!("Ignoring body id {} for update of student {}", body_id, id);
    }
    let fields = validate(input)?;
    info!(
        "Update student {}: course '{}' -> '{}'",
        id, course, fields.course
    );

    let _guards = state
        .course_locks
        .lock_all(&[course, fields.course.as_str()])
        .await;
    let mut tx = state.pool.begin().await?;

    if update_student(&mut tx, id, course, &fields).await? == 0 {
        return Err(student_not_found(id, course));
    }

    let outcome = resequence(&mut tx, &fields.course).await?;
    if fields.course != course {
        let vacated = resequence(&mut tx, course).await?;
        info!(
            "Resequenced vacated course '{}' ({} members, {} ranks moved)",
            course, vacated.members, vacated.changed
        );
    }

    let updated = get_student(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow!("Student {id} missing after update")))?;

    tx.commit().await?;

    info!(
        "Student {} updated, roll {} in '{}' ({} ranks moved)",
        id, updated.roll_number, updated.course, outcome.changed
    );
    Ok(updated.into())
}

/// Removes the student addressed by `(id, course)` and closes the gap it leaves.
pub async fn remove_student(state: &AppState, id: i64, course: &str) -> Result<(), AppError> {
    info!("Delete student {} from '{}'", id, course);

    let _guard = state.course_locks.lock(course).await;
    let mut tx = state.pool.begin().await?;

    if delete_student(&mut tx, id, course).await? == 0 {
        return Err(student_not_found(id, course));
    }
    let outcome = resequence(&mut tx, course).await?;

    tx.commit().await?;

    info!(
        "Student {} deleted, '{}' now has {} members ({} ranks moved)",
        id, course, outcome.members, outcome.changed
    );
    Ok(())
}

/// Students matching the optional filters. Empty filter values count as absent.
pub async fn list_all_students(
    state: &AppState,
    course: Option<&str>,
    gender: Option<&str>,
) -> Result<Vec<StudentOut>, AppError> {
    let course = course.filter(|c| !c.is_empty());
    let gender = gender.filter(|g| !g.is_empty());

    let mut conn = state.pool.acquire().await?;
    let students = list_students(&mut conn, course, gender).await?;

    Ok(students.into_iter().map(StudentOut::from).collect())
}
