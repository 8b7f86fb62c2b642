//! Roll number sequencing.
//!
//! Within a course, roll numbers are the dense 1-based rank of each student ordered by
//! case-insensitive name. Names that fold to the same string keep creation order (`id`).
//! The caller owns the transaction and the course lock; this module only reads and
//! rewrites ranks.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::student_operations::student_models::{CourseMember, course_members, set_roll_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResequenceOutcome {
    pub members: usize,
    pub changed: usize,
}

/// Sorts `members` into roll order and returns `(id, roll_number)` pairs in that order.
pub fn rank_by_name(members: &mut [CourseMember]) -> Vec<(i64, i64)> {
    members.sort_by_cached_key(|m| (m.name.to_lowercase(), m.id));
    members
        .iter()
        .zip(1..)
        .map(|(member, roll)| (member.id, roll))
        .collect()
}

/// Recomputes every roll number in `course`, writing only the ranks that moved.
pub async fn resequence(
    conn: &mut SqliteConnection,
    course: &str,
) -> sqlx::Result<ResequenceOutcome> {
    let mut members = course_members(&mut *conn, course).await?;
    let ranking = rank_by_name(&mut members);

    let mut changed = 0;
    for (member, (id, roll)) in members.iter().zip(ranking) {
        if member.roll_number != roll {
            set_roll_number(&mut *conn, id, roll).await?;
            changed += 1;
        }
    }

    debug!(course, members = members.len(), changed, "Resequenced course");
    Ok(ResequenceOutcome {
        members: members.len(),
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student_operations::student_models::{
        get_student, insert_student,
        tests::{fields, memory_pool},
    };

    fn member(id: i64, name: &str) -> CourseMember {
        CourseMember {
            id,
            name: name.to_string(),
            roll_number: 0,
        }
    }

    fn rolls_by_name(members: &mut [CourseMember]) -> Vec<(String, i64)> {
        let ranking = rank_by_name(members);
        members
            .iter()
            .zip(ranking)
            .map(|(m, (_, roll))| (m.name.clone(), roll))
            .collect()
    }

    #[test]
    fn test_rank_is_case_insensitive() {
        let mut members = vec![member(1, "bob"), member(2, "Alice"), member(3, "carol")];
        assert_eq!(
            rolls_by_name(&mut members),
            vec![
                ("Alice".to_string(), 1),
                ("bob".to_string(), 2),
                ("carol".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_rank_ties_fall_back_to_creation_order() {
        let mut members = vec![member(7, "ann"), member(3, "Ann"), member(5, "ANN")];
        let ranking = rank_by_name(&mut members);
        assert_eq!(ranking, vec![(3, 1), (5, 2), (7, 3)]);
    }

    #[test]
    fn test_rank_empty_course() {
        assert!(rank_by_name(&mut []).is_empty());
    }

    #[test]
    fn test_rank_is_dense() {
        let mut members: Vec<CourseMember> = ["zed", "Mona", "amy", "Lee", "kai"]
            .iter()
            .enumerate()
            .map(|(i, name)| member(i as i64 + 1, name))
            .collect();
        let rolls: Vec<i64> = rank_by_name(&mut members).into_iter().map(|(_, r)| r).collect();
        assert_eq!(rolls, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_resequence_persists_ranks() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let bob = insert_student(&mut conn, &fields("bob", "CS", "M")).await.unwrap();
        let alice = insert_student(&mut conn, &fields("Alice", "CS", "F")).await.unwrap();
        let carol = insert_student(&mut conn, &fields("carol", "CS", "F")).await.unwrap();
        let other = insert_student(&mut conn, &fields("Aaron", "EE", "M")).await.unwrap();

        let outcome = resequence(&mut conn, "CS").await.unwrap();
        assert_eq!(outcome, ResequenceOutcome { members: 3, changed: 3 });

        for (id, expected) in [(alice, 1), (bob, 2), (carol, 3)] {
            let record = get_student(&mut conn, id).await.unwrap().unwrap();
            assert_eq!(record.roll_number, expected);
        }
        // Other courses are untouched.
        let record = get_student(&mut conn, other).await.unwrap().unwrap();
        assert_eq!(record.roll_number, 0);
    }

    #[tokio::test]
    async fn test_resequence_skips_unchanged_ranks() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        insert_student(&mut conn, &fields("Amy", "CS", "F")).await.unwrap();
        insert_student(&mut conn, &fields("Zed", "CS", "M")).await.unwrap();
        resequence(&mut conn, "CS").await.unwrap();

        insert_student(&mut conn, &fields("Mona", "CS", "F")).await.unwrap();
        let outcome = resequence(&mut conn, "CS").await.unwrap();

        // Amy stays 1; Mona takes 2 and Zed moves to 3.
        assert_eq!(outcome, ResequenceOutcome { members: 3, changed: 2 });
    }

    #[tokio::test]
    async fn test_resequence_unknown_course_is_noop() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let outcome = resequence(&mut conn, "Nowhere").await.unwrap();
        assert_eq!(outcome, ResequenceOutcome { members: 0, changed: 0 });
    }
}
