#[cfg(test)]
mod tests {
    use crate::db::{NewProgressNotes, add_lesson_notes, get_lesson, progress_summary};
    use crate::error::AppError;
    use crate::test::test_utils::{
        INSTRUCTOR, MEMBER, NEWCOMER, OTHER_INSTRUCTOR, TestDb, create_standard_test_db,
        future_slot,
    };
    use crate::workflow::{LessonRequest, accept_lesson, complete_lesson, request_lesson};
    use rocket::tokio;

    async fn completed_lesson(db: &TestDb, hour: u32) -> i64 {
        let instructor = db.user(INSTRUCTOR);
        let booked = request_lesson(
            &db.pool,
            &db.user(MEMBER),
            &LessonRequest {
                instructor_id: instructor.id,
                scheduled_date: future_slot(1, hour),
                lesson_type: Default::default(),
                vehicle_type: None,
                duration_minutes: 60,
                price: None,
                message: String::new(),
            },
        )
        .await
        .unwrap();
        accept_lesson(&db.pool, &instructor, booked.booking.id)
            .await
            .unwrap();
        complete_lesson(&db.pool, &instructor, booked.lesson.id)
            .await
            .unwrap();
        booked.lesson.id
    }

    fn notes(text: &str, rating: i64) -> NewProgressNotes {
        NewProgressNotes {
            notes: text.to_string(),
            performance_rating: rating,
            skills_practiced: vec!["parallel parking".to_string()],
            areas_to_improve: vec!["mirror checks".to_string()],
        }
    }

    #[tokio::test]
    async fn test_empty_progress_averages_zero() {
        let db = create_standard_test_db().await;

        let summary = progress_summary(&db.pool, db.user_id(NEWCOMER)).await.unwrap();

        assert_eq!(summary.total_lessons, 0);
        assert_eq!(summary.completed_lessons, 0);
        assert_eq!(summary.average_rating, 0.0);
        assert!(summary.progress_entries.is_empty());
    }

    #[tokio::test]
    async fn test_notes_are_recorded_and_averaged() {
        let db = create_standard_test_db().await;
        let instructor = db.user(INSTRUCTOR);
        let first = completed_lesson(&db, 9).await;
        let second = completed_lesson(&db, 11).await;

        let entry = add_lesson_notes(
            &db.pool,
            instructor.id,
            &instructor.email,
            first,
            &notes("Good control", 4),
        )
        .await
        .expect("Instructor should add notes");
        assert_eq!(entry.skills_practiced, vec!["parallel parking"]);
        assert_eq!(entry.areas_to_improve, vec!["mirror checks"]);

        add_lesson_notes(
            &db.pool,
            instructor.id,
            &instructor.email,
            second,
            &notes("Needs work on roundabouts", 3),
        )
        .await
        .unwrap();

        let lesson = get_lesson(&db.pool, first).await.unwrap();
        assert_eq!(lesson.notes.as_deref(), Some("Good control"));

        let summary = progress_summary(&db.pool, db.user_id(MEMBER)).await.unwrap();
        assert_eq!(summary.total_lessons, 2);
        assert_eq!(summary.completed_lessons, 2);
        assert_eq!(summary.progress_entries.len(), 2);
        assert!((summary.average_rating - 3.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_notes_limited_to_lesson_instructor() {
        let db = create_standard_test_db().await;
        let lesson_id = completed_lesson(&db, 10).await;
        let other = db.user(OTHER_INSTRUCTOR);

        let result =
            add_lesson_notes(&db.pool, other.id, &other.email, lesson_id, &notes("x", 3)).await;

        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_performance_rating_bounds() {
        let db = create_standard_test_db().await;
        let lesson_id = completed_lesson(&db, 12).await;
        let instructor = db.user(INSTRUCTOR);

        let result = add_lesson_notes(
            &db.pool,
            instructor.id,
            &instructor.email,
            lesson_id,
            &notes("x", 6),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
