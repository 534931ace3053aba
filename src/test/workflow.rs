#[cfg(test)]
mod tests {
    use crate::db::{
        get_booking, get_lesson, get_school, get_school_detail, get_student, lessons_for_user,
        list_bookings_for_user, list_notifications, list_undelivered, upcoming_lessons,
    };
    use crate::error::AppError;
    use crate::models::{
        BookingStatus, BookingType, CancelledBy, LessonStatus, LessonType, NotificationKind,
        StudentSchoolStatus,
    };
    use crate::test::test_utils::{
        ADMIN, INSTRUCTOR, MEMBER, NEWCOMER, OTHER_INSTRUCTOR, SCHOOL, SCHOOL_EMAIL, TestDb,
        TestDbBuilder, create_standard_test_db, future_slot,
    };
    use crate::workflow::{
        LessonBooking, LessonRequest, SchoolJoinRequest, accept_lesson, approve_school_join,
        cancel_lesson, complete_lesson, reject_lesson, reject_school_join, request_lesson,
        request_school_join,
    };
    use rocket::tokio;

    fn lesson_request(instructor_id: i64, days: i64, hour: u32) -> LessonRequest {
        LessonRequest {
            instructor_id,
            scheduled_date: future_slot(days, hour),
            lesson_type: LessonType::Driving,
            vehicle_type: None,
            duration_minutes: 60,
            price: Some(45.0),
            message: "Looking forward to it".to_string(),
        }
    }

    async fn notification_total(db: &TestDb) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
            .fetch_one(&db.pool)
            .await
            .expect("Failed to count notifications")
    }

    async fn lesson_notices(
        db: &TestDb,
        email: &str,
        lesson_id: i64,
        kind: NotificationKind,
    ) -> usize {
        list_notifications(&db.pool, email)
            .await
            .expect("Failed to list notifications")
            .iter()
            .filter(|n| n.lesson_id == Some(lesson_id) && n.kind == kind)
            .count()
    }

    async fn book_lesson(db: &TestDb, hour: u32) -> LessonBooking {
        let student = db.user(MEMBER);
        request_lesson(
            &db.pool,
            &student,
            &lesson_request(db.user_id(INSTRUCTOR), 2, hour),
        )
        .await
        .expect("Failed to request lesson")
    }

    #[tokio::test]
    async fn test_join_request_creates_pending_booking() {
        let db = create_standard_test_db().await;
        let school_id = db.school_id(SCHOOL);

        let booking = request_school_join(
            &db.pool,
            &db.user(NEWCOMER),
            &SchoolJoinRequest {
                school_id,
                message: "Please let me in".to_string(),
            },
        )
        .await
        .expect("Join request should succeed");

        assert_eq!(booking.booking_type, BookingType::SchoolJoin);
        assert_eq!(booking.status, BookingStatus::Requested);
        assert_eq!(booking.school_id, Some(school_id));
        assert_eq!(booking.student_message, "Please let me in");

        let detail = crate::db::get_school_detail(&db.pool, school_id)
            .await
            .expect("Failed to load school");
        assert_eq!(detail.pending_requests, vec![db.user_id(NEWCOMER)]);
    }

    #[tokio::test]
    async fn test_duplicate_join_request_conflicts() {
        let db = create_standard_test_db().await;
        let student = db.user(NEWCOMER);
        let request = SchoolJoinRequest {
            school_id: db.school_id(SCHOOL),
            message: String::new(),
        };

        request_school_join(&db.pool, &student, &request)
            .await
            .expect("First request should succeed");

        let second = request_school_join(&db.pool, &student, &request).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let bookings = list_bookings_for_user(&db.pool, &student)
            .await
            .expect("Failed to list bookings");
        assert_eq!(bookings.len(), 1);
    }

    #[tokio::test]
    async fn test_member_cannot_request_join_again() {
        let db = create_standard_test_db().await;

        let result = request_school_join(
            &db.pool,
            &db.user(MEMBER),
            &SchoolJoinRequest {
                school_id: db.school_id(SCHOOL),
                message: String::new(),
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_instructor_cannot_request_join() {
        let db = create_standard_test_db().await;

        let result = request_school_join(
            &db.pool,
            &db.user(INSTRUCTOR),
            &SchoolJoinRequest {
                school_id: db.school_id(SCHOOL),
                message: String::new(),
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_staff_instructor_approves_join() {
        let db = create_standard_test_db().await;
        let school_id = db.school_id(SCHOOL);
        let before = get_school(&db.pool, school_id).await.unwrap().total_students;

        let booking = request_school_join(
            &db.pool,
            &db.user(NEWCOMER),
            &SchoolJoinRequest {
                school_id,
                message: String::new(),
            },
        )
        .await
        .unwrap();

        let approved = approve_school_join(&db.pool, &db.user(INSTRUCTOR), booking.id)
            .await
            .expect("Staff instructor should approve");

        assert_eq!(approved.status, BookingStatus::Confirmed);
        assert_eq!(approved.school_response.as_deref(), Some("approved"));
        assert!(approved.school_response_at.is_some());

        let student = get_student(&db.pool, db.user_id(NEWCOMER)).await.unwrap();
        assert_eq!(student.school_id, Some(school_id));
        assert_eq!(student.school_status, Some(StudentSchoolStatus::Approved));

        let detail = crate::db::get_school_detail(&db.pool, school_id).await.unwrap();
        assert_eq!(detail.school.total_students, before + 1);
        assert!(detail.students.contains(&db.user_id(NEWCOMER)));
        assert!(detail.pending_requests.is_empty());
    }

    #[tokio::test]
    async fn test_reapproving_join_conflicts_without_counter_change() {
        let db = create_standard_test_db().await;
        let school_id = db.school_id(SCHOOL);

        let booking = request_school_join(
            &db.pool,
            &db.user(NEWCOMER),
            &SchoolJoinRequest {
                school_id,
                message: String::new(),
            },
        )
        .await
        .unwrap();
        approve_school_join(&db.pool, &db.user(INSTRUCTOR), booking.id)
            .await
            .unwrap();
        let after_first = get_school(&db.pool, school_id).await.unwrap().total_students;

        let again = approve_school_join(&db.pool, &db.user(INSTRUCTOR), booking.id).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let after_second = get_school(&db.pool, school_id).await.unwrap().total_students;
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_unattached_instructor_cannot_review_join() {
        let db = create_standard_test_db().await;

        let booking = request_school_join(
            &db.pool,
            &db.user(NEWCOMER),
            &SchoolJoinRequest {
                school_id: db.school_id(SCHOOL),
                message: String::new(),
            },
        )
        .await
        .unwrap();

        let result = approve_school_join(&db.pool, &db.user(OTHER_INSTRUCTOR), booking.id).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));

        let unchanged = get_booking(&db.pool, booking.id).await.unwrap();
        assert_eq!(unchanged.status, BookingStatus::Requested);
    }

    #[tokio::test]
    async fn test_reject_join_records_reason() {
        let db = create_standard_test_db().await;
        let school_id = db.school_id(SCHOOL);

        let booking = request_school_join(
            &db.pool,
            &db.user(NEWCOMER),
            &SchoolJoinRequest {
                school_id,
                message: String::new(),
            },
        )
        .await
        .unwrap();

        let rejected = reject_school_join(&db.pool, &db.user(INSTRUCTOR), booking.id, "Class full")
            .await
            .expect("Reject should succeed");

        assert_eq!(rejected.status, BookingStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Class full"));

        let student = get_student(&db.pool, db.user_id(NEWCOMER)).await.unwrap();
        assert_eq!(student.school_id, None);

        let detail = crate::db::get_school_detail(&db.pool, school_id).await.unwrap();
        assert!(detail.pending_requests.is_empty());

        // A rejected request no longer blocks a new one.
        request_school_join(
            &db.pool,
            &db.user(NEWCOMER),
            &SchoolJoinRequest {
                school_id,
                message: String::new(),
            },
        )
        .await
        .expect("New request after rejection should succeed");
    }

    #[tokio::test]
    async fn test_lesson_request_requires_membership() {
        let db = create_standard_test_db().await;

        let result = request_lesson(
            &db.pool,
            &db.user(NEWCOMER),
            &lesson_request(db.user_id(INSTRUCTOR), 2, 10),
        )
        .await;

        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_lesson_request_creates_pending_lesson_and_booking() {
        let db = create_standard_test_db().await;

        let booked = book_lesson(&db, 10).await;

        assert_eq!(booked.booking.booking_type, BookingType::Lesson);
        assert_eq!(booked.booking.status, BookingStatus::PendingInstructor);
        assert_eq!(booked.booking.lesson_id, Some(booked.lesson.id));
        assert_eq!(booked.lesson.status, LessonStatus::Pending);
        assert!(!booked.lesson.instructor_accepted);
        assert_eq!(booked.lesson.school_id, Some(db.school_id(SCHOOL)));

        let student = get_student(&db.pool, db.user_id(MEMBER)).await.unwrap();
        assert_eq!(student.total_lessons, 1);
    }

    #[tokio::test]
    async fn test_double_booking_same_slot_conflicts() {
        let db = create_standard_test_db().await;
        book_lesson(&db, 10).await;

        let second = request_lesson(
            &db.pool,
            &db.user(MEMBER),
            &lesson_request(db.user_id(INSTRUCTOR), 2, 10),
        )
        .await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_accept_lesson_confirms_both_records() {
        let db = create_standard_test_db().await;
        let booked = book_lesson(&db, 10).await;

        let booking = accept_lesson(&db.pool, &db.user(INSTRUCTOR), booked.booking.id)
            .await
            .expect("Instructor should accept");

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.instructor_response.as_deref(), Some("accepted"));
        assert!(booking.confirmed_at.is_some());

        let lesson = get_lesson(&db.pool, booked.lesson.id).await.unwrap();
        assert_eq!(lesson.status, LessonStatus::Confirmed);
        assert!(lesson.instructor_accepted);
    }

    #[tokio::test]
    async fn test_only_requested_instructor_answers() {
        let db = create_standard_test_db().await;
        let booked = book_lesson(&db, 10).await;

        let result = accept_lesson(&db.pool, &db.user(OTHER_INSTRUCTOR), booked.booking.id).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));

        let result = accept_lesson(&db.pool, &db.user(MEMBER), booked.booking.id).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_reject_lesson_cancels_lesson_with_notes() {
        let db = create_standard_test_db().await;
        let booked = book_lesson(&db, 11).await;

        let booking = reject_lesson(
            &db.pool,
            &db.user(INSTRUCTOR),
            booked.booking.id,
            "Car in service",
        )
        .await
        .expect("Instructor should reject");

        assert_eq!(booking.status, BookingStatus::Rejected);
        assert_eq!(booking.rejection_reason.as_deref(), Some("Car in service"));

        let lesson = get_lesson(&db.pool, booked.lesson.id).await.unwrap();
        assert_eq!(lesson.status, LessonStatus::Cancelled);
        assert_eq!(lesson.cancelled_by, Some(CancelledBy::Instructor));
        assert_eq!(lesson.notes.as_deref(), Some("Rejected: Car in service"));
        assert!(lesson.cancelled_at.is_some());

        // Answering twice is refused.
        let again = accept_lesson(&db.pool, &db.user(INSTRUCTOR), booked.booking.id).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_rejected_slot_can_be_booked_again() {
        let db = create_standard_test_db().await;
        let booked = book_lesson(&db, 12).await;

        reject_lesson(&db.pool, &db.user(INSTRUCTOR), booked.booking.id, "Busy")
            .await
            .unwrap();

        book_lesson(&db, 12).await;
    }

    #[tokio::test]
    async fn test_complete_requires_confirmed_lesson() {
        let db = create_standard_test_db().await;
        let booked = book_lesson(&db, 13).await;
        let instructor = db.user(INSTRUCTOR);

        let early = complete_lesson(&db.pool, &instructor, booked.lesson.id).await;
        assert!(matches!(early, Err(AppError::Conflict(_))));

        accept_lesson(&db.pool, &instructor, booked.booking.id)
            .await
            .unwrap();

        let lesson = complete_lesson(&db.pool, &instructor, booked.lesson.id)
            .await
            .expect("Confirmed lesson should complete");
        assert_eq!(lesson.status, LessonStatus::Completed);

        let booking = get_booking(&db.pool, booked.booking.id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);

        let student = get_student(&db.pool, db.user_id(MEMBER)).await.unwrap();
        assert_eq!(student.completed_lessons, 1);
    }

    #[tokio::test]
    async fn test_student_cancels_own_lesson() {
        let db = create_standard_test_db().await;
        let booked = book_lesson(&db, 14).await;

        let lesson = cancel_lesson(&db.pool, &db.user(MEMBER), booked.lesson.id, "Sick")
            .await
            .expect("Student should cancel");

        assert_eq!(lesson.status, LessonStatus::Cancelled);
        assert_eq!(lesson.cancelled_by, Some(CancelledBy::Student));
        assert_eq!(lesson.cancellation_reason.as_deref(), Some("Sick"));

        let booking = get_booking(&db.pool, booked.booking.id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);

        let again = cancel_lesson(&db.pool, &db.user(MEMBER), booked.lesson.id, "Sick").await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_other_student_cannot_cancel() {
        let db = create_standard_test_db().await;
        let booked = book_lesson(&db, 15).await;

        let result = cancel_lesson(&db.pool, &db.user(NEWCOMER), booked.lesson.id, "Nope").await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_joins_conflict() {
        const STUDENTS: usize = 12;
        let emails: Vec<String> = (0..STUDENTS)
            .map(|i| format!("learner{}@example.com", i))
            .collect();

        let mut builder = TestDbBuilder::new().on_disk().school(SCHOOL, SCHOOL_EMAIL);
        for email in &emails {
            builder = builder.student(email, "Lane", "Driver");
        }
        let db = builder.build().await.expect("Failed to build file database");
        let school_id = db.school_id(SCHOOL);

        let mut handles = Vec::new();
        for email in &emails {
            for _ in 0..2 {
                let pool = db.pool.clone();
                let student = db.user(email);
                handles.push(tokio::spawn(async move {
                    request_school_join(
                        &pool,
                        &student,
                        &SchoolJoinRequest {
                            school_id,
                            message: String::new(),
                        },
                    )
                    .await
                }));
            }
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.expect("Join task panicked") {
                Ok(_) => created += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("Unexpected join error: {}", other),
            }
        }

        assert_eq!(created, STUDENTS);
        assert_eq!(conflicts, STUDENTS);

        let detail = get_school_detail(&db.pool, school_id).await.unwrap();
        assert_eq!(detail.pending_requests.len(), STUDENTS);
        for email in &emails {
            let bookings = list_bookings_for_user(&db.pool, &db.user(email))
                .await
                .unwrap();
            assert_eq!(bookings.len(), 1, "{} should have one booking", email);
        }

        db.remove().await;
    }

    #[tokio::test]
    async fn test_admin_sees_no_participant_lessons() {
        let db = create_standard_test_db().await;
        let admin = db.user(ADMIN);
        assert_eq!(
            admin.id,
            db.user_id(MEMBER),
            "fixture ids overlap across identity tables"
        );

        book_lesson(&db, 10).await;

        let member_lessons = lessons_for_user(&db.pool, &db.user(MEMBER)).await.unwrap();
        assert_eq!(member_lessons.len(), 1);

        assert!(lessons_for_user(&db.pool, &admin).await.unwrap().is_empty());
        assert!(upcoming_lessons(&db.pool, &admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lesson_request_notifies_student_and_instructor() {
        let db = create_standard_test_db().await;
        let before = notification_total(&db).await;

        let booked = book_lesson(&db, 10).await;
        let lesson_id = booked.lesson.id;

        assert_eq!(notification_total(&db).await, before + 2);
        assert_eq!(
            lesson_notices(&db, MEMBER, lesson_id, NotificationKind::LessonBooked).await,
            1
        );
        assert_eq!(
            lesson_notices(&db, INSTRUCTOR, lesson_id, NotificationKind::LessonRequest).await,
            1
        );
        assert!(list_undelivered(&db.pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accept_lesson_sends_one_confirmation() {
        let db = create_standard_test_db().await;
        let booked = book_lesson(&db, 10).await;
        let lesson_id = booked.lesson.id;
        let before = notification_total(&db).await;

        accept_lesson(&db.pool, &db.user(INSTRUCTOR), booked.booking.id)
            .await
            .unwrap();

        assert_eq!(notification_total(&db).await, before + 1);
        assert_eq!(
            lesson_notices(&db, MEMBER, lesson_id, NotificationKind::LessonConfirmed).await,
            1
        );
        assert_eq!(
            lesson_notices(&db, INSTRUCTOR, lesson_id, NotificationKind::LessonConfirmed).await,
            0
        );
    }

    #[tokio::test]
    async fn test_reject_lesson_sends_one_cancellation() {
        let db = create_standard_test_db().await;
        let booked = book_lesson(&db, 10).await;
        let lesson_id = booked.lesson.id;
        let before = notification_total(&db).await;

        reject_lesson(&db.pool, &db.user(INSTRUCTOR), booked.booking.id, "Busy")
            .await
            .unwrap();

        assert_eq!(notification_total(&db).await, before + 1);
        assert_eq!(
            lesson_notices(&db, MEMBER, lesson_id, NotificationKind::LessonCancelled).await,
            1
        );
    }

    #[tokio::test]
    async fn test_reject_lesson_leaves_other_students_untouched() {
        const CLASSMATE: &str = "remy@example.com";
        let db = TestDbBuilder::new()
            .instructor(INSTRUCTOR, "Ian", "Walker")
            .student(MEMBER, "Sam", "Lee")
            .student(CLASSMATE, "Remy", "Cole")
            .school(SCHOOL, SCHOOL_EMAIL)
            .staff(SCHOOL, INSTRUCTOR)
            .member(SCHOOL, MEMBER)
            .member(SCHOOL, CLASSMATE)
            .build()
            .await
            .expect("Failed to build test database");
        let school_id = db.school_id(SCHOOL);

        let rejected = book_lesson(&db, 10).await;
        let kept = request_lesson(
            &db.pool,
            &db.user(CLASSMATE),
            &lesson_request(db.user_id(INSTRUCTOR), 2, 11),
        )
        .await
        .unwrap();
        let school_before = get_school_detail(&db.pool, school_id).await.unwrap();

        reject_lesson(&db.pool, &db.user(INSTRUCTOR), rejected.booking.id, "Busy")
            .await
            .unwrap();

        let booking = get_booking(&db.pool, kept.booking.id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::PendingInstructor);
        assert!(booking.rejection_reason.is_none());
        assert!(booking.instructor_response.is_none());

        let lesson = get_lesson(&db.pool, kept.lesson.id).await.unwrap();
        assert_eq!(lesson.status, LessonStatus::Pending);
        assert!(lesson.cancelled_at.is_none());
        assert!(lesson.notes.is_none());

        for email in [MEMBER, CLASSMATE] {
            let student = get_student(&db.pool, db.user_id(email)).await.unwrap();
            assert_eq!(student.school_id, Some(school_id));
            assert_eq!(student.school_status, Some(StudentSchoolStatus::Approved));
        }

        let school_after = get_school_detail(&db.pool, school_id).await.unwrap();
        assert_eq!(school_after.students, school_before.students);
        assert_eq!(
            school_after.school.total_students,
            school_before.school.total_students
        );
    }
}
