//! Booking state machine.
//!
//! Every transition runs in one transaction: state changes, counters, membership
//! sets and outbox rows commit together or not at all. The outbox is flushed right
//! after commit; the background dispatcher picks up anything that fails here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::{Role, User};
use crate::db::{
    NewBooking, NewLesson, add_member, add_pending_request, approve_student_membership,
    begin_write, cancel_lesson_row, complete_lesson_row, confirm_lesson, dispatch_pending,
    enqueue_notification, find_booking_for_lesson, get_booking, get_instructor, get_lesson,
    get_school, get_student, has_pending_join_request, increment_completed_lessons,
    increment_student_lessons, insert_booking, insert_lesson, instructor_belongs_to_school,
    instructor_has_lesson_at, is_member, record_instructor_response, record_school_response,
    remove_pending_request, set_booking_status,
};
use crate::error::AppError;
use crate::models::{
    Booking, BookingStatus, BookingType, CancelledBy, Lesson, LessonStatus, LessonType,
    NewNotification, NotificationKind, SchoolStatus, VehicleType,
};

pub const DEFAULT_REJECTION_REASON: &str = "No reason provided";

const FLUSH_BATCH: i64 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchoolJoinRequest {
    pub school_id: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LessonRequest {
    pub instructor_id: i64,
    pub scheduled_date: NaiveDateTime,
    #[serde(default)]
    pub lesson_type: LessonType,
    pub vehicle_type: Option<VehicleType>,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    pub price: Option<f64>,
    #[serde(default)]
    pub message: String,
}

fn default_duration() -> i64 {
    60
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonBooking {
    pub booking: Booking,
    pub lesson: Lesson,
}

fn require_role(user: &User, role: Role, action: &str) -> Result<(), AppError> {
    if user.role == role {
        Ok(())
    } else {
        Err(AppError::Authorization(format!(
            "Only {}s can {}",
            role.as_str(),
            action
        )))
    }
}

/// Best-effort delivery of whatever the last transaction queued.
pub async fn flush_outbox(pool: &Pool<Sqlite>) {
    if let Err(err) = dispatch_pending(pool, FLUSH_BATCH).await {
        warn!(error = %err, "Post-commit outbox flush failed; the dispatcher will retry");
    }
}

#[instrument(skip(pool, user, request), fields(email = %user.email, school_id = request.school_id))]
pub async fn request_school_join(
    pool: &Pool<Sqlite>,
    user: &User,
    request: &SchoolJoinRequest,
) -> Result<Booking, AppError> {
    require_role(user, Role::Student, "request to join a school")?;

    let mut tx = begin_write(pool).await?;

    let student = get_student(&mut *tx, user.id).await?;
    let school = get_school(&mut *tx, request.school_id).await?;

    if school.status != SchoolStatus::Active {
        return Err(AppError::Validation(format!(
            "School {} is not accepting students",
            school.id
        )));
    }

    if is_member(&mut *tx, school.id, student.id).await? {
        return Err(AppError::Conflict(
            "Student is already a member of this school".to_string(),
        ));
    }

    if has_pending_join_request(&mut *tx, student.id, school.id).await? {
        return Err(AppError::Conflict(
            "A join request for this school is already pending".to_string(),
        ));
    }

    let booking_id = insert_booking(
        &mut tx,
        &NewBooking {
            booking_type: BookingType::SchoolJoin,
            student_id: student.id,
            instructor_id: None,
            school_id: Some(school.id),
            lesson_id: None,
            preferred_date: None,
            status: BookingStatus::Requested,
            student_message: request.message.clone(),
        },
    )
    .await?;

    add_pending_request(&mut tx, school.id, student.id).await?;

    enqueue_notification(
        &mut tx,
        &NewNotification {
            recipient_email: school.email.clone(),
            title: "New Student Request".to_string(),
            message: format!("{} wants to join your school", student.full_name()),
            kind: NotificationKind::SchoolJoinRequest,
            booking_id: Some(booking_id),
            lesson_id: None,
        },
    )
    .await?;

    let booking = get_booking(&mut *tx, booking_id).await?;
    tx.commit().await?;
    info!(booking_id, "School join requested");

    flush_outbox(pool).await;
    Ok(booking)
}

#[instrument(skip(pool, user, request), fields(email = %user.email, instructor_id = request.instructor_id))]
pub async fn request_lesson(
    pool: &Pool<Sqlite>,
    user: &User,
    request: &LessonRequest,
) -> Result<LessonBooking, AppError> {
    require_role(user, Role::Student, "book lessons")?;

    if request.duration_minutes <= 0 {
        return Err(AppError::Validation(
            "Lesson duration must be positive".to_string(),
        ));
    }

    let mut tx = begin_write(pool).await?;

    let student = get_student(&mut *tx, user.id).await?;
    if !student.is_approved_member() {
        return Err(AppError::Authorization(
            "You must be approved by a school first".to_string(),
        ));
    }

    let instructor = get_instructor(&mut *tx, request.instructor_id).await?;

    if instructor_has_lesson_at(&mut *tx, instructor.id, request.scheduled_date).await? {
        return Err(AppError::Conflict(format!(
            "Instructor already has a lesson at {}",
            request.scheduled_date
        )));
    }

    let lesson_id = insert_lesson(
        &mut tx,
        &NewLesson {
            student_id: student.id,
            instructor_id: instructor.id,
            school_id: student.school_id,
            lesson_type: request.lesson_type,
            vehicle_type: request.vehicle_type,
            scheduled_date: request.scheduled_date,
            duration_minutes: request.duration_minutes,
            price: request.price,
        },
    )
    .await?;

    let booking_id = insert_booking(
        &mut tx,
        &NewBooking {
            booking_type: BookingType::Lesson,
            student_id: student.id,
            instructor_id: Some(instructor.id),
            school_id: student.school_id,
            lesson_id: Some(lesson_id),
            preferred_date: Some(request.scheduled_date),
            status: BookingStatus::PendingInstructor,
            student_message: request.message.clone(),
        },
    )
    .await?;

    increment_student_lessons(&mut tx, student.id).await?;

    enqueue_notification(
        &mut tx,
        &lesson_booked_notice(
            &student.email,
            &instructor.full_name(),
            request.scheduled_date,
            booking_id,
            lesson_id,
        ),
    )
    .await?;
    enqueue_notification(
        &mut tx,
        &lesson_request_notice(
            &instructor.email,
            &student.full_name(),
            request.scheduled_date,
            booking_id,
            lesson_id,
        ),
    )
    .await?;

    let booking = get_booking(&mut *tx, booking_id).await?;
    let lesson = get_lesson(&mut *tx, lesson_id).await?;
    tx.commit().await?;
    info!(booking_id, lesson_id, "Lesson requested");

    flush_outbox(pool).await;
    Ok(LessonBooking { booking, lesson })
}

pub(crate) fn lesson_booked_notice(
    student_email: &str,
    instructor_name: &str,
    scheduled_date: NaiveDateTime,
    booking_id: i64,
    lesson_id: i64,
) -> NewNotification {
    NewNotification {
        recipient_email: student_email.to_string(),
        title: "Lesson Booked".to_string(),
        message: format!(
            "Your lesson with {} is scheduled for {}",
            instructor_name, scheduled_date
        ),
        kind: NotificationKind::LessonBooked,
        booking_id: Some(booking_id),
        lesson_id: Some(lesson_id),
    }
}

pub(crate) fn lesson_request_notice(
    instructor_email: &str,
    student_name: &str,
    scheduled_date: NaiveDateTime,
    booking_id: i64,
    lesson_id: i64,
) -> NewNotification {
    NewNotification {
        recipient_email: instructor_email.to_string(),
        title: "New Lesson Request".to_string(),
        message: format!(
            "New lesson request from {} for {}",
            student_name, scheduled_date
        ),
        kind: NotificationKind::LessonRequest,
        booking_id: Some(booking_id),
        lesson_id: Some(lesson_id),
    }
}

/// Loads a school join booking and checks the actor may review it.
async fn reviewable_join_booking(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    user: &User,
    booking_id: i64,
) -> Result<(Booking, i64), AppError> {
    let booking = get_booking(&mut **tx, booking_id).await?;

    if booking.booking_type != BookingType::SchoolJoin {
        return Err(AppError::Validation(format!(
            "Booking {} is not a school join request",
            booking_id
        )));
    }

    let school_id = booking.school_id.ok_or_else(|| {
        AppError::Internal(format!("Join booking {} has no school", booking_id))
    })?;

    let allowed = match user.role {
        Role::Admin => true,
        Role::Instructor => instructor_belongs_to_school(&mut **tx, school_id, user.id).await?,
        Role::Student => false,
    };
    if !allowed {
        return Err(AppError::Authorization(
            "Only school staff can review join requests".to_string(),
        ));
    }

    if booking.status != BookingStatus::Requested {
        return Err(AppError::Conflict(format!(
            "Booking {} has already been processed",
            booking_id
        )));
    }

    Ok((booking, school_id))
}

#[instrument(skip(pool, user), fields(email = %user.email))]
pub async fn approve_school_join(
    pool: &Pool<Sqlite>,
    user: &User,
    booking_id: i64,
) -> Result<Booking, AppError> {
    let mut tx = begin_write(pool).await?;

    let (booking, school_id) = reviewable_join_booking(&mut tx, user, booking_id).await?;

    record_school_response(&mut tx, booking_id, BookingStatus::Confirmed, "approved", None).await?;
    approve_student_membership(&mut tx, booking.student_id, school_id).await?;
    let newly_added = add_member(&mut tx, school_id, booking.student_id).await?;
    remove_pending_request(&mut tx, school_id, booking.student_id).await?;

    let student = get_student(&mut *tx, booking.student_id).await?;
    enqueue_notification(
        &mut tx,
        &NewNotification {
            recipient_email: student.email,
            title: "School Application Approved".to_string(),
            message: "Your application to join the school has been approved!".to_string(),
            kind: NotificationKind::SchoolApproval,
            booking_id: Some(booking_id),
            lesson_id: None,
        },
    )
    .await?;

    let booking = get_booking(&mut *tx, booking_id).await?;
    tx.commit().await?;
    info!(booking_id, school_id, newly_added, "School join approved");

    flush_outbox(pool).await;
    Ok(booking)
}

#[instrument(skip(pool, user), fields(email = %user.email))]
pub async fn reject_school_join(
    pool: &Pool<Sqlite>,
    user: &User,
    booking_id: i64,
    reason: &str,
) -> Result<Booking, AppError> {
    let mut tx = begin_write(pool).await?;

    let (booking, school_id) = reviewable_join_booking(&mut tx, user, booking_id).await?;

    record_school_response(&mut tx, booking_id, BookingStatus::Rejected, "rejected", Some(reason))
        .await?;
    remove_pending_request(&mut tx, school_id, booking.student_id).await?;

    let student = get_student(&mut *tx, booking.student_id).await?;
    enqueue_notification(
        &mut tx,
        &NewNotification {
            recipient_email: student.email,
            title: "School Application Rejected".to_string(),
            message: format!(
                "Your application to join the school was rejected. Reason: {}",
                reason
            ),
            kind: NotificationKind::SchoolRejection,
            booking_id: Some(booking_id),
            lesson_id: None,
        },
    )
    .await?;

    let booking = get_booking(&mut *tx, booking_id).await?;
    tx.commit().await?;
    info!(booking_id, school_id, "School join rejected");

    flush_outbox(pool).await;
    Ok(booking)
}

/// Loads a lesson booking awaiting the acting instructor's answer.
async fn answerable_lesson_booking(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    user: &User,
    booking_id: i64,
) -> Result<(Booking, i64), AppError> {
    let booking = get_booking(&mut **tx, booking_id).await?;

    if user.role != Role::Instructor || booking.instructor_id != Some(user.id) {
        return Err(AppError::Authorization(
            "Only the requested instructor can answer this booking".to_string(),
        ));
    }

    if booking.booking_type != BookingType::Lesson
        || booking.status != BookingStatus::PendingInstructor
    {
        return Err(AppError::Conflict(format!(
            "Booking {} is not awaiting an instructor response",
            booking_id
        )));
    }

    let lesson_id = booking.lesson_id.ok_or_else(|| {
        AppError::Internal(format!("Lesson booking {} has no lesson", booking_id))
    })?;

    Ok((booking, lesson_id))
}

#[instrument(skip(pool, user), fields(email = %user.email))]
pub async fn accept_lesson(
    pool: &Pool<Sqlite>,
    user: &User,
    booking_id: i64,
) -> Result<Booking, AppError> {
    let mut tx = begin_write(pool).await?;

    let (booking, lesson_id) = answerable_lesson_booking(&mut tx, user, booking_id).await?;

    record_instructor_response(&mut tx, booking_id, BookingStatus::Confirmed, "accepted", None)
        .await?;
    confirm_lesson(&mut tx, lesson_id).await?;

    let student = get_student(&mut *tx, booking.student_id).await?;
    let lesson = get_lesson(&mut *tx, lesson_id).await?;
    enqueue_notification(
        &mut tx,
        &NewNotification {
            recipient_email: student.email,
            title: "Lesson Confirmed".to_string(),
            message: format!(
                "Your lesson for {} has been confirmed by your instructor",
                lesson.scheduled_date
            ),
            kind: NotificationKind::LessonConfirmed,
            booking_id: Some(booking_id),
            lesson_id: Some(lesson_id),
        },
    )
    .await?;

    let booking = get_booking(&mut *tx, booking_id).await?;
    tx.commit().await?;
    info!(booking_id, lesson_id, "Lesson accepted");

    flush_outbox(pool).await;
    Ok(booking)
}

#[instrument(skip(pool, user), fields(email = %user.email))]
pub async fn reject_lesson(
    pool: &Pool<Sqlite>,
    user: &User,
    booking_id: i64,
    reason: &str,
) -> Result<Booking, AppError> {
    let mut tx = begin_write(pool).await?;

    let (booking, lesson_id) = answerable_lesson_booking(&mut tx, user, booking_id).await?;

    let notes = format!("Rejected: {}", reason);
    cancel_lesson_row(&mut tx, lesson_id, CancelledBy::Instructor, reason, Some(&notes)).await?;
    record_instructor_response(
        &mut tx,
        booking_id,
        BookingStatus::Rejected,
        "rejected",
        Some(reason),
    )
    .await?;

    let student = get_student(&mut *tx, booking.student_id).await?;
    let lesson = get_lesson(&mut *tx, lesson_id).await?;
    enqueue_notification(
        &mut tx,
        &NewNotification {
            recipient_email: student.email,
            title: "Lesson Cancelled".to_string(),
            message: format!(
                "Your lesson for {} has been cancelled. Reason: {}",
                lesson.scheduled_date, reason
            ),
            kind: NotificationKind::LessonCancelled,
            booking_id: Some(booking_id),
            lesson_id: Some(lesson_id),
        },
    )
    .await?;

    let booking = get_booking(&mut *tx, booking_id).await?;
    tx.commit().await?;
    info!(booking_id, lesson_id, "Lesson rejected");

    flush_outbox(pool).await;
    Ok(booking)
}

/// Resolves the booking behind a lesson, for routes addressed by lesson id.
pub async fn booking_id_for_lesson(pool: &Pool<Sqlite>, lesson_id: i64) -> Result<i64, AppError> {
    Ok(find_booking_for_lesson(pool, lesson_id).await?.id)
}

#[instrument(skip(pool, user), fields(email = %user.email))]
pub async fn complete_lesson(
    pool: &Pool<Sqlite>,
    user: &User,
    lesson_id: i64,
) -> Result<Lesson, AppError> {
    let mut tx = begin_write(pool).await?;

    let lesson = get_lesson(&mut *tx, lesson_id).await?;
    if user.role != Role::Instructor || lesson.instructor_id != user.id {
        return Err(AppError::Authorization(
            "Only the lesson's instructor can complete it".to_string(),
        ));
    }
    if lesson.status != LessonStatus::Confirmed {
        return Err(AppError::Conflict(format!(
            "Lesson {} is not confirmed",
            lesson_id
        )));
    }

    complete_lesson_row(&mut tx, lesson_id).await?;
    let booking = find_booking_for_lesson(&mut *tx, lesson_id).await?;
    set_booking_status(&mut tx, booking.id, BookingStatus::Completed).await?;
    increment_completed_lessons(&mut tx, lesson.student_id).await?;

    let student = get_student(&mut *tx, lesson.student_id).await?;
    enqueue_notification(
        &mut tx,
        &NewNotification {
            recipient_email: student.email,
            title: "Lesson Completed".to_string(),
            message: format!("Your lesson on {} has been completed", lesson.scheduled_date),
            kind: NotificationKind::LessonCompleted,
            booking_id: Some(booking.id),
            lesson_id: Some(lesson_id),
        },
    )
    .await?;

    let lesson = get_lesson(&mut *tx, lesson_id).await?;
    tx.commit().await?;
    info!(lesson_id, "Lesson completed");

    flush_outbox(pool).await;
    Ok(lesson)
}

#[instrument(skip(pool, user), fields(email = %user.email))]
pub async fn cancel_lesson(
    pool: &Pool<Sqlite>,
    user: &User,
    lesson_id: i64,
    reason: &str,
) -> Result<Lesson, AppError> {
    let mut tx = begin_write(pool).await?;

    let lesson = get_lesson(&mut *tx, lesson_id).await?;
    if user.role != Role::Student || lesson.student_id != user.id {
        return Err(AppError::Authorization(
            "Only the student who booked the lesson can cancel it".to_string(),
        ));
    }
    if !matches!(lesson.status, LessonStatus::Pending | LessonStatus::Confirmed) {
        return Err(AppError::Conflict(format!(
            "Lesson {} can no longer be cancelled",
            lesson_id
        )));
    }

    cancel_lesson_row(&mut tx, lesson_id, CancelledBy::Student, reason, None).await?;
    let booking = find_booking_for_lesson(&mut *tx, lesson_id).await?;
    set_booking_status(&mut tx, booking.id, BookingStatus::Cancelled).await?;

    let student = get_student(&mut *tx, lesson.student_id).await?;
    let instructor = get_instructor(&mut *tx, lesson.instructor_id).await?;
    enqueue_notification(
        &mut tx,
        &NewNotification {
            recipient_email: instructor.email,
            title: "Lesson Cancelled".to_string(),
            message: format!(
                "{} cancelled the lesson for {}. Reason: {}",
                student.full_name(),
                lesson.scheduled_date,
                reason
            ),
            kind: NotificationKind::LessonCancelled,
            booking_id: Some(booking.id),
            lesson_id: Some(lesson_id),
        },
    )
    .await?;

    let lesson = get_lesson(&mut *tx, lesson_id).await?;
    tx.commit().await?;
    info!(lesson_id, "Lesson cancelled by student");

    flush_outbox(pool).await;
    Ok(lesson)
}

/// Re-sends the booking notices for an existing lesson and mails both parties.
#[instrument(skip(pool, mailer))]
pub async fn send_lesson_notification(
    pool: &Pool<Sqlite>,
    mailer: &dyn crate::mailer::Mailer,
    lesson_id: i64,
) -> Result<(), AppError> {
    let mut tx = begin_write(pool).await?;

    let lesson = get_lesson(&mut *tx, lesson_id).await?;
    let student = get_student(&mut *tx, lesson.student_id).await?;
    let instructor = get_instructor(&mut *tx, lesson.instructor_id).await?;
    let booking_id = find_booking_for_lesson(&mut *tx, lesson_id).await?.id;

    let to_student = lesson_booked_notice(
        &student.email,
        &instructor.full_name(),
        lesson.scheduled_date,
        booking_id,
        lesson_id,
    );
    let to_instructor = lesson_request_notice(
        &instructor.email,
        &student.full_name(),
        lesson.scheduled_date,
        booking_id,
        lesson_id,
    );

    enqueue_notification(&mut tx, &to_student).await?;
    enqueue_notification(&mut tx, &to_instructor).await?;
    tx.commit().await?;

    for notice in [&to_student, &to_instructor] {
        if let Err(err) = mailer.send(&notice.recipient_email, &notice.title, &notice.message) {
            warn!(to = %notice.recipient_email, error = %err, "Mock email failed");
        }
    }

    flush_outbox(pool).await;
    Ok(())
}
