use rocket::Route;
use serde::Serialize;

pub mod auth;
pub mod booking;
pub mod chat;
pub mod health;
pub mod instructor;
pub mod instructors;
pub mod lessons;
pub mod notifications;
pub mod progress;
pub mod ratings;
pub mod scheduling;
pub mod schools;
pub mod students;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn routes() -> Vec<Route> {
    routes![
        health::health,
        auth::api_register,
        auth::api_login,
        auth::api_logout,
        auth::api_me,
        students::api_get_my_profile,
        students::api_update_my_profile,
        students::api_list_students,
        instructors::api_list_instructors,
        instructors::api_get_my_profile,
        instructors::api_update_my_profile,
        schools::api_list_schools,
        schools::api_create_school,
        schools::api_seed_schools,
        schools::api_my_school,
        schools::api_get_school,
        schools::api_school_requests,
        schools::api_assign_instructor,
        booking::api_request_school_join,
        booking::api_approve_school_join,
        booking::api_reject_school_join,
        booking::api_request_lesson,
        booking::api_accept_lesson,
        booking::api_reject_lesson,
        booking::api_my_requests,
        lessons::api_upcoming_lessons,
        lessons::api_my_lessons,
        lessons::api_complete_lesson,
        lessons::api_cancel_lesson,
        instructor::api_pending_lessons,
        instructor::api_accept_lesson,
        instructor::api_reject_lesson,
        scheduling::api_available_slots,
        notifications::api_list_notifications,
        notifications::api_unread_count,
        notifications::api_mark_read,
        notifications::api_send_lesson_notification,
        notifications::api_outbox,
        chat::api_send_message,
        chat::api_conversations,
        chat::api_messages,
        ratings::api_rate_instructor,
        ratings::api_list_ratings,
        progress::api_add_lesson_notes,
        progress::api_my_progress,
        progress::api_student_progress,
    ]
}
