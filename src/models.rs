use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BookingType {
    Lesson,
    SchoolJoin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    PendingInstructor,
    Confirmed,
    Rejected,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LessonStatus {
    Pending,
    Confirmed,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LessonType {
    #[default]
    Driving,
    Theory,
    MockTest,
    Simulator,
    Highway,
    Parking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum VehicleType {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SchoolStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StudentSchoolStatus {
    Pending,
    Approved,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InstructorStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CancelledBy {
    Student,
    Instructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationKind {
    SchoolJoinRequest,
    SchoolApproval,
    SchoolRejection,
    LessonBooked,
    LessonRequest,
    LessonConfirmed,
    LessonCancelled,
    LessonCompleted,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub emergency_contact: String,
    pub license_number: Option<String>,
    pub school_id: Option<i64>,
    pub school_status: Option<StudentSchoolStatus>,
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_approved_member(&self) -> bool {
        self.school_id.is_some() && self.school_status == Some(StudentSchoolStatus::Approved)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Instructor {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub license_number: String,
    pub hourly_rate: f64,
    pub specializations: Vec<String>,
    pub bio: Option<String>,
    pub school_id: Option<i64>,
    pub status: InstructorStatus,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Instructor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbInstructor {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub license_number: String,
    pub hourly_rate: f64,
    pub specializations: Json<Vec<String>>,
    pub bio: Option<String>,
    pub school_id: Option<i64>,
    pub status: InstructorStatus,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<DbInstructor> for Instructor {
    fn from(db: DbInstructor) -> Self {
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            phone: db.phone,
            license_number: db.license_number,
            hourly_rate: db.hourly_rate,
            specializations: db.specializations.0,
            bio: db.bio,
            school_id: db.school_id,
            status: db.status,
            average_rating: db.average_rating,
            total_ratings: db.total_ratings,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPricing {
    pub lesson_type: String,
    pub price: f64,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub monday: Option<String>,
    pub tuesday: Option<String>,
    pub wednesday: Option<String>,
    pub thursday: Option<String>,
    pub friday: Option<String>,
    pub saturday: Option<String>,
    pub sunday: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct School {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub description: String,
    pub license_number: String,
    pub services: Vec<String>,
    pub lesson_types: Vec<String>,
    pub pricing: Vec<LessonPricing>,
    pub operating_hours: OperatingHours,
    pub status: SchoolStatus,
    pub total_students: i64,
    pub total_instructors: i64,
    pub average_rating: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSchool {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub description: String,
    pub license_number: String,
    pub services: Json<Vec<String>>,
    pub lesson_types: Json<Vec<String>>,
    pub pricing: Json<Vec<LessonPricing>>,
    pub operating_hours: Json<OperatingHours>,
    pub status: SchoolStatus,
    pub total_students: i64,
    pub total_instructors: i64,
    pub average_rating: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<DbSchool> for School {
    fn from(db: DbSchool) -> Self {
        Self {
            id: db.id,
            name: db.name,
            address: db.address,
            phone: db.phone,
            email: db.email,
            description: db.description,
            license_number: db.license_number,
            services: db.services.0,
            lesson_types: db.lesson_types.0,
            pricing: db.pricing.0,
            operating_hours: db.operating_hours.0,
            status: db.status,
            total_students: db.total_students,
            total_instructors: db.total_instructors,
            average_rating: db.average_rating,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Everything needed to register a school; counters and timestamps are set on insert.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewSchool {
    #[validate(length(min = 1, max = 200, message = "School name is required"))]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[validate(email(message = "Invalid school email"))]
    pub email: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub license_number: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub lesson_types: Vec<String>,
    #[serde(default)]
    pub pricing: Vec<LessonPricing>,
    #[serde(default)]
    pub operating_hours: OperatingHours,
    #[validate(range(min = 0.0, max = 5.0))]
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub booking_type: BookingType,
    pub student_id: i64,
    pub instructor_id: Option<i64>,
    pub school_id: Option<i64>,
    pub lesson_id: Option<i64>,
    pub preferred_date: Option<NaiveDateTime>,
    pub status: BookingStatus,
    pub student_message: String,
    pub instructor_response: Option<String>,
    pub school_response: Option<String>,
    pub rejection_reason: Option<String>,
    pub requested_at: NaiveDateTime,
    pub instructor_response_at: Option<NaiveDateTime>,
    pub school_response_at: Option<NaiveDateTime>,
    pub confirmed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lesson {
    pub id: i64,
    pub student_id: i64,
    pub instructor_id: i64,
    pub school_id: Option<i64>,
    pub lesson_type: LessonType,
    pub vehicle_type: Option<VehicleType>,
    pub scheduled_date: NaiveDateTime,
    pub duration_minutes: i64,
    pub status: LessonStatus,
    pub instructor_accepted: bool,
    pub price: Option<f64>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub outbox_id: Option<i64>,
    pub user_email: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub booking_id: Option<i64>,
    pub lesson_id: Option<i64>,
    pub read: bool,
    pub created_at: NaiveDateTime,
}

/// A notification waiting in the outbox to be delivered to its recipient.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: i64,
    pub recipient_email: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub booking_id: Option<i64>,
    pub lesson_id: Option<i64>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub delivered_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub recipient_email: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub booking_id: Option<i64>,
    pub lesson_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_email: String,
    pub receiver_email: String,
    pub message: String,
    pub message_type: String,
    pub read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub partner_email: String,
    pub last_message: String,
    pub last_message_time: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    pub student_id: i64,
    pub instructor_id: i64,
    pub lesson_id: Option<i64>,
    pub rating: i64,
    pub comment: String,
    pub student_name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_ratings: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: i64,
    pub lesson_id: i64,
    pub instructor_email: String,
    pub notes: String,
    pub performance_rating: i64,
    pub skills_practiced: Vec<String>,
    pub areas_to_improve: Vec<String>,
    pub created_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProgressEntry {
    pub id: i64,
    pub lesson_id: i64,
    pub instructor_email: String,
    pub notes: String,
    pub performance_rating: i64,
    pub skills_practiced: Json<Vec<String>>,
    pub areas_to_improve: Json<Vec<String>>,
    pub created_at: NaiveDateTime,
}

impl From<DbProgressEntry> for ProgressEntry {
    fn from(db: DbProgressEntry) -> Self {
        Self {
            id: db.id,
            lesson_id: db.lesson_id,
            instructor_email: db.instructor_email,
            notes: db.notes,
            performance_rating: db.performance_rating,
            skills_practiced: db.skills_practiced.0,
            areas_to_improve: db.areas_to_improve.0,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub average_rating: f64,
    pub progress_entries: Vec<ProgressEntry>,
}
