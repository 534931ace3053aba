use anyhow::Error;
use once_cell::sync::Lazy;
use rocket::serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,
    SendMessages,
    ViewOwnProgress,

    RequestSchoolJoin,
    BookLessons,
    RateInstructors,

    ViewAllStudents,
    RespondToLessons,
    AddLessonNotes,
    ViewStudentProgress,
    ReviewSchoolRequests,

    ManageSchools,
    ViewNotificationOutbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

static COMMON_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);
    permissions.insert(Permission::SendMessages);

    permissions
});

static STUDENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COMMON_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewOwnProgress);
    permissions.insert(Permission::RequestSchoolJoin);
    permissions.insert(Permission::BookLessons);
    permissions.insert(Permission::RateInstructors);

    permissions
});

static INSTRUCTOR_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COMMON_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewAllStudents);
    permissions.insert(Permission::RespondToLessons);
    permissions.insert(Permission::AddLessonNotes);
    permissions.insert(Permission::ViewStudentProgress);
    permissions.insert(Permission::ReviewSchoolRequests);

    permissions
});

// Admins oversee schools but never act as the instructor on a lesson.
static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COMMON_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewAllStudents);
    permissions.insert(Permission::ViewStudentProgress);
    permissions.insert(Permission::ReviewSchoolRequests);
    permissions.insert(Permission::ManageSchools);
    permissions.insert(Permission::ViewNotificationOutbox);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Student => &STUDENT_PERMISSIONS,
            Role::Instructor => &INSTRUCTOR_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
