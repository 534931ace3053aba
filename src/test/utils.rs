#[cfg(test)]
pub mod test_db {
    use crate::auth::{Role, User};
    use crate::db::{
        NewInstructor, NewStudent, assign_instructor_to_school, create_admin, create_instructor,
        create_school, create_student, normalize_email,
    };
    use crate::error::AppError;
    use crate::models::NewSchool;
    use crate::workflow::{SchoolJoinRequest, approve_school_join, request_school_join};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Once;
    use tracing::log::LevelFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        schools: Vec<TestSchool>,
        staff: Vec<(String, String)>,
        members: Vec<(String, String)>,
        file: Option<PathBuf>,
    }

    pub struct TestUser {
        pub email: String,
        pub first_name: String,
        pub last_name: String,
        pub role: Role,
    }

    pub struct TestSchool {
        pub name: String,
        pub email: String,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn user(mut self, email: &str, first_name: &str, last_name: &str, role: Role) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role,
            });
            self
        }

        pub fn student(self, email: &str, first_name: &str, last_name: &str) -> Self {
            self.user(email, first_name, last_name, Role::Student)
        }

        pub fn instructor(self, email: &str, first_name: &str, last_name: &str) -> Self {
            self.user(email, first_name, last_name, Role::Instructor)
        }

        pub fn admin(self, email: &str) -> Self {
            self.user(email, "Site", "Admin", Role::Admin)
        }

        pub fn school(mut self, name: &str, email: &str) -> Self {
            self.schools.push(TestSchool {
                name: name.to_string(),
                email: email.to_string(),
            });
            self
        }

        /// Puts the instructor on the school's staff.
        pub fn staff(mut self, school_name: &str, instructor_email: &str) -> Self {
            self.staff
                .push((school_name.to_string(), instructor_email.to_string()));
            self
        }

        /// Makes the student an approved member by running the join workflow.
        pub fn member(mut self, school_name: &str, student_email: &str) -> Self {
            self.members
                .push((school_name.to_string(), student_email.to_string()));
            self
        }

        /// Backs the database with a WAL file in the temp dir and a multi-connection pool.
        pub fn on_disk(mut self) -> Self {
            let name = format!("driving-school-test-{}.db", uuid::Uuid::new_v4().simple());
            self.file = Some(std::env::temp_dir().join(name));
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            let pool = match &self.file {
                Some(path) => crate::db::connect(&format!("sqlite://{}", path.display()), 8).await?,
                // One connection keeps the whole in-memory database alive for the test.
                None => {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                        .connect("sqlite::memory:")
                        .await?
                }
            };

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut users: HashMap<String, User> = HashMap::new();
            let mut school_ids: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let id = match user.role {
                    Role::Student => {
                        create_student(
                            &pool,
                            &NewStudent {
                                email: user.email.clone(),
                                password: STANDARD_PASSWORD.to_string(),
                                first_name: user.first_name.clone(),
                                last_name: user.last_name.clone(),
                                phone: "0400000000".to_string(),
                                emergency_contact: "0400000001".to_string(),
                            },
                        )
                        .await?
                    }
                    Role::Instructor => {
                        create_instructor(
                            &pool,
                            &NewInstructor {
                                email: user.email.clone(),
                                password: STANDARD_PASSWORD.to_string(),
                                first_name: user.first_name.clone(),
                                last_name: user.last_name.clone(),
                                phone: "0400000002".to_string(),
                                license_number: "INS-001".to_string(),
                                hourly_rate: 50.0,
                            },
                        )
                        .await?
                    }
                    Role::Admin => {
                        create_admin(&pool, &user.email, STANDARD_PASSWORD, "Site Admin").await?
                    }
                };

                let email = normalize_email(&user.email);
                users.insert(
                    email.clone(),
                    User {
                        id,
                        email,
                        role: user.role,
                        display_name: format!("{} {}", user.first_name, user.last_name),
                    },
                );
            }

            for school in &self.schools {
                let created = create_school(
                    &pool,
                    &NewSchool {
                        name: school.name.clone(),
                        email: school.email.clone(),
                        address: "1 Test Street".to_string(),
                        ..NewSchool::default()
                    },
                )
                .await?;
                school_ids.insert(school.name.clone(), created.id);
            }

            for (school_name, instructor_email) in &self.staff {
                let school_id = lookup(&school_ids, school_name)?;
                let instructor = lookup(&users, instructor_email)?;
                assign_instructor_to_school(&pool, school_id, instructor.id).await?;
            }

            let reviewer = User {
                id: 0,
                email: "fixtures@example.com".to_string(),
                role: Role::Admin,
                display_name: "Fixtures".to_string(),
            };
            for (school_name, student_email) in &self.members {
                let school_id = lookup(&school_ids, school_name)?;
                let student = lookup(&users, student_email)?;
                let booking = request_school_join(
                    &pool,
                    &student,
                    &SchoolJoinRequest {
                        school_id,
                        message: String::new(),
                    },
                )
                .await?;
                approve_school_join(&pool, &reviewer, booking.id).await?;
            }

            Ok(TestDb {
                pool,
                users,
                school_ids,
                file: self.file,
            })
        }
    }

    fn lookup<V: Clone>(map: &HashMap<String, V>, key: &str) -> Result<V, AppError> {
        map.get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Fixture '{}' not declared", key)))
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub users: HashMap<String, User>,
        pub school_ids: HashMap<String, i64>,
        pub file: Option<PathBuf>,
    }

    impl TestDb {
        /// Closes the pool and deletes the on-disk database, if any.
        pub async fn remove(self) {
            self.pool.close().await;
            if let Some(path) = self.file {
                for suffix in ["", "-wal", "-shm"] {
                    let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
                }
            }
        }

        pub fn user(&self, email: &str) -> User {
            self.users
                .get(email)
                .cloned()
                .unwrap_or_else(|| panic!("User {} not in fixture", email))
        }

        pub fn user_id(&self, email: &str) -> i64 {
            self.user(email).id
        }

        pub fn school_id(&self, name: &str) -> i64 {
            *self
                .school_ids
                .get(name)
                .unwrap_or_else(|| panic!("School {} not in fixture", name))
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDateTime, NaiveTime, Utc};
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    pub use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder};
    use crate::env::AppConfig;
    use crate::mailer::{LogMailer, SharedMailer};

    pub const SCHOOL: &str = "DriveRight Academy";
    pub const SCHOOL_EMAIL: &str = "info@driveright.com";
    pub const INSTRUCTOR: &str = "ian@example.com";
    pub const OTHER_INSTRUCTOR: &str = "olive@example.com";
    pub const MEMBER: &str = "sam@example.com";
    pub const NEWCOMER: &str = "nina@example.com";
    pub const ADMIN: &str = "admin@example.com";

    /// A school with one staff instructor, one approved student, one student
    /// without a school, an unattached instructor, and an admin.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin(ADMIN)
            .instructor(INSTRUCTOR, "Ian", "Walker")
            .instructor(OTHER_INSTRUCTOR, "Olive", "Hart")
            .student(MEMBER, "Sam", "Lee")
            .student(NEWCOMER, "Nina", "Park")
            .school(SCHOOL, SCHOOL_EMAIL)
            .staff(SCHOOL, INSTRUCTOR)
            .member(SCHOOL, MEMBER)
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    /// `hour` o'clock, `days` days from today.
    pub fn future_slot(days: i64, hour: u32) -> NaiveDateTime {
        let date = (Utc::now() + Duration::days(days)).date_naive();
        date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).expect("valid hour"))
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let mailer: SharedMailer = Arc::new(LogMailer::new("test@drivingschool.com"));
        let rocket = crate::init_rocket(test_db.pool.clone(), AppConfig::default(), mailer).await;

        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        (client, test_db)
    }

    pub async fn login_test_user(client: &Client, email: &str) {
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": email,
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "login failed for {}", email);
    }
}
