use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db::{create_school, school_count};
use crate::error::AppError;
use crate::models::{LessonPricing, NewSchool, OperatingHours};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SeedOutcome {
    pub created: usize,
    pub existing: i64,
}

fn weekday_hours(weekdays: &str, saturday: &str) -> OperatingHours {
    OperatingHours {
        monday: Some(weekdays.to_string()),
        tuesday: Some(weekdays.to_string()),
        wednesday: Some(weekdays.to_string()),
        thursday: Some(weekdays.to_string()),
        friday: Some(weekdays.to_string()),
        saturday: Some(saturday.to_string()),
        sunday: Some("closed".to_string()),
    }
}

fn price(lesson_type: &str, price: f64, duration_minutes: i64) -> LessonPricing {
    LessonPricing {
        lesson_type: lesson_type.to_string(),
        price,
        duration_minutes,
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn sample_schools() -> Vec<NewSchool> {
    vec![
        NewSchool {
            name: "DriveRight Academy".to_string(),
            address: "123 Main Street, New York, NY 10001".to_string(),
            phone: "+1-555-0101".to_string(),
            email: "info@driveright.com".to_string(),
            description: "Premier driving school with experienced instructors".to_string(),
            license_number: "SCH001".to_string(),
            services: to_strings(&[
                "Manual Transmission",
                "Automatic Transmission",
                "Defensive Driving",
            ]),
            lesson_types: to_strings(&["driving", "theory", "mock_test", "simulator"]),
            pricing: vec![
                price("driving", 45.0, 60),
                price("highway", 55.0, 60),
                price("theory", 30.0, 45),
                price("mock_test", 60.0, 90),
            ],
            operating_hours: weekday_hours("08:00-18:00", "09:00-16:00"),
            average_rating: Some(4.8),
        },
        NewSchool {
            name: "SafeDrive Institute".to_string(),
            address: "456 Oak Avenue, Los Angeles, CA 90210".to_string(),
            phone: "+1-555-0202".to_string(),
            email: "contact@safedrive.com".to_string(),
            description: "Safety-focused driving education since 2010".to_string(),
            license_number: "SCH002".to_string(),
            services: to_strings(&["Beginner Lessons", "Advanced Driving", "Highway Training"]),
            lesson_types: to_strings(&["driving", "highway", "theory"]),
            pricing: vec![price("driving", 50.0, 60), price("highway", 60.0, 60)],
            operating_hours: weekday_hours("09:00-17:00", "10:00-14:00"),
            average_rating: Some(4.6),
        },
        NewSchool {
            name: "City Driving School".to_string(),
            address: "789 Pine Road, Chicago, IL 60601".to_string(),
            phone: "+1-555-0303".to_string(),
            email: "admin@citydriving.com".to_string(),
            description: "Urban driving specialists".to_string(),
            license_number: "SCH003".to_string(),
            services: to_strings(&["City Driving", "Parallel Parking", "Night Driving"]),
            lesson_types: to_strings(&["driving", "parking"]),
            pricing: vec![price("driving", 40.0, 60), price("parking", 35.0, 45)],
            operating_hours: weekday_hours("08:00-20:00", "closed"),
            average_rating: Some(4.4),
        },
    ]
}

/// Inserts the sample schools unless any school already exists.
#[instrument(skip(pool))]
pub async fn seed_schools(pool: &Pool<Sqlite>) -> Result<SeedOutcome, AppError> {
    let existing = school_count(pool).await?;
    if existing > 0 {
        info!(existing, "Schools already present, skipping seed");
        return Ok(SeedOutcome {
            created: 0,
            existing,
        });
    }

    let schools = sample_schools();
    for school in &schools {
        create_school(pool, school).await?;
    }

    info!(created = schools.len(), "Seeded sample schools");
    Ok(SeedOutcome {
        created: schools.len(),
        existing,
    })
}
