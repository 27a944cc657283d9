use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::seat::Seat;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub venue_id: i64,
    pub name: String,
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Embedded into venue listings
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SectionSummary {
    pub id: i64,
    pub name: String,
    pub capacity: i32,
}

impl From<&Section> for SectionSummary {
    fn from(section: &Section) -> Self {
        Self {
            id: section.id,
            name: section.name.clone(),
            capacity: section.capacity,
        }
    }
}

/// Section with a bounded number of its lowest-numbered seats.
#[derive(Debug, Clone, Serialize)]
pub struct SectionPreview {
    #[serde(flatten)]
    pub section: SectionSummary,
    pub seats: Vec<Seat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionWithSeats {
    #[serde(flatten)]
    pub section: Section,
    pub seats: Vec<Seat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionWithVenue {
    #[serde(flatten)]
    pub section: Section,
    pub venue: VenueRef,
}

// POST /venue/admin/venue/{id}/section
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewSection {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: Option<String>,
    pub capacity: Option<i64>,
}

// PUT /venue/admin/venue/{id}/section/{sectionId}
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SectionPatch {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: Option<String>,
    pub capacity: Option<i64>,
}
