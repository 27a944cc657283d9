use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::{CatalogError, CatalogResult};
use crate::models::section::{SectionPreview, SectionSummary};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Venue {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values of a venue row after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueFields {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

// POST /venue/admin/venue
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewVenue {
    #[validate(length(min = 1, max = 150, message = "must be 1-150 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 250, message = "must be at most 250 characters"))]
    pub address: Option<String>,
    #[validate(length(max = 120, message = "must be at most 120 characters"))]
    pub city: Option<String>,
    #[validate(length(max = 120, message = "must be at most 120 characters"))]
    pub country: Option<String>,
}

impl NewVenue {
    pub fn into_fields(self) -> CatalogResult<VenueFields> {
        self.validate()?;
        let name = required_name(self.name)?;
        Ok(VenueFields {
            name,
            address: self.address,
            city: self.city,
            country: self.country,
        })
    }
}

// PUT /venue/admin/venue/{id}
// Absent field: unchanged. Explicit null: cleared (optional fields only).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct VenuePatch {
    #[validate(length(min = 1, max = 150, message = "must be 1-150 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 250, message = "must be at most 250 characters"))]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 120, message = "must be at most 120 characters"))]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 120, message = "must be at most 120 characters"))]
    pub country: Option<Option<String>>,
}

impl VenuePatch {
    /// Merges the patch over the current row.
    pub fn apply(self, current: &Venue) -> CatalogResult<VenueFields> {
        self.validate()?;
        let name = match self.name {
            Some(name) => required_name(Some(name))?,
            None => current.name.clone(),
        };
        Ok(VenueFields {
            name,
            address: self.address.unwrap_or_else(|| current.address.clone()),
            city: self.city.unwrap_or_else(|| current.city.clone()),
            country: self.country.unwrap_or_else(|| current.country.clone()),
        })
    }
}

fn required_name(name: Option<String>) -> CatalogResult<String> {
    match name {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => Err(CatalogError::Validation("name is required".to_string())),
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/* ---------- read models ---------- */

/// Normalized parameters of the venue listing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListingQuery {
    pub page: u32,
    pub limit: u32,
    pub include_sections: bool,
}

impl ListingQuery {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueEntry {
    #[serde(flatten)]
    pub venue: Venue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionSummary>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: u32, limit: u32) -> Self {
        let limit_i = i64::from(limit.max(1));
        Self {
            total,
            page,
            limit,
            total_pages: (total + limit_i - 1) / limit_i,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueListing {
    pub venues: Vec<VenueEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueDetails {
    #[serde(flatten)]
    pub venue: Venue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionPreview>>,
}
