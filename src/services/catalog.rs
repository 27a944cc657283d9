//! Venue catalog: venue CRUD, section delegation and the cached venue listing.
//!
//! Every successful mutation invalidates the listing cache after its
//! transaction has committed. Failed mutations leave the cache alone.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheLookup, ListingCache};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    ListingQuery, NewSection, NewVenue, Pagination, SectionPatch, SectionPreview,
    SectionSummary, SectionWithSeats, SectionWithVenue, Venue, VenueDetails, VenueEntry,
    VenueListing, VenuePatch,
};
use crate::services::capacity::{CapacityManager, SectionDeletion};
use crate::store::{settle, StoreTx, VenueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// Serialized venue listing and where it came from.
#[derive(Debug, Clone)]
pub struct Listing {
    pub body: String,
    pub cache: CacheStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueDeletion {
    pub venue_id: i64,
    pub sections_removed: u64,
    pub seats_removed: u64,
}

#[derive(Clone)]
pub struct VenueCatalog {
    store: Arc<dyn VenueStore>,
    capacity: CapacityManager,
    cache: ListingCache,
    settings: CatalogConfig,
}

impl VenueCatalog {
    pub fn new(store: Arc<dyn VenueStore>, cache: ListingCache, settings: CatalogConfig) -> Self {
        let capacity = CapacityManager::new(store.clone(), settings.max_section_capacity);
        Self {
            store,
            capacity,
            cache,
            settings,
        }
    }

    pub fn capacity(&self) -> &CapacityManager {
        &self.capacity
    }

    /// Applies defaults and bounds to raw listing parameters.
    pub fn listing_query(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
        include_sections: bool,
    ) -> ListingQuery {
        ListingQuery {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(self.settings.default_page_size)
                .clamp(1, self.settings.max_page_size),
            include_sections,
        }
    }

    /* ---------- reads ---------- */

    pub async fn list_venues(&self, query: ListingQuery) -> CatalogResult<Listing> {
        // 1. Cache first
        let key = match self.cache.lookup(&query).await {
            CacheLookup::Hit(body) => {
                return Ok(Listing {
                    body,
                    cache: CacheStatus::Hit,
                })
            }
            CacheLookup::Miss(key) => Some(key),
            CacheLookup::Unavailable => None,
        };

        // 2. Store on miss or when the cache is out
        let listing = self.load_listing(&query).await?;
        let body = serde_json::to_string(&listing)
            .map_err(|e| CatalogError::Infrastructure(format!("listing serialization: {e}")))?;

        // 3. Populate for the next reader
        match key {
            Some(key) => {
                self.cache.store(&key, &body).await;
                Ok(Listing {
                    body,
                    cache: CacheStatus::Miss,
                })
            }
            None => Ok(Listing {
                body,
                cache: CacheStatus::Bypass,
            }),
        }
    }

    async fn load_listing(&self, query: &ListingQuery) -> CatalogResult<VenueListing> {
        let total = self.store.count_venues().await?;
        let venues = self
            .store
            .list_venues(i64::from(query.limit), query.offset())
            .await?;

        let mut sections_by_venue: Option<HashMap<i64, Vec<SectionSummary>>> = None;
        if query.include_sections {
            let ids: Vec<i64> = venues.iter().map(|v| v.id).collect();
            let mut grouped: HashMap<i64, Vec<SectionSummary>> = HashMap::new();
            for section in self.store.sections_of_venues(&ids).await? {
                grouped
                    .entry(section.venue_id)
                    .or_default()
                    .push(SectionSummary::from(&section));
            }
            sections_by_venue = Some(grouped);
        }

        let venues = venues
            .into_iter()
            .map(|venue| {
                let sections = sections_by_venue
                    .as_mut()
                    .map(|grouped| grouped.remove(&venue.id).unwrap_or_default());
                VenueEntry { venue, sections }
            })
            .collect();

        Ok(VenueListing {
            venues,
            pagination: Pagination::new(total, query.page, query.limit),
        })
    }

    /// Direct store read, never cached.
    pub async fn get_venue(&self, venue_id: i64, include_details: bool) -> CatalogResult<VenueDetails> {
        let venue = self
            .store
            .find_venue(venue_id)
            .await?
            .ok_or(CatalogError::NotFound("Venue"))?;

        if !include_details {
            return Ok(VenueDetails {
                venue,
                sections: None,
            });
        }

        let sections = self.store.sections_of_venues(&[venue_id]).await?;
        let mut seats_by_section: HashMap<i64, Vec<_>> = HashMap::new();
        let preview = self
            .store
            .seat_preview(venue_id, i64::from(self.settings.seat_preview_limit))
            .await?;
        for seat in preview {
            seats_by_section.entry(seat.section_id).or_default().push(seat);
        }

        let sections = sections
            .iter()
            .map(|section| SectionPreview {
                section: SectionSummary::from(section),
                seats: seats_by_section.remove(&section.id).unwrap_or_default(),
            })
            .collect();

        Ok(VenueDetails {
            venue,
            sections: Some(sections),
        })
    }

    pub async fn list_sections(&self, venue_id: i64) -> CatalogResult<Vec<SectionWithVenue>> {
        self.store.sections_with_venue(venue_id).await
    }

    pub async fn list_seats(&self, venue_id: i64, section_id: i64) -> CatalogResult<SectionWithSeats> {
        let section = self
            .store
            .find_section(venue_id, section_id)
            .await?
            .ok_or(CatalogError::NotFound("Section"))?;
        let seats = self.store.list_seats(section.id).await?;
        Ok(SectionWithSeats { section, seats })
    }

    /* ---------- venue mutations ---------- */

    pub async fn create_venue(&self, draft: NewVenue) -> CatalogResult<Venue> {
        let fields = draft.into_fields()?;

        let mut tx = self.store.begin().await?;
        let result = tx.insert_venue(&fields).await;
        let venue = settle(tx, result).await?;

        info!("Venue {} '{}' created", venue.id, venue.name);
        self.invalidate_listings().await;
        Ok(venue)
    }

    pub async fn update_venue(&self, venue_id: i64, patch: VenuePatch) -> CatalogResult<Venue> {
        let mut tx = self.store.begin().await?;
        let result = apply_venue_patch(tx.as_mut(), venue_id, patch).await;
        let venue = settle(tx, result).await?;

        info!("Venue {} updated", venue.id);
        self.invalidate_listings().await;
        Ok(venue)
    }

    pub async fn delete_venue(&self, venue_id: i64) -> CatalogResult<VenueDeletion> {
        let mut tx = self.store.begin().await?;
        let result = remove_venue(tx.as_mut(), venue_id).await;
        let deletion = settle(tx, result).await?;

        info!(
            "Venue {} deleted with {} sections and {} seats",
            venue_id, deletion.sections_removed, deletion.seats_removed
        );
        self.invalidate_listings().await;
        Ok(deletion)
    }

    /* ---------- section mutations ---------- */

    pub async fn create_section(
        &self,
        venue_id: i64,
        draft: NewSection,
    ) -> CatalogResult<SectionWithSeats> {
        let created = self.capacity.create_section(venue_id, draft).await?;
        self.invalidate_listings().await;
        Ok(created)
    }

    pub async fn update_section(
        &self,
        venue_id: i64,
        section_id: i64,
        patch: SectionPatch,
    ) -> CatalogResult<SectionWithSeats> {
        let updated = self
            .capacity
            .resize_section(venue_id, section_id, patch)
            .await?;
        self.invalidate_listings().await;
        Ok(updated)
    }

    pub async fn delete_section(
        &self,
        venue_id: i64,
        section_id: i64,
    ) -> CatalogResult<SectionDeletion> {
        let deletion = self.capacity.delete_section(venue_id, section_id).await?;
        self.invalidate_listings().await;
        Ok(deletion)
    }

    // Runs after commit only; a failure here is logged by the cache layer
    async fn invalidate_listings(&self) {
        self.cache.invalidate().await;
    }
}

/* ---------- transaction bodies ---------- */

async fn apply_venue_patch(
    tx: &mut dyn StoreTx,
    venue_id: i64,
    patch: VenuePatch,
) -> CatalogResult<Venue> {
    let current = tx
        .lock_venue(venue_id)
        .await?
        .ok_or(CatalogError::NotFound("Venue"))?;
    let fields = patch.apply(&current)?;
    tx.update_venue(venue_id, &fields).await
}

// Seats, then sections, then the venue itself
async fn remove_venue(tx: &mut dyn StoreTx, venue_id: i64) -> CatalogResult<VenueDeletion> {
    tx.lock_venue(venue_id)
        .await?
        .ok_or(CatalogError::NotFound("Venue"))?;

    let seats_removed = tx.delete_seats_of_venue(venue_id).await?;
    let sections_removed = tx.delete_sections_of_venue(venue_id).await?;
    tx.delete_venue(venue_id).await?;

    Ok(VenueDeletion {
        venue_id,
        sections_removed,
        seats_removed,
    })
}
