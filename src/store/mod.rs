//! Persistence seam for venues, sections and seats.
//!
//! Reads go straight through [`VenueStore`]. Every mutation runs inside a
//! [`StoreTx`] obtained from [`VenueStore::begin`] and must end with an explicit
//! `commit` or `rollback`. Dropping a transaction without committing discards
//! its writes.

use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::models::{Seat, Section, SectionWithVenue, Venue, VenueFields};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait VenueStore: Send + Sync {
    async fn begin(&self) -> CatalogResult<Box<dyn StoreTx>>;

    /// Page of venues, newest first.
    async fn list_venues(&self, limit: i64, offset: i64) -> CatalogResult<Vec<Venue>>;

    async fn count_venues(&self) -> CatalogResult<i64>;

    /// Sections of the given venues, ordered by name.
    async fn sections_of_venues(&self, venue_ids: &[i64]) -> CatalogResult<Vec<Section>>;

    async fn find_venue(&self, venue_id: i64) -> CatalogResult<Option<Venue>>;

    async fn sections_with_venue(&self, venue_id: i64) -> CatalogResult<Vec<SectionWithVenue>>;

    async fn find_section(&self, venue_id: i64, section_id: i64)
        -> CatalogResult<Option<Section>>;

    /// At most `per_section` lowest-numbered seats of every section of a venue.
    async fn seat_preview(&self, venue_id: i64, per_section: i64) -> CatalogResult<Vec<Seat>>;

    async fn list_seats(&self, section_id: i64) -> CatalogResult<Vec<Seat>>;
}

/// Unit of work over the store. Lock methods take row locks that are held
/// until the transaction ends.
#[async_trait]
pub trait StoreTx: Send {
    async fn lock_venue(&mut self, venue_id: i64) -> CatalogResult<Option<Venue>>;

    /// Section scoped to its venue; `None` when it belongs to another venue.
    async fn lock_section(&mut self, venue_id: i64, section_id: i64)
        -> CatalogResult<Option<Section>>;

    /// Exact, case-sensitive name match within the venue.
    async fn section_name_taken(
        &mut self,
        venue_id: i64,
        name: &str,
        exclude_section: Option<i64>,
    ) -> CatalogResult<bool>;

    async fn insert_venue(&mut self, fields: &VenueFields) -> CatalogResult<Venue>;

    async fn update_venue(&mut self, venue_id: i64, fields: &VenueFields) -> CatalogResult<Venue>;

    async fn delete_venue(&mut self, venue_id: i64) -> CatalogResult<u64>;

    async fn insert_section(&mut self, venue_id: i64, name: &str, capacity: i32)
        -> CatalogResult<Section>;

    async fn update_section(&mut self, section_id: i64, name: &str, capacity: i32)
        -> CatalogResult<Section>;

    async fn delete_section(&mut self, section_id: i64) -> CatalogResult<u64>;

    async fn delete_sections_of_venue(&mut self, venue_id: i64) -> CatalogResult<u64>;

    /// Provisions seats `first..=last`.
    async fn insert_seat_range(&mut self, section_id: i64, first: i32, last: i32)
        -> CatalogResult<u64>;

    /// Removes every seat numbered above `keep`.
    async fn delete_seats_above(&mut self, section_id: i64, keep: i32) -> CatalogResult<u64>;

    async fn delete_seats_of_section(&mut self, section_id: i64) -> CatalogResult<u64>;

    async fn delete_seats_of_venue(&mut self, venue_id: i64) -> CatalogResult<u64>;

    async fn list_seats(&mut self, section_id: i64) -> CatalogResult<Vec<Seat>>;

    async fn commit(self: Box<Self>) -> CatalogResult<()>;

    async fn rollback(self: Box<Self>) -> CatalogResult<()>;
}

/// Commits on success, rolls back on failure and hands the original result back.
pub async fn settle<T>(tx: Box<dyn StoreTx>, result: CatalogResult<T>) -> CatalogResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Rollback failed after {:?}: {:?}", err, rollback_err);
            }
            Err(err)
        }
    }
}
