//! In-process store with the same constraints as the PostgreSQL schema:
//! foreign keys, unique `(venue_id, name)` and `(section_id, seat_number)`,
//! and all-or-nothing transactions. Transactions are serialized by a single
//! async mutex and work on a private copy of the tables until commit.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Seat, Section, SectionWithVenue, Venue, VenueFields, VenueRef};
use crate::store::{StoreTx, VenueStore};

#[derive(Debug, Default, Clone)]
struct Tables {
    venues: BTreeMap<i64, Venue>,
    sections: BTreeMap<i64, Section>,
    seats: BTreeMap<i64, Seat>,
    venue_seq: i64,
    section_seq: i64,
    seat_seq: i64,
}

impl Tables {
    fn sorted_seats(&self, section_id: i64) -> Vec<Seat> {
        let mut seats: Vec<Seat> = self
            .seats
            .values()
            .filter(|s| s.section_id == section_id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.seat_number);
        seats
    }

    fn sections_sorted(&self, venue_id: i64) -> Vec<Section> {
        let mut sections: Vec<Section> = self
            .sections
            .values()
            .filter(|s| s.venue_id == venue_id)
            .cloned()
            .collect();
        sections.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        sections
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_seat_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While enabled every seat insert or delete inside a transaction fails,
    /// as a lost database connection would.
    pub fn set_seat_write_failure(&self, fail: bool) {
        self.fail_seat_writes.store(fail, Ordering::SeqCst);
    }

    /// Total seat rows across all sections.
    pub async fn seat_count(&self) -> usize {
        self.tables.lock().await.seats.len()
    }

    pub async fn section_count(&self) -> usize {
        self.tables.lock().await.sections.len()
    }
}

#[async_trait]
impl VenueStore for MemoryStore {
    async fn begin(&self) -> CatalogResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            work,
            fail_seat_writes: self.fail_seat_writes.clone(),
        }))
    }

    async fn list_venues(&self, limit: i64, offset: i64) -> CatalogResult<Vec<Venue>> {
        let tables = self.tables.lock().await;
        let mut venues: Vec<Venue> = tables.venues.values().cloned().collect();
        venues.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(venues
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn count_venues(&self) -> CatalogResult<i64> {
        Ok(self.tables.lock().await.venues.len() as i64)
    }

    async fn sections_of_venues(&self, venue_ids: &[i64]) -> CatalogResult<Vec<Section>> {
        let tables = self.tables.lock().await;
        let mut sections: Vec<Section> = tables
            .sections
            .values()
            .filter(|s| venue_ids.contains(&s.venue_id))
            .cloned()
            .collect();
        sections.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(sections)
    }

    async fn find_venue(&self, venue_id: i64) -> CatalogResult<Option<Venue>> {
        Ok(self.tables.lock().await.venues.get(&venue_id).cloned())
    }

    async fn sections_with_venue(&self, venue_id: i64) -> CatalogResult<Vec<SectionWithVenue>> {
        let tables = self.tables.lock().await;
        let Some(venue) = tables.venues.get(&venue_id) else {
            return Ok(Vec::new());
        };
        Ok(tables
            .sections_sorted(venue_id)
            .into_iter()
            .map(|section| SectionWithVenue {
                section,
                venue: VenueRef {
                    id: venue.id,
                    name: venue.name.clone(),
                },
            })
            .collect())
    }

    async fn find_section(
        &self,
        venue_id: i64,
        section_id: i64,
    ) -> CatalogResult<Option<Section>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sections
            .get(&section_id)
            .filter(|s| s.venue_id == venue_id)
            .cloned())
    }

    async fn seat_preview(&self, venue_id: i64, per_section: i64) -> CatalogResult<Vec<Seat>> {
        let tables = self.tables.lock().await;
        let per_section = usize::try_from(per_section).unwrap_or(0);
        let mut section_ids: Vec<i64> = tables
            .sections
            .values()
            .filter(|s| s.venue_id == venue_id)
            .map(|s| s.id)
            .collect();
        section_ids.sort_unstable();
        Ok(section_ids
            .into_iter()
            .flat_map(|id| tables.sorted_seats(id).into_iter().take(per_section))
            .collect())
    }

    async fn list_seats(&self, section_id: i64) -> CatalogResult<Vec<Seat>> {
        Ok(self.tables.lock().await.sorted_seats(section_id))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
    fail_seat_writes: Arc<AtomicBool>,
}

impl MemoryTx {
    fn check_seat_write(&self) -> CatalogResult<()> {
        if self.fail_seat_writes.load(Ordering::SeqCst) {
            return Err(CatalogError::Infrastructure(
                "seat write failed: connection reset".to_string(),
            ));
        }
        Ok(())
    }

    fn name_taken(&self, venue_id: i64, name: &str, exclude: Option<i64>) -> bool {
        self.work
            .sections
            .values()
            .any(|s| s.venue_id == venue_id && s.name == name && Some(s.id) != exclude)
    }
}

fn duplicate_section_name() -> CatalogError {
    CatalogError::Conflict("A section with this name already exists in this venue".to_string())
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_venue(&mut self, venue_id: i64) -> CatalogResult<Option<Venue>> {
        Ok(self.work.venues.get(&venue_id).cloned())
    }

    async fn lock_section(
        &mut self,
        venue_id: i64,
        section_id: i64,
    ) -> CatalogResult<Option<Section>> {
        Ok(self
            .work
            .sections
            .get(&section_id)
            .filter(|s| s.venue_id == venue_id)
            .cloned())
    }

    async fn section_name_taken(
        &mut self,
        venue_id: i64,
        name: &str,
        exclude_section: Option<i64>,
    ) -> CatalogResult<bool> {
        Ok(self.name_taken(venue_id, name, exclude_section))
    }

    async fn insert_venue(&mut self, fields: &VenueFields) -> CatalogResult<Venue> {
        self.work.venue_seq += 1;
        let now = Utc::now();
        let venue = Venue {
            id: self.work.venue_seq,
            name: fields.name.clone(),
            address: fields.address.clone(),
            city: fields.city.clone(),
            country: fields.country.clone(),
            created_at: now,
            updated_at: now,
        };
        self.work.venues.insert(venue.id, venue.clone());
        Ok(venue)
    }

    async fn update_venue(&mut self, venue_id: i64, fields: &VenueFields) -> CatalogResult<Venue> {
        let venue = self
            .work
            .venues
            .get_mut(&venue_id)
            .ok_or(CatalogError::NotFound("Venue"))?;
        venue.name = fields.name.clone();
        venue.address = fields.address.clone();
        venue.city = fields.city.clone();
        venue.country = fields.country.clone();
        venue.updated_at = Utc::now();
        Ok(venue.clone())
    }

    async fn delete_venue(&mut self, venue_id: i64) -> CatalogResult<u64> {
        if self.work.sections.values().any(|s| s.venue_id == venue_id) {
            return Err(CatalogError::Infrastructure(format!(
                "venue {venue_id} still referenced by sections"
            )));
        }
        Ok(u64::from(self.work.venues.remove(&venue_id).is_some()))
    }

    async fn insert_section(
        &mut self,
        venue_id: i64,
        name: &str,
        capacity: i32,
    ) -> CatalogResult<Section> {
        if !self.work.venues.contains_key(&venue_id) {
            return Err(CatalogError::Infrastructure(format!(
                "section references missing venue {venue_id}"
            )));
        }
        if self.name_taken(venue_id, name, None) {
            return Err(duplicate_section_name());
        }
        self.work.section_seq += 1;
        let now = Utc::now();
        let section = Section {
            id: self.work.section_seq,
            venue_id,
            name: name.to_string(),
            capacity,
            created_at: now,
            updated_at: now,
        };
        self.work.sections.insert(section.id, section.clone());
        Ok(section)
    }

    async fn update_section(
        &mut self,
        section_id: i64,
        name: &str,
        capacity: i32,
    ) -> CatalogResult<Section> {
        let venue_id = self
            .work
            .sections
            .get(&section_id)
            .map(|s| s.venue_id)
            .ok_or(CatalogError::NotFound("Section"))?;
        if self.name_taken(venue_id, name, Some(section_id)) {
            return Err(duplicate_section_name());
        }
        let section = self
            .work
            .sections
            .get_mut(&section_id)
            .ok_or(CatalogError::NotFound("Section"))?;
        section.name = name.to_string();
        section.capacity = capacity;
        section.updated_at = Utc::now();
        Ok(section.clone())
    }

    async fn delete_section(&mut self, section_id: i64) -> CatalogResult<u64> {
        if self.work.seats.values().any(|s| s.section_id == section_id) {
            return Err(CatalogError::Infrastructure(format!(
                "section {section_id} still referenced by seats"
            )));
        }
        Ok(u64::from(self.work.sections.remove(&section_id).is_some()))
    }

    async fn delete_sections_of_venue(&mut self, venue_id: i64) -> CatalogResult<u64> {
        let ids: Vec<i64> = self
            .work
            .sections
            .values()
            .filter(|s| s.venue_id == venue_id)
            .map(|s| s.id)
            .collect();
        let mut removed = 0;
        for id in ids {
            removed += self.delete_section(id).await?;
        }
        Ok(removed)
    }

    async fn insert_seat_range(
        &mut self,
        section_id: i64,
        first: i32,
        last: i32,
    ) -> CatalogResult<u64> {
        self.check_seat_write()?;
        if !self.work.sections.contains_key(&section_id) {
            return Err(CatalogError::Infrastructure(format!(
                "seat references missing section {section_id}"
            )));
        }
        let range = first..=last;
        // Overlap check in a single scan
        if let Some(taken) = self
            .work
            .seats
            .values()
            .find(|s| s.section_id == section_id && range.contains(&s.seat_number))
        {
            return Err(CatalogError::Infrastructure(format!(
                "duplicate seat {} in section {section_id}",
                taken.seat_number
            )));
        }
        let mut inserted = 0;
        for seat_number in range {
            self.work.seat_seq += 1;
            let seat = Seat {
                id: self.work.seat_seq,
                section_id,
                seat_number,
            };
            self.work.seats.insert(seat.id, seat);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn delete_seats_above(&mut self, section_id: i64, keep: i32) -> CatalogResult<u64> {
        self.check_seat_write()?;
        let before = self.work.seats.len();
        self.work
            .seats
            .retain(|_, s| !(s.section_id == section_id && s.seat_number > keep));
        Ok((before - self.work.seats.len()) as u64)
    }

    async fn delete_seats_of_section(&mut self, section_id: i64) -> CatalogResult<u64> {
        self.check_seat_write()?;
        let before = self.work.seats.len();
        self.work.seats.retain(|_, s| s.section_id != section_id);
        Ok((before - self.work.seats.len()) as u64)
    }

    async fn delete_seats_of_venue(&mut self, venue_id: i64) -> CatalogResult<u64> {
        self.check_seat_write()?;
        let before = self.work.seats.len();
        let sections = &self.work.sections;
        self.work.seats.retain(|_, s| {
            sections
                .get(&s.section_id)
                .map_or(true, |section| section.venue_id != venue_id)
        });
        Ok((before - self.work.seats.len()) as u64)
    }

    async fn list_seats(&mut self, section_id: i64) -> CatalogResult<Vec<Seat>> {
        Ok(self.work.sorted_seats(section_id))
    }

    async fn commit(self: Box<Self>) -> CatalogResult<()> {
        let MemoryTx {
            mut guard, work, ..
        } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CatalogResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str) -> VenueFields {
        VenueFields {
            name: name.to_string(),
            address: None,
            city: None,
            country: None,
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_venue(&fields("Hall")).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(store.count_venues().await.unwrap(), 0);

        let mut tx = store.begin().await.unwrap();
        tx.insert_venue(&fields("Hall")).await.unwrap();
        drop(tx);
        assert_eq!(store.count_venues().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        assert!(tx.insert_section(42, "A", 3).await.is_err());

        let venue = tx.insert_venue(&fields("Hall")).await.unwrap();
        let section = tx.insert_section(venue.id, "A", 3).await.unwrap();
        tx.insert_seat_range(section.id, 1, 3).await.unwrap();
        assert!(tx.delete_section(section.id).await.is_err());
        assert!(tx.delete_venue(venue.id).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_seat_numbers_are_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let venue = tx.insert_venue(&fields("Hall")).await.unwrap();
        let section = tx.insert_section(venue.id, "A", 3).await.unwrap();

        tx.insert_seat_range(section.id, 1, 3).await.unwrap();
        assert!(tx.insert_seat_range(section.id, 3, 4).await.is_err());
        assert!(tx.insert_seat_range(section.id, 0, 1).await.is_err());
        assert_eq!(tx.insert_seat_range(section.id, 4, 6).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn large_seat_ranges_insert_quickly() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let venue = tx.insert_venue(&fields("Stadium")).await.unwrap();
        let section = tx.insert_section(venue.id, "Bowl", 20_000).await.unwrap();

        let started = std::time::Instant::now();
        let inserted = tx.insert_seat_range(section.id, 1, 20_000).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(inserted, 20_000);
        assert_eq!(store.seat_count().await, 20_000);
        assert!(
            started.elapsed() < std::time::Duration::from_secs(2),
            "took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn section_names_are_unique_per_venue() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_venue(&fields("One")).await.unwrap();
        let second = tx.insert_venue(&fields("Two")).await.unwrap();

        tx.insert_section(first.id, "A", 1).await.unwrap();
        assert!(matches!(
            tx.insert_section(first.id, "A", 1).await,
            Err(CatalogError::Conflict(_))
        ));
        assert!(tx.insert_section(first.id, "a", 1).await.is_ok());
        assert!(tx.insert_section(second.id, "A", 1).await.is_ok());
    }
}
