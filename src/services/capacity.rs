//! Section capacity management.
//!
//! A section with capacity N owns exactly the seats numbered `1..=N`. Every
//! operation here changes the section row and its seats inside one store
//! transaction, so a failure at any step leaves the previous state intact.
//!
//! Lock order is venue before section, matching venue deletion, so that
//! concurrent writers queue instead of deadlocking.

use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{NewSection, SectionPatch, SectionWithSeats};
use crate::store::{settle, StoreTx, VenueStore};

/// Seat rows to add or remove to move a section between two capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatDelta {
    Unchanged,
    /// Provision seats `first..=last`.
    Grow { first: i32, last: i32 },
    /// Drop every seat numbered above `keep`.
    Shrink { keep: i32 },
}

impl SeatDelta {
    pub fn between(current: i32, target: i32) -> Self {
        match target.cmp(&current) {
            Ordering::Greater => SeatDelta::Grow {
                first: current + 1,
                last: target,
            },
            Ordering::Less => SeatDelta::Shrink { keep: target },
            Ordering::Equal => SeatDelta::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionDeletion {
    pub section_id: i64,
    pub seats_removed: u64,
}

#[derive(Clone)]
pub struct CapacityManager {
    store: Arc<dyn VenueStore>,
    max_capacity: i32,
}

impl CapacityManager {
    pub fn new(store: Arc<dyn VenueStore>, max_capacity: i32) -> Self {
        Self {
            store,
            max_capacity,
        }
    }

    pub async fn create_section(
        &self,
        venue_id: i64,
        draft: NewSection,
    ) -> CatalogResult<SectionWithSeats> {
        draft.validate()?;
        let name = match draft.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(CatalogError::Validation("name is required".to_string())),
        };
        let capacity = match draft.capacity {
            Some(raw) => self.checked_capacity(raw)?,
            None => return Err(CatalogError::Validation("capacity is required".to_string())),
        };

        let mut tx = self.store.begin().await?;
        let result = provision(tx.as_mut(), venue_id, &name, capacity).await;
        let created = settle(tx, result).await?;

        info!(
            "Section {} '{}' created in venue {} with {} seats",
            created.section.id, created.section.name, venue_id, created.seats.len()
        );
        Ok(created)
    }

    pub async fn resize_section(
        &self,
        venue_id: i64,
        section_id: i64,
        patch: SectionPatch,
    ) -> CatalogResult<SectionWithSeats> {
        patch.validate()?;
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CatalogError::Validation("name must not be blank".to_string()));
        }
        let capacity = patch
            .capacity
            .map(|raw| self.checked_capacity(raw))
            .transpose()?;

        let mut tx = self.store.begin().await?;
        let result = resize(tx.as_mut(), venue_id, section_id, patch.name, capacity).await;
        let (resized, delta) = settle(tx, result).await?;

        match delta {
            SeatDelta::Grow { first, last } => info!(
                "Section {} grew to {} seats (added {}..={})",
                section_id, resized.section.capacity, first, last
            ),
            SeatDelta::Shrink { keep } => info!(
                "Section {} shrank to {} seats",
                section_id, keep
            ),
            SeatDelta::Unchanged => info!("Section {} updated, capacity unchanged", section_id),
        }
        Ok(resized)
    }

    pub async fn delete_section(
        &self,
        venue_id: i64,
        section_id: i64,
    ) -> CatalogResult<SectionDeletion> {
        let mut tx = self.store.begin().await?;
        let result = remove(tx.as_mut(), venue_id, section_id).await;
        let deletion = settle(tx, result).await?;

        info!(
            "Section {} deleted from venue {}, {} seats removed",
            section_id, venue_id, deletion.seats_removed
        );
        Ok(deletion)
    }

    fn checked_capacity(&self, raw: i64) -> CatalogResult<i32> {
        if raw < 1 {
            return Err(CatalogError::Validation(
                "capacity must be a positive integer".to_string(),
            ));
        }
        match i32::try_from(raw) {
            Ok(capacity) if capacity <= self.max_capacity => Ok(capacity),
            _ => Err(CatalogError::Validation(format!(
                "capacity must not exceed {}",
                self.max_capacity
            ))),
        }
    }
}

/* ---------- transaction bodies ---------- */

async fn provision(
    tx: &mut dyn StoreTx,
    venue_id: i64,
    name: &str,
    capacity: i32,
) -> CatalogResult<SectionWithSeats> {
    // 1. Venue lock serializes creates and renames under this venue
    tx.lock_venue(venue_id)
        .await?
        .ok_or(CatalogError::NotFound("Venue"))?;

    // 2. Exact-match uniqueness within the venue
    if tx.section_name_taken(venue_id, name, None).await? {
        return Err(duplicate_name(name));
    }

    // 3. Section row, then seats 1..=capacity
    let section = tx.insert_section(venue_id, name, capacity).await?;
    tx.insert_seat_range(section.id, 1, capacity).await?;

    let seats = tx.list_seats(section.id).await?;
    Ok(SectionWithSeats { section, seats })
}

async fn resize(
    tx: &mut dyn StoreTx,
    venue_id: i64,
    section_id: i64,
    name: Option<String>,
    capacity: Option<i32>,
) -> CatalogResult<(SectionWithSeats, SeatDelta)> {
    if name.is_some() {
        tx.lock_venue(venue_id)
            .await?
            .ok_or(CatalogError::NotFound("Section"))?;
    }

    // Row lock on the section serializes concurrent resizes of it
    let current = tx
        .lock_section(venue_id, section_id)
        .await?
        .ok_or(CatalogError::NotFound("Section"))?;

    let rename = name.filter(|n| *n != current.name);
    if let Some(new_name) = rename.as_deref() {
        if tx
            .section_name_taken(venue_id, new_name, Some(section_id))
            .await?
        {
            return Err(duplicate_name(new_name));
        }
    }

    let target = capacity.unwrap_or(current.capacity);
    let delta = SeatDelta::between(current.capacity, target);
    match delta {
        SeatDelta::Grow { first, last } => {
            tx.insert_seat_range(section_id, first, last).await?;
        }
        SeatDelta::Shrink { keep } => {
            tx.delete_seats_above(section_id, keep).await?;
        }
        SeatDelta::Unchanged => {}
    }

    let section = if rename.is_some() || delta != SeatDelta::Unchanged {
        let name = rename.as_deref().unwrap_or(&current.name);
        tx.update_section(section_id, name, target).await?
    } else {
        current
    };

    let seats = tx.list_seats(section_id).await?;
    Ok((SectionWithSeats { section, seats }, delta))
}

async fn remove(
    tx: &mut dyn StoreTx,
    venue_id: i64,
    section_id: i64,
) -> CatalogResult<SectionDeletion> {
    let section = tx
        .lock_section(venue_id, section_id)
        .await?
        .ok_or(CatalogError::NotFound("Section"))?;

    let seats_removed = tx.delete_seats_of_section(section.id).await?;
    tx.delete_section(section.id).await?;

    Ok(SectionDeletion {
        section_id: section.id,
        seats_removed,
    })
}

fn duplicate_name(name: &str) -> CatalogError {
    CatalogError::Conflict(format!(
        "A section named \"{name}\" already exists in this venue"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_for_growth_starts_after_current_capacity() {
        assert_eq!(
            SeatDelta::between(3, 7),
            SeatDelta::Grow { first: 4, last: 7 }
        );
    }

    #[test]
    fn delta_for_shrink_keeps_the_low_numbers() {
        assert_eq!(SeatDelta::between(7, 3), SeatDelta::Shrink { keep: 3 });
    }

    #[test]
    fn delta_for_same_capacity_is_empty() {
        assert_eq!(SeatDelta::between(5, 5), SeatDelta::Unchanged);
    }

    #[test]
    fn capacity_bounds() {
        let manager = CapacityManager::new(Arc::new(crate::store::MemoryStore::new()), 100);
        assert!(manager.checked_capacity(0).is_err());
        assert!(manager.checked_capacity(-4).is_err());
        assert!(manager.checked_capacity(101).is_err());
        assert!(manager.checked_capacity(i64::MAX).is_err());
        assert_eq!(manager.checked_capacity(100).unwrap(), 100);
        assert_eq!(manager.checked_capacity(1).unwrap(), 1);
    }
}
