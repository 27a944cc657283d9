use proptest::prelude::*;
use std::sync::Arc;

use venue_catalog::cache::ListingCache;
use venue_catalog::config::Config;
use venue_catalog::error::CatalogError;
use venue_catalog::models::{NewSection, NewVenue, SectionPatch, SectionWithSeats};
use venue_catalog::services::VenueCatalog;
use venue_catalog::store::{MemoryStore, VenueStore};

fn catalog(store: &Arc<MemoryStore>) -> VenueCatalog {
    let config = Config::default();
    let store: Arc<dyn VenueStore> = store.clone();
    VenueCatalog::new(store, ListingCache::disabled(&config.cache), config.catalog)
}

async fn venue(catalog: &VenueCatalog, name: &str) -> i64 {
    catalog
        .create_venue(NewVenue {
            name: Some(name.to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

fn section(name: &str, capacity: i64) -> NewSection {
    NewSection {
        name: Some(name.to_string()),
        capacity: Some(capacity),
    }
}

fn resize_to(capacity: i64) -> SectionPatch {
    SectionPatch {
        name: None,
        capacity: Some(capacity),
    }
}

fn seat_numbers(section: &SectionWithSeats) -> Vec<i32> {
    section.seats.iter().map(|s| s.seat_number).collect()
}

fn assert_contiguous(section: &SectionWithSeats) {
    let expected: Vec<i32> = (1..=section.section.capacity).collect();
    assert_eq!(seat_numbers(section), expected);
}

#[tokio::test]
async fn create_provisions_one_seat_per_unit_of_capacity() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;

    let created = catalog
        .create_section(venue_id, section("Floor", 5))
        .await
        .unwrap();

    assert_eq!(created.section.capacity, 5);
    assert_eq!(created.section.venue_id, venue_id);
    assert_contiguous(&created);
    assert!(created.seats.iter().all(|s| s.section_id == created.section.id));
    assert_eq!(store.seat_count().await, 5);
}

#[tokio::test]
async fn large_section_is_provisioned_in_reasonable_time() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Stadium").await;

    let started = std::time::Instant::now();
    let created = catalog
        .create_section(venue_id, section("Bowl", 20_000))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_contiguous(&created);
    assert_eq!(store.seat_count().await, 20_000);
    assert!(elapsed < std::time::Duration::from_secs(5), "took {elapsed:?}");
}

#[tokio::test]
async fn grow_appends_and_keeps_existing_seats() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;
    let created = catalog
        .create_section(venue_id, section("Floor", 3))
        .await
        .unwrap();
    let before: Vec<i64> = created.seats.iter().map(|s| s.id).collect();

    let grown = catalog
        .update_section(venue_id, created.section.id, resize_to(6))
        .await
        .unwrap();

    assert_contiguous(&grown);
    let kept: Vec<i64> = grown.seats.iter().take(3).map(|s| s.id).collect();
    assert_eq!(kept, before);
}

#[tokio::test]
async fn shrink_removes_only_the_highest_numbers() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;
    let created = catalog
        .create_section(venue_id, section("Floor", 8))
        .await
        .unwrap();
    let survivors: Vec<i64> = created.seats.iter().take(2).map(|s| s.id).collect();

    let shrunk = catalog
        .update_section(venue_id, created.section.id, resize_to(2))
        .await
        .unwrap();

    assert_contiguous(&shrunk);
    assert_eq!(shrunk.seats.iter().map(|s| s.id).collect::<Vec<_>>(), survivors);
    assert_eq!(store.seat_count().await, 2);
}

#[tokio::test]
async fn resize_to_same_capacity_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;
    let created = catalog
        .create_section(venue_id, section("Floor", 4))
        .await
        .unwrap();

    let same = catalog
        .update_section(venue_id, created.section.id, resize_to(4))
        .await
        .unwrap();

    assert_eq!(same.section, created.section);
    assert_eq!(
        same.seats.iter().map(|s| s.id).collect::<Vec<_>>(),
        created.seats.iter().map(|s| s.id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn round_trip_restores_the_seat_numbers() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;
    let created = catalog
        .create_section(venue_id, section("Floor", 5))
        .await
        .unwrap();
    let id = created.section.id;

    catalog.update_section(venue_id, id, resize_to(12)).await.unwrap();
    let back = catalog.update_section(venue_id, id, resize_to(5)).await.unwrap();

    assert_eq!(seat_numbers(&back), seat_numbers(&created));
}

#[tokio::test]
async fn invalid_capacity_and_missing_fields_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;

    for draft in [
        section("Floor", 0),
        section("Floor", -3),
        NewSection {
            name: Some("Floor".to_string()),
            capacity: None,
        },
        NewSection {
            name: None,
            capacity: Some(10),
        },
        section("   ", 10),
    ] {
        let err = catalog.create_section(venue_id, draft).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)), "{err:?}");
    }
    assert_eq!(store.section_count().await, 0);
    assert_eq!(store.seat_count().await, 0);
}

#[tokio::test]
async fn create_in_missing_venue_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);

    let err = catalog
        .create_section(404, section("Floor", 3))
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::NotFound("Venue")));
    assert_eq!(store.seat_count().await, 0);
}

#[tokio::test]
async fn duplicate_section_name_conflicts_within_a_venue_only() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let arena = venue(&catalog, "Arena").await;
    let hall = venue(&catalog, "Hall").await;

    catalog.create_section(arena, section("Floor", 3)).await.unwrap();
    let err = catalog
        .create_section(arena, section("Floor", 7))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Conflict(_)));

    // Same name under another venue is fine, and matching is exact
    catalog.create_section(hall, section("Floor", 2)).await.unwrap();
    catalog.create_section(arena, section("floor", 2)).await.unwrap();
    assert_eq!(store.seat_count().await, 7);
}

#[tokio::test]
async fn rename_to_taken_name_conflicts_but_own_name_is_fine() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;
    catalog.create_section(venue_id, section("Floor", 2)).await.unwrap();
    let balcony = catalog
        .create_section(venue_id, section("Balcony", 2))
        .await
        .unwrap();

    let err = catalog
        .update_section(
            venue_id,
            balcony.section.id,
            SectionPatch {
                name: Some("Floor".to_string()),
                capacity: Some(9),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Conflict(_)));
    assert_eq!(store.seat_count().await, 4);

    let renamed = catalog
        .update_section(
            venue_id,
            balcony.section.id,
            SectionPatch {
                name: Some("Balcony".to_string()),
                capacity: Some(3),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.section.name, "Balcony");
    assert_contiguous(&renamed);
}

#[tokio::test]
async fn section_is_not_found_under_another_venue() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let arena = venue(&catalog, "Arena").await;
    let hall = venue(&catalog, "Hall").await;
    let created = catalog.create_section(arena, section("Floor", 3)).await.unwrap();

    let err = catalog
        .update_section(hall, created.section.id, resize_to(10))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound("Section")));

    let err = catalog
        .delete_section(hall, created.section.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound("Section")));
    assert_eq!(store.seat_count().await, 3);
}

#[tokio::test]
async fn failed_seat_write_rolls_back_create() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;

    store.set_seat_write_failure(true);
    let err = catalog
        .create_section(venue_id, section("Floor", 5))
        .await
        .unwrap_err();
    store.set_seat_write_failure(false);

    assert!(matches!(err, CatalogError::Infrastructure(_)));
    assert_eq!(store.section_count().await, 0);
    assert_eq!(store.seat_count().await, 0);

    // The name is free again after the rollback
    catalog.create_section(venue_id, section("Floor", 5)).await.unwrap();
}

#[tokio::test]
async fn failed_seat_write_rolls_back_resize() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;
    let created = catalog
        .create_section(venue_id, section("Floor", 4))
        .await
        .unwrap();

    store.set_seat_write_failure(true);
    for target in [9, 1] {
        let err = catalog
            .update_section(venue_id, created.section.id, resize_to(target))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Infrastructure(_)));
    }
    store.set_seat_write_failure(false);

    let current = catalog
        .list_seats(venue_id, created.section.id)
        .await
        .unwrap();
    assert_eq!(current.section.capacity, 4);
    assert_eq!(
        current.seats.iter().map(|s| s.id).collect::<Vec<_>>(),
        created.seats.iter().map(|s| s.id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn delete_section_removes_its_seats() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;
    let floor = catalog.create_section(venue_id, section("Floor", 6)).await.unwrap();
    catalog.create_section(venue_id, section("Balcony", 2)).await.unwrap();

    let deletion = catalog
        .delete_section(venue_id, floor.section.id)
        .await
        .unwrap();

    assert_eq!(deletion.seats_removed, 6);
    assert_eq!(store.seat_count().await, 2);
    assert_eq!(store.section_count().await, 1);
}

#[tokio::test]
async fn concurrent_resizes_leave_a_consistent_section() {
    let store = Arc::new(MemoryStore::new());
    let catalog = catalog(&store);
    let venue_id = venue(&catalog, "Arena").await;
    let created = catalog
        .create_section(venue_id, section("Floor", 10))
        .await
        .unwrap();
    let id = created.section.id;

    let mut handles = Vec::new();
    for target in [3_i64, 25, 7, 14, 1, 30] {
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move {
            catalog.update_section(venue_id, id, resize_to(target)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let current = catalog.list_seats(venue_id, id).await.unwrap();
    assert_contiguous(&current);
    assert_eq!(store.seat_count().await, current.section.capacity as usize);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn seats_always_match_capacity(initial in 1_i64..40, targets in prop::collection::vec(1_i64..40, 1..6)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let catalog = catalog(&store);
            let venue_id = venue(&catalog, "Arena").await;
            let created = catalog
                .create_section(venue_id, section("Floor", initial))
                .await
                .unwrap();
            assert_contiguous(&created);

            for target in targets {
                let resized = catalog
                    .update_section(venue_id, created.section.id, resize_to(target))
                    .await
                    .unwrap();
                assert_eq!(i64::from(resized.section.capacity), target);
                assert_contiguous(&resized);
                assert_eq!(store.seat_count().await, target as usize);
            }
        });
    }
}
