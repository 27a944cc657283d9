pub mod capacity;
pub mod catalog;

pub use capacity::{CapacityManager, SeatDelta, SectionDeletion};
pub use catalog::{CacheStatus, Listing, VenueCatalog, VenueDeletion};
