pub mod venue;
pub mod section;
pub mod seat;

pub use venue::{
    ListingQuery, NewVenue, Pagination, Venue, VenueDetails, VenueEntry, VenueFields, VenueListing,
    VenuePatch,
};
pub use section::{
    NewSection, Section, SectionPatch, SectionPreview, SectionSummary, SectionWithSeats,
    SectionWithVenue, VenueRef,
};
pub use seat::Seat;
