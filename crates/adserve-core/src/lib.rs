// adserve-core - Data model and in-memory bookkeeping
//
// Pure logic shared by the batching pipeline and the HTTP layer:
// - Tracking events (the unit of ingestion)
// - Line items and the in-memory store
// - Bid-based ad selection
//
// No async, no I/O.

pub mod ads;
pub mod line_items;
pub mod types;

pub use ads::AdSelector;
pub use line_items::{LineItemStore, StoreError, ValidationError};
pub use types::{Ad, EventType, LineItem, LineItemCreate, LineItemStatus, TrackingEvent};
