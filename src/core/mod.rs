pub mod primitives;
pub mod series_store;
pub mod snapshot;
pub mod sync_handle;
pub mod types;

pub use series_store::{LiveSeriesStore, LiveSeriesStoreBuilder};
pub use snapshot::SeriesSnapshot;
pub use sync_handle::{SyncGuard, SyncHandle};
pub use types::{DataPoint, SeriesId};
