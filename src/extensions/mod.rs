mod observers;

pub(crate) use observers::ObserverRegistry;
pub use observers::{SeriesEvent, SeriesObserver};
