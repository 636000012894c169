//! live-series: thread-safe live-updating chart series.
//!
//! A [`LiveSeriesStore`] is mutated point by point from any thread (usually by
//! an [`UpdateLoop`]) while a render path draws from a [`RenderSnapshot`]
//! taken under the store's [`SyncHandle`]. Series that share a surface share
//! one handle, so a capture never shows one series a tick ahead of another.

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod render;
pub mod telemetry;

pub use crate::api::{LiveSurface, MutationPolicy, UpdateLoop, UpdateLoopConfig, UpdateLoopState};
pub use crate::core::{DataPoint, LiveSeriesStore, SeriesSnapshot, SyncHandle};
pub use crate::error::{LiveError, LiveResult};
pub use crate::render::RenderSnapshot;
