mod dispatch;
mod loop_config;
mod mutation_policy;
mod surface;
mod update_loop;

pub use dispatch::{DispatchJob, ImmediateDispatcher, QueuedDispatcher, RenderDispatcher};
pub use loop_config::{MutationPolicy, UpdateLoopConfig};
pub use mutation_policy::{BuiltinPolicy, CyclePolicy};
pub use surface::LiveSurface;
pub use update_loop::{LoopExit, LoopSummary, UpdateLoop, UpdateLoopState};
