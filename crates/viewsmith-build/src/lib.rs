//! Build orchestration: blocking one-shot production builds plus the
//! background development watch-and-rebuild loop.

pub mod orchestrator;
pub mod watch;

pub use orchestrator::{BuildState, Orchestrator};
pub use watch::ChangeWatcher;
