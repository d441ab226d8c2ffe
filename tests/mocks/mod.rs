pub mod manual_clock;
pub mod scripted_source;

pub use manual_clock::ManualClock;
pub use scripted_source::{ScriptedSource, Step};
pub use snapshot_builder::SnapshotBuilder;
