//! Recorded workouts: the leg/split model, its file format, the split index
//! used while ingesting edits, and the directory the workouts live in.

pub mod duration;
pub mod index;
pub mod store;
pub mod timer;

pub use duration::{format_timer, parse_timer};
pub use index::{SplitIndex, SplitLoc};
pub use store::WorkoutStore;
pub use timer::{format_distance, Leg, Split, WorkoutTimer};
