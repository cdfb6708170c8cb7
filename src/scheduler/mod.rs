pub mod daemon;

pub use daemon::{parse_schedule, CycleDaemon};
