pub mod cycle;

pub use cycle::{CycleEntry, CycleReport, CycleRunner};
