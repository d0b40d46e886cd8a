pub mod cycle;

pub use cycle::{CycleReport, Engine, PhaseReport};
