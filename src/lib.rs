// Library crate - Monte Carlo risk-per-trade simulation

pub mod error;
pub mod report;
pub mod simulation;

pub use error::{SimError, SimResult};
