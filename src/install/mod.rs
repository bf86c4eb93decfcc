pub mod executable;
pub mod installer;

pub use installer::{BatchItem, BatchReport, Installer, Outcome};
