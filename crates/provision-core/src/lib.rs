pub mod error;
pub mod identity;
pub mod io;
pub mod log;
pub mod orchestrator;
pub mod params;
pub mod paths;
pub mod profile;
pub mod root_phase;
pub mod runner;
pub mod step;
pub mod user_phase;

pub use error::{ProvisionError, Result};
