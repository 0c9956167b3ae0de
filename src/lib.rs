pub mod clock;
pub mod device;
pub mod dsl;
pub mod error;
pub mod jobs;
pub mod model;
pub mod refresh;
pub mod runner;
pub mod script_job;
pub mod settings;
pub mod vm;

#[cfg(test)]
mod testing;
