pub mod config;
pub mod equation;
pub mod games;
pub mod progress;
pub mod quiz;
