pub mod benchmark;
pub mod config;
pub mod rng;
pub mod runner;
pub mod sim;
pub mod transport;
pub mod util;
