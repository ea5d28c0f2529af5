#[macro_use]
extern crate log;

pub mod clock;
pub mod config;
pub mod model;
pub mod operations;
pub mod paths;
pub mod poll;
pub mod registry;
pub mod store;
pub mod tally;
pub mod token;
pub mod util;
