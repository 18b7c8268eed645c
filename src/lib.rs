pub mod app;
pub mod cli;
pub mod collector;
pub mod config;
pub mod generator;
pub mod logging;
pub mod output;
pub mod probe;
pub mod resolver;
pub mod runner;
pub mod worker;

#[cfg(test)]
mod tests;
