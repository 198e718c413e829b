pub mod app;
pub mod cli;
pub mod config;
pub mod http;
pub mod models;
pub mod output;
pub mod payloads;
pub mod redirect;
pub mod runner;
pub mod scanner;
pub mod vectors;

#[cfg(test)]
mod tests;
