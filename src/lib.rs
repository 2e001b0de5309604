pub mod config;
pub mod formatting;
pub mod grid;
pub mod providers;
pub mod scheduler;
pub mod tui;
pub mod widget;

#[cfg(test)]
mod integration_tests;
