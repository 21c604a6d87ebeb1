pub mod adapters;
pub mod config;
pub mod error;
pub mod generation;
pub mod session;
pub mod web;

#[cfg(test)]
mod test_support;
