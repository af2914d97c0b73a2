//! Task tracking for the weekly events of a student association.

pub mod config;
pub mod db;
pub mod error;
pub mod graphql;
pub mod models;
pub mod notify;
pub mod util;

#[cfg(test)]
mod tests;
