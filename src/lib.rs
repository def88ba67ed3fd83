//! Balance-aware vehicle loading for multi-deck ferries.
//!
//! Vehicles of the golongan classes IV..IX are placed onto rectangular decks
//! so that the weighted centroid of each deck stays close to a target point.
//! [`ship::Ship`] is the entry point; the HTTP layer in [`api`] wraps it.

pub mod api;
pub mod balance;
pub mod config;
pub mod geometry;
pub mod layout;
pub mod model;
pub mod occupancy;
pub mod planner;
pub mod routing;
pub mod ship;
pub mod types;
