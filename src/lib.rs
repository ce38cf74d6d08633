//! Sea freight load calculator.
//!
//! Aggregates a cargo list into totals and container utilization, lays the
//! physical units out on a coarse slot grid, animates them into a 3D scene
//! and renders a printable report. The binary wraps all of it in an HTTP
//! service with an embedded web viewer.

pub mod aggregate;
pub mod animation;
pub mod api;
pub mod calculator;
pub mod config;
pub mod model;
pub mod planner;
pub mod report;
pub mod scene;
pub mod session;
pub mod types;
