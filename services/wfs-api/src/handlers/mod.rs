//! HTTP request handlers for the WFS API.

pub mod common;
pub mod health;
pub mod wfs;

pub use health::{api_metrics_handler, health_handler, metrics_handler, ready_handler};
pub use wfs::{wfs_get_handler, wfs_post_handler};
