//! Ticket planner
//!
//! Turns Jira tickets into implementation plans with IBM Granite, optionally
//! grounded in a scan of the linked GitHub repository.

pub mod analyzer;
pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod github;
pub mod granite;
pub mod jira;
pub mod metrics;
pub mod planner;
pub mod review;

pub use config::Config;
pub use credentials::Credentials;
pub use error::{PlannerError, Result};
