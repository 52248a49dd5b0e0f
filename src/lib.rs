//! Ad placement mediation: one show/load contract over many ad network providers.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod provider;
pub mod service;

pub use error::{AdsError, AdsResult};
