//! Helpers for querying Virtual Observatory services: cone search, image and
//! spectral access, TAP and RegTAP registry discovery.

pub mod apis;
pub mod client;
pub mod config;
pub mod constants;
pub mod coords;
pub mod display;
pub mod error;
pub mod logging;
pub mod observability;
pub mod query;
pub mod resolver;
pub mod services;
pub mod votable;

// Port traits and their adapters
pub mod app;
pub mod infra;

pub use apis::cone::{Cone, ConeOptions};
pub use apis::image::{Image, ImageColumn, ImageFormat, ImageTable};
pub use apis::registry::{Registry, RegistryFilter};
pub use apis::spectra::{Spectra, SpectraColumn};
pub use apis::tap::Tap;
pub use client::VoClient;
pub use config::Config;
pub use coords::{CoordInput, CoordList, RadiusArg, SkyPosition};
pub use error::{Result, VoError};
pub use query::ErrorHandling;
pub use services::{ServiceDescriptor, ServiceSet};
pub use votable::{Value, VoTable};
