//! Core application components for P1Doks Fetcher
//!
//! Everything the CLI layer composes: the catalog client over the
//! authenticated session, the car-name mapping resolver, the download
//! organizer, and the iRacing schedule arithmetic. Nothing in here
//! prompts for input or exits the process.

pub mod client;
pub mod mapping;
pub mod models;
pub mod organizer;
pub mod schedule;

// Re-export main public API
pub use client::CatalogClient;
pub use mapping::{resolve, sanitize_folder, ReferenceMapping, Resolution};
pub use models::{
    determine_car_class, group_by_class, CarClass, DataPack, DownloadContext, Series, SetupFile,
    SetupKind,
};
pub use organizer::{PackOutcome, SetupOrganizer};
