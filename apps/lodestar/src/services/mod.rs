//! Service layer - business rules over the engagement repository

pub mod engagement;

pub use engagement::EngagementService;
