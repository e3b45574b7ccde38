//! Domain models owned by the engagement core

pub mod engagement;

pub use engagement::{
    Artifact, Category, Commit, CreationDetails, Engagement, EngagementUser, HostingEnvironment,
    Launch, Status, StatusMessage,
};
