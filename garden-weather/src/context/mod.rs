//! Weather context document and its canonical store

pub mod models;
pub mod store;

pub use models::{
    FocusArea, GitCommit, GitContext, NextSteps, ProgressSummary, WeatherCondition,
    WeatherConditions, WeatherContext, CONTEXT_VERSION,
};
pub use store::{parse_document, read_document, ContextStore};
