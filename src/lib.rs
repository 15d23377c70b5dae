pub mod assessment;
pub mod cache;
pub mod config;
pub mod error;
pub mod estimators;
pub mod fetcher;
pub mod labels;
pub mod model;
pub mod normalize;
pub mod scheduler;
pub mod scoring;
pub mod stage;
