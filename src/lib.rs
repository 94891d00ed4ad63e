pub mod api;
pub mod artifacts;
pub mod config;
pub mod extraction;
pub mod humanize;
pub mod jobs;
pub mod observability;
pub mod orchestrator;
pub mod relay;
pub mod remote;
pub mod strategy;
pub mod sweeper;
