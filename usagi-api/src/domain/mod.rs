pub mod jobs;
pub mod models;
pub mod search;
pub mod services;
