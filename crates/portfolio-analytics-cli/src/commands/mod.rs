pub mod analytics;
pub mod optimization;
