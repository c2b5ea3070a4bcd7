pub mod client;
pub mod dashboard;
pub mod features;
