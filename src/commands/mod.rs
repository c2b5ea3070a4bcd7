pub mod banking;
pub mod clients;
pub mod dataset;
pub mod db;
pub mod health;
pub mod settings;
