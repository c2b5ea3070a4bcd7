pub mod aggregate;
pub mod classifier;
pub mod ratios;
pub mod risk_level;
pub mod validation;
