pub mod anomaly;
pub mod config;
pub mod series;
pub mod source;
pub mod tree;
