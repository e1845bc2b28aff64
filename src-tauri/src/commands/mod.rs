pub mod config;
#[cfg(feature = "desktop")]
pub mod credentials;
#[cfg(feature = "desktop")]
pub mod dashboard;
#[cfg(feature = "desktop")]
pub mod fetch;
