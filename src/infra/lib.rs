pub use pgscribe_app as app;
pub use pgscribe_domain as domain;

pub mod config;
pub mod postgres;
