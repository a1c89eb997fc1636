pub use pgscribe_app as app;
pub use pgscribe_domain as domain;
pub use pgscribe_infra as infra;

pub mod commands;
pub mod error;
