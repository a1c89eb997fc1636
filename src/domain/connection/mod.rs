mod id;
mod name;
mod profile;
mod ssl_mode;

pub use id::ConnectionId;
pub use name::{ConnectionName, ConnectionNameError};
pub use profile::ConnectionProfile;
pub use ssl_mode::{SslMode, UnknownSslMode};
