//! Configuration and session management.
//!
//! One [`ConfigStore`] holds every named value the suite needs, including
//! the session token shared by all authenticated API calls.

pub mod keys;
pub mod placeholder;
pub mod properties;
pub mod settings;
pub mod source;
pub mod store;

pub use properties::PropertySet;
pub use settings::RunSettings;
pub use source::{ConfigSource, LoadTier};
pub use store::{ConfigStore, StoreState, SESSION_TOKEN_KEY};
