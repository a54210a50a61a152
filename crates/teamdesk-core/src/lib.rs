pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod outcome;
pub mod policy;

pub use auth::{AuthContext, Claims, ClaimsBuilder};
pub use config::TeamdeskConfig;
pub use error::{Result, TeamdeskError};
pub use outcome::{Outcome, StepOutcome};
pub use policy::{ensure, ensure_admin, Action, Guarded};
