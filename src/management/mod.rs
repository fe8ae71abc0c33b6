mod auth;
mod rate_limit;
mod session;
mod tasks;

pub use auth::CredentialProvider;
pub use auth::SessionCredentials;
pub use rate_limit::RateLimiter;
pub use session::SessionData;
pub use session::SessionStore;
pub use tasks::TaskRegistry;
pub use tasks::TaskStatus;
