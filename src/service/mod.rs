/// Remote tag manager session: sign-in, tag list and tag commands
pub mod client;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::ServiceError;
use crate::models::RawTag;

pub use client::WirelessTagClient;

/// Account credentials for the tag manager.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// One request/response exchange per call over a session that outlives the
/// call. Implementations never retry; the scheduler's next tick does.
#[async_trait]
pub trait TagService: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), ServiceError>;

    /// Fetch the full tag list. An empty `Ok` means the account has no tags;
    /// any transport or protocol problem is an `Err`.
    async fn fetch_snapshot(&self) -> Result<Vec<RawTag>, ServiceError>;

    async fn beep(&self, slave_id: i64, duration: u32) -> Result<(), ServiceError>;
}
