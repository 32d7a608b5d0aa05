use std::{fmt, sync::Arc};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::KeyValueStore;

const ENABLE_LOGS: bool = true;

use crate::log_info;

pub const USER_ID_KEY: &str = "userid";

/// Pseudonymous per-installation id. Only ever used as hash input.
#[derive(Clone, PartialEq, Eq)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UserId(<redacted>)")
    }
}

/// Lowercase hex SHA-256 of user id + site. Stands in for the site in every record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashedSite(String);

impl HashedSite {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for HashedSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn hash_site(user_id: &UserId, site: &str) -> HashedSite {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_str().as_bytes());
    hasher.update(site.as_bytes());
    HashedSite(hex::encode(hasher.finalize()))
}

pub struct IdentityProvider {
    store: Arc<dyn KeyValueStore>,
}

impl IdentityProvider {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get_or_create_user_id(&self) -> Result<UserId> {
        if let Some(existing) = self
            .store
            .get(USER_ID_KEY)
            .await
            .context("failed to read user id")?
            .filter(|value| !value.is_empty())
        {
            return Ok(UserId(existing));
        }

        let user_id = Uuid::new_v4().to_string();
        self.store
            .set(USER_ID_KEY, &user_id)
            .await
            .context("failed to persist user id")?;
        log_info!("Generated new pseudonymous user id");
        Ok(UserId(user_id))
    }
}
