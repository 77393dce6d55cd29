//! In-memory collaborators for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::identity::{
    IdentityError, IdentityProvider, NewAccount, UserClaims,
};
use crate::profile::{Profile, ProfileError, ProfileResult, ProfileStore};

/// Identity provider double, recording every call.
#[derive(Default)]
pub struct MemoryIdentity {
    accounts: Mutex<Vec<NewAccount>>,
    claims: Mutex<HashMap<String, UserClaims>>,
    calls: AtomicUsize,
    fail_claims: bool,
}

impl MemoryIdentity {
    /// Provider whose claims assignment always fails.
    pub fn failing_claims() -> Self {
        Self {
            fail_claims: true,
            ..Default::default()
        }
    }

    /// Pre-register an account, as if created by an earlier call.
    pub fn seed(&self, uid: &str, email: &str) {
        self.accounts.lock().unwrap().push(NewAccount {
            uid: uid.to_owned(),
            email: email.to_owned(),
        });
    }

    /// Number of calls received, across both operations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn accounts(&self) -> Vec<NewAccount> {
        self.accounts.lock().unwrap().clone()
    }

    pub fn claims_of(&self, uid: &str) -> Option<UserClaims> {
        self.claims.lock().unwrap().get(uid).cloned()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn create_account(
        &self,
        email: &str,
        _password: &str,
        _display_name: &str,
    ) -> Result<NewAccount, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.iter().any(|account| account.email == email) {
            return Err(IdentityError::EmailTaken {
                email: email.to_owned(),
            });
        }

        let account = NewAccount {
            uid: format!("uid-{}", accounts.len() + 1),
            email: email.to_owned(),
        };
        accounts.push(account.clone());
        Ok(account)
    }

    async fn set_claims(
        &self,
        uid: &str,
        claims: &UserClaims,
    ) -> Result<(), IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_claims {
            return Err(IdentityError::Provider(
                "claims endpoint unavailable".to_owned(),
            ));
        }

        self.claims
            .lock()
            .unwrap()
            .insert(uid.to_owned(), claims.clone());
        Ok(())
    }
}

/// Profile store double, stamping rows the way the real store does.
#[derive(Default)]
pub struct MemoryProfiles {
    rows: Mutex<HashMap<String, (Profile, DateTime<Utc>)>>,
    fail: bool,
}

impl MemoryProfiles {
    /// Store whose writes always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn rows(&self) -> HashMap<String, (Profile, DateTime<Utc>)> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfiles {
    async fn write(&self, uid: &str, profile: &Profile) -> ProfileResult<()> {
        if self.fail {
            return Err(ProfileError::Sql(sqlx::Error::PoolClosed));
        }

        self.rows
            .lock()
            .unwrap()
            .insert(uid.to_owned(), (profile.clone(), Utc::now()));
        Ok(())
    }
}
