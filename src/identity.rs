//! External identity provider support.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::Identity;

/// Error code returned by the provider on duplicate registration.
const EMAIL_EXISTS: &str = "EMAIL_EXISTS";

/// Failures reported by the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("email {email} is already registered")]
    EmailTaken { email: String },

    #[error("{0}")]
    Provider(String),
}

/// Account as issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    /// Opaque identifier assigned by the provider.
    pub uid: String,
    pub email: String,
}

/// Custom claims attached to a provider account, readable by later
/// authorization checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserClaims {
    pub role: String,
}

/// Account management operations delegated to the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and return the provider-issued identity.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<NewAccount, IdentityError>;

    /// Attach custom claims to an existing account.
    async fn set_claims(
        &self,
        uid: &str,
        claims: &UserClaims,
    ) -> Result<(), IdentityError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountBody<'a> {
    email: &'a str,
    password: &'a str,
    display_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderFailure {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Identity provider client over its admin REST API.
#[derive(Clone, Debug)]
pub struct RestIdentityProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl RestIdentityProvider {
    /// Create a new [`RestIdentityProvider`] from configuration.
    pub fn new(config: &Identity) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Url::parse(&config.address)?,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base_url
            .join(path)
            .map_err(|err| IdentityError::Provider(err.to_string()))
    }

    async fn failure(response: reqwest::Response) -> ProviderFailure {
        let status = response.status();
        let mut failure =
            response.json::<ProviderFailure>().await.unwrap_or_default();

        if failure.message.is_empty() {
            failure.message =
                format!("identity provider returned {status} status");
        }
        failure
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<NewAccount, IdentityError> {
        let response = self
            .client
            .post(self.endpoint("accounts")?)
            .bearer_auth(&self.api_key)
            .json(&CreateAccountBody {
                email,
                password,
                display_name,
            })
            .send()
            .await
            .map_err(|err| IdentityError::Provider(err.to_string()))?;

        if response.status().is_success() {
            let account = response
                .json::<NewAccount>()
                .await
                .map_err(|err| IdentityError::Provider(err.to_string()))?;

            tracing::debug!(uid = account.uid, "account created on provider");
            return Ok(account);
        }

        let failure = Self::failure(response).await;
        if failure.code == EMAIL_EXISTS {
            return Err(IdentityError::EmailTaken {
                email: email.to_owned(),
            });
        }
        Err(IdentityError::Provider(failure.message))
    }

    async fn set_claims(
        &self,
        uid: &str,
        claims: &UserClaims,
    ) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(self.endpoint(&format!("accounts/{uid}/claims"))?)
            .bearer_auth(&self.api_key)
            .json(claims)
            .send()
            .await
            .map_err(|err| IdentityError::Provider(err.to_string()))?;

        if !response.status().is_success() {
            let failure = Self::failure(response).await;
            return Err(IdentityError::Provider(failure.message));
        }

        tracing::debug!(uid, "claims attached on provider");
        Ok(())
    }
}
