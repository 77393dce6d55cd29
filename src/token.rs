//! Verify caller json web tokens.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const DEFAULT_AUDIENCE: &str = "provisa";
const EXPIRATION_TIME: u64 = 60 * 15; // 15 minutes.

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Recipients that the JWT is intended for.
    pub aud: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// Caller ID.
    pub sub: String,
    /// Custom claim carrying the caller's role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Manage JWT tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    public_key: DecodingKey,
    private_key: EncodingKey,
    name: String,
    audience: String,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    pub fn new(
        name: &str,
        public_key_pem: &str,
        private_key_pem: &str,
    ) -> Result<Self> {
        let public_key = DecodingKey::from_ec_pem(public_key_pem.as_bytes())?;
        let private_key =
            EncodingKey::from_ec_pem(private_key_pem.as_bytes())?;

        Ok(Self {
            algorithm: Algorithm::ES384,
            public_key,
            private_key,
            name: name.to_owned(),
            audience: DEFAULT_AUDIENCE.to_string(),
        })
    }

    /// Set `audience` field on JWT.
    pub fn audience(&mut self, audience: &str) {
        self.audience = audience.to_owned();
    }

    /// Create a new [`jsonwebtoken`] carrying a `role` custom claim.
    pub fn create(&self, user_id: &str, role: Option<&str>) -> Result<String> {
        let time = chrono::Utc::now().timestamp() as u64;
        let header = Header::new(self.algorithm);
        let claims = Claims {
            aud: self.audience.clone(),
            exp: time + EXPIRATION_TIME,
            iat: time,
            iss: self.name.clone(),
            sub: user_id.to_owned(),
            role: role.map(str::to_owned),
        };

        Ok(encode(&header, &claims, &self.private_key)?)
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[&self.audience]);

        Ok(decode::<Claims>(token, &self.public_key, &validation)?.claims)
    }
}
