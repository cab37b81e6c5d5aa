use crate::error::{AuthError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by a short-lived MFA challenge token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChallengeClaims {
    pub sub: String,        // User ID
    pub organization_id: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: ChallengeTokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeTokenType {
    MfaChallenge,
}

/// Issues and verifies the challenge tokens handed back when a login needs
/// a second factor. Ten-minute lifetime, single purpose.
pub struct ChallengeService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl ChallengeService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
        }
    }

    pub fn issue(&self, user_id: Uuid, organization_id: Uuid, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = ChallengeClaims {
            sub: user_id.to_string(),
            organization_id: organization_id.to_string(),
            email: email.to_string(),
            exp: (now + Duration::minutes(10)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: ChallengeTokenType::MfaChallenge,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<ChallengeClaims> {
        let validation = Validation::new(self.algorithm);
        let data = decode::<ChallengeClaims>(token, &self.decoding_key, &validation)?;

        if data.claims.token_type != ChallengeTokenType::MfaChallenge {
            return Err(AuthError::InvalidToken(
                "token is not an MFA challenge".to_string(),
            ));
        }
        Ok(data.claims)
    }
}
