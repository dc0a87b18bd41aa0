//! Per-job bearer tokens that workers present on status callbacks.

use std::time::Duration;

use jsonwebtoken::{decode, encode, get_current_timestamp, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CALLBACK_SCOPE: &str = "job-status";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CallbackClaims {
    pub sub: Uuid,
    pub scope: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn mint(secret: &str, job_id: Uuid, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
    let now = get_current_timestamp();
    let claims = CallbackClaims {
        sub: job_id,
        scope: CALLBACK_SCOPE.to_string(),
        exp: (now + ttl.as_secs()) as usize,
        iat: now as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify(secret: &str, token: &str) -> Result<CallbackClaims, jsonwebtoken::errors::Error> {
    let claims = decode::<CallbackClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?
    .claims;

    if claims.scope != CALLBACK_SCOPE {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_token_verifies_for_its_job() {
        let job_id = Uuid::new_v4();
        let token = mint("s3cret", job_id, Duration::from_secs(60)).unwrap();

        let claims = verify("s3cret", &token).unwrap();
        assert_eq!(claims.sub, job_id);
        assert_eq!(claims.scope, CALLBACK_SCOPE);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = mint("s3cret", Uuid::new_v4(), Duration::from_secs(60)).unwrap();
        assert!(verify("different", &token).is_err());
    }
}
