//! Bearer tokens handed out in `init` and redeemed by `join {token}` and
//! the REST API.
//!
//! Tokens are HS256 JWTs carrying only the character id. They do not
//! expire; rotating `JWT_SECRET` invalidates every token.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Claims {
    id: String,
}

/// Sign a token for `character_id`.
///
/// # Errors
///
/// Returns an error if the token cannot be encoded.
pub fn issue_token(secret: &str, character_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            id: character_id.to_owned(),
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify `token` and return the character id it was issued for.
///
/// # Errors
///
/// Returns an error if the signature does not match, the algorithm is not
/// HMAC, or the `id` claim is missing.
pub fn verify_token(secret: &str, token: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims.id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let token = issue_token("secret", "k").unwrap();
        assert_eq!(verify_token("secret", &token).unwrap(), "k");
    }

    #[test]
    fn wrong_secret_or_garbage_is_rejected() {
        let token = issue_token("secret", "k").unwrap();
        assert!(verify_token("other", &token).is_err());
        assert!(verify_token("secret", "not-a-token").is_err());
    }
}
