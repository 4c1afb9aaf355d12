use auction_core::model::UserId;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub exp: usize,
}

pub fn verify(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: usize) -> String {
        let claims = Claims { sub: UserId::new_v4(), username: "alice".into(), exp };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn verifies_a_correctly_signed_token() {
        let future_exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        let token = token("shared-secret", future_exp);
        let claims = verify("shared-secret", &token).unwrap();
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn rejects_a_token_signed_with_a_different_secret() {
        let future_exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        let token = token("other-secret", future_exp);
        assert!(verify("shared-secret", &token).is_err());
    }

    #[test]
    fn rejects_an_expired_token() {
        let past_exp = (chrono::Utc::now().timestamp() - 3600) as usize;
        let token = token("shared-secret", past_exp);
        assert!(verify("shared-secret", &token).is_err());
    }
}
