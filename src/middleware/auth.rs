use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::user::{Identity, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

/// Verifies HS256 bearer tokens and turns their claims into an [`Identity`].
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|_| Error::Unauthenticated("invalid_token".into()))?;
        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| Error::Unauthenticated("invalid_subject".into()))?;
        let role: Role = data
            .claims
            .role
            .as_deref()
            .ok_or_else(|| Error::Unauthenticated("missing_role".into()))?
            .parse()
            .map_err(|_| Error::Unauthenticated("unknown_role".into()))?;
        Ok(Identity::new(user_id, role))
    }
}

fn bearer_token(req: &Request) -> Result<&str> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthenticated("missing_authorization".into()))?;
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthenticated("bad_authorization".into()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthenticated("unsupported_scheme".into()))
}

pub async fn require_bearer_auth(
    State(verifier): State<JwtVerifier>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = match bearer_token(&req).and_then(|token| verifier.verify(token)) {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };
    req.extensions_mut().insert(identity);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(sub: &str, role: Option<&str>, exp_offset: i64) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
            role: role.map(str::to_string),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let verifier = JwtVerifier::new("secret");
        let id = Uuid::new_v4();
        let identity = verifier
            .verify(&token(&id.to_string(), Some("employer"), 3600))
            .unwrap();
        assert_eq!(identity, Identity::new(id, Role::Employer));
    }

    #[test]
    fn rejects_expired_wrongly_signed_and_roleless_tokens() {
        let verifier = JwtVerifier::new("secret");
        let id = Uuid::new_v4().to_string();
        let cases = [
            token(&id, Some("jobseeker"), -3600),
            token(&id, None, 3600),
            token("not-a-uuid", Some("jobseeker"), 3600),
            token(&id, Some("recruiter"), 3600),
        ];
        for case in cases {
            assert!(matches!(
                verifier.verify(&case),
                Err(Error::Unauthenticated(_))
            ));
        }
        assert!(JwtVerifier::new("other")
            .verify(&token(&id, Some("jobseeker"), 3600))
            .is_err());
    }
}
