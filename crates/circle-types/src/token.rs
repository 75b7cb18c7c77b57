//! Session token issue/verify, used by both the REST middleware and the
//! gateway handshake.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::api::Claims;
use crate::models::Role;

const TOKEN_LIFETIME_DAYS: i64 = 30;

pub fn issue(secret: &str, user_id: Uuid, session_id: Uuid, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        sid: session_id,
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let user = Uuid::new_v4();
        let session = Uuid::new_v4();
        let token = issue("secret", user, session, Role::Volunteer).unwrap();

        let claims = verify("secret", &token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.sid, session);
        assert_eq!(claims.role, Role::Volunteer);
    }

    #[test]
    fn wrong_secret_fails() {
        let token = issue("secret", Uuid::new_v4(), Uuid::new_v4(), Role::Donor).unwrap();
        assert!(verify("other", &token).is_err());
    }
}
