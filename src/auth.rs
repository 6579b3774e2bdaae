//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs with a required `exp`. The documented subject field is
//! `sub`; older producers put the user id under other names, and those aliases are
//! resolved here and nowhere else so handlers only ever see an [`Identity`].

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Owner,
    Manager,
    Staff,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CUSTOMER" => Some(Role::Customer),
            "OWNER" => Some(Role::Owner),
            "MANAGER" => Some(Role::Manager),
            "STAFF" => Some(Role::Staff),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    pub const MANAGEMENT: &'static [Role] = &[Role::Owner, Role::Manager, Role::Staff];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    /// Present on management tokens; names the business the holder acts for.
    pub business_id: Option<String>,
}

/// Accepted locations of the user id, in lookup order.
const USER_ID_PATHS: &[&[&str]] = &[
    &["userId"],
    &["id"],
    &["sub"],
    &["_id"],
    &["user_id"],
    &["user", "id"],
    &["user", "userId"],
];

/// Resolves the caller and checks their role. Every failure is a bare 401.
pub fn authenticate(
    headers: &HeaderMap,
    secret: &str,
    allowed: &[Role],
) -> Result<Identity, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let claims = decode_claims(token, secret).ok_or(AppError::Unauthorized)?;
    let identity = identity_from_claims(&claims).ok_or(AppError::Unauthorized)?;

    if !allowed.contains(&identity.role) {
        tracing::debug!(user_id = %identity.user_id, role = ?identity.role, "role not permitted");
        return Err(AppError::Unauthorized);
    }

    Ok(identity)
}

fn decode_claims(token: &str, secret: &str) -> Option<Value> {
    let validation = Validation::new(Algorithm::HS256);
    match decode::<Value>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            None
        }
    }
}

pub fn identity_from_claims(claims: &Value) -> Option<Identity> {
    let role = claims.get("role").and_then(Value::as_str).and_then(Role::parse)?;
    let user_id = extract_user_id(claims)?;
    let business_id = claims
        .get("businessId")
        .or_else(|| claims.get("business_id"))
        .and_then(id_string);

    Some(Identity {
        user_id,
        role,
        business_id,
    })
}

fn extract_user_id(claims: &Value) -> Option<String> {
    USER_ID_PATHS.iter().find_map(|path| {
        let value = path
            .iter()
            .try_fold(claims, |node, key| node.get(*key))?;
        id_string(value)
    })
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn token(claims: Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_each_alias_resolves_user_id() {
        let shapes = [
            json!({"role": "CUSTOMER", "userId": "u1"}),
            json!({"role": "CUSTOMER", "id": "u1"}),
            json!({"role": "CUSTOMER", "sub": "u1"}),
            json!({"role": "CUSTOMER", "_id": "u1"}),
            json!({"role": "CUSTOMER", "user_id": "u1"}),
            json!({"role": "CUSTOMER", "user": {"id": "u1"}}),
            json!({"role": "CUSTOMER", "user": {"userId": "u1"}}),
        ];
        for claims in shapes {
            let identity = identity_from_claims(&claims).unwrap();
            assert_eq!(identity.user_id, "u1", "claims: {claims}");
        }
    }

    #[test]
    fn test_numeric_ids_are_stringified() {
        let identity = identity_from_claims(&json!({"role": "CUSTOMER", "sub": 42})).unwrap();
        assert_eq!(identity.user_id, "42");
    }

    #[test]
    fn test_missing_user_id_rejected() {
        assert!(identity_from_claims(&json!({"role": "CUSTOMER", "email": "a@b.c"})).is_none());
        assert!(identity_from_claims(&json!({"role": "CUSTOMER", "sub": ""})).is_none());
        let nested = json!({"role": "CUSTOMER", "user": {"name": "x"}});
        assert!(identity_from_claims(&nested).is_none());
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(identity_from_claims(&json!({"role": "GUEST", "sub": "u1"})).is_none());
        assert!(identity_from_claims(&json!({"sub": "u1"})).is_none());
    }

    #[test]
    fn test_authenticate_accepts_valid_customer() {
        let t = token(json!({"sub": "u1", "role": "CUSTOMER", "exp": far_future()}));
        let identity = authenticate(&headers_with(&t), SECRET, &[Role::Customer]).unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.role, Role::Customer);
    }

    #[test]
    fn test_authenticate_rejects_wrong_role() {
        let t = token(json!({"sub": "u1", "role": "ADMIN", "exp": far_future()}));
        let result = authenticate(&headers_with(&t), SECRET, &[Role::Customer]);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_authenticate_rejects_bad_signature_and_expiry() {
        let forged = encode(
            &Header::default(),
            &json!({"sub": "u1", "role": "CUSTOMER", "exp": far_future()}),
            &EncodingKey::from_secret(b"other-secret"),
        )
        .unwrap();
        assert!(authenticate(&headers_with(&forged), SECRET, &[Role::Customer]).is_err());

        let expired = token(json!({"sub": "u1", "role": "CUSTOMER", "exp": 1_000_000}));
        assert!(authenticate(&headers_with(&expired), SECRET, &[Role::Customer]).is_err());
    }

    #[test]
    fn test_authenticate_requires_bearer_header() {
        assert!(authenticate(&HeaderMap::new(), SECRET, &[Role::Customer]).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(authenticate(&headers, SECRET, &[Role::Customer]).is_err());
    }

    #[test]
    fn test_management_token_carries_business() {
        let t = token(json!({
            "sub": "m1",
            "role": "MANAGER",
            "businessId": "biz1",
            "exp": far_future(),
        }));
        let identity = authenticate(&headers_with(&t), SECRET, Role::MANAGEMENT).unwrap();
        assert_eq!(identity.business_id.as_deref(), Some("biz1"));
    }
}
