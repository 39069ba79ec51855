use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// The logged-in user, as read from the stored credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl CurrentUser {
    /// Reads the user from a JWT payload
    ///
    /// The signature is not verified: the token only tells the client who it
    /// is talking for, the API checks it on every call. Returns `None` for
    /// malformed tokens and tokens without a `sub` claim.
    pub fn from_token(token: &str) -> Option<Self> {
        let payload = token.trim().split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;

        let email = claims.sub.filter(|sub| !sub.trim().is_empty())?;
        Some(Self {
            email,
            name: claims.name,
        })
    }

    /// Key under which this user's session state is stored
    pub fn session_key(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_from_sub_and_name() {
        let token = encode_test_token(&json!({"sub": "Ada@Example.com", "name": "Ada"}));
        let user = CurrentUser::from_token(&token).unwrap();
        assert_eq!(user.email, "Ada@Example.com");
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert_eq!(user.session_key(), "ada@example.com");
    }

    #[test]
    fn test_padded_payload_accepted() {
        let token = encode_test_token(&json!({"sub": "a@b.co"}));
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1].push_str("==");
        let user = CurrentUser::from_token(&parts.join(".")).unwrap();
        assert_eq!(user.email, "a@b.co");
    }

    #[test]
    fn test_missing_sub_is_anonymous() {
        let token = encode_test_token(&json!({"name": "Ada"}));
        assert_eq!(CurrentUser::from_token(&token), None);
    }

    #[test]
    fn test_garbage_token_is_anonymous() {
        assert_eq!(CurrentUser::from_token("not-a-jwt"), None);
        assert_eq!(CurrentUser::from_token("a.!!!.c"), None);
    }
}
