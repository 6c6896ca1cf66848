//! Bearer-token validation against the OpenID issuer
//!
//! Signing keys come from the issuer's JWKS document and are cached
//! process-wide; a token whose kid is not in the cache triggers exactly one
//! refresh-and-retry before the token is rejected.

use std::collections::HashMap;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::Engine;
use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kty: String,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub k: Option<String>,
}

#[derive(Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Clone)]
pub enum JwkSource {
    /// Fixed keys, used in tests.
    Static(Vec<Jwk>),
    /// JWKS document fetched from the issuer.
    Http { uri: String },
}

#[derive(Deserialize)]
struct Claims {
    sub: String,
}

pub struct AuthService {
    issuer: String,
    audience: String,
    source: JwkSource,
    client: reqwest::Client,
    keys: RwLock<Option<HashMap<String, Jwk>>>,
}

impl AuthService {
    /// `issuer` is expected to end with a slash (Auth0 convention); the JWKS
    /// document lives at `{issuer}.well-known/jwks.json`.
    pub fn new(issuer: String, audience: String) -> Self {
        let uri = format!("{}.well-known/jwks.json", issuer);
        Self::with_source(issuer, audience, JwkSource::Http { uri })
    }

    pub fn with_source(issuer: String, audience: String, source: JwkSource) -> Self {
        Self {
            issuer,
            audience,
            source,
            client: reqwest::Client::new(),
            keys: RwLock::new(None),
        }
    }

    /// Resolves the caller from the Authorization header. `required = false`
    /// turns a missing or invalid token into `Ok(None)` for endpoints that
    /// also serve anonymous callers.
    pub async fn get_user(
        &self,
        headers: &HeaderMap,
        required: bool,
    ) -> Result<Option<String>, ApiError> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        let token = match token {
            Some(token) => token,
            None if required => return Err(ApiError::Auth("missing bearer token".into())),
            None => return Ok(None),
        };

        match self.validate(token).await {
            Ok(sub) => Ok(Some(sub)),
            Err(err) if required => Err(err),
            Err(err) => {
                tracing::debug!(error = %err, "Rejected optional bearer token");
                Ok(None)
            }
        }
    }

    async fn validate(&self, token: &str) -> Result<String, ApiError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|err| ApiError::Auth(format!("invalid token header: {}", err)))?;
        let kid = header
            .kid
            .ok_or_else(|| ApiError::Auth("token missing kid header".into()))?;

        // The issuer may have rotated its signing keys since the last fetch,
        // so an unknown kid triggers one refresh before giving up.
        let mut tries = 0;
        loop {
            let jwk = self.lookup_key(&kid, tries > 0).await?;
            match jwk {
                Some(jwk) => return self.decode(token, &jwk),
                None if tries == 0 => tries += 1,
                None => return Err(ApiError::Auth(format!("no signing key for kid {}", kid))),
            }
        }
    }

    fn decode(&self, token: &str, jwk: &Jwk) -> Result<String, ApiError> {
        let algorithm = jwk
            .alg
            .as_deref()
            .unwrap_or("RS256")
            .parse::<jsonwebtoken::Algorithm>()
            .map_err(|_| ApiError::Auth("unsupported signing algorithm".into()))?;

        let key = match jwk.kty.as_str() {
            "RSA" => {
                let n = jwk
                    .n
                    .as_ref()
                    .ok_or_else(|| ApiError::Auth("jwk missing rsa modulus".into()))?;
                let e = jwk
                    .e
                    .as_ref()
                    .ok_or_else(|| ApiError::Auth("jwk missing rsa exponent".into()))?;
                jsonwebtoken::DecodingKey::from_rsa_components(n, e)
                    .map_err(|err| ApiError::Auth(format!("bad rsa jwk: {}", err)))?
            }
            "oct" => {
                let secret = jwk
                    .k
                    .as_ref()
                    .ok_or_else(|| ApiError::Auth("jwk missing secret".into()))?;
                let bytes = base64::engine::general_purpose::URL_SAFE
                    .decode(secret)
                    .map_err(|err| ApiError::Auth(format!("bad jwk secret: {}", err)))?;
                jsonwebtoken::DecodingKey::from_secret(&bytes)
            }
            other => {
                return Err(ApiError::Auth(format!("unsupported jwk key type {}", other)));
            }
        };

        let mut validation = jsonwebtoken::Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;

        let data = jsonwebtoken::decode::<Claims>(token, &key, &validation)
            .map_err(|err| ApiError::Auth(format!("token validation failed: {}", err)))?;
        Ok(data.claims.sub)
    }

    async fn lookup_key(&self, kid: &str, force_refresh: bool) -> Result<Option<Jwk>, ApiError> {
        let needs_fetch = force_refresh || self.keys.read().is_none();
        if needs_fetch {
            let fetched = self.fetch_keys().await?;
            *self.keys.write() = Some(fetched);
        }
        Ok(self
            .keys
            .read()
            .as_ref()
            .and_then(|keys| keys.get(kid))
            .cloned())
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, Jwk>, ApiError> {
        let keys = match &self.source {
            JwkSource::Static(keys) => keys.clone(),
            JwkSource::Http { uri } => {
                tracing::info!(uri = %uri, "Fetching issuer signing keys");
                let response = self
                    .client
                    .get(uri)
                    .send()
                    .await
                    .map_err(|err| ApiError::Upstream(format!("jwks fetch failed: {}", err)))?;
                if !response.status().is_success() {
                    return Err(ApiError::Upstream(format!(
                        "jwks fetch returned {}",
                        response.status()
                    )));
                }
                let set: JwkSet = response
                    .json()
                    .await
                    .map_err(|err| ApiError::Upstream(format!("jwks decode failed: {}", err)))?;
                set.keys
            }
        };
        Ok(keys.into_iter().map(|jwk| (jwk.kid.clone(), jwk)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const ISSUER: &str = "https://issuer.example/";
    const AUDIENCE: &str = "https://api.example/";

    fn hs256_service(secret: &str) -> AuthService {
        let jwk = Jwk {
            kid: "test-key".into(),
            alg: Some("HS256".into()),
            kty: "oct".into(),
            n: None,
            e: None,
            k: Some(base64::engine::general_purpose::URL_SAFE.encode(secret)),
        };
        AuthService::with_source(
            ISSUER.into(),
            AUDIENCE.into(),
            JwkSource::Static(vec![jwk]),
        )
    }

    fn signed_token(secret: &str, kid: &str, exp_offset: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let header = Header {
            alg: Algorithm::HS256,
            kid: Some(kid.into()),
            ..Header::default()
        };
        let claims = json!({
            "sub": "auth0|user-1",
            "iss": ISSUER,
            "aud": AUDIENCE,
            "exp": now + exp_offset,
            "iat": now,
        });
        encode(&header, &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn valid_token_yields_subject() {
        let service = hs256_service("topsecret");
        let token = signed_token("topsecret", "test-key", 600);
        let user = service.get_user(&bearer_headers(&token), true).await.unwrap();
        assert_eq!(user.as_deref(), Some("auth0|user-1"));
    }

    #[tokio::test]
    async fn missing_token_is_none_when_optional() {
        let service = hs256_service("topsecret");
        let user = service.get_user(&HeaderMap::new(), false).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn missing_token_fails_when_required() {
        let service = hs256_service("topsecret");
        let result = service.get_user(&HeaderMap::new(), true).await;
        assert!(matches!(result, Err(ApiError::Auth(_))));
    }

    #[tokio::test]
    async fn unknown_kid_is_rejected_after_refresh() {
        let service = hs256_service("topsecret");
        let token = signed_token("topsecret", "rotated-key", 600);
        let result = service.get_user(&bearer_headers(&token), true).await;
        assert!(matches!(result, Err(ApiError::Auth(_))));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let service = hs256_service("topsecret");
        let token = signed_token("topsecret", "test-key", -600);
        let result = service.get_user(&bearer_headers(&token), true).await;
        assert!(matches!(result, Err(ApiError::Auth(_))));
    }
}
