//! JWT 토큰 발급/검증.
//!
//! Access Token과 Refresh Token은 서로 다른 시크릿으로 서명됩니다 (HS256).
//! 한 종류의 토큰은 다른 종류의 키로 절대 검증되지 않습니다.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use homeo_core::AuthConfig;

use super::Role;

/// 토큰에 담기는 신원 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    /// 사용자 ID
    pub user_id: String,
    /// 이메일
    pub email: String,
    /// 역할
    pub role: Role,
}

impl TokenPayload {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            role,
        }
    }
}

/// JWT 페이로드 (와이어 형식).
///
/// `{userId, email, role, iat, exp}`. 시간은 Unix 초 단위입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// 사용자 ID
    pub user_id: String,
    /// 이메일
    pub email: String,
    /// 역할
    pub role: Role,
    /// Issued At
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

impl Claims {
    fn new(payload: &TokenPayload, now: DateTime<Utc>, ttl_secs: i64) -> Result<Self, TokenError> {
        let exp = Duration::try_seconds(ttl_secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                TokenError::Signing(format!("token lifetime {}s is out of range", ttl_secs))
            })?;

        Ok(Self {
            user_id: payload.user_id.clone(),
            email: payload.email.clone(),
            role: payload.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        })
    }

    fn into_payload(self) -> TokenPayload {
        TokenPayload {
            user_id: self.user_id,
            email: self.email,
            role: self.role,
        }
    }
}

/// Access Token + Refresh Token 페어.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Access Token
    pub access_token: String,
    /// Refresh Token
    pub refresh_token: String,
    /// Access Token 만료까지 남은 시간 (초)
    pub expires_in: i64,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
}

/// 토큰 에러.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// 구조, 인코딩, 클레임이 잘못된 토큰
    #[error("malformed token: {0}")]
    Malformed(String),
    /// 서명 불일치 (변조 또는 다른 키)
    #[error("invalid token signature")]
    InvalidSignature,
    /// 서명은 유효하지만 만료됨
    #[error("token expired")]
    Expired,
    /// 서명 실패
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl TokenError {
    /// 갱신을 시도해 볼 만한 에러인지 확인합니다.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired)
    }

    /// 로그 라벨.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed(_) => "malformed",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::Expired => "expired",
            TokenError::Signing(_) => "signing",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// 토큰 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl SigningKeys {
    fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }
}

/// 토큰 발급/검증 서비스.
///
/// [`AuthConfig`]로 한 번 생성되고 이후 변경되지 않습니다.
/// 모든 연산에는 시각을 직접 지정하는 `_at` 변형이 있습니다.
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_secs", &self.access.ttl_secs)
            .field("refresh_ttl_secs", &self.refresh.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // 만료는 verify_at에서 leeway 없이 직접 검사
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            access: SigningKeys::new(config.access_secret(), config.access_ttl_secs),
            refresh: SigningKeys::new(config.refresh_secret(), config.refresh_ttl_secs),
            validation,
        }
    }

    /// Access Token 수명 (초).
    pub fn access_ttl_secs(&self) -> i64 {
        self.access.ttl_secs
    }

    /// Refresh Token 수명 (초).
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh.ttl_secs
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// 지정한 시각 기준으로 토큰을 발급합니다.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        payload: &TokenPayload,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let claims = Claims::new(payload, now, keys.ttl_secs)?;

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// 지정한 시각 기준으로 토큰을 검증합니다.
    ///
    /// 서명을 먼저 확인한 뒤 `iat <= now < exp`를 검사합니다.
    pub fn verify_at(
        &self,
        kind: TokenKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPayload, TokenError> {
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)?;
        let claims = data.claims;
        let now = now.timestamp();

        if claims.iat > now {
            return Err(TokenError::Malformed("token issued in the future".into()));
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims.into_payload())
    }

    pub fn issue_access(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        self.issue_at(TokenKind::Access, payload, Utc::now())
    }

    pub fn issue_refresh(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        self.issue_at(TokenKind::Refresh, payload, Utc::now())
    }

    pub fn verify_access(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_at(TokenKind::Access, token, Utc::now())
    }

    pub fn verify_refresh(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_at(TokenKind::Refresh, token, Utc::now())
    }

    /// Access Token + Refresh Token 쌍을 발급합니다.
    pub fn issue_pair(&self, payload: &TokenPayload) -> Result<TokenPair, TokenError> {
        self.issue_pair_at(payload, Utc::now())
    }

    pub fn issue_pair_at(
        &self,
        payload: &TokenPayload,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_at(TokenKind::Access, payload, now)?,
            refresh_token: self.issue_at(TokenKind::Refresh, payload, now)?,
            expires_in: self.access.ttl_secs,
            token_type: "Bearer".to_string(),
        })
    }
}
