//! 비밀번호 해싱.
//!
//! Argon2id 기반 해싱 및 검증. 해시는 PHC 문자열(알고리즘, 파라미터, 솔트, 해시)로 저장됩니다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::Arc;

use homeo_core::PasswordHashConfig;

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed")]
    HashingFailed,
    #[error("invalid password hash format")]
    InvalidHashFormat,
    #[error("invalid hash parameters: {0}")]
    InvalidParams(String),
}

/// 자격 증명 해셔.
///
/// 생성 후 변경되지 않으며 여러 요청에서 잠금 없이 공유됩니다.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    /// 존재하지 않는 계정의 로그인 검증에 쓰는 해시. 설정된 파라미터로 생성됩니다.
    dummy_digest: Arc<str>,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}

impl CredentialHasher {
    /// 작업량 설정으로 해셔를 생성합니다.
    pub fn new(config: &PasswordHashConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        let dummy_digest = argon2
            .hash_password(b"homeo-dummy-credential", &salt)
            .map_err(|_| PasswordError::HashingFailed)?
            .to_string();

        Ok(Self {
            argon2,
            dummy_digest: dummy_digest.into(),
        })
    }

    /// 비밀번호를 해싱합니다.
    ///
    /// 호출마다 OS 난수로 새 솔트를 만들므로 같은 입력도 매번 다른 해시가 나옵니다.
    ///
    /// ```rust,ignore
    /// let digest = hasher.hash("my_secure_password1")?;
    /// // "$argon2id$v=19$m=19456,t=2,p=1$..."
    /// ```
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let digest = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|_| PasswordError::HashingFailed)?;

        Ok(digest.to_string())
    }

    /// 비밀번호를 검증합니다.
    ///
    /// 해시에 포함된 솔트와 파라미터로 다시 계산한 뒤 상수 시간으로 비교합니다.
    /// 불일치는 `Ok(false)`, 해시를 해석할 수 없으면 `InvalidHashFormat`.
    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(digest).map_err(|_| PasswordError::InvalidHashFormat)?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(_) => Err(PasswordError::InvalidHashFormat),
        }
    }

    /// 블로킹 풀에서 해싱합니다.
    pub async fn hash_blocking(&self, plaintext: String) -> Result<String, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|_| PasswordError::HashingFailed)?
    }

    /// 블로킹 풀에서 검증합니다.
    pub async fn verify_blocking(
        &self,
        plaintext: String,
        digest: String,
    ) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .map_err(|_| PasswordError::HashingFailed)?
    }

    /// 더미 해시로 한 번 검증하고 결과를 버립니다.
    ///
    /// 없는 계정의 로그인도 실제 검증과 같은 비용을 치르게 해
    /// 응답 시간으로 계정 존재 여부가 드러나지 않게 합니다.
    pub async fn verify_dummy_blocking(&self, plaintext: String) -> Result<(), PasswordError> {
        let digest = self.dummy_digest.to_string();
        self.verify_blocking(plaintext, digest).await.map(|_| ())
    }
}

/// 비밀번호 강도 검증.
///
/// - 최소 8자 이상
/// - 최소 1개의 숫자 포함
/// - 최소 1개의 영문자 포함
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }

    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("Password must contain at least one letter");
    }

    Ok(())
}
