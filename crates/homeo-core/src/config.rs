//! 설정 관리.
//!
//! 설정은 다음 순서로 병합됩니다 (뒤쪽이 우선):
//!
//! 1. 내장 기본값
//! 2. `config/default.toml` (선택)
//! 3. `HOMEO__SECTION__KEY` 형식의 환경 변수
//! 4. 잘 알려진 환경 변수: `API_HOST`, `API_PORT`, `DATABASE_URL`, `APP_ENV`,
//!    `JWT_SECRET`, `JWT_REFRESH_SECRET`
//!
//! 토큰 서명 시크릿은 로드 직후 [`AuthConfig`]로 검증되며, 누락되면 기동이 중단됩니다.

use config::builder::DefaultState;
use config::ConfigBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HomeoError, HomeoResult};

/// 개발 모드에서만 사용되는 access 토큰 시크릿.
const DEV_ACCESS_SECRET: &str = "homeo-development-access-secret-do-not-deploy";
/// 개발 모드에서만 사용되는 refresh 토큰 시크릿.
const DEV_REFRESH_SECRET: &str = "homeo-development-refresh-secret-do-not-deploy";

/// 권장 최소 시크릿 길이 (바이트).
const MIN_SECRET_LEN: usize = 32;

/// 실행 환경.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// 애플리케이션 설정.
#[derive(Debug)]
pub struct AppConfig {
    /// 실행 환경
    pub environment: Environment,
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 인증 설정 (검증 완료)
    pub auth: AuthConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// `host:port` 형식의 바인딩 주소.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 URL. 없으면 DB 기능이 비활성화됩니다.
    #[serde(default)]
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 획득 타임아웃 (초)
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 10,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨 필터
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "homeo_api=info,tower_http=info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 비밀번호 해시 작업량 설정 (Argon2id 파라미터).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PasswordHashConfig {
    /// 메모리 비용 (KiB)
    pub memory_kib: u32,
    /// 반복 횟수
    pub iterations: u32,
    /// 병렬도
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        // argon2 크레이트의 권장 기본값 (OWASP)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// 토큰 서명 및 해시 설정.
///
/// 두 시크릿은 서로 달라야 하며 비어 있으면 안 됩니다. 생성 후에는 변경되지 않습니다.
#[derive(Debug)]
pub struct AuthConfig {
    access_secret: SecretString,
    refresh_secret: SecretString,
    /// Access 토큰 수명 (초)
    pub access_ttl_secs: i64,
    /// Refresh 토큰 수명 (초)
    pub refresh_ttl_secs: i64,
    /// 비밀번호 해시 파라미터
    pub password_hash: PasswordHashConfig,
}

impl AuthConfig {
    /// 기본 Access 토큰 수명: 1시간.
    pub const DEFAULT_ACCESS_TTL_SECS: i64 = 60 * 60;
    /// 기본 Refresh 토큰 수명: 7일.
    pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
    /// 허용되는 최대 토큰 수명: 365일.
    pub const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

    /// 두 시크릿으로 인증 설정을 생성합니다.
    ///
    /// # Errors
    ///
    /// 시크릿이 비어 있거나 두 시크릿이 같으면 `HomeoError::Config`.
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
    ) -> HomeoResult<Self> {
        let access_secret = access_secret.into();
        let refresh_secret = refresh_secret.into();

        if access_secret.trim().is_empty() {
            return Err(HomeoError::Config("JWT_SECRET must not be empty".into()));
        }
        if refresh_secret.trim().is_empty() {
            return Err(HomeoError::Config(
                "JWT_REFRESH_SECRET must not be empty".into(),
            ));
        }
        if access_secret == refresh_secret {
            return Err(HomeoError::Config(
                "JWT_SECRET and JWT_REFRESH_SECRET must differ".into(),
            ));
        }
        if access_secret.len() < MIN_SECRET_LEN || refresh_secret.len() < MIN_SECRET_LEN {
            tracing::warn!(
                min_len = MIN_SECRET_LEN,
                "JWT secret shorter than recommended length"
            );
        }

        Ok(Self {
            access_secret: SecretString::from(access_secret),
            refresh_secret: SecretString::from(refresh_secret),
            access_ttl_secs: Self::DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: Self::DEFAULT_REFRESH_TTL_SECS,
            password_hash: PasswordHashConfig::default(),
        })
    }

    /// 토큰 수명을 설정합니다.
    ///
    /// # Errors
    ///
    /// 수명이 0 이하이거나 [`Self::MAX_TTL_SECS`]를 넘거나, access 수명이 refresh 수명
    /// 이상이면 `HomeoError::Config`.
    pub fn with_ttls(mut self, access_ttl_secs: i64, refresh_ttl_secs: i64) -> HomeoResult<Self> {
        if access_ttl_secs <= 0 || refresh_ttl_secs <= 0 {
            return Err(HomeoError::Config("token TTLs must be positive".into()));
        }
        if access_ttl_secs > Self::MAX_TTL_SECS || refresh_ttl_secs > Self::MAX_TTL_SECS {
            return Err(HomeoError::Config(format!(
                "token TTLs must not exceed {} seconds",
                Self::MAX_TTL_SECS
            )));
        }
        if access_ttl_secs >= refresh_ttl_secs {
            return Err(HomeoError::Config(
                "access token TTL must be shorter than refresh token TTL".into(),
            ));
        }
        self.access_ttl_secs = access_ttl_secs;
        self.refresh_ttl_secs = refresh_ttl_secs;
        Ok(self)
    }

    /// 비밀번호 해시 파라미터를 설정합니다.
    pub fn with_password_hash(mut self, password_hash: PasswordHashConfig) -> Self {
        self.password_hash = password_hash;
        self
    }

    /// Access 토큰 서명 키.
    pub fn access_secret(&self) -> &[u8] {
        self.access_secret.expose_secret().as_bytes()
    }

    /// Refresh 토큰 서명 키.
    pub fn refresh_secret(&self) -> &[u8] {
        self.refresh_secret.expose_secret().as_bytes()
    }
}

/// 역직렬화용 원시 설정. 검증 전 단계입니다.
#[derive(Debug, Deserialize)]
struct RawAppConfig {
    environment: Environment,
    server: ServerConfig,
    database: DatabaseConfig,
    logging: LoggingConfig,
    auth: RawAuthConfig,
}

#[derive(Debug, Deserialize)]
struct RawAuthConfig {
    #[serde(default)]
    access_secret: Option<String>,
    #[serde(default)]
    refresh_secret: Option<String>,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    hash_memory_kib: u32,
    hash_iterations: u32,
    hash_parallelism: u32,
}

impl AppConfig {
    /// 기본값만 채워진 설정 빌더.
    pub fn default_builder() -> HomeoResult<ConfigBuilder<DefaultState>> {
        let server = ServerConfig::default();
        let database = DatabaseConfig::default();
        let logging = LoggingConfig::default();
        let hash = PasswordHashConfig::default();

        let builder = config::Config::builder()
            .set_default("environment", "production")?
            .set_default("server.host", server.host)?
            .set_default("server.port", server.port as i64)?
            .set_default("server.request_timeout_secs", server.request_timeout_secs as i64)?
            .set_default("database.max_connections", database.max_connections as i64)?
            .set_default("database.acquire_timeout_secs", database.acquire_timeout_secs as i64)?
            .set_default("logging.level", logging.level)?
            .set_default("logging.format", logging.format)?
            .set_default("auth.access_ttl_secs", AuthConfig::DEFAULT_ACCESS_TTL_SECS)?
            .set_default("auth.refresh_ttl_secs", AuthConfig::DEFAULT_REFRESH_TTL_SECS)?
            .set_default("auth.hash_memory_kib", hash.memory_kib as i64)?
            .set_default("auth.hash_iterations", hash.iterations as i64)?
            .set_default("auth.hash_parallelism", hash.parallelism as i64)?;

        Ok(builder)
    }

    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 건너뜁니다.
    pub fn load<P: AsRef<Path>>(path: P) -> HomeoResult<Self> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let builder = Self::default_builder()?
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("HOMEO")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("environment", env("APP_ENV"))?
            .set_override_option("server.host", env("API_HOST"))?
            .set_override_option("server.port", env("API_PORT"))?
            .set_override_option("database.url", env("DATABASE_URL"))?
            .set_override_option("auth.access_secret", env("JWT_SECRET"))?
            .set_override_option("auth.refresh_secret", env("JWT_REFRESH_SECRET"))?;

        Self::from_builder(builder)
    }

    /// 기본 경로(`config/default.toml`)에서 설정을 로드합니다.
    pub fn load_default() -> HomeoResult<Self> {
        Self::load("config/default.toml")
    }

    /// 준비된 빌더에서 설정을 만들고 검증합니다.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> HomeoResult<Self> {
        let raw: RawAppConfig = builder.build()?.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawAppConfig) -> HomeoResult<Self> {
        let environment = raw.environment;
        let access_secret = resolve_secret(
            raw.auth.access_secret,
            "JWT_SECRET",
            environment,
            DEV_ACCESS_SECRET,
        )?;
        let refresh_secret = resolve_secret(
            raw.auth.refresh_secret,
            "JWT_REFRESH_SECRET",
            environment,
            DEV_REFRESH_SECRET,
        )?;

        let auth = AuthConfig::new(access_secret, refresh_secret)?
            .with_ttls(raw.auth.access_ttl_secs, raw.auth.refresh_ttl_secs)?
            .with_password_hash(PasswordHashConfig {
                memory_kib: raw.auth.hash_memory_kib,
                iterations: raw.auth.hash_iterations,
                parallelism: raw.auth.hash_parallelism,
            });

        Ok(Self {
            environment,
            server: raw.server,
            database: raw.database,
            logging: raw.logging,
            auth,
        })
    }
}

/// 설정된 시크릿을 반환합니다. 개발 모드에서만 고정 값으로 대체합니다.
fn resolve_secret(
    value: Option<String>,
    name: &'static str,
    environment: Environment,
    dev_fallback: &str,
) -> HomeoResult<String> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(secret) => Ok(secret),
        None if environment.is_development() => {
            tracing::warn!(
                variable = name,
                "token secret not set, using development fallback (never deploy this)"
            );
            Ok(dev_fallback.to_string())
        }
        None => Err(HomeoError::Config(format!("{} is required", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = "test-access-secret-0123456789abcdef";
    const REFRESH: &str = "test-refresh-secret-0123456789abcdef";

    fn builder_with_secrets() -> ConfigBuilder<DefaultState> {
        AppConfig::default_builder()
            .unwrap()
            .set_override("auth.access_secret", ACCESS)
            .unwrap()
            .set_override("auth.refresh_secret", REFRESH)
            .unwrap()
    }

    #[test]
    fn test_defaults_with_secrets() {
        let config = AppConfig::from_builder(builder_with_secrets()).unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.bind_address(), "127.0.0.1:3001");
        assert!(config.database.url.is_none());
        assert_eq!(config.auth.access_ttl_secs, 3600);
        assert_eq!(config.auth.refresh_ttl_secs, 7 * 24 * 3600);
        assert_eq!(config.auth.access_secret(), ACCESS.as_bytes());
        assert_eq!(config.auth.refresh_secret(), REFRESH.as_bytes());
        assert_eq!(config.auth.password_hash, PasswordHashConfig::default());
    }

    #[test]
    fn test_missing_secret_is_fatal_in_production() {
        let builder = AppConfig::default_builder()
            .unwrap()
            .set_override("auth.access_secret", ACCESS)
            .unwrap();

        let err = AppConfig::from_builder(builder).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("JWT_REFRESH_SECRET"));
    }

    #[test]
    fn test_missing_secret_falls_back_in_development() {
        let builder = AppConfig::default_builder()
            .unwrap()
            .set_override("environment", "development")
            .unwrap();

        let config = AppConfig::from_builder(builder).unwrap();
        assert!(config.environment.is_development());
        assert_eq!(config.auth.access_secret(), DEV_ACCESS_SECRET.as_bytes());
        assert_ne!(config.auth.access_secret(), config.auth.refresh_secret());
    }

    #[test]
    fn test_identical_secrets_rejected() {
        let result = AuthConfig::new(ACCESS, ACCESS);
        assert!(matches!(result, Err(HomeoError::Config(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(AuthConfig::new("   ", REFRESH).is_err());
        assert!(AuthConfig::new(ACCESS, "").is_err());
    }

    #[test]
    fn test_ttl_validation() {
        let auth = AuthConfig::new(ACCESS, REFRESH).unwrap();
        assert!(auth.with_ttls(0, 100).is_err());

        let auth = AuthConfig::new(ACCESS, REFRESH).unwrap();
        assert!(auth.with_ttls(100, 100).is_err());

        let auth = AuthConfig::new(ACCESS, REFRESH).unwrap();
        assert!(auth.with_ttls(3600, 99_999_999_999_999_999).is_err());

        let auth = AuthConfig::new(ACCESS, REFRESH).unwrap();
        assert!(auth
            .with_ttls(3600, AuthConfig::MAX_TTL_SECS)
            .is_ok());

        let auth = AuthConfig::new(ACCESS, REFRESH).unwrap().with_ttls(60, 120).unwrap();
        assert_eq!(auth.access_ttl_secs, 60);
        assert_eq!(auth.refresh_ttl_secs, 120);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let builder = builder_with_secrets()
            .set_override("server.port", "8080")
            .unwrap()
            .set_override("auth.access_ttl_secs", 900)
            .unwrap()
            .set_override("database.url", "postgres://localhost/homeo")
            .unwrap();

        let config = AppConfig::from_builder(builder).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.access_ttl_secs, 900);
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/homeo")
        );
    }

    #[test]
    fn test_oversized_ttl_rejected_while_loading() {
        let builder = builder_with_secrets()
            .set_override("auth.refresh_ttl_secs", 99_999_999_999_999_999_i64)
            .unwrap();

        let err = AppConfig::from_builder(builder).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_debug_does_not_leak_secrets() {
        let auth = AuthConfig::new(ACCESS, REFRESH).unwrap();
        let printed = format!("{:?}", auth);
        assert!(!printed.contains(ACCESS));
        assert!(!printed.contains(REFRESH));
    }
}
