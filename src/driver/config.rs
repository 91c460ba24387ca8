//! Client Configuration
//!
//! 접속 설정. 아무 것도 지정하지 않으면 `localhost:7687`,
//! `neo4j`/`neo4j`, 암호화 사용으로 동작합니다.

use std::fmt;

use crate::bolt::AuthToken as BoltAuthToken;

use super::error::{DriverError, DriverResult};

/// 기본 포트
pub const DEFAULT_PORT: u16 = 7687;

/// 기본 사용자명/비밀번호
pub const DEFAULT_USERNAME: &str = "neo4j";
pub const DEFAULT_PASSWORD: &str = "neo4j";

// ============================================================================
// ServerAddress - 서버 주소
// ============================================================================

/// 서버 주소
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
}

impl ServerAddress {
    /// 새 서버 주소 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host[:port]` 파싱 (스킴은 제거된 상태)
    fn parse(authority: &str) -> DriverResult<Self> {
        let parts: Vec<&str> = authority.split(':').collect();
        match parts.as_slice() {
            [host] if !host.is_empty() => Ok(Self::new(*host, DEFAULT_PORT)),
            [host, port] if !host.is_empty() => {
                let port = port
                    .parse()
                    .map_err(|_| DriverError::configuration(format!("Invalid port: {}", port)))?;
                Ok(Self::new(*host, port))
            }
            _ => Err(DriverError::configuration(format!(
                "Invalid server address: {}",
                authority
            ))),
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

// ============================================================================
// ClientConfig - 클라이언트 설정
// ============================================================================

/// 클라이언트 설정
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// 호스트명
    pub hostname: String,
    /// 포트
    pub port: u16,
    /// 사용자명
    pub username: String,
    /// 비밀번호
    pub password: String,
    /// TLS 암호화
    pub encrypted: bool,
    /// User Agent
    pub user_agent: String,
}

impl ClientConfig {
    /// 빌더 시작
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// `bolt://host:port` 형식의 URI로 설정 생성
    ///
    /// 지원하는 스킴(`bolt`, `bolt+s`, `bolt+ssc`)은 모두 암호화를 켭니다.
    /// 평문 연결은 빌더의 `with_encrypted(false)`로만 설정합니다.
    pub fn from_uri(uri: &str) -> DriverResult<Self> {
        let (scheme, authority) = uri
            .split_once("://")
            .ok_or_else(|| DriverError::configuration(format!("Missing scheme: {}", uri)))?;

        let encrypted = match scheme {
            "bolt" | "bolt+s" | "bolt+ssc" => true,
            other => {
                return Err(DriverError::configuration(format!(
                    "Unsupported scheme: {}",
                    other
                )))
            }
        };

        let address = ServerAddress::parse(authority.trim_end_matches('/'))?;
        Ok(Self {
            hostname: address.host,
            port: address.port,
            encrypted,
            ..Self::default()
        })
    }

    /// 서버 주소
    pub fn address(&self) -> ServerAddress {
        ServerAddress::new(self.hostname.clone(), self.port)
    }

    /// INIT 요청에 실을 인증 토큰
    pub fn auth_token(&self) -> BoltAuthToken {
        if self.username.is_empty() {
            BoltAuthToken::none()
        } else {
            BoltAuthToken::basic(&self.username, &self.password)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            encrypted: true,
            user_agent: format!("boltgraph-driver/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

// ============================================================================
// ClientConfigBuilder - 설정 빌더
// ============================================================================

/// 클라이언트 설정 빌더
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// 호스트명 설정
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.hostname = hostname.into();
        self
    }

    /// 포트 설정
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// 인증 정보 설정
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    /// TLS 암호화 설정
    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.config.encrypted = encrypted;
        self
    }

    /// User Agent 설정
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// 빌드
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

// ============================================================================
// Tests
// ============================================================================
