//! Driver Error Types
//!
//! 드라이버 에러 정의
//!
//! 서버가 거부한 문장(statement)은 에러가 아니라 `success == false`로
//! 전달됩니다. 여기 정의된 에러는 전송 실패와 사용 규칙 위반입니다.

use std::io;
use thiserror::Error;

use crate::bolt::BoltError;

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
#[derive(Error, Debug)]
pub enum DriverError {
    /// 연결 에러 (세션에 치명적)
    #[error("Connection error: {0}")]
    Connection(String),

    /// 인증 에러
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 프로토콜 사용 규칙 위반
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 쿼리 생성 실패
    #[error("Query build error: {0}")]
    QueryBuild(String),

    /// 트랜잭션 에러
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// 풀 에러
    #[error("Pool error: {0}")]
    Pool(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 타입 변환 에러
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 내부 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DriverError {
    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 인증 에러 생성
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 쿼리 생성 에러 생성
    pub fn query_build(msg: impl Into<String>) -> Self {
        Self::QueryBuild(msg.into())
    }

    /// 트랜잭션 에러 생성
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// 풀 에러 생성
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 타입 변환 에러 생성
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// 내부 에러 생성
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 세션을 다시 연결해야 하는 에러 여부
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Authentication(_) | Self::Io(_)
        )
    }

    /// 호출자 코드의 사용 오류 여부
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_)
                | Self::QueryBuild(_)
                | Self::Configuration(_)
                | Self::TypeConversion(_)
        )
    }
}

impl From<BoltError> for DriverError {
    fn from(err: BoltError) -> Self {
        match err {
            BoltError::Io(e) => DriverError::Io(e),
            BoltError::Connection(msg) => DriverError::Connection(msg),
            BoltError::Protocol(msg) => DriverError::Protocol(msg),
            BoltError::Authentication(msg) => DriverError::Authentication(msg),
            BoltError::Timeout => DriverError::connection("Bolt operation timed out"),
            BoltError::ConnectionClosed => DriverError::connection("Connection closed"),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================
