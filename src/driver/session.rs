//! Session Client
//!
//! 연결 하나를 요청/응답 사이클로 바꾸는 세션
//!
//! 한 세션 안에서 요청은 엄격하게 순차적입니다. `submit_query`로 문장을
//! 보내면 그 결과를 `pull_all` 또는 `discard_all`로 비우기 전까지 다음
//! 문장을 보낼 수 없습니다.
//!
//! ```text
//! Disconnected ──connect──▶ Ready ──submit_query──▶ Streaming
//!                             ▲                         │
//!                             └──pull_all/discard_all───┘
//! ```
//!
//! 서버가 RUN, PULL_ALL, DISCARD_ALL 중 어느 단계에서든 실패를 돌려주면
//! 세션은 RESET으로 실패 상태를 비웁니다. 서버는 RESET과 함께 열린
//! 트랜잭션도 버리므로 세션의 트랜잭션 역시 실패로 닫힙니다.

use std::fmt;

use tracing::{debug, warn};

use super::blocking;
use super::config::ClientConfig;
use super::error::{DriverError, DriverResult};
use super::result::{Query, QueryResult, ServerFailure};
use super::transaction::Transaction;
use crate::bolt::{Connection, Request, ResponseBatch};

// ============================================================================
// Bookmark - 북마크
// ============================================================================

/// 인과적 일관성 북마크
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bookmark {
    value: String,
}

impl Bookmark {
    /// 새 북마크 생성
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// 북마크 값
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl From<&str> for Bookmark {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Bookmark {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// SessionState - 세션 상태
// ============================================================================

#[derive(Debug)]
enum SessionState {
    /// 연결 전 또는 전송 실패 후
    Disconnected,
    /// 다음 문장을 받을 수 있음
    Ready,
    /// RUN 응답을 받았고 결과를 아직 비우지 않음
    Streaming(ResponseBatch),
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Ready => "Ready",
            SessionState::Streaming(_) => "Streaming",
        }
    }
}

// ============================================================================
// SessionClient - 세션
// ============================================================================

/// 연결 하나를 소유하는 세션
pub struct SessionClient<C: Connection> {
    config: ClientConfig,
    connection: C,
    state: SessionState,
    last_bookmark: Option<Bookmark>,
    pub(crate) current_transaction: Option<Transaction>,
}

impl<C: Connection> SessionClient<C> {
    /// 연결되지 않은 세션 생성
    pub fn new(config: ClientConfig, connection: C) -> Self {
        Self {
            config,
            connection,
            state: SessionState::Disconnected,
            last_bookmark: None,
            current_transaction: None,
        }
    }

    /// 설정
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 연결 여부
    pub fn is_connected(&self) -> bool {
        !matches!(self.state, SessionState::Disconnected)
    }

    /// 마지막으로 받은 북마크
    pub fn last_bookmark(&self) -> Option<&Bookmark> {
        self.last_bookmark.as_ref()
    }

    /// 가장 최근 트랜잭션
    pub fn current_transaction(&self) -> Option<&Transaction> {
        self.current_transaction.as_ref()
    }

    /// 연결 후 INIT
    ///
    /// 서버가 INIT을 거부하면 `Ok(false)`이고 세션은 연결되지 않은 상태로 남습니다.
    pub async fn connect(&mut self) -> DriverResult<bool> {
        self.connection.connect().await?;

        let init = Request::Init {
            user_agent: self.config.user_agent.clone(),
            auth: self.config.auth_token(),
        };
        debug!(address = %self.config.address(), "Sending INIT");
        let batch = self.connection.request(init).await?;

        if batch.success {
            self.state = SessionState::Ready;
        } else {
            let reason = batch
                .failure_message()
                .map(|f| format!("{}: {}", f.code, f.message))
                .unwrap_or_default();
            warn!(address = %self.config.address(), %reason, "INIT rejected");
        }
        Ok(batch.success)
    }

    /// 연결 종료
    pub async fn disconnect(&mut self) -> DriverResult<()> {
        self.state = SessionState::Disconnected;
        self.current_transaction = None;
        self.connection.disconnect().await?;
        Ok(())
    }

    /// RESET: 실패 상태와 남은 결과를 비움
    ///
    /// 열린 트랜잭션이 있으면 서버가 함께 버리므로 실패로 닫힙니다.
    pub async fn reset(&mut self) -> DriverResult<bool> {
        self.ensure_connected()?;
        self.acknowledge_failure().await
    }

    /// 비우지 않은 결과가 남아 있는지
    pub(crate) fn has_pending_result(&self) -> bool {
        matches!(self.state, SessionState::Streaming(_))
    }

    /// 문장 전송 (RUN)
    ///
    /// 반환된 핸들의 `pull_all`로 결과를 받아야 다음 문장을 보낼 수 있습니다.
    /// 핸들을 버리면 세션은 Streaming 상태로 남고, 다음 `submit_query`는
    /// `pull_all`/`discard_all`/`reset` 전까지 실패합니다.
    pub async fn submit_query(&mut self, query: impl Into<Query>) -> DriverResult<PendingQuery<'_, C>> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Disconnected => {
                return Err(DriverError::connection("Session is not connected"))
            }
            SessionState::Streaming(_) => {
                return Err(DriverError::protocol(
                    "Previous result must be pulled before submitting another query",
                ))
            }
        }

        let batch = self.send(query.into().into_request()).await?;
        let accepted = batch.success;
        self.state = SessionState::Streaming(batch);
        Ok(PendingQuery {
            session: self,
            accepted,
        })
    }

    /// 남은 결과를 모두 받음 (PULL_ALL)
    ///
    /// 서버가 문장을 거부했다면 PULL_ALL 대신 RESET을 보내고
    /// `success == false`인 결과를 돌려줍니다. PULL_ALL 자체가 실패해도
    /// (예: 실행 중 0으로 나누기) RESET을 보낸 뒤 실패 결과를 돌려줍니다.
    pub async fn pull_all(&mut self) -> DriverResult<QueryResult> {
        let run = self.take_streaming("pull_all")?;

        if !run.success {
            let failure = run.failure_message().map(ServerFailure::from);
            self.acknowledge_failure().await?;
            return Ok(QueryResult::failed(failure));
        }

        let pull = self.send(Request::PullAll).await?;
        if pull.success {
            self.state = SessionState::Ready;
            self.capture_bookmark(&pull);
        } else {
            self.acknowledge_failure().await?;
        }
        QueryResult::from_batches(&run, &pull)
    }

    /// 남은 결과를 버림 (DISCARD_ALL)
    pub async fn discard_all(&mut self) -> DriverResult<bool> {
        let run = self.take_streaming("discard_all")?;

        if !run.success {
            self.acknowledge_failure().await?;
            return Ok(false);
        }

        let discard = self.send(Request::DiscardAll).await?;
        if discard.success {
            self.state = SessionState::Ready;
            self.capture_bookmark(&discard);
        } else {
            self.acknowledge_failure().await?;
        }
        Ok(discard.success)
    }

    /// 문장 실행 후 결과 수집
    pub async fn execute(&mut self, query: impl Into<Query>) -> DriverResult<QueryResult> {
        self.submit_query(query).await?.pull_all().await
    }

    /// `execute`의 동기 버전
    pub fn execute_sync(&mut self, query: impl Into<Query>) -> DriverResult<QueryResult> {
        blocking::wait(self.execute(query))
    }

    // ------------------------------------------------------------------------
    // internal
    // ------------------------------------------------------------------------

    fn ensure_connected(&self) -> DriverResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DriverError::connection("Session is not connected"))
        }
    }

    fn take_streaming(&mut self, operation: &str) -> DriverResult<ResponseBatch> {
        match std::mem::replace(&mut self.state, SessionState::Ready) {
            SessionState::Streaming(run) => Ok(run),
            other => {
                let message = format!("{} called in {} state", operation, other.name());
                self.state = other;
                match self.state {
                    SessionState::Disconnected => Err(DriverError::connection(message)),
                    _ => Err(DriverError::protocol(message)),
                }
            }
        }
    }

    /// RESET 전송
    ///
    /// 서버는 RESET을 받으면 열린 트랜잭션을 버립니다.
    async fn acknowledge_failure(&mut self) -> DriverResult<bool> {
        self.abandon_transaction();
        let batch = self.send(Request::Reset).await?;
        self.state = SessionState::Ready;
        Ok(batch.success)
    }

    fn abandon_transaction(&mut self) {
        if let Some(tx) = self.current_transaction.as_mut().filter(|tx| tx.is_open()) {
            warn!(state = ?tx.state(), "Server discarded the open transaction");
            tx.abandon();
        }
    }

    async fn send(&mut self, request: Request) -> DriverResult<ResponseBatch> {
        debug!(
            request = request.name(),
            statement = request.statement().unwrap_or(""),
            "Sending request"
        );
        match self.connection.request(request).await {
            Ok(batch) => Ok(batch),
            Err(e) => {
                warn!(error = %e, "Request failed, session disconnected");
                self.state = SessionState::Disconnected;
                self.abandon_transaction();
                Err(e.into())
            }
        }
    }

    fn capture_bookmark(&mut self, batch: &ResponseBatch) {
        let Some(value) = batch.bookmark() else {
            return;
        };
        let bookmark = Bookmark::new(value);
        if let Some(tx) = self.current_transaction.as_mut().filter(|tx| tx.is_open()) {
            tx.bookmark = Some(bookmark.clone());
        }
        self.last_bookmark = Some(bookmark);
    }
}

impl<C: Connection> fmt::Debug for SessionClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("address", &self.config.address())
            .field("state", &self.state.name())
            .field("last_bookmark", &self.last_bookmark)
            .finish()
    }
}

// ============================================================================
// PendingQuery - 결과 대기 핸들
// ============================================================================

/// 전송된 문장의 결과 핸들
///
/// 세션을 빌리고 있으므로 핸들이 살아 있는 동안 다른 문장을 보낼 수 없습니다.
#[must_use = "the result must be pulled before the session accepts another query"]
pub struct PendingQuery<'s, C: Connection> {
    session: &'s mut SessionClient<C>,
    accepted: bool,
}

impl<'s, C: Connection> PendingQuery<'s, C> {
    /// 서버가 문장을 받아들였는지
    pub fn accepted(&self) -> bool {
        self.accepted
    }

    /// 결과 수집
    pub async fn pull_all(self) -> DriverResult<QueryResult> {
        self.session.pull_all().await
    }

    /// 결과 버림
    pub async fn discard_all(self) -> DriverResult<bool> {
        self.session.discard_all().await
    }
}

// ============================================================================
// Tests
// ============================================================================
