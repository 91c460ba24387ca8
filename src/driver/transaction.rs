//! Transaction Coordinator
//!
//! 세션 위에서 BEGIN/COMMIT/ROLLBACK을 관리하는 작은 상태 기계
//!
//! ```text
//! NotStarted ──BEGIN──▶ Active ──▶ Committing ──▶ Closed
//!                         │                          ▲
//!                         └──────▶ RollingBack ──────┘
//! ```
//!
//! 세션에는 트랜잭션 참조가 하나만 있습니다. Active인 트랜잭션이 있는 동안
//! 다시 시작하려 하면 `DriverError::Transaction`으로 거부됩니다.
//!
//! 트랜잭션 안의 문장이 실패하면 세션이 RESET을 보내고, 서버가 트랜잭션을
//! 버리므로 여기서도 실패로 닫힙니다. 그 뒤의 문장은 트랜잭션 밖에서
//! 실행되지 않도록 거부됩니다.

use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::blocking;
use super::error::{DriverError, DriverResult};
use super::result::{Query, QueryResult};
use super::session::{Bookmark, SessionClient};
use crate::bolt::Connection;

// ============================================================================
// TransactionOptions - 트랜잭션 옵션
// ============================================================================

/// 트랜잭션 옵션
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    /// BEGIN에 함께 보낼 북마크
    pub bookmark: Option<Bookmark>,
    /// 블록 종료 시 자동 커밋/롤백
    pub autocommit: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            bookmark: None,
            autocommit: true,
        }
    }
}

impl TransactionOptions {
    /// 기본 옵션 (자동 커밋)
    pub fn new() -> Self {
        Self::default()
    }

    /// 명시적 커밋 모드
    pub fn explicit() -> Self {
        Self {
            autocommit: false,
            ..Self::default()
        }
    }

    /// 북마크 설정
    pub fn with_bookmark(mut self, bookmark: impl Into<Bookmark>) -> Self {
        self.bookmark = Some(bookmark.into());
        self
    }

    /// 자동 커밋 설정
    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }
}

// ============================================================================
// TransactionState - 트랜잭션 상태
// ============================================================================

/// 트랜잭션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// BEGIN 전
    NotStarted,
    /// 활성 상태
    Active,
    /// COMMIT 진행 중
    Committing,
    /// ROLLBACK 진행 중
    RollingBack,
    /// 종료
    Closed,
}

impl TransactionState {
    /// 완료 상태 여부
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ============================================================================
// Transaction - 트랜잭션
// ============================================================================

/// 트랜잭션 핸들
///
/// 종료된 후에도 결과(`succeed`, `bookmark`)를 읽을 수 있습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    succeed: bool,
    pub(crate) bookmark: Option<Bookmark>,
    autocommit: bool,
    state: TransactionState,
}

impl Transaction {
    fn new(autocommit: bool) -> Self {
        Self {
            succeed: true,
            bookmark: None,
            autocommit,
            state: TransactionState::NotStarted,
        }
    }

    /// 성공 여부 (한 번 실패하면 계속 실패)
    pub fn succeed(&self) -> bool {
        self.succeed
    }

    /// COMMIT/ROLLBACK 응답의 북마크
    pub fn bookmark(&self) -> Option<&Bookmark> {
        self.bookmark.as_ref()
    }

    /// 자동 커밋 여부
    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    /// 현재 상태
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// 활성 상태 여부
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// 종료 전인지
    pub(crate) fn is_open(&self) -> bool {
        !self.state.is_terminated()
    }

    /// 실패로 표시
    pub fn mark_as_failed(&mut self) {
        self.succeed = false;
    }

    /// 서버가 트랜잭션을 버림 (RESET 또는 연결 끊김)
    pub(crate) fn abandon(&mut self) {
        self.succeed = false;
        self.state = TransactionState::Closed;
    }
}

// ============================================================================
// SessionClient - 트랜잭션 API
// ============================================================================

impl<C: Connection> SessionClient<C> {
    fn has_active_transaction(&self) -> bool {
        self.current_transaction
            .as_ref()
            .is_some_and(Transaction::is_active)
    }

    /// BEGIN
    ///
    /// 서버가 BEGIN을 거부하면 트랜잭션은 버려지고 `DriverError::Transaction`을 돌려줍니다.
    pub async fn begin(&mut self, options: &TransactionOptions) -> DriverResult<()> {
        if self.has_active_transaction() {
            return Err(DriverError::transaction(
                "A transaction is already active on this session",
            ));
        }

        let mut query = Query::new("BEGIN");
        if let Some(bookmark) = &options.bookmark {
            query = query.with_param("bookmark", bookmark.value());
        }

        self.current_transaction = Some(Transaction::new(options.autocommit));
        match self.execute(query).await {
            Ok(result) if result.success => {
                if let Some(tx) = self.current_transaction.as_mut() {
                    tx.state = TransactionState::Active;
                }
                debug!(autocommit = options.autocommit, "Transaction started");
                Ok(())
            }
            Ok(result) => {
                self.current_transaction = None;
                let reason = result.failure.map(|f| f.to_string()).unwrap_or_default();
                warn!(%reason, "BEGIN rejected");
                Err(DriverError::transaction(format!("BEGIN rejected: {}", reason)))
            }
            Err(e) => {
                self.current_transaction = None;
                Err(e)
            }
        }
    }

    /// COMMIT
    ///
    /// 실패로 표시된 트랜잭션은 커밋 대신 롤백됩니다.
    pub async fn commit(&mut self) -> DriverResult<Transaction> {
        self.finish(true).await
    }

    /// ROLLBACK
    pub async fn rollback(&mut self) -> DriverResult<Transaction> {
        self.finish(false).await
    }

    async fn finish(&mut self, commit: bool) -> DriverResult<Transaction> {
        let commit = match self.current_transaction.as_mut() {
            Some(tx) if tx.is_active() => {
                let commit = commit && tx.succeed;
                tx.state = if commit {
                    TransactionState::Committing
                } else {
                    TransactionState::RollingBack
                };
                commit
            }
            _ => return Err(DriverError::transaction("No active transaction")),
        };

        let statement = if commit { "COMMIT" } else { "ROLLBACK" };
        debug!(statement, "Finishing transaction");
        let outcome = self.execute(statement).await;

        let Some(tx) = self.current_transaction.as_mut() else {
            return Err(DriverError::internal("Transaction lost while finishing"));
        };
        tx.state = TransactionState::Closed;
        match outcome {
            Ok(result) => {
                if !(commit && result.success) {
                    tx.succeed = false;
                }
                Ok(tx.clone())
            }
            Err(e) => {
                tx.succeed = false;
                Err(e)
            }
        }
    }

    /// 트랜잭션 안에서 작업 실행
    ///
    /// 자동 커밋 모드에서는 작업이 끝나면 `succeed`에 따라 COMMIT 또는 ROLLBACK을
    /// 보냅니다. 명시적 모드에서는 작업 안에서 `commit`/`rollback`을 호출해야
    /// 합니다. 작업이 에러를 돌려주면 두 모드 모두 롤백 후 그 에러를 전달합니다.
    ///
    /// ```ignore
    /// let (created, tx) = session
    ///     .execute_as_transaction(TransactionOptions::default(), |tx| {
    ///         Box::pin(async move {
    ///             let result = tx.execute("CREATE (n:T {foo: 'bar'})").await?;
    ///             if !result.success {
    ///                 tx.mark_as_failed();
    ///             }
    ///             Ok(result.stats.nodes_created)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn execute_as_transaction<T, F>(
        &mut self,
        options: TransactionOptions,
        work: F,
    ) -> DriverResult<(T, Transaction)>
    where
        F: for<'t> FnOnce(&'t mut TransactionScope<'t, C>) -> BoxFuture<'t, DriverResult<T>> + Send,
        T: Send,
    {
        self.begin(&options).await?;

        let outcome = {
            let mut scope = TransactionScope {
                session: &mut *self,
            };
            work(&mut scope).await
        };

        self.conclude(outcome).await
    }

    /// `execute_as_transaction`의 동기 버전
    ///
    /// 작업은 호출한 스레드에서 실행되고, 블록 안의 문장은
    /// [`BlockingTransactionScope`]를 통해 동기로 보냅니다.
    ///
    /// ```ignore
    /// let (created, tx) = session.execute_as_transaction_sync(TransactionOptions::default(), |tx| {
    ///     let result = tx.execute("CREATE (n:T {foo: 'bar'})")?;
    ///     Ok(result.stats.nodes_created)
    /// })?;
    /// ```
    pub fn execute_as_transaction_sync<T, F>(
        &mut self,
        options: TransactionOptions,
        work: F,
    ) -> DriverResult<(T, Transaction)>
    where
        F: FnOnce(&mut BlockingTransactionScope<'_, C>) -> DriverResult<T>,
    {
        blocking::wait(self.begin(&options))?;

        let outcome = work(&mut BlockingTransactionScope {
            scope: TransactionScope {
                session: &mut *self,
            },
        });

        blocking::wait(self.conclude(outcome))
    }

    /// 작업이 끝난 트랜잭션 정리
    async fn conclude<T>(&mut self, outcome: DriverResult<T>) -> DriverResult<(T, Transaction)> {
        match outcome {
            Ok(value) => {
                let pending = self
                    .current_transaction
                    .as_ref()
                    .filter(|tx| tx.autocommit && tx.is_active())
                    .map(Transaction::succeed);
                if let Some(succeed) = pending {
                    self.finish(succeed).await?;
                }
                let tx = self
                    .current_transaction
                    .clone()
                    .ok_or_else(|| DriverError::internal("Transaction lost after work"))?;
                Ok((value, tx))
            }
            Err(e) => {
                if let Some(tx) = self.current_transaction.as_mut() {
                    tx.mark_as_failed();
                }
                if self.has_active_transaction() {
                    if let Err(rollback_err) = self.finish(false).await {
                        warn!(error = %rollback_err, "Rollback after failed work failed");
                    }
                }
                Err(e)
            }
        }
    }
}

// ============================================================================
// TransactionScope - 작업 블록이 받는 핸들
// ============================================================================

/// 트랜잭션 작업 중 세션 접근
pub struct TransactionScope<'s, C: Connection> {
    session: &'s mut SessionClient<C>,
}

impl<'s, C: Connection> TransactionScope<'s, C> {
    /// 트랜잭션 안에서 쿼리 실행
    ///
    /// 트랜잭션이 이미 닫혔다면 (커밋, 롤백 또는 서버가 버림)
    /// 문장을 보내지 않고 `DriverError::Transaction`을 돌려줍니다.
    pub async fn execute(&mut self, query: impl Into<Query>) -> DriverResult<QueryResult> {
        if !self.session.has_active_transaction() {
            return Err(DriverError::transaction("Transaction is no longer active"));
        }
        self.session.execute(query).await
    }

    /// 현재 트랜잭션
    pub fn transaction(&self) -> Option<&Transaction> {
        self.session.current_transaction.as_ref()
    }

    /// 실패로 표시 (블록 종료 시 롤백)
    pub fn mark_as_failed(&mut self) {
        if let Some(tx) = self.session.current_transaction.as_mut() {
            tx.mark_as_failed();
        }
    }

    /// 명시적 커밋
    pub async fn commit(&mut self) -> DriverResult<Transaction> {
        self.session.commit().await
    }

    /// 명시적 롤백
    pub async fn rollback(&mut self) -> DriverResult<Transaction> {
        self.session.rollback().await
    }
}

// ============================================================================
// BlockingTransactionScope - 동기 작업 블록 핸들
// ============================================================================

/// 동기 트랜잭션 작업 중 세션 접근
pub struct BlockingTransactionScope<'s, C: Connection> {
    scope: TransactionScope<'s, C>,
}

impl<'s, C: Connection> BlockingTransactionScope<'s, C> {
    /// 트랜잭션 안에서 쿼리 실행
    pub fn execute(&mut self, query: impl Into<Query>) -> DriverResult<QueryResult> {
        blocking::wait(self.scope.execute(query))
    }

    /// 현재 트랜잭션
    pub fn transaction(&self) -> Option<&Transaction> {
        self.scope.transaction()
    }

    /// 실패로 표시 (블록 종료 시 롤백)
    pub fn mark_as_failed(&mut self) {
        self.scope.mark_as_failed();
    }

    /// 명시적 커밋
    pub fn commit(&mut self) -> DriverResult<Transaction> {
        blocking::wait(self.scope.commit())
    }

    /// 명시적 롤백
    pub fn rollback(&mut self) -> DriverResult<Transaction> {
        blocking::wait(self.scope.rollback())
    }
}

// ============================================================================
// Tests
// ============================================================================
