//! Connection Pool
//!
//! 세션을 빌려주는 고정 상한 연결 풀
//!
//! # 구조
//!
//! - 세마포어 (상한 `max`): 동시에 빌려준 세션 수 제한
//! - 엔트리 목록 (Mutex): 세션과 `in_use` 플래그
//!
//! 생성 시 `min`개를 미리 연결하고, 빈 엔트리가 없으면 `max`까지 늘어납니다.
//! 빌린 세션([`PooledSession`])은 drop될 때 자동으로 반환됩니다.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut, RangeInclusive};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as SessionLock, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use super::blocking;
use super::client::{GraphClient, TransactionalClient};
use super::config::ClientConfig;
use super::error::{DriverError, DriverResult};
use super::result::{Query, QueryResult};
use super::session::SessionClient;
use super::transaction::{BlockingTransactionScope, Transaction, TransactionOptions, TransactionScope};
use crate::bolt::Connection;

// ============================================================================
// ConnectionFactory - 연결 생성기
// ============================================================================

/// 풀이 새 세션을 만들 때 쓰는 연결 생성기
///
/// `Fn(&ClientConfig) -> C` 클로저도 생성기입니다.
pub trait ConnectionFactory<C>: Send + Sync + 'static {
    /// 연결되지 않은 새 연결 생성
    fn create(&self, config: &ClientConfig) -> C;
}

impl<C, F> ConnectionFactory<C> for F
where
    F: Fn(&ClientConfig) -> C + Send + Sync + 'static,
{
    fn create(&self, config: &ClientConfig) -> C {
        self(config)
    }
}

// ============================================================================
// PoolMetrics - 풀 메트릭
// ============================================================================

/// 풀 메트릭
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// 현재 크기
    pub size: usize,
    /// 유휴 세션 수
    pub idle: usize,
    /// 사용 중인 세션 수
    pub in_use: usize,
    /// 최대 크기
    pub max: usize,
    /// 총 획득 횟수
    pub total_acquisitions: u64,
    /// 총 생성 횟수
    pub total_created: u64,
}

// ============================================================================
// Pool internals
// ============================================================================

struct PoolEntry<C: Connection> {
    id: u64,
    session: Arc<SessionLock<SessionClient<C>>>,
    in_use: bool,
}

struct PoolShared<C: Connection> {
    config: ClientConfig,
    factory: Box<dyn ConnectionFactory<C>>,
    /// 세마포어 (동시 사용 상한)
    semaphore: Arc<Semaphore>,
    entries: Mutex<Vec<PoolEntry<C>>>,
    max: usize,
    next_id: AtomicU64,
    total_acquisitions: AtomicU64,
    total_created: AtomicU64,
    /// 열린 상태
    open: RwLock<bool>,
}

impl<C: Connection> PoolShared<C> {
    /// 새 세션 생성 후 연결
    ///
    /// 연결에 실패해도 세션은 돌려주고, 실패는 첫 사용 때 드러납니다.
    async fn open_session(&self) -> SessionClient<C> {
        let mut session = SessionClient::new(self.config.clone(), self.factory.create(&self.config));
        match session.connect().await {
            Ok(true) => {}
            Ok(false) => warn!("Pool session rejected by server: {}", self.config.address()),
            Err(e) => warn!("Pool connection failed: {}", e),
        }
        self.total_created.fetch_add(1, Ordering::Relaxed);
        session
    }

    fn push_entry(&self, session: SessionClient<C>, in_use: bool) -> (u64, Arc<SessionLock<SessionClient<C>>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(SessionLock::new(session));
        self.entries.lock().push(PoolEntry {
            id,
            session: session.clone(),
            in_use,
        });
        (id, session)
    }

    /// 빈 엔트리 점유
    fn claim_free(&self) -> Option<(u64, Arc<SessionLock<SessionClient<C>>>)> {
        let mut entries = self.entries.lock();
        let entry = entries.iter_mut().find(|e| !e.in_use)?;
        entry.in_use = true;
        Some((entry.id, entry.session.clone()))
    }

    fn release_entry(&self, entry_id: u64) {
        let open = *self.open.read();
        let mut entries = self.entries.lock();
        if let Some(index) = entries.iter().position(|e| e.id == entry_id) {
            if open {
                entries[index].in_use = false;
            } else {
                entries.swap_remove(index);
            }
        }
    }
}

// ============================================================================
// PooledSession - 빌린 세션
// ============================================================================

/// 엔트리 반환 표시. 세션 잠금이 풀린 뒤에 drop됩니다.
struct EntryRelease<C: Connection> {
    shared: Arc<PoolShared<C>>,
    entry_id: u64,
}

impl<C: Connection> Drop for EntryRelease<C> {
    fn drop(&mut self) {
        self.shared.release_entry(self.entry_id);
    }
}

/// 풀에서 빌린 세션
///
/// drop되면 풀로 돌아가고 대기 중인 `acquire` 하나가 깨어납니다.
pub struct PooledSession<C: Connection> {
    // 필드 순서 = drop 순서: 세션 잠금 해제, 엔트리 반환, 세마포어 반환
    session: OwnedMutexGuard<SessionClient<C>>,
    release: EntryRelease<C>,
    _permit: OwnedSemaphorePermit,
}

impl<C: Connection> PooledSession<C> {
    /// 풀 엔트리 id
    pub fn entry_id(&self) -> u64 {
        self.release.entry_id
    }

    /// 반환 전에 열린 트랜잭션 롤백
    async fn roll_back_left_open(&mut self) {
        if self.current_transaction().is_some_and(Transaction::is_active) {
            warn!("Transaction left open on pooled session {}, rolling back", self.entry_id());
            if let Err(e) = self.rollback().await {
                warn!("Rollback before release failed: {}", e);
            }
        }
    }
}

impl<C: Connection> Deref for PooledSession<C> {
    type Target = SessionClient<C>;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl<C: Connection> DerefMut for PooledSession<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl<C: Connection> fmt::Debug for PooledSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("entry_id", &self.release.entry_id)
            .field("session", &*self.session)
            .finish()
    }
}

// ============================================================================
// ConnectionPool - 연결 풀
// ============================================================================

/// 연결 풀
///
/// 복제본은 같은 풀을 공유합니다.
pub struct ConnectionPool<C: Connection> {
    shared: Arc<PoolShared<C>>,
}

impl<C: Connection> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: Connection> ConnectionPool<C> {
    /// 새 연결 풀 생성
    ///
    /// `sizes.start()`개의 세션을 미리 만들어 연결합니다.
    pub async fn new(
        config: ClientConfig,
        sizes: RangeInclusive<usize>,
        factory: impl ConnectionFactory<C>,
    ) -> DriverResult<Self> {
        let (min, max) = (*sizes.start(), *sizes.end());
        if max == 0 || min > max {
            return Err(DriverError::configuration(format!(
                "Invalid pool size range {}..={}",
                min, max
            )));
        }

        let pool = Self {
            shared: Arc::new(PoolShared {
                config,
                factory: Box::new(factory),
                semaphore: Arc::new(Semaphore::new(max)),
                entries: Mutex::new(Vec::with_capacity(max)),
                max,
                next_id: AtomicU64::new(1),
                total_acquisitions: AtomicU64::new(0),
                total_created: AtomicU64::new(0),
                open: RwLock::new(true),
            }),
        };

        for _ in 0..min {
            let session = pool.shared.open_session().await;
            pool.shared.push_entry(session, false);
        }
        debug!(min, max, address = %pool.shared.config.address(), "Connection pool created");
        Ok(pool)
    }

    /// 설정
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// 세션 획득
    ///
    /// `max`개가 모두 사용 중이면 반환될 때까지 기다립니다. 연결이 끊긴 세션은
    /// 다시 연결을 시도하고, 실패하면 세션 사용 시 에러가 납니다. 이전 사용자가
    /// 결과를 비우지 않고 반환한 세션은 RESET으로 비운 뒤 빌려줍니다.
    pub async fn acquire(&self) -> DriverResult<PooledSession<C>> {
        if !*self.shared.open.read() {
            return Err(DriverError::pool("Pool is closed"));
        }

        let permit = self
            .shared
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DriverError::pool("Pool is closed"))?;

        let (entry_id, session) = match self.shared.claim_free() {
            Some(claimed) => claimed,
            None => {
                let session = self.shared.open_session().await;
                let claimed = self.shared.push_entry(session, true);
                debug!(entry = claimed.0, "Connection pool grew");
                claimed
            }
        };

        let release = EntryRelease {
            shared: self.shared.clone(),
            entry_id,
        };
        let guard = session
            .try_lock_owned()
            .map_err(|_| DriverError::internal("Claimed pool session is still locked"))?;
        let mut lease = PooledSession {
            session: guard,
            release,
            _permit: permit,
        };
        self.shared.total_acquisitions.fetch_add(1, Ordering::Relaxed);

        if !lease.is_connected() {
            match lease.connect().await {
                Ok(true) => debug!(entry = entry_id, "Pool session reconnected"),
                Ok(false) => warn!("Pool session rejected by server: {}", self.shared.config.address()),
                Err(e) => warn!("Pool reconnect failed: {}", e),
            }
        } else if lease.has_pending_result() {
            warn!(entry = entry_id, "Pool session returned with an unconsumed result, resetting");
            if let Err(e) = lease.reset().await {
                warn!("Pool session reset failed: {}", e);
            }
        }
        Ok(lease)
    }

    /// 세션 반환 (drop과 같음)
    pub fn release(&self, lease: PooledSession<C>) {
        drop(lease);
    }

    /// 세션 하나를 빌려 쿼리 실행
    pub async fn execute(&self, query: impl Into<Query>) -> DriverResult<QueryResult> {
        let mut lease = self.acquire().await?;
        lease.execute(query).await
    }

    /// `execute`의 동기 버전
    pub fn execute_sync(&self, query: impl Into<Query>) -> DriverResult<QueryResult> {
        blocking::wait(self.execute(query))
    }

    /// 세션 하나를 빌려 동기 트랜잭션 실행
    ///
    /// 작업은 호출한 스레드에서 실행됩니다. 명시적 모드에서 작업이 커밋하지 않고
    /// 끝나면 세션을 돌려주기 전에 롤백합니다.
    pub fn execute_as_transaction_sync<T, F>(
        &self,
        options: TransactionOptions,
        work: F,
    ) -> DriverResult<(T, Transaction)>
    where
        F: FnOnce(&mut BlockingTransactionScope<'_, C>) -> DriverResult<T>,
    {
        let mut lease = blocking::wait(self.acquire())?;
        let outcome = lease.execute_as_transaction_sync(options, work);
        blocking::wait(async {
            lease.roll_back_left_open().await;
            Ok::<_, DriverError>(())
        })?;
        outcome
    }

    /// 메트릭
    pub fn metrics(&self) -> PoolMetrics {
        let entries = self.shared.entries.lock();
        let in_use = entries.iter().filter(|e| e.in_use).count();
        PoolMetrics {
            size: entries.len(),
            idle: entries.len() - in_use,
            in_use,
            max: self.shared.max,
            total_acquisitions: self.shared.total_acquisitions.load(Ordering::Relaxed),
            total_created: self.shared.total_created.load(Ordering::Relaxed),
        }
    }

    /// 풀 열림 여부
    pub fn is_open(&self) -> bool {
        *self.shared.open.read()
    }

    /// 풀 닫기
    ///
    /// 유휴 세션은 바로 연결을 끊고, 빌려준 세션은 반환될 때 버려집니다.
    /// 대기 중인 `acquire`는 에러를 받습니다.
    pub async fn close(&self) {
        {
            let mut open = self.shared.open.write();
            if !*open {
                return;
            }
            *open = false;
        }
        self.shared.semaphore.close();

        let idle: Vec<PoolEntry<C>> = {
            let mut entries = self.shared.entries.lock();
            let (idle, busy): (Vec<_>, Vec<_>) = entries.drain(..).partition(|e| !e.in_use);
            *entries = busy;
            idle
        };

        for entry in idle {
            let mut session = entry.session.lock().await;
            if let Err(e) = session.disconnect().await {
                warn!("Failed to close pooled session: {}", e);
            }
        }
        debug!("Connection pool closed");
    }
}

impl<C: Connection> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("address", &self.shared.config.address())
            .field("open", &self.is_open())
            .field("metrics", &self.metrics())
            .finish()
    }
}

// ============================================================================
// Client traits
// ============================================================================

impl<C: Connection> GraphClient for ConnectionPool<C> {
    fn execute(&mut self, query: Query) -> impl Future<Output = DriverResult<QueryResult>> + Send {
        ConnectionPool::execute(self, query)
    }
}

impl<C: Connection> TransactionalClient for ConnectionPool<C> {
    type Connection = C;

    /// 세션 하나를 빌려 트랜잭션 실행
    ///
    /// 명시적 모드에서 작업이 커밋하지 않고 끝나면 세션을 돌려주기 전에 롤백합니다.
    fn execute_as_transaction<T, F>(
        &mut self,
        options: TransactionOptions,
        work: F,
    ) -> impl Future<Output = DriverResult<(T, Transaction)>> + Send
    where
        F: for<'t> FnOnce(&'t mut TransactionScope<'t, C>) -> BoxFuture<'t, DriverResult<T>> + Send,
        T: Send,
    {
        async move {
            let mut lease = self.acquire().await?;
            let outcome = lease.execute_as_transaction(options, work).await;
            lease.roll_back_left_open().await;
            outcome
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
