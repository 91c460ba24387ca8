//! Blocking and callback adapters
//!
//! 모든 네트워크 작업은 async 하나로만 구현되고, 동기 API와 콜백 API는
//! 이 두 어댑터로 만들어집니다.
//!
//! - [`wait`]: 호출한 스레드만 막고 결과를 기다림
//! - [`spawn_with_callback`]: 런타임에서 실행하고 완료 시 콜백 호출

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tokio::task::JoinHandle;
use tracing::debug;

use super::error::{DriverError, DriverResult};

/// 런타임 밖의 동기 호출이 함께 쓰는 런타임
///
/// 연결이 등록한 소켓, 타이머, 백그라운드 태스크는 이 런타임에 묶이므로
/// 호출이 끝나도 살아 있어야 합니다.
static SHARED_RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn shared_runtime() -> DriverResult<&'static Runtime> {
    if let Some(runtime) = SHARED_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .thread_name("boltgraph-blocking")
        .build()?;
    debug!("Shared blocking runtime started");
    // 동시에 만들었다면 먼저 들어간 쪽이 남음
    Ok(SHARED_RUNTIME.get_or_init(|| runtime))
}

/// 호출 스레드에서 future가 끝날 때까지 대기
///
/// - 멀티스레드 런타임 안: `block_in_place`로 현재 워커만 양보
/// - 런타임 밖: 프로세스 전체가 공유하는 멀티스레드 런타임에서 실행
/// - current-thread 런타임 안: 교착 상태가 되므로 `DriverError::Internal`
pub fn wait<T, F>(future: F) -> DriverResult<T>
where
    F: Future<Output = DriverResult<T>>,
{
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(DriverError::internal(
                "Blocking call inside a current-thread runtime would deadlock; use the async API",
            )),
            _ => tokio::task::block_in_place(|| handle.block_on(future)),
        },
        Err(_) => shared_runtime()?.block_on(future),
    }
}

/// 현재 런타임에서 실행하고 완료되면 콜백 호출
pub fn spawn_with_callback<T, F, C>(future: F, callback: C) -> DriverResult<JoinHandle<()>>
where
    F: Future<Output = DriverResult<T>> + Send + 'static,
    T: Send + 'static,
    C: FnOnce(DriverResult<T>) + Send + 'static,
{
    let handle = Handle::try_current()
        .map_err(|_| DriverError::internal("Callback API requires a running Tokio runtime"))?;
    Ok(handle.spawn(async move { callback(future.await) }))
}

// ============================================================================
// Tests
// ============================================================================
