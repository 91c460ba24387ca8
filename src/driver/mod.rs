//! Driver Module
//!
//! Bolt 그래프 서버용 클라이언트 SDK
//!
//! # 구성
//!
//! - 세션 (SessionClient, PendingQuery, Bookmark)
//! - 트랜잭션 (Transaction, TransactionOptions, TransactionScope, BlockingTransactionScope)
//! - 연결 풀 (ConnectionPool, PooledSession, PoolMetrics)
//! - 쿼리 빌더 (노드/관계 CRUD와 검색 문장 생성)
//! - 레코드 디코더 (PackStream 구조체 → Node, Relationship, Path)
//!
//! 네트워크 작업은 async로 한 번만 구현되고, 동기 API는 [`blocking`]
//! 어댑터를 거칩니다.
//!
//! # Example
//!
//! ```ignore
//! use boltgraph_driver::driver::{ClientConfig, ConnectionPool, GraphClient, Node};
//!
//! let config = ClientConfig::builder()
//!     .with_hostname("localhost")
//!     .with_port(7687)
//!     .with_credentials("neo4j", "password")
//!     .build();
//! let mut pool = ConnectionPool::new(config, 1..=4, |config: &ClientConfig| MyBoltConnection::new(config.address())).await?;
//!
//! // 노드 생성
//! let mut alice = Node::new(["Person"]);
//! alice.set_property("name", "Alice");
//! pool.create_node(&mut alice).await?;
//!
//! // 쿼리 실행
//! let result = pool
//!     .execute(Query::new("MATCH (n:Person) WHERE n.name = $name RETURN n")
//!         .with_params(params! {"name" => "Alice"}))
//!     .await?;
//! for record in &result.rows {
//!     println!("{}", record);
//! }
//!
//! // 트랜잭션
//! let (count, tx) = pool
//!     .execute_as_transaction(TransactionOptions::explicit(), |tx| Box::pin(async move {
//!         tx.execute(Query::new("CREATE (n:Person {name: $name})").with_param("name", "Bob")).await?;
//!         tx.commit().await?;
//!         Ok(1)
//!     }))
//!     .await?;
//! ```

pub mod blocking;
pub mod decoder;
pub mod query_builder;
mod client;
mod config;
mod error;
mod graph;
mod pool;
mod record;
mod result;
mod session;
mod transaction;
mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use client::{GraphClient, TransactionalClient};
pub use config::{ClientConfig, ClientConfigBuilder, ServerAddress, DEFAULT_PORT};
pub use error::{DriverError, DriverResult};
pub use graph::{Node, Path, PathSegment, PendingEdits, Relationship, RelationshipDirection, UnboundRelationship};
pub use pool::{ConnectionFactory, ConnectionPool, PoolMetrics, PooledSession};
pub use query_builder::{NodeSearch, RelationshipSearch};
pub use record::Record;
pub use result::{Query, QueryResult, QueryStats, ServerFailure};
pub use session::{Bookmark, PendingQuery, SessionClient};
pub use transaction::{
    BlockingTransactionScope, Transaction, TransactionOptions, TransactionScope, TransactionState,
};
pub use types::Value;

/// 파라미터 맵 생성 매크로
#[macro_export]
macro_rules! params {
    () => {
        std::collections::HashMap::<String, $crate::driver::Value>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = std::collections::HashMap::<String, $crate::driver::Value>::new();
        $(
            map.insert($key.into(), $crate::driver::Value::from($value));
        )+
        map
    }};
}
