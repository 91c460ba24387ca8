//! # BoltGraph Driver
//!
//! A client-side Rust driver for graph databases that speak the Bolt protocol.
//!
//! ## Features
//!
//! - **Sessions** - One logical conversation per connection with the RUN / PULL_ALL cycle enforced
//! - **Transactions** - Explicit and autocommit transactions with bookmark chaining
//! - **Connection Pooling** - Bounded pool of sessions shared across tasks
//! - **Query Builder** - Node and relationship CRUD without hand-written statements
//! - **Record Decoding** - PackStream structures turned into typed nodes, relationships and paths
//! - **Async first** - Every network call is async; a blocking adapter covers synchronous callers
//!
//! The wire layer (sockets, TLS, chunking, PackStream bytes) sits behind the
//! [`bolt::Connection`] trait and is supplied by the caller.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use boltgraph_driver::{ClientConfig, ConnectionPool, GraphClient, Node, Query};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_uri("bolt://localhost:7687")?;
//!     let mut pool = ConnectionPool::new(config, 1..=8, |config: &ClientConfig| MyBoltConnection::new(config.address())).await?;
//!
//!     // Create a node
//!     let mut alice = Node::new(["Person"]).with_property("name", "Alice");
//!     pool.create_node(&mut alice).await?;
//!
//!     // Run a statement
//!     let result = pool.execute(Query::new("MATCH (n:Person) RETURN n")).await?;
//!     println!("{} people", result.nodes.len());
//!
//!     pool.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! ```rust,ignore
//! # use boltgraph_driver::{TransactionalClient, TransactionOptions, Query};
//! let (created, tx) = pool
//!     .execute_as_transaction(TransactionOptions::explicit(), |tx| {
//!         Box::pin(async move {
//!             let result = tx.execute(Query::new("CREATE (n:Node) RETURN n")).await?;
//!             tx.commit().await?;
//!             Ok(result.stats.nodes_created)
//!         })
//!     })
//!     .await?;
//! println!("bookmark: {:?}", tx.bookmark());
//!
//! // Outside an async context
//! let (created, _) = pool.execute_as_transaction_sync(TransactionOptions::default(), |tx| {
//!     Ok(tx.execute("CREATE (n:Node)")?.stats.nodes_created)
//! })?;
//! ```
//!
//! ## Error Handling
//!
//! Transport and usage failures are [`DriverError`]s. A statement the server
//! rejects is not an error: it comes back as a [`QueryResult`] with
//! `success == false` and the server's failure attached.
//!
//! ## Modules
//!
//! - [`driver`] - Sessions, transactions, pool, query builder and decoder
//! - [`bolt`] - The connection seam and the message/value model it carries
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;
pub mod driver;

// Re-exports for convenience
pub use driver::{
    BlockingTransactionScope, Bookmark, ClientConfig, ClientConfigBuilder, ConnectionPool,
    DriverError, DriverResult, GraphClient, Node, Path, PendingQuery, PooledSession, Query,
    QueryResult, QueryStats, Record, Relationship, ServerAddress, SessionClient, Transaction,
    TransactionOptions, TransactionScope, TransactionalClient, Value,
};

pub use bolt::{BoltError, Connection, PackStreamValue};
