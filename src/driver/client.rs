//! Graph Client capability set
//!
//! 쿼리 실행, 트랜잭션, 노드/관계 CRUD를 할 수 있는 모든 것
//!
//! [`GraphClient`]는 `execute` 하나만 구현하면 나머지 CRUD/검색 메서드를
//! 기본 구현으로 얻습니다. 세션, 트랜잭션 블록, 연결 풀이 같은 인터페이스로
//! 쓰입니다.

use std::future::Future;

use super::error::DriverResult;
use super::graph::{Node, Relationship};
use super::query_builder::{self, NodeSearch, RelationshipSearch, NODE_ALIAS, REL_ALIAS};
use super::result::{Query, QueryResult};
use super::session::SessionClient;
use super::transaction::{Transaction, TransactionOptions, TransactionScope};
use crate::bolt::Connection;
use futures::future::BoxFuture;

fn returned_node_id(result: &QueryResult, field: &str) -> Option<i64> {
    result.rows.first()?.get(field)?.as_node()?.id
}

fn returned_relationship_id(result: &QueryResult, field: &str) -> Option<i64> {
    result.rows.first()?.get(field)?.as_relationship()?.id
}

// ============================================================================
// GraphClient - 쿼리와 CRUD
// ============================================================================

/// 쿼리를 실행할 수 있는 클라이언트
///
/// 쓰기 메서드는 서버가 문장을 받아들였을 때만 엔티티의 변경 사항을 비우고
/// 새 id를 기록합니다. 거부되면 `Ok(false)`를 돌려주고 엔티티는 그대로입니다.
pub trait GraphClient: Send {
    /// 쿼리 실행
    fn execute(&mut self, query: Query) -> impl Future<Output = DriverResult<QueryResult>> + Send;

    /// 노드 생성 후 서버가 준 id 기록
    fn create_node(&mut self, node: &mut Node) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            let result = self.execute(query_builder::create_node(node, true)).await?;
            match returned_node_id(&result, NODE_ALIAS) {
                Some(id) if result.success => {
                    node.id = Some(id);
                    node.clear_edits();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    /// 노드 생성 후 서버의 사본 반환
    fn create_and_return_node(&mut self, node: &Node) -> impl Future<Output = DriverResult<Option<Node>>> + Send {
        async move {
            let result = self.execute(query_builder::create_node(node, true)).await?;
            Ok(result.first_node(NODE_ALIAS).cloned())
        }
    }

    /// 여러 노드를 한 문장으로 생성
    fn create_nodes(&mut self, nodes: &mut [Node]) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            let result = self.execute(query_builder::create_nodes(nodes)?).await?;
            if !result.success {
                return Ok(false);
            }
            for (i, node) in nodes.iter_mut().enumerate() {
                if let Some(id) = returned_node_id(&result, &format!("{}{}", NODE_ALIAS, i)) {
                    node.id = Some(id);
                    node.clear_edits();
                }
            }
            Ok(true)
        }
    }

    /// 변경 사항 반영. 변경이 없으면 서버에 보내지 않음
    fn update_node(&mut self, node: &mut Node) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            if node.edits().is_empty() {
                return Ok(true);
            }
            let result = self.execute(query_builder::update_node(node)?).await?;
            if result.success {
                node.clear_edits();
            }
            Ok(result.success)
        }
    }

    /// 여러 노드의 변경 사항 반영
    fn update_nodes(&mut self, nodes: &mut [Node]) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            if nodes.iter().all(|n| n.edits().is_empty()) {
                return Ok(true);
            }
            let result = self.execute(query_builder::update_nodes(nodes)?).await?;
            if result.success {
                nodes.iter_mut().for_each(Node::clear_edits);
            }
            Ok(result.success)
        }
    }

    /// 노드 삭제 (연결된 관계 포함)
    fn delete_node(&mut self, node: &Node) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            let result = self.execute(query_builder::delete_node(node)?).await?;
            Ok(result.success)
        }
    }

    /// 여러 노드 삭제
    fn delete_nodes(&mut self, nodes: &[Node]) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            let result = self.execute(query_builder::delete_nodes(nodes)?).await?;
            Ok(result.success)
        }
    }

    /// id로 노드 조회
    fn node_by_id(&mut self, id: i64) -> impl Future<Output = DriverResult<Option<Node>>> + Send {
        async move {
            let result = self.execute(query_builder::node_by_id(id)).await?;
            Ok(result.first_node(NODE_ALIAS).cloned())
        }
    }

    /// 레이블/속성으로 노드 검색
    fn nodes_with(&mut self, search: &NodeSearch) -> impl Future<Output = DriverResult<QueryResult>> + Send {
        async move { self.execute(query_builder::find_nodes(search)).await }
    }

    /// 관계 생성 후 서버가 준 id 기록
    fn create_relationship(&mut self, rel: &mut Relationship) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            let result = self.execute(query_builder::create_relationship(rel)?).await?;
            match returned_relationship_id(&result, REL_ALIAS) {
                Some(id) if result.success => {
                    rel.id = Some(id);
                    rel.clear_edits();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    /// 여러 관계를 한 문장으로 생성
    fn create_relationships(&mut self, rels: &mut [Relationship]) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            let result = self.execute(query_builder::create_relationships(rels)?).await?;
            if !result.success {
                return Ok(false);
            }
            for (i, rel) in rels.iter_mut().enumerate() {
                if let Some(id) = returned_relationship_id(&result, &format!("{}{}", REL_ALIAS, i)) {
                    rel.id = Some(id);
                    rel.clear_edits();
                }
            }
            Ok(true)
        }
    }

    /// 관계 변경 사항 반영
    fn update_relationship(&mut self, rel: &mut Relationship) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            if rel.edits().is_empty() {
                return Ok(true);
            }
            let result = self.execute(query_builder::update_relationship(rel)?).await?;
            if result.success {
                rel.clear_edits();
            }
            Ok(result.success)
        }
    }

    /// 관계 삭제
    fn delete_relationship(&mut self, rel: &Relationship) -> impl Future<Output = DriverResult<bool>> + Send {
        async move {
            let result = self.execute(query_builder::delete_relationship(rel)?).await?;
            Ok(result.success)
        }
    }

    /// id로 관계 조회
    fn relationship_by_id(&mut self, id: i64) -> impl Future<Output = DriverResult<Option<Relationship>>> + Send {
        async move {
            let result = self.execute(query_builder::relationship_by_id(id)).await?;
            Ok(result.first_relationship(REL_ALIAS).cloned())
        }
    }

    /// 타입/속성으로 관계 검색
    fn relationships_with(
        &mut self,
        search: &RelationshipSearch,
    ) -> impl Future<Output = DriverResult<QueryResult>> + Send {
        async move { self.execute(query_builder::find_relationships(search)).await }
    }
}

// ============================================================================
// TransactionalClient - 트랜잭션 블록
// ============================================================================

/// 트랜잭션 블록을 실행할 수 있는 클라이언트
pub trait TransactionalClient: GraphClient {
    /// 하부 연결 타입
    type Connection: Connection;

    /// 트랜잭션 안에서 작업 실행
    fn execute_as_transaction<T, F>(
        &mut self,
        options: TransactionOptions,
        work: F,
    ) -> impl Future<Output = DriverResult<(T, Transaction)>> + Send
    where
        F: for<'t> FnOnce(&'t mut TransactionScope<'t, Self::Connection>) -> BoxFuture<'t, DriverResult<T>>
            + Send,
        T: Send;
}

// ============================================================================
// Implementations
// ============================================================================

impl<C: Connection> GraphClient for SessionClient<C> {
    fn execute(&mut self, query: Query) -> impl Future<Output = DriverResult<QueryResult>> + Send {
        SessionClient::execute(self, query)
    }
}

impl<C: Connection> TransactionalClient for SessionClient<C> {
    type Connection = C;

    fn execute_as_transaction<T, F>(
        &mut self,
        options: TransactionOptions,
        work: F,
    ) -> impl Future<Output = DriverResult<(T, Transaction)>> + Send
    where
        F: for<'t> FnOnce(&'t mut TransactionScope<'t, C>) -> BoxFuture<'t, DriverResult<T>> + Send,
        T: Send,
    {
        SessionClient::execute_as_transaction(self, options, work)
    }
}

impl<'s, C: Connection> GraphClient for TransactionScope<'s, C> {
    fn execute(&mut self, query: Query) -> impl Future<Output = DriverResult<QueryResult>> + Send {
        TransactionScope::execute(self, query)
    }
}

// ============================================================================
// Tests
// ============================================================================
