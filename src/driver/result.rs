//! Query and Query Result
//!
//! 실행할 쿼리와 한 번의 실행 결과

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::decoder;
use super::error::DriverResult;
use super::graph::{Node, Path, Relationship};
use super::record::Record;
use super::types::Value;
use crate::bolt::{FailureMessage, Request, ResponseBatch};

// ============================================================================
// Query - 쿼리
// ============================================================================

/// 쿼리 문장과 파라미터
///
/// 값은 항상 파라미터로 전달되고 문장에 직접 들어가지 않습니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// 쿼리 문장
    pub statement: String,
    /// 파라미터
    pub parameters: HashMap<String, Value>,
}

impl Query {
    /// 새 쿼리 생성
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: HashMap::new(),
        }
    }

    /// 파라미터 추가
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// 여러 파라미터 추가
    pub fn with_params(mut self, params: HashMap<String, Value>) -> Self {
        self.parameters.extend(params);
        self
    }

    /// RUN 요청으로 변환
    pub(crate) fn into_request(self) -> Request {
        Request::run(
            self.statement,
            self.parameters
                .into_iter()
                .map(|(k, v)| (k, v.into()))
                .collect(),
        )
    }
}

impl From<&str> for Query {
    fn from(statement: &str) -> Self {
        Query::new(statement)
    }
}

impl From<String> for Query {
    fn from(statement: String) -> Self {
        Query::new(statement)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.statement)
    }
}

// ============================================================================
// QueryStats - 쿼리 통계
// ============================================================================

/// 쓰기 통계 (응답에 없으면 0)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    /// 생성된 노드
    pub nodes_created: i64,
    /// 삭제된 노드
    pub nodes_deleted: i64,
    /// 생성된 관계
    pub relationships_created: i64,
    /// 삭제된 관계
    pub relationships_deleted: i64,
    /// 설정된 속성
    pub properties_set: i64,
    /// 추가된 레이블
    pub labels_added: i64,
    /// 제거된 레이블
    pub labels_removed: i64,
    /// 쿼리 타입 ("r", "w", "rw", "s")
    pub query_type: Option<String>,
    /// 첫 레코드까지 걸린 시간 (ms)
    pub result_available_after: Option<i64>,
    /// 마지막 레코드까지 걸린 시간 (ms)
    pub result_consumed_after: Option<i64>,
}

impl QueryStats {
    /// 변경 사항 여부
    pub fn contains_updates(&self) -> bool {
        self.nodes_created > 0
            || self.nodes_deleted > 0
            || self.relationships_created > 0
            || self.relationships_deleted > 0
            || self.properties_set > 0
            || self.labels_added > 0
            || self.labels_removed > 0
    }
}

// ============================================================================
// ServerFailure - 서버가 거부한 문장
// ============================================================================

/// 서버 실패 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFailure {
    /// 에러 코드
    pub code: String,
    /// 메시지
    pub message: String,
}

impl From<&FailureMessage> for ServerFailure {
    fn from(f: &FailureMessage) -> Self {
        Self {
            code: f.code.clone(),
            message: f.message.clone(),
        }
    }
}

impl fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// ============================================================================
// QueryResult - 쿼리 결과
// ============================================================================

/// 한 번의 쿼리 실행 결과
///
/// 노드/관계는 id 기준으로 중복 없이 모입니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// 서버가 문장을 받아들였는지
    pub success: bool,
    /// 거부된 경우 서버 응답
    pub failure: Option<ServerFailure>,
    /// 필드 이름
    pub fields: Vec<String>,
    /// 통계
    pub stats: QueryStats,
    /// id → 노드
    pub nodes: HashMap<i64, Node>,
    /// id → 관계
    pub relationships: HashMap<i64, Relationship>,
    /// 경로
    pub paths: Vec<Path>,
    /// 모든 레코드
    pub rows: Vec<Record>,
}

impl QueryResult {
    /// RUN 응답과 PULL_ALL 응답으로 결과 구성
    pub(crate) fn from_batches(run: &ResponseBatch, pull: &ResponseBatch) -> DriverResult<Self> {
        let fields = run
            .summaries()
            .find_map(|s| s.fields())
            .unwrap_or_default();
        let keys: Arc<[String]> = fields.clone().into();

        let mut result = Self {
            success: run.success && pull.success,
            failure: run
                .failure_message()
                .or_else(|| pull.failure_message())
                .map(ServerFailure::from),
            fields,
            stats: decoder::decode_stats(run.summaries().chain(pull.summaries())),
            ..Self::default()
        };

        for message in pull.records() {
            let record = Record::from_message(keys.clone(), message)?;
            for value in record.values() {
                result.absorb(value);
            }
            result.rows.push(record);
        }

        Ok(result)
    }

    fn absorb(&mut self, value: &Value) {
        match value {
            Value::Node(node) => {
                if let Some(id) = node.id {
                    self.nodes.entry(id).or_insert_with(|| node.clone());
                }
            }
            Value::Relationship(rel) => {
                if let Some(id) = rel.id {
                    self.relationships.entry(id).or_insert_with(|| rel.clone());
                }
            }
            Value::Path(path) => self.paths.push(path.clone()),
            Value::List(items) => items.iter().for_each(|v| self.absorb(v)),
            _ => {}
        }
    }

    /// 실패한 결과
    pub(crate) fn failed(failure: Option<ServerFailure>) -> Self {
        Self {
            success: false,
            failure,
            ..Self::default()
        }
    }

    /// 첫 행의 노드 값
    pub fn first_node(&self, field: &str) -> Option<&Node> {
        self.rows.first()?.get(field)?.as_node()
    }

    /// 첫 행의 관계 값
    pub fn first_relationship(&self, field: &str) -> Option<&Relationship> {
        self.rows.first()?.get(field)?.as_relationship()
    }

    /// 레코드 수
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 레코드 없음
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
