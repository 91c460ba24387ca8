//! Graph Entities
//!
//! 노드, 관계, 경로와 변경 추적(PendingEdits)
//!
//! 클라이언트에서 만든 엔티티는 `id`가 없고, 서버가 생성 응답에서
//! 부여한 id를 받은 뒤부터 변경 사항이 `PendingEdits`에 쌓입니다.
//! 쓰기가 성공하면 `clear_edits()`로 비웁니다.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{DriverError, DriverResult};
use super::types::Value;

// ============================================================================
// PendingEdits - 변경 추적
// ============================================================================

/// 마지막 동기화 이후의 변경 사항
///
/// 같은 레이블/키에 대해서는 마지막 연산만 남습니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingEdits {
    added_labels: Vec<String>,
    removed_labels: Vec<String>,
    updated_properties: BTreeMap<String, Value>,
    removed_property_keys: Vec<String>,
}

impl PendingEdits {
    /// 추가된 레이블
    pub fn added_labels(&self) -> &[String] {
        &self.added_labels
    }

    /// 제거된 레이블
    pub fn removed_labels(&self) -> &[String] {
        &self.removed_labels
    }

    /// 변경된 속성 (키 순서)
    pub fn updated_properties(&self) -> &BTreeMap<String, Value> {
        &self.updated_properties
    }

    /// 제거된 속성 키
    pub fn removed_property_keys(&self) -> &[String] {
        &self.removed_property_keys
    }

    /// SET 절이 필요한지
    pub fn has_set(&self) -> bool {
        !self.added_labels.is_empty() || !self.updated_properties.is_empty()
    }

    /// REMOVE 절이 필요한지
    pub fn has_remove(&self) -> bool {
        !self.removed_labels.is_empty() || !self.removed_property_keys.is_empty()
    }

    /// 변경 없음
    pub fn is_empty(&self) -> bool {
        !self.has_set() && !self.has_remove()
    }

    pub(crate) fn add_label(&mut self, label: &str) {
        self.removed_labels.retain(|l| l != label);
        if !self.added_labels.iter().any(|l| l == label) {
            self.added_labels.push(label.to_string());
        }
    }

    pub(crate) fn remove_label(&mut self, label: &str) {
        self.added_labels.retain(|l| l != label);
        if !self.removed_labels.iter().any(|l| l == label) {
            self.removed_labels.push(label.to_string());
        }
    }

    pub(crate) fn set_property(&mut self, key: &str, value: Value) {
        self.removed_property_keys.retain(|k| k != key);
        self.updated_properties.insert(key.to_string(), value);
    }

    pub(crate) fn remove_property(&mut self, key: &str) {
        self.updated_properties.remove(key);
        if !self.removed_property_keys.iter().any(|k| k == key) {
            self.removed_property_keys.push(key.to_string());
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Node - 그래프 노드
// ============================================================================

/// 그래프 노드
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// 노드 ID (생성 전에는 None)
    pub id: Option<i64>,
    /// 레이블
    pub labels: Vec<String>,
    /// 속성
    pub properties: HashMap<String, Value>,
    #[serde(skip)]
    edits: PendingEdits,
}

impl Node {
    /// 아직 생성되지 않은 노드
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// 서버에서 받은 노드
    pub fn with_id(id: i64, labels: Vec<String>, properties: HashMap<String, Value>) -> Self {
        Self {
            id: Some(id),
            labels,
            properties,
            edits: PendingEdits::default(),
        }
    }

    /// 생성 전 속성 지정 (변경 추적 없음)
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// 레이블 포함 여부
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// 속성 가져오기
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// 속성 가져오기 (타입 변환)
    pub fn get_as<T: TryFrom<Value, Error = DriverError>>(&self, key: &str) -> DriverResult<T> {
        self.properties
            .get(key)
            .cloned()
            .ok_or_else(|| DriverError::type_conversion(format!("Property '{}' not found", key)))
            .and_then(T::try_from)
    }

    /// 레이블 추가
    pub fn add_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        if !self.has_label(&label) {
            self.labels.push(label.clone());
        }
        self.edits.add_label(&label);
    }

    /// 레이블 제거
    pub fn remove_label(&mut self, label: &str) {
        self.labels.retain(|l| l != label);
        self.edits.remove_label(label);
    }

    /// 속성 설정
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.edits.set_property(&key, value.clone());
        self.properties.insert(key, value);
    }

    /// 속성 제거
    pub fn remove_property(&mut self, key: &str) {
        self.properties.remove(key);
        self.edits.remove_property(key);
    }

    /// 변경 사항
    pub fn edits(&self) -> &PendingEdits {
        &self.edits
    }

    /// 쓰기 성공 후 변경 사항 비우기
    pub fn clear_edits(&mut self) {
        self.edits.clear();
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = if self.labels.is_empty() {
            String::new()
        } else {
            format!(":{}", self.labels.join(":"))
        };
        match self.id {
            Some(id) => write!(f, "({}{})", id, labels),
            None => write!(f, "(new{})", labels),
        }
    }
}

// ============================================================================
// Relationship - 그래프 관계
// ============================================================================

/// 관계 방향 (쿼리 생성에만 사용)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipDirection {
    /// `(from)-[]->(to)`
    #[default]
    From,
    /// `(from)<-[]-(to)`
    To,
}

/// 그래프 관계
///
/// 양 끝 노드 id는 생성 시점에 고정됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// 관계 ID (생성 전에는 None)
    pub id: Option<i64>,
    from_node_id: Option<i64>,
    to_node_id: Option<i64>,
    /// 타입
    #[serde(rename = "type")]
    pub rel_type: String,
    /// 방향
    pub direction: RelationshipDirection,
    /// 속성
    pub properties: HashMap<String, Value>,
    #[serde(skip)]
    edits: PendingEdits,
}

impl Relationship {
    /// 아직 생성되지 않은 관계
    pub fn new(from_node_id: Option<i64>, to_node_id: Option<i64>, rel_type: impl Into<String>) -> Self {
        Self {
            id: None,
            from_node_id,
            to_node_id,
            rel_type: rel_type.into(),
            direction: RelationshipDirection::From,
            properties: HashMap::new(),
            edits: PendingEdits::default(),
        }
    }

    /// 두 노드 사이의 관계
    pub fn between(from: &Node, to: &Node, rel_type: impl Into<String>) -> Self {
        Self::new(from.id, to.id, rel_type)
    }

    /// 서버에서 받은 관계
    pub fn with_id(
        id: i64,
        from_node_id: i64,
        to_node_id: i64,
        rel_type: impl Into<String>,
        properties: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: Some(id),
            properties,
            ..Self::new(Some(from_node_id), Some(to_node_id), rel_type)
        }
    }

    /// 방향 지정
    pub fn with_direction(mut self, direction: RelationshipDirection) -> Self {
        self.direction = direction;
        self
    }

    /// 생성 전 속성 지정 (변경 추적 없음)
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// 시작 노드 ID
    pub fn from_node_id(&self) -> Option<i64> {
        self.from_node_id
    }

    /// 끝 노드 ID
    pub fn to_node_id(&self) -> Option<i64> {
        self.to_node_id
    }

    /// 속성 가져오기
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// 속성 설정
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.edits.set_property(&key, value.clone());
        self.properties.insert(key, value);
    }

    /// 속성 제거
    pub fn remove_property(&mut self, key: &str) {
        self.properties.remove(key);
        self.edits.remove_property(key);
    }

    /// 변경 사항
    pub fn edits(&self) -> &PendingEdits {
        &self.edits
    }

    /// 쓰기 성공 후 변경 사항 비우기
    pub fn clear_edits(&mut self) {
        self.edits.clear();
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = |v: Option<i64>| v.map_or_else(|| "?".to_string(), |i| i.to_string());
        match self.direction {
            RelationshipDirection::From => write!(
                f,
                "({})-[:{}]->({})",
                id(self.from_node_id),
                self.rel_type,
                id(self.to_node_id)
            ),
            RelationshipDirection::To => write!(
                f,
                "({})<-[:{}]-({})",
                id(self.from_node_id),
                self.rel_type,
                id(self.to_node_id)
            ),
        }
    }
}

/// 양 끝 노드 id가 없는 관계 (경로 복원 전용)
#[derive(Debug, Clone, PartialEq)]
pub struct UnboundRelationship {
    /// 관계 ID
    pub id: i64,
    /// 타입
    pub rel_type: String,
    /// 속성
    pub properties: HashMap<String, Value>,
}

// ============================================================================
// Path - 그래프 경로
// ============================================================================

/// 경로의 한 구간
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    /// 구간 시작 노드
    pub start: Node,
    /// 구간 관계 (from = start, to = end, 방향은 실제 간선 방향)
    pub relationship: Relationship,
    /// 구간 끝 노드
    pub end: Node,
}

/// 그래프 경로
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// 구간들
    pub segments: Vec<PathSegment>,
}

impl Path {
    /// 새 경로 생성
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// 와이어 표현에서 경로 복원
    ///
    /// `sequence`는 (관계 인덱스, 노드 인덱스) 쌍의 나열입니다. 관계 인덱스는
    /// 1부터 시작하고 부호가 방향(양수 = 현재 노드에서 멀어짐)을 나타냅니다.
    /// 첫 노드는 항상 `nodes[0]`입니다.
    pub fn from_wire(
        nodes: &[Node],
        relationships: &[UnboundRelationship],
        sequence: &[i64],
    ) -> DriverResult<Self> {
        if sequence.len() % 2 != 0 {
            return Err(DriverError::protocol(format!(
                "Path sequence has odd length {}",
                sequence.len()
            )));
        }
        if sequence.is_empty() {
            return Ok(Self::default());
        }

        let mut current = nodes
            .first()
            .ok_or_else(|| DriverError::protocol("Path sequence without nodes"))?;
        let mut segments = Vec::with_capacity(sequence.len() / 2);

        for pair in sequence.chunks_exact(2) {
            let (rel_index, node_index) = (pair[0], pair[1]);

            let unbound = rel_index
                .unsigned_abs()
                .checked_sub(1)
                .and_then(|i| relationships.get(i as usize))
                .ok_or_else(|| {
                    DriverError::protocol(format!("Invalid path relationship index {}", rel_index))
                })?;
            let next = usize::try_from(node_index)
                .ok()
                .and_then(|i| nodes.get(i))
                .ok_or_else(|| {
                    DriverError::protocol(format!("Invalid path node index {}", node_index))
                })?;

            let direction = if rel_index > 0 {
                RelationshipDirection::From
            } else {
                RelationshipDirection::To
            };

            let mut relationship = Relationship::new(current.id, next.id, unbound.rel_type.clone())
                .with_direction(direction);
            relationship.id = Some(unbound.id);
            relationship.properties = unbound.properties.clone();

            segments.push(PathSegment {
                start: current.clone(),
                relationship,
                end: next.clone(),
            });
            current = next;
        }

        Ok(Self { segments })
    }

    /// 경로 길이 (구간 수)
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// 빈 경로 여부
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 시작 노드
    pub fn start(&self) -> Option<&Node> {
        self.segments.first().map(|s| &s.start)
    }

    /// 끝 노드
    pub fn end(&self) -> Option<&Node> {
        self.segments.last().map(|s| &s.end)
    }

    /// 경로 위의 노드 (시작 노드 포함)
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.start()
            .into_iter()
            .chain(self.segments.iter().map(|s| &s.end))
    }

    /// 경로 위의 관계
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.segments.iter().map(|s| &s.relationship)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Path: {} segments>", self.segments.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
