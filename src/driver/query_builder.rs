//! Query Builder
//!
//! 노드/관계와 그 변경 사항으로 쿼리 문장과 파라미터를 만드는 순수 함수들
//!
//! 속성 값은 항상 파라미터(`$key`)로 전달됩니다. 레이블, 타입, 키는
//! `[A-Za-z_][A-Za-z0-9_]*` 형태가 아니면 백쿼트로 감쌉니다. 배치 함수는
//! 엔티티마다 별칭(`node0`, `node1`, ...)과 파라미터 접미사(`_0`, `_1`, ...)를
//! 붙입니다.

use std::collections::{BTreeMap, HashMap};

use super::error::{DriverError, DriverResult};
use super::graph::{Node, PendingEdits, Relationship, RelationshipDirection};
use super::result::Query;
use super::types::Value;

pub(crate) const NODE_ALIAS: &str = "node";
pub(crate) const REL_ALIAS: &str = "rel";

// ============================================================================
// Identifier escaping
// ============================================================================

/// 식별자 이스케이프
pub fn escape_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

fn param_name(key: &str, suffix: Option<usize>) -> String {
    match suffix {
        Some(i) => format!("{}_{}", key, i),
        None => key.to_string(),
    }
}

fn labels_fragment(labels: &[String]) -> String {
    labels
        .iter()
        .map(|l| format!(":{}", escape_identifier(l)))
        .collect()
}

/// ` {k: $k, ...}` 조각과 파라미터 (키 순서)
fn properties_fragment(
    properties: &HashMap<String, Value>,
    suffix: Option<usize>,
    params: &mut HashMap<String, Value>,
) -> String {
    if properties.is_empty() {
        return String::new();
    }

    let sorted: BTreeMap<&String, &Value> = properties.iter().collect();
    let entries: Vec<String> = sorted
        .into_iter()
        .map(|(key, value)| {
            let param = param_name(key, suffix);
            let entry = format!("{}: ${}", escape_identifier(key), escape_identifier(&param));
            params.insert(param, value.clone());
            entry
        })
        .collect();

    format!(" {{{}}}", entries.join(", "))
}

#[derive(Default)]
struct EditClauses {
    set: Vec<String>,
    remove: Vec<String>,
}

impl EditClauses {
    fn collect(
        &mut self,
        alias: &str,
        edits: &PendingEdits,
        suffix: Option<usize>,
        params: &mut HashMap<String, Value>,
    ) {
        for label in edits.added_labels() {
            self.set.push(format!("{}:{}", alias, escape_identifier(label)));
        }
        for (key, value) in edits.updated_properties() {
            let param = param_name(key, suffix);
            self.set.push(format!(
                "{}.{} = ${}",
                alias,
                escape_identifier(key),
                escape_identifier(&param)
            ));
            params.insert(param, value.clone());
        }
        for label in edits.removed_labels() {
            self.remove.push(format!("{}:{}", alias, escape_identifier(label)));
        }
        for key in edits.removed_property_keys() {
            self.remove.push(format!("{}.{}", alias, escape_identifier(key)));
        }
    }

    /// SET/REMOVE 절. 둘 다 비면 `RETURN fallback`
    fn render(self, fallback: &str) -> String {
        let mut out = String::new();
        if !self.set.is_empty() {
            out.push_str(" SET ");
            out.push_str(&self.set.join(", "));
        }
        if !self.remove.is_empty() {
            out.push_str(" REMOVE ");
            out.push_str(&self.remove.join(", "));
        }
        if out.is_empty() {
            out.push_str(" RETURN ");
            out.push_str(fallback);
        }
        out
    }
}

fn require_id(id: Option<i64>, what: &str) -> DriverResult<i64> {
    id.ok_or_else(|| DriverError::query_build(format!("{} has no id", what)))
}

fn require_non_empty<T>(items: &[T], what: &str) -> DriverResult<()> {
    if items.is_empty() {
        Err(DriverError::query_build(format!("No {} to build a query for", what)))
    } else {
        Ok(())
    }
}

/// `MATCH (a0), (a1) WHERE id(a0) = 1 AND id(a1) = 2`
fn match_by_ids(targets: &[(String, i64)]) -> String {
    let patterns: Vec<String> = targets.iter().map(|(alias, _)| format!("({})", alias)).collect();
    let conditions: Vec<String> = targets
        .iter()
        .map(|(alias, id)| format!("id({}) = {}", alias, id))
        .collect();
    format!("MATCH {} WHERE {}", patterns.join(", "), conditions.join(" AND "))
}

fn batch_alias(base: &str, index: usize) -> String {
    format!("{}{}", base, index)
}

// ============================================================================
// Node
// ============================================================================

/// 노드 생성: `CREATE (node:L {k: $k}) [RETURN node]`
pub fn create_node(node: &Node, return_node: bool) -> Query {
    let mut params = HashMap::new();
    let mut statement = format!(
        "CREATE ({}{}{})",
        NODE_ALIAS,
        labels_fragment(&node.labels),
        properties_fragment(&node.properties, None, &mut params)
    );
    if return_node {
        statement.push_str(" RETURN ");
        statement.push_str(NODE_ALIAS);
    }
    Query::new(statement).with_params(params)
}

/// 여러 노드 생성. 항상 `RETURN node0, node1, ...`
pub fn create_nodes(nodes: &[Node]) -> DriverResult<Query> {
    require_non_empty(nodes, "nodes")?;

    let mut params = HashMap::new();
    let mut patterns = Vec::with_capacity(nodes.len());
    let mut aliases = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        let alias = batch_alias(NODE_ALIAS, i);
        patterns.push(format!(
            "({}{}{})",
            alias,
            labels_fragment(&node.labels),
            properties_fragment(&node.properties, Some(i), &mut params)
        ));
        aliases.push(alias);
    }

    let statement = format!("CREATE {} RETURN {}", patterns.join(", "), aliases.join(", "));
    Ok(Query::new(statement).with_params(params))
}

/// 노드 수정: `MATCH (node) WHERE id(node) = <id> SET ... REMOVE ...`
pub fn update_node(node: &Node) -> DriverResult<Query> {
    let id = require_id(node.id, "Node")?;

    let mut params = HashMap::new();
    let mut clauses = EditClauses::default();
    clauses.collect(NODE_ALIAS, node.edits(), None, &mut params);

    let statement = format!(
        "{}{}",
        match_by_ids(&[(NODE_ALIAS.to_string(), id)]),
        clauses.render(NODE_ALIAS)
    );
    Ok(Query::new(statement).with_params(params))
}

/// 여러 노드 수정. id가 없는 노드가 하나라도 있으면 전체 실패
pub fn update_nodes(nodes: &[Node]) -> DriverResult<Query> {
    require_non_empty(nodes, "nodes")?;

    let mut targets = Vec::with_capacity(nodes.len());
    let mut params = HashMap::new();
    let mut clauses = EditClauses::default();
    for (i, node) in nodes.iter().enumerate() {
        let id = require_id(node.id, "Node")?;
        let alias = batch_alias(NODE_ALIAS, i);
        clauses.collect(&alias, node.edits(), Some(i), &mut params);
        targets.push((alias, id));
    }

    let fallback: Vec<&str> = targets.iter().map(|(a, _)| a.as_str()).collect();
    let statement = format!(
        "{}{}",
        match_by_ids(&targets),
        clauses.render(&fallback.join(", "))
    );
    Ok(Query::new(statement).with_params(params))
}

/// 노드 삭제 (연결된 관계 포함)
pub fn delete_node(node: &Node) -> DriverResult<Query> {
    let id = require_id(node.id, "Node")?;
    Ok(Query::new(format!(
        "{} DETACH DELETE {}",
        match_by_ids(&[(NODE_ALIAS.to_string(), id)]),
        NODE_ALIAS
    )))
}

/// 여러 노드 삭제
pub fn delete_nodes(nodes: &[Node]) -> DriverResult<Query> {
    require_non_empty(nodes, "nodes")?;

    let targets = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| Ok((batch_alias(NODE_ALIAS, i), require_id(node.id, "Node")?)))
        .collect::<DriverResult<Vec<_>>>()?;
    let aliases: Vec<&str> = targets.iter().map(|(a, _)| a.as_str()).collect();

    Ok(Query::new(format!(
        "{} DETACH DELETE {}",
        match_by_ids(&targets),
        aliases.join(", ")
    )))
}

/// id로 노드 조회
pub fn node_by_id(id: i64) -> Query {
    Query::new(format!(
        "{} RETURN {}",
        match_by_ids(&[(NODE_ALIAS.to_string(), id)]),
        NODE_ALIAS
    ))
}

// ============================================================================
// Relationship
// ============================================================================

fn relationship_pattern(
    from: &str,
    alias: &str,
    rel: &Relationship,
    suffix: Option<usize>,
    to: &str,
    params: &mut HashMap<String, Value>,
) -> String {
    let body = format!(
        "[{}:{}{}]",
        alias,
        escape_identifier(&rel.rel_type),
        properties_fragment(&rel.properties, suffix, params)
    );
    match rel.direction {
        RelationshipDirection::From => format!("({})-{}->({})", from, body, to),
        RelationshipDirection::To => format!("({})<-{}-({})", from, body, to),
    }
}

fn endpoints(rel: &Relationship) -> DriverResult<(i64, i64)> {
    match (rel.from_node_id(), rel.to_node_id()) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(DriverError::query_build(format!(
            "Relationship {} needs both endpoint ids",
            rel
        ))),
    }
}

/// 관계 생성: `MATCH (a), (b) WHERE ... CREATE (a)-[rel:T {..}]->(b) RETURN rel`
pub fn create_relationship(rel: &Relationship) -> DriverResult<Query> {
    let (from, to) = endpoints(rel)?;

    let mut params = HashMap::new();
    let pattern = relationship_pattern("a", REL_ALIAS, rel, None, "b", &mut params);
    let statement = format!(
        "{} CREATE {} RETURN {}",
        match_by_ids(&[("a".to_string(), from), ("b".to_string(), to)]),
        pattern,
        REL_ALIAS
    );
    Ok(Query::new(statement).with_params(params))
}

/// 여러 관계 생성
pub fn create_relationships(rels: &[Relationship]) -> DriverResult<Query> {
    require_non_empty(rels, "relationships")?;

    let mut targets = Vec::with_capacity(rels.len() * 2);
    let mut patterns = Vec::with_capacity(rels.len());
    let mut aliases = Vec::with_capacity(rels.len());
    let mut params = HashMap::new();
    for (i, rel) in rels.iter().enumerate() {
        let (from, to) = endpoints(rel)?;
        let (a, b, alias) = (batch_alias("a", i), batch_alias("b", i), batch_alias(REL_ALIAS, i));
        patterns.push(relationship_pattern(&a, &alias, rel, Some(i), &b, &mut params));
        targets.push((a, from));
        targets.push((b, to));
        aliases.push(alias);
    }

    let statement = format!(
        "{} CREATE {} RETURN {}",
        match_by_ids(&targets),
        patterns.join(", "),
        aliases.join(", ")
    );
    Ok(Query::new(statement).with_params(params))
}

fn match_relationship(id: i64) -> String {
    format!("MATCH ()-[{0}]->() WHERE id({0}) = {1}", REL_ALIAS, id)
}

/// 관계 수정
pub fn update_relationship(rel: &Relationship) -> DriverResult<Query> {
    let id = require_id(rel.id, "Relationship")?;

    let mut params = HashMap::new();
    let mut clauses = EditClauses::default();
    clauses.collect(REL_ALIAS, rel.edits(), None, &mut params);

    let statement = format!("{}{}", match_relationship(id), clauses.render(REL_ALIAS));
    Ok(Query::new(statement).with_params(params))
}

/// 관계 삭제
pub fn delete_relationship(rel: &Relationship) -> DriverResult<Query> {
    let id = require_id(rel.id, "Relationship")?;
    Ok(Query::new(format!("{} DELETE {}", match_relationship(id), REL_ALIAS)))
}

/// id로 관계 조회
pub fn relationship_by_id(id: i64) -> Query {
    Query::new(format!("{} RETURN {}", match_relationship(id), REL_ALIAS))
}

// ============================================================================
// Search
// ============================================================================

/// 노드 검색 조건
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSearch {
    /// 레이블 (모두 일치)
    pub labels: Vec<String>,
    /// 속성 동등 조건
    pub properties: BTreeMap<String, Value>,
    /// 별칭 (기본 `node`)
    pub alias: Option<String>,
    /// 0이면 생략
    pub skip: u64,
    /// 0이면 생략
    pub limit: u64,
}

impl NodeSearch {
    /// 빈 검색 조건
    pub fn new() -> Self {
        Self::default()
    }

    /// 레이블 추가
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// 속성 조건 추가
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// 별칭 지정
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// SKIP
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// LIMIT
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }
}

/// 관계 검색 조건
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipSearch {
    /// 관계 타입
    pub rel_type: Option<String>,
    /// 속성 동등 조건
    pub properties: BTreeMap<String, Value>,
    /// 0이면 생략
    pub skip: u64,
    /// 0이면 생략
    pub limit: u64,
}

impl RelationshipSearch {
    /// 타입으로 검색
    pub fn of_type(rel_type: impl Into<String>) -> Self {
        Self {
            rel_type: Some(rel_type.into()),
            ..Self::default()
        }
    }

    /// 속성 조건 추가
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// SKIP
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// LIMIT
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }
}

fn where_equals(
    alias: &str,
    properties: &BTreeMap<String, Value>,
    params: &mut HashMap<String, Value>,
) -> String {
    if properties.is_empty() {
        return String::new();
    }
    let conditions: Vec<String> = properties
        .iter()
        .map(|(key, value)| {
            params.insert(key.clone(), value.clone());
            format!("{}.{} = ${}", alias, escape_identifier(key), escape_identifier(key))
        })
        .collect();
    format!(" WHERE {}", conditions.join(" AND "))
}

fn paging(skip: u64, limit: u64) -> String {
    let mut out = String::new();
    if skip > 0 {
        out.push_str(&format!(" SKIP {}", skip));
    }
    if limit > 0 {
        out.push_str(&format!(" LIMIT {}", limit));
    }
    out
}

/// 노드 검색: `MATCH (node:L) WHERE node.k = $k RETURN node SKIP n LIMIT n`
pub fn find_nodes(search: &NodeSearch) -> Query {
    let alias = escape_identifier(search.alias.as_deref().unwrap_or(NODE_ALIAS));
    let mut params = HashMap::new();
    let statement = format!(
        "MATCH ({}{}){} RETURN {}{}",
        alias,
        labels_fragment(&search.labels),
        where_equals(&alias, &search.properties, &mut params),
        alias,
        paging(search.skip, search.limit)
    );
    Query::new(statement).with_params(params)
}

/// 관계 검색: `MATCH ()-[rel:T]->() WHERE rel.k = $k RETURN rel`
pub fn find_relationships(search: &RelationshipSearch) -> Query {
    let rel_type = search
        .rel_type
        .as_deref()
        .map(|t| format!(":{}", escape_identifier(t)))
        .unwrap_or_default();
    let mut params = HashMap::new();
    let statement = format!(
        "MATCH ()-[{}{}]->(){} RETURN {}{}",
        REL_ALIAS,
        rel_type,
        where_equals(REL_ALIAS, &search.properties, &mut params),
        REL_ALIAS,
        paging(search.skip, search.limit)
    );
    Query::new(statement).with_params(params)
}

// ============================================================================
// Tests
// ============================================================================
