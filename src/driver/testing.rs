//! In-memory server for driver tests
//!
//! 쿼리 빌더가 만드는 문장 형태(CREATE, MATCH ... WHERE id(..), SET, REMOVE,
//! DELETE, RETURN, SKIP/LIMIT)와 BEGIN/COMMIT/ROLLBACK만 이해하는 작은
//! 그래프 저장소입니다. 연결마다 트랜잭션 사본을 두고 COMMIT 때 반영합니다.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::bolt::packstream::{NODE_TAG, RELATIONSHIP_TAG};
use crate::bolt::{
    BoltError, BoltErrorCode, BoltResult, Connection, PackStreamValue, RecordMessage, Request,
    Response, ResponseBatch, SuccessMessage,
};

type Props = HashMap<String, PackStreamValue>;
type Failure = (&'static str, String);

const PARAMETER_MISSING: &str = "Neo.ClientError.Statement.ParameterMissing";
const REQUEST_INVALID: &str = "Neo.ClientError.Request.Invalid";
const TRANSACTION_START_FAILED: &str = "Neo.ClientError.Transaction.TransactionStartFailed";
const ARITHMETIC_ERROR: &str = "Neo.ClientError.Statement.ArithmeticError";

/// INIT을 거부당하는 사용자 이름
const REJECTED_PRINCIPAL: &str = "intruder";

fn syntax_error(message: impl Into<String>) -> Failure {
    (BoltErrorCode::SYNTAX_ERROR, message.into())
}

// ============================================================================
// Graph store
// ============================================================================

#[derive(Debug, Clone)]
struct StoredNode {
    labels: Vec<String>,
    properties: Props,
}

#[derive(Debug, Clone)]
struct StoredRelationship {
    start: i64,
    end: i64,
    rel_type: String,
    properties: Props,
}

#[derive(Debug, Clone, Default)]
struct Graph {
    nodes: BTreeMap<i64, StoredNode>,
    relationships: BTreeMap<i64, StoredRelationship>,
    next_id: i64,
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Node(i64),
    Relationship(i64),
}

type Row = HashMap<String, Bound>;

impl Graph {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn properties(&self, bound: Bound) -> Option<&Props> {
        match bound {
            Bound::Node(id) => self.nodes.get(&id).map(|n| &n.properties),
            Bound::Relationship(id) => self.relationships.get(&id).map(|r| &r.properties),
        }
    }

    fn properties_mut(&mut self, bound: Bound) -> Option<&mut Props> {
        match bound {
            Bound::Node(id) => self.nodes.get_mut(&id).map(|n| &mut n.properties),
            Bound::Relationship(id) => self.relationships.get_mut(&id).map(|r| &mut r.properties),
        }
    }

    fn value(&self, bound: Bound) -> PackStreamValue {
        match bound {
            Bound::Node(id) => match self.nodes.get(&id) {
                Some(node) => PackStreamValue::structure(
                    NODE_TAG,
                    vec![
                        PackStreamValue::Integer(id),
                        PackStreamValue::string_list(node.labels.iter()),
                        PackStreamValue::Map(node.properties.clone()),
                    ],
                ),
                None => PackStreamValue::Null,
            },
            Bound::Relationship(id) => match self.relationships.get(&id) {
                Some(rel) => PackStreamValue::structure(
                    RELATIONSHIP_TAG,
                    vec![
                        PackStreamValue::Integer(id),
                        PackStreamValue::Integer(rel.start),
                        PackStreamValue::Integer(rel.end),
                        PackStreamValue::String(rel.rel_type.clone()),
                        PackStreamValue::Map(rel.properties.clone()),
                    ],
                ),
                None => PackStreamValue::Null,
            },
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    nodes_created: i64,
    nodes_deleted: i64,
    relationships_created: i64,
    relationships_deleted: i64,
    properties_set: i64,
    labels_added: i64,
    labels_removed: i64,
}

impl Counters {
    fn to_map(&self) -> Props {
        [
            ("nodes-created", self.nodes_created),
            ("nodes-deleted", self.nodes_deleted),
            ("relationships-created", self.relationships_created),
            ("relationships-deleted", self.relationships_deleted),
            ("properties-set", self.properties_set),
            ("labels-added", self.labels_added),
            ("labels-removed", self.labels_removed),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(key, count)| (key.to_string(), PackStreamValue::Integer(count)))
        .collect()
    }

    fn is_write(&self) -> bool {
        !self.to_map().is_empty()
    }
}

// ============================================================================
// Statement parsing
// ============================================================================

const KEYWORDS: [&str; 9] = [
    "MATCH", "WHERE", "CREATE", "SET", "REMOVE", "DELETE", "RETURN", "SKIP", "LIMIT",
];

#[derive(Debug, Default)]
struct Statement {
    matches: Option<String>,
    conditions: Option<String>,
    create: Option<String>,
    set: Option<String>,
    remove: Option<String>,
    delete: Option<(bool, String)>,
    returns: Option<String>,
    skip: usize,
    limit: Option<usize>,
}

fn split_clauses(text: &str) -> Result<Vec<(String, String)>, Failure> {
    let mut clauses: Vec<(String, Vec<&str>)> = Vec::new();
    let mut quoted = false;
    let mut words = text.split_whitespace().peekable();

    while let Some(word) = words.next() {
        if !quoted {
            if word == "DETACH" && words.peek() == Some(&"DELETE") {
                words.next();
                clauses.push(("DETACH DELETE".to_string(), Vec::new()));
                continue;
            }
            if KEYWORDS.contains(&word) {
                clauses.push((word.to_string(), Vec::new()));
                continue;
            }
        }
        if word.matches('`').count() % 2 == 1 {
            quoted = !quoted;
        }
        match clauses.last_mut() {
            Some((_, body)) => body.push(word),
            None => return Err(syntax_error(format!("Invalid input '{}'", word))),
        }
    }

    Ok(clauses
        .into_iter()
        .map(|(keyword, body)| (keyword, body.join(" ")))
        .collect())
}

fn parse_count(text: &str) -> Result<usize, Failure> {
    text.trim()
        .parse()
        .map_err(|_| syntax_error(format!("Invalid count '{}'", text)))
}

fn parse_statement(text: &str) -> Result<Statement, Failure> {
    let clauses = split_clauses(text)?;
    if clauses.is_empty() {
        return Err(syntax_error("Empty statement"));
    }

    let mut statement = Statement::default();
    for (keyword, body) in clauses {
        match keyword.as_str() {
            "MATCH" => statement.matches = Some(body),
            "WHERE" => statement.conditions = Some(body),
            "CREATE" => statement.create = Some(body),
            "SET" => statement.set = Some(body),
            "REMOVE" => statement.remove = Some(body),
            "DELETE" => statement.delete = Some((false, body)),
            "DETACH DELETE" => statement.delete = Some((true, body)),
            "RETURN" => statement.returns = Some(body),
            "SKIP" => statement.skip = parse_count(&body)?,
            "LIMIT" => statement.limit = Some(parse_count(&body)?),
            other => return Err(syntax_error(format!("Unsupported clause {}", other))),
        }
    }
    Ok(statement)
}

/// 괄호와 백쿼트 밖의 구분자로 자르기
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '`' => quoted = !quoted,
            '(' | '[' | '{' if !quoted => depth += 1,
            ')' | ']' | '}' if !quoted => depth -= 1,
            c if c == separator && !quoted && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

fn find_unquoted(text: &str, target: char) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        if c == '`' {
            quoted = !quoted;
        } else if c == target && !quoted {
            return Some(i);
        }
    }
    None
}

fn identifier(text: &str) -> String {
    let text = text.trim();
    match text.strip_prefix('`').and_then(|t| t.strip_suffix('`')) {
        Some(inner) => inner.replace("``", "`"),
        None => text.to_string(),
    }
}

fn parameter(text: &str, params: &Props) -> Result<PackStreamValue, Failure> {
    let name = text
        .trim()
        .strip_prefix('$')
        .map(identifier)
        .ok_or_else(|| syntax_error(format!("Expected a parameter, got '{}'", text)))?;
    params
        .get(&name)
        .cloned()
        .ok_or_else(|| (PARAMETER_MISSING, format!("Expected parameter(s): {}", name)))
}

/// `head {k: $p, ...}` → (head, [(k, p)])
fn split_properties(text: &str) -> Result<(&str, Vec<(String, String)>), Failure> {
    let Some(open) = find_unquoted(text, '{') else {
        return Ok((text.trim(), Vec::new()));
    };
    let body = text[open..]
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| syntax_error(format!("Invalid property map '{}'", text)))?;
    let entries = split_top_level(body, ',')
        .into_iter()
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once(": $")
                .map(|(key, param)| (identifier(key), identifier(param)))
                .ok_or_else(|| syntax_error(format!("Invalid property '{}'", entry)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((text[..open].trim(), entries))
}

fn resolve_properties(entries: &[(String, String)], params: &Props) -> Result<Props, Failure> {
    entries
        .iter()
        .map(|(key, param)| {
            params
                .get(param)
                .cloned()
                .map(|value| (key.clone(), value))
                .ok_or_else(|| (PARAMETER_MISSING, format!("Expected parameter(s): {}", param)))
        })
        .collect()
}

struct NodePattern {
    alias: String,
    labels: Vec<String>,
    properties: Vec<(String, String)>,
}

fn parse_node_pattern(text: &str) -> Result<NodePattern, Failure> {
    let inner = text
        .trim()
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| syntax_error(format!("Invalid node pattern '{}'", text)))?;
    let (head, properties) = split_properties(inner)?;
    let mut parts = split_top_level(head, ':').into_iter();
    let alias = parts.next().map(identifier).unwrap_or_default();
    Ok(NodePattern {
        alias,
        labels: parts.map(identifier).collect(),
        properties,
    })
}

struct RelationshipPattern {
    start: String,
    alias: String,
    rel_type: Option<String>,
    properties: Vec<(String, String)>,
    end: String,
    reversed: bool,
}

/// `(a)-[rel:T {..}]->(b)` 또는 `(a)<-[rel:T]-(b)`
fn parse_relationship_pattern(text: &str) -> Result<RelationshipPattern, Failure> {
    let invalid = || syntax_error(format!("Invalid relationship pattern '{}'", text));
    let open = find_unquoted(text, '[').ok_or_else(invalid)?;
    let close = text.rfind(']').ok_or_else(invalid)?;
    if close < open {
        return Err(invalid());
    }

    let left = text[..open].trim();
    let right = text[close + 1..].trim();
    let reversed = left.ends_with("<-");
    let start = parse_node_pattern(left.trim_end_matches(|c: char| c == '-' || c == '<'))?.alias;
    let end = parse_node_pattern(right.trim_start_matches(|c: char| c == '-' || c == '>'))?.alias;

    let (head, properties) = split_properties(&text[open + 1..close])?;
    let mut parts = split_top_level(head, ':').into_iter();
    let alias = parts.next().map(identifier).unwrap_or_default();
    Ok(RelationshipPattern {
        start,
        alias,
        rel_type: parts.next().map(identifier),
        properties,
        end,
        reversed,
    })
}

enum Condition {
    Id { alias: String, id: i64 },
    Equals { alias: String, key: String, value: PackStreamValue },
}

impl Condition {
    fn accepts(&self, graph: &Graph, alias: &str, bound: Bound) -> bool {
        match self {
            Condition::Id { alias: target, id } if target == alias => match bound {
                Bound::Node(found) | Bound::Relationship(found) => found == *id,
            },
            Condition::Equals { alias: target, key, value } if target == alias => {
                graph.properties(bound).and_then(|p| p.get(key)) == Some(value)
            }
            _ => true,
        }
    }
}

fn parse_conditions(text: Option<&str>, params: &Props) -> Result<Vec<Condition>, Failure> {
    let Some(text) = text else {
        return Ok(Vec::new());
    };
    text.split(" AND ")
        .map(|condition| {
            let (lhs, rhs) = condition
                .split_once(" = ")
                .ok_or_else(|| syntax_error(format!("Invalid condition '{}'", condition)))?;
            let lhs = lhs.trim();
            if let Some(alias) = lhs.strip_prefix("id(").and_then(|t| t.strip_suffix(')')) {
                let id = rhs
                    .trim()
                    .parse()
                    .map_err(|_| syntax_error(format!("Invalid id '{}'", rhs)))?;
                return Ok(Condition::Id {
                    alias: identifier(alias),
                    id,
                });
            }
            let (alias, key) = lhs
                .split_once('.')
                .ok_or_else(|| syntax_error(format!("Invalid condition '{}'", condition)))?;
            Ok(Condition::Equals {
                alias: identifier(alias),
                key: identifier(key),
                value: parameter(rhs, params)?,
            })
        })
        .collect()
}

// ============================================================================
// Statement execution
// ============================================================================

struct Outcome {
    fields: Vec<String>,
    records: Vec<Vec<PackStreamValue>>,
    summary: SuccessMessage,
    /// RUN은 받아들였지만 결과를 당길 때 나는 실패
    deferred: Option<Failure>,
}

impl Outcome {
    fn empty() -> Self {
        Self {
            fields: Vec::new(),
            records: Vec::new(),
            summary: SuccessMessage::default(),
            deferred: None,
        }
    }
}

fn bound_node(row: &Row, alias: &str) -> Result<i64, Failure> {
    match row.get(alias) {
        Some(Bound::Node(id)) => Ok(*id),
        _ => Err(syntax_error(format!("Variable `{}` not defined", alias))),
    }
}

fn bound(row: &Row, alias: &str) -> Result<Bound, Failure> {
    row.get(alias)
        .copied()
        .ok_or_else(|| syntax_error(format!("Variable `{}` not defined", alias)))
}

fn match_rows(
    graph: &Graph,
    patterns: &str,
    conditions: Option<&str>,
    params: &Props,
) -> Result<Vec<Row>, Failure> {
    let conditions = parse_conditions(conditions, params)?;
    let mut rows = vec![Row::new()];

    for pattern in split_top_level(patterns, ',') {
        let candidates: Vec<(String, Bound)> = if pattern.contains("-[") {
            let rel = parse_relationship_pattern(pattern)?;
            graph
                .relationships
                .iter()
                .filter(|(_, r)| rel.rel_type.as_ref().map_or(true, |t| *t == r.rel_type))
                .map(|(id, _)| (rel.alias.clone(), Bound::Relationship(*id)))
                .collect()
        } else {
            let node = parse_node_pattern(pattern)?;
            graph
                .nodes
                .iter()
                .filter(|(_, n)| node.labels.iter().all(|l| n.labels.contains(l)))
                .map(|(id, _)| (node.alias.clone(), Bound::Node(*id)))
                .collect()
        };
        let candidates: Vec<(String, Bound)> = candidates
            .into_iter()
            .filter(|(alias, bound)| conditions.iter().all(|c| c.accepts(graph, alias, *bound)))
            .collect();

        rows = rows
            .into_iter()
            .flat_map(|row| {
                candidates.iter().map(move |(alias, bound)| {
                    let mut row = row.clone();
                    row.insert(alias.clone(), *bound);
                    row
                })
            })
            .collect();
    }
    Ok(rows)
}

fn apply_create(
    graph: &mut Graph,
    text: &str,
    row: &mut Row,
    params: &Props,
    counters: &mut Counters,
) -> Result<(), Failure> {
    for pattern in split_top_level(text, ',') {
        if pattern.contains("-[") {
            let rel = parse_relationship_pattern(pattern)?;
            let (mut start, mut end) = (bound_node(row, &rel.start)?, bound_node(row, &rel.end)?);
            if rel.reversed {
                std::mem::swap(&mut start, &mut end);
            }
            let rel_type = rel
                .rel_type
                .ok_or_else(|| syntax_error("Exactly one relationship type must be specified"))?;
            let properties = resolve_properties(&rel.properties, params)?;
            counters.properties_set += properties.len() as i64;
            counters.relationships_created += 1;

            let id = graph.allocate_id();
            graph.relationships.insert(
                id,
                StoredRelationship {
                    start,
                    end,
                    rel_type,
                    properties,
                },
            );
            if !rel.alias.is_empty() {
                row.insert(rel.alias, Bound::Relationship(id));
            }
        } else {
            let node = parse_node_pattern(pattern)?;
            let properties = resolve_properties(&node.properties, params)?;
            counters.properties_set += properties.len() as i64;
            counters.labels_added += node.labels.len() as i64;
            counters.nodes_created += 1;

            let id = graph.allocate_id();
            graph.nodes.insert(
                id,
                StoredNode {
                    labels: node.labels,
                    properties,
                },
            );
            if !node.alias.is_empty() {
                row.insert(node.alias, Bound::Node(id));
            }
        }
    }
    Ok(())
}

/// `alias.key ...` 인지 `alias:Label` 인지
fn is_property_item(item: &str) -> bool {
    item.find(|c: char| c == ':' || c == '.')
        .map_or(false, |i| item[i..].starts_with('.'))
}

fn apply_set(
    graph: &mut Graph,
    text: &str,
    rows: &[Row],
    params: &Props,
    counters: &mut Counters,
) -> Result<(), Failure> {
    for row in rows {
        for item in split_top_level(text, ',') {
            if is_property_item(item) {
                let (target, value) = item
                    .split_once(" = ")
                    .ok_or_else(|| syntax_error(format!("Invalid SET item '{}'", item)))?;
                let (alias, key) = target
                    .split_once('.')
                    .ok_or_else(|| syntax_error(format!("Invalid SET item '{}'", item)))?;
                let value = parameter(value, params)?;
                if let Some(props) = graph.properties_mut(bound(row, &identifier(alias))?) {
                    props.insert(identifier(key), value);
                    counters.properties_set += 1;
                }
            } else {
                let (alias, label) = item
                    .split_once(':')
                    .ok_or_else(|| syntax_error(format!("Invalid SET item '{}'", item)))?;
                let id = bound_node(row, &identifier(alias))?;
                let label = identifier(label);
                if let Some(node) = graph.nodes.get_mut(&id) {
                    if !node.labels.contains(&label) {
                        node.labels.push(label);
                        counters.labels_added += 1;
                    }
                }
            }
        }
    }
    Ok(())
}

fn apply_remove(
    graph: &mut Graph,
    text: &str,
    rows: &[Row],
    counters: &mut Counters,
) -> Result<(), Failure> {
    for row in rows {
        for item in split_top_level(text, ',') {
            if is_property_item(item) {
                let (alias, key) = item
                    .split_once('.')
                    .ok_or_else(|| syntax_error(format!("Invalid REMOVE item '{}'", item)))?;
                if let Some(props) = graph.properties_mut(bound(row, &identifier(alias))?) {
                    if props.remove(&identifier(key)).is_some() {
                        counters.properties_set += 1;
                    }
                }
            } else {
                let (alias, label) = item
                    .split_once(':')
                    .ok_or_else(|| syntax_error(format!("Invalid REMOVE item '{}'", item)))?;
                let id = bound_node(row, &identifier(alias))?;
                let label = identifier(label);
                if let Some(node) = graph.nodes.get_mut(&id) {
                    let before = node.labels.len();
                    node.labels.retain(|l| *l != label);
                    counters.labels_removed += (before - node.labels.len()) as i64;
                }
            }
        }
    }
    Ok(())
}

fn apply_delete(
    graph: &mut Graph,
    detach: bool,
    text: &str,
    rows: &[Row],
    counters: &mut Counters,
) -> Result<(), Failure> {
    for row in rows {
        for alias in split_top_level(text, ',') {
            match bound(row, &identifier(alias))? {
                Bound::Node(id) => {
                    let attached: Vec<i64> = graph
                        .relationships
                        .iter()
                        .filter(|(_, r)| r.start == id || r.end == id)
                        .map(|(rel_id, _)| *rel_id)
                        .collect();
                    if !attached.is_empty() && !detach {
                        return Err((
                            BoltErrorCode::CONSTRAINT_VIOLATION,
                            format!("Cannot delete node<{}>, because it still has relationships", id),
                        ));
                    }
                    for rel_id in attached {
                        graph.relationships.remove(&rel_id);
                        counters.relationships_deleted += 1;
                    }
                    if graph.nodes.remove(&id).is_some() {
                        counters.nodes_deleted += 1;
                    }
                }
                Bound::Relationship(id) => {
                    if graph.relationships.remove(&id).is_some() {
                        counters.relationships_deleted += 1;
                    }
                }
            }
        }
    }
    Ok(())
}

fn project(
    graph: &Graph,
    text: &str,
    rows: &[Row],
    params: &Props,
) -> Result<(Vec<String>, Vec<Vec<PackStreamValue>>), Failure> {
    let items: Vec<(&str, String)> = split_top_level(text, ',')
        .into_iter()
        .map(|item| match item.split_once(" AS ") {
            Some((expr, name)) => (expr.trim(), identifier(name)),
            None => (item, identifier(item)),
        })
        .collect();

    let evaluate = |expr: &str, row: &Row| -> Result<PackStreamValue, Failure> {
        if let Ok(n) = expr.parse::<i64>() {
            return Ok(PackStreamValue::Integer(n));
        }
        if expr.starts_with('$') {
            return parameter(expr, params);
        }
        Ok(graph.value(bound(row, &identifier(expr))?))
    };

    let records = rows
        .iter()
        .map(|row| {
            items
                .iter()
                .map(|(expr, _)| evaluate(*expr, row))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    let fields = items.into_iter().map(|(_, name)| name).collect();
    Ok((fields, records))
}

/// 문장 하나 실행. 실패하면 그래프는 바뀌지 않음
fn execute(graph: &mut Graph, text: &str, params: &Props) -> Result<Outcome, Failure> {
    let statement = parse_statement(text)?;
    let mut working = graph.clone();
    let mut counters = Counters::default();

    let mut rows = match &statement.matches {
        Some(patterns) => match_rows(&working, patterns, statement.conditions.as_deref(), params)?,
        None => vec![Row::new()],
    };
    if let Some(create) = &statement.create {
        for row in rows.iter_mut() {
            apply_create(&mut working, create, row, params, &mut counters)?;
        }
    }
    if let Some(set) = &statement.set {
        apply_set(&mut working, set, &rows, params, &mut counters)?;
    }
    if let Some(remove) = &statement.remove {
        apply_remove(&mut working, remove, &rows, &mut counters)?;
    }
    if let Some((detach, targets)) = &statement.delete {
        apply_delete(&mut working, *detach, targets, &rows, &mut counters)?;
    }

    let (fields, records) = match &statement.returns {
        Some(returns) => project(&working, returns, &rows, params)?,
        None => (Vec::new(), Vec::new()),
    };
    let records = records
        .into_iter()
        .skip(statement.skip)
        .take(statement.limit.unwrap_or(usize::MAX))
        .collect();

    let summary = SuccessMessage::default()
        .add("stats", counters.to_map())
        .add("type", if counters.is_write() { "w" } else { "r" })
        .add("t_last", 0i64);

    *graph = working;
    Ok(Outcome {
        fields,
        records,
        summary,
        deferred: None,
    })
}

// ============================================================================
// FakeServer - 공유 상태
// ============================================================================

#[derive(Default)]
struct ServerState {
    graph: Graph,
    log: Vec<String>,
    connects: usize,
    refuse_connections: bool,
    generation: u64,
    rejected_prefixes: Vec<String>,
    pull_failures: Vec<String>,
    delay: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,
    bookmark_seq: u64,
    last_bookmark_seen: Option<String>,
}

/// 여러 연결이 공유하는 가짜 서버
#[derive(Clone, Default)]
pub(crate) struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 연결되지 않은 새 연결
    pub(crate) fn connection(&self) -> FakeConnection {
        FakeConnection {
            state: self.state.clone(),
            generation: None,
            transaction: None,
            pending: None,
            failed: false,
        }
    }

    /// 받은 요청 (RUN은 문장, 나머지는 메시지 이름)
    pub(crate) fn requests(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    /// 커밋된 노드 수
    pub(crate) fn node_count(&self) -> usize {
        self.state.lock().graph.nodes.len()
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connections = refuse;
    }

    /// 열린 연결을 모두 끊음
    pub(crate) fn drop_connections(&self) {
        self.state.lock().generation += 1;
    }

    /// 이 접두어로 시작하는 문장을 거부
    pub(crate) fn reject_statement(&self, prefix: &str) {
        self.state.lock().rejected_prefixes.push(prefix.to_string());
    }

    /// 이 접두어로 시작하는 문장은 RUN은 성공하고 PULL_ALL/DISCARD_ALL에서 실패
    pub(crate) fn fail_during_pull(&self, prefix: &str) {
        self.state.lock().pull_failures.push(prefix.to_string());
    }

    /// RUN 처리 지연
    pub(crate) fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// 동시에 처리 중이던 요청의 최대 수
    pub(crate) fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    /// 마지막 BEGIN의 북마크 파라미터
    pub(crate) fn last_bookmark_seen(&self) -> Option<String> {
        self.state.lock().last_bookmark_seen.clone()
    }
}

// ============================================================================
// FakeConnection - 연결
// ============================================================================

/// 가짜 서버로의 연결
pub(crate) struct FakeConnection {
    state: Arc<Mutex<ServerState>>,
    /// 연결된 세대 (끊기면 None 또는 서버와 다름)
    generation: Option<u64>,
    /// 열린 트랜잭션의 그래프 사본
    transaction: Option<Graph>,
    pending: Option<Outcome>,
    failed: bool,
}

impl FakeConnection {
    fn admit(&mut self, request: &Request) -> BoltResult<Option<Duration>> {
        let mut state = self.state.lock();
        if self.generation != Some(state.generation) {
            self.generation = None;
            return Err(BoltError::ConnectionClosed);
        }

        state
            .log
            .push(request.statement().unwrap_or(request.name()).to_string());
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);

        Ok(match request {
            Request::Run { .. } => state.delay,
            _ => None,
        })
    }

    fn handle(&mut self, request: Request) -> ResponseBatch {
        match request {
            Request::Init { auth, .. } => {
                if auth.principal.as_deref() == Some(REJECTED_PRINCIPAL) {
                    ResponseBatch::failure(
                        BoltErrorCode::UNAUTHORIZED,
                        "The client is unauthorized due to authentication failure.",
                    )
                } else {
                    ResponseBatch::success(vec![Response::Success(
                        SuccessMessage::default().add("server", "FakeGraph/1.0"),
                    )])
                }
            }
            // RESET은 열린 트랜잭션도 버림
            Request::Reset => {
                self.failed = false;
                self.pending = None;
                self.transaction = None;
                ResponseBatch::empty_success()
            }
            _ if self.failed => ResponseBatch {
                success: false,
                responses: vec![Response::Ignored],
            },
            Request::Run { statement, parameters } => self.run(&statement, &parameters),
            Request::PullAll => self.pull(true),
            Request::DiscardAll => self.pull(false),
        }
    }

    fn run(&mut self, statement: &str, params: &Props) -> ResponseBatch {
        let outcome = if self.pending.is_some() {
            Err((REQUEST_INVALID, "Previous result was not consumed".to_string()))
        } else {
            self.dispatch(statement, params)
        };

        match outcome {
            Ok(outcome) => {
                let fields = PackStreamValue::string_list(outcome.fields.iter());
                self.pending = Some(outcome);
                ResponseBatch::success(vec![Response::Success(
                    SuccessMessage::default()
                        .add("fields", fields)
                        .add("t_first", 0i64),
                )])
            }
            Err((code, message)) => {
                self.failed = true;
                ResponseBatch::failure(code, message)
            }
        }
    }

    fn dispatch(&mut self, statement: &str, params: &Props) -> Result<Outcome, Failure> {
        let mut state = self.state.lock();
        if state
            .rejected_prefixes
            .iter()
            .any(|prefix| statement.starts_with(prefix.as_str()))
        {
            return Err(syntax_error(format!("Statement rejected: {}", statement)));
        }
        if state
            .pull_failures
            .iter()
            .any(|prefix| statement.starts_with(prefix.as_str()))
        {
            return Ok(Outcome {
                deferred: Some((ARITHMETIC_ERROR, "/ by zero".to_string())),
                ..Outcome::empty()
            });
        }

        match statement {
            "BEGIN" => {
                if self.transaction.is_some() {
                    return Err((TRANSACTION_START_FAILED, "Transaction already open".to_string()));
                }
                state.last_bookmark_seen = params
                    .get("bookmark")
                    .and_then(|b| b.as_str())
                    .map(str::to_string);
                self.transaction = Some(state.graph.clone());
                Ok(Outcome::empty())
            }
            "COMMIT" => {
                let graph = self.transaction.take().ok_or_else(|| {
                    (BoltErrorCode::TRANSACTION_NOT_FOUND, "No transaction to commit".to_string())
                })?;
                state.graph = graph;
                state.bookmark_seq += 1;
                let mut outcome = Outcome::empty();
                outcome.summary = SuccessMessage::default()
                    .add("bookmark", format!("bm:{}", state.bookmark_seq));
                Ok(outcome)
            }
            "ROLLBACK" => {
                self.transaction = None;
                Ok(Outcome::empty())
            }
            _ => match self.transaction.as_mut() {
                Some(graph) => execute(graph, statement, params),
                None => execute(&mut state.graph, statement, params),
            },
        }
    }

    fn pull(&mut self, keep_records: bool) -> ResponseBatch {
        let Some(outcome) = self.pending.take() else {
            self.failed = true;
            return ResponseBatch::failure(REQUEST_INVALID, "No result to pull");
        };
        if let Some((code, message)) = outcome.deferred {
            self.failed = true;
            return ResponseBatch::failure(code, message);
        }

        let mut responses: Vec<Response> = if keep_records {
            outcome
                .records
                .into_iter()
                .map(|fields| Response::Record(RecordMessage::new(fields)))
                .collect()
        } else {
            Vec::new()
        };
        responses.push(Response::Success(outcome.summary));
        ResponseBatch::success(responses)
    }
}

impl Connection for FakeConnection {
    fn connect(&mut self) -> impl Future<Output = BoltResult<()>> + Send {
        let result = {
            let mut state = self.state.lock();
            if state.refuse_connections {
                Err(BoltError::Connection("Connection refused".to_string()))
            } else {
                state.connects += 1;
                Ok(state.generation)
            }
        };
        let result = result.map(|generation| {
            self.generation = Some(generation);
            self.transaction = None;
            self.pending = None;
            self.failed = false;
        });
        std::future::ready(result)
    }

    fn request(&mut self, request: Request) -> impl Future<Output = BoltResult<ResponseBatch>> + Send {
        async move {
            if let Some(delay) = self.admit(&request)? {
                tokio::time::sleep(delay).await;
            }
            let batch = self.handle(request);
            self.state.lock().in_flight -= 1;
            Ok(batch)
        }
    }

    fn disconnect(&mut self) -> impl Future<Output = BoltResult<()>> + Send {
        self.generation = None;
        self.transaction = None;
        self.pending = None;
        std::future::ready(Ok(()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, PackStreamValue)]) -> Props {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_split_clauses_respects_backticks() {
        let clauses = split_clauses("MATCH (n:`Big SET Cat`) DETACH DELETE n").unwrap();
        assert_eq!(
            clauses,
            vec![
                ("MATCH".to_string(), "(n:`Big SET Cat`)".to_string()),
                ("DETACH DELETE".to_string(), "n".to_string()),
            ]
        );
        assert!(split_clauses("THIS IS NOT CYPHER").is_err());
    }

    #[test]
    fn test_create_match_return() {
        let mut graph = Graph::default();
        let created = execute(
            &mut graph,
            "CREATE (node:T:`Big Cat` {foo: $foo}) RETURN node",
            &params(&[("foo", PackStreamValue::from("bar"))]),
        )
        .unwrap();
        assert_eq!(created.fields, vec!["node".to_string()]);
        assert_eq!(created.records.len(), 1);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[&1].labels, vec!["T".to_string(), "Big Cat".to_string()]);

        let found = execute(
            &mut graph,
            "MATCH (node:`Big Cat`) WHERE node.foo = $foo RETURN node",
            &params(&[("foo", PackStreamValue::from("bar"))]),
        )
        .unwrap();
        assert_eq!(found.records.len(), 1);
    }

    #[test]
    fn test_failed_statement_leaves_graph_unchanged() {
        let mut graph = Graph::default();
        let err = execute(&mut graph, "CREATE (node:T {foo: $foo}) RETURN node", &Props::new());
        assert_eq!(err.err().map(|(code, _)| code), Some(PARAMETER_MISSING));
        assert!(graph.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_transaction_isolation() {
        let server = FakeServer::new();
        let mut conn = server.connection();
        conn.connect().await.unwrap();

        conn.request(Request::run("BEGIN", Props::new())).await.unwrap();
        conn.request(Request::PullAll).await.unwrap();
        conn.request(Request::run("CREATE (node:T)", Props::new())).await.unwrap();
        conn.request(Request::PullAll).await.unwrap();
        assert_eq!(server.node_count(), 0);

        conn.request(Request::run("COMMIT", Props::new())).await.unwrap();
        let pulled = conn.request(Request::PullAll).await.unwrap();
        assert_eq!(pulled.bookmark(), Some("bm:1"));
        assert_eq!(server.node_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_then_ignored_until_reset() {
        let server = FakeServer::new();
        let mut conn = server.connection();
        conn.connect().await.unwrap();

        let run = conn.request(Request::run("NONSENSE", Props::new())).await.unwrap();
        assert!(!run.success);
        let pull = conn.request(Request::PullAll).await.unwrap();
        assert!(matches!(pull.responses.as_slice(), [Response::Ignored]));

        assert!(conn.request(Request::Reset).await.unwrap().success);
        assert!(conn.request(Request::run("RETURN 1 AS n", Props::new())).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_pull_failure_then_reset_drops_transaction() {
        let server = FakeServer::new();
        server.fail_during_pull("RETURN 1/0");
        let mut conn = server.connection();
        conn.connect().await.unwrap();

        conn.request(Request::run("BEGIN", Props::new())).await.unwrap();
        conn.request(Request::PullAll).await.unwrap();
        conn.request(Request::run("CREATE (node:T)", Props::new())).await.unwrap();
        conn.request(Request::PullAll).await.unwrap();

        let run = conn.request(Request::run("RETURN 1/0 AS x", Props::new())).await.unwrap();
        assert!(run.success);
        let pull = conn.request(Request::PullAll).await.unwrap();
        assert_eq!(pull.failure_message().map(|f| f.code.as_str()), Some(ARITHMETIC_ERROR));

        assert!(conn.request(Request::Reset).await.unwrap().success);
        conn.request(Request::run("COMMIT", Props::new())).await.unwrap();
        assert!(!conn.request(Request::PullAll).await.unwrap().success);
        assert_eq!(server.node_count(), 0);
    }
}
