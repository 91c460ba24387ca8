//! Record Decoder
//!
//! 와이어 값을 그래프 값으로 바꾸는 순수 함수들
//!
//! 노드/관계는 태그와 필드 수가 정확히 맞을 때만 인식하고, 맞지 않으면
//! 에러 대신 `None`을 돌려줍니다. 경로는 시퀀스가 깨져 있으면 프로토콜
//! 에러입니다.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};

use super::error::{DriverError, DriverResult};
use super::graph::{Node, Path, Relationship, RelationshipDirection, UnboundRelationship};
use super::result::QueryStats;
use super::types::Value;
use crate::bolt::packstream::{
    PackStreamStructure, PackStreamValue, DATE_TAG, DATE_TIME_TAG, LOCAL_DATE_TIME_TAG,
    NODE_ARITY, NODE_TAG, PATH_ARITY, PATH_TAG, RELATIONSHIP_ARITY, RELATIONSHIP_TAG,
    UNBOUND_RELATIONSHIP_ARITY, UNBOUND_RELATIONSHIP_TAG,
};
use crate::bolt::SuccessMessage;

/// 0001-01-01부터 1970-01-01까지의 일 수
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

// ============================================================================
// Graph structures
// ============================================================================

fn decode_properties(value: &PackStreamValue) -> Option<HashMap<String, Value>> {
    value.as_map().map(|m| {
        m.iter()
            .map(|(k, v)| (k.clone(), decode_value(v.clone())))
            .collect()
    })
}

fn shaped(value: &PackStreamValue, tag: u8, arity: usize) -> Option<&PackStreamStructure> {
    value.as_structure().filter(|s| s.is_shaped(tag, arity))
}

/// 노드 디코드: `N(id, labels, properties)`
pub fn decode_node(value: &PackStreamValue) -> Option<Node> {
    let s = shaped(value, NODE_TAG, NODE_ARITY)?;
    let id = s.fields[0].as_int()?;
    let labels = s.fields[1].as_string_list()?;
    let properties = decode_properties(&s.fields[2])?;
    Some(Node::with_id(id, labels, properties))
}

/// 관계 디코드: `R(id, start, end, type, properties)`
pub fn decode_relationship(value: &PackStreamValue) -> Option<Relationship> {
    let s = shaped(value, RELATIONSHIP_TAG, RELATIONSHIP_ARITY)?;
    let id = s.fields[0].as_int()?;
    let start = s.fields[1].as_int()?;
    let end = s.fields[2].as_int()?;
    let rel_type = s.fields[3].as_str()?;
    let properties = decode_properties(&s.fields[4])?;
    Some(Relationship::with_id(id, start, end, rel_type, properties))
}

/// 양 끝이 없는 관계 디코드: `r(id, type, properties)`
pub fn decode_unbound_relationship(value: &PackStreamValue) -> Option<UnboundRelationship> {
    let s = shaped(value, UNBOUND_RELATIONSHIP_TAG, UNBOUND_RELATIONSHIP_ARITY)?;
    Some(UnboundRelationship {
        id: s.fields[0].as_int()?,
        rel_type: s.fields[1].as_str()?.to_string(),
        properties: decode_properties(&s.fields[2])?,
    })
}

/// 경로 디코드: `P(nodes, relationships, sequence)`
///
/// 경로 구조체가 아니면 `Ok(None)`, 구조체 내용이 깨져 있으면 에러.
pub fn decode_path(value: &PackStreamValue) -> DriverResult<Option<Path>> {
    let Some(s) = shaped(value, PATH_TAG, PATH_ARITY) else {
        return Ok(None);
    };

    let list = |index: usize, what: &str| {
        s.fields[index]
            .as_list()
            .ok_or_else(|| DriverError::protocol(format!("Path {} is not a list", what)))
    };

    let nodes = list(0, "nodes")?
        .iter()
        .map(|v| decode_node(v).ok_or_else(|| DriverError::protocol("Path node is malformed")))
        .collect::<DriverResult<Vec<_>>>()?;
    let relationships = list(1, "relationships")?
        .iter()
        .map(|v| {
            decode_unbound_relationship(v)
                .ok_or_else(|| DriverError::protocol("Path relationship is malformed"))
        })
        .collect::<DriverResult<Vec<_>>>()?;
    let sequence = list(2, "sequence")?
        .iter()
        .map(|v| {
            v.as_int()
                .ok_or_else(|| DriverError::protocol("Path sequence entry is not an integer"))
        })
        .collect::<DriverResult<Vec<_>>>()?;

    Path::from_wire(&nodes, &relationships, &sequence).map(Some)
}

// ============================================================================
// Temporal structures
// ============================================================================

fn decode_date(s: &PackStreamStructure) -> Option<NaiveDate> {
    let days = i32::try_from(s.fields.first()?.as_int()?).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn decode_local_date_time(s: &PackStreamStructure) -> Option<NaiveDateTime> {
    let seconds = s.fields.first()?.as_int()?;
    let nanos = u32::try_from(s.fields.get(1)?.as_int()?).ok()?;
    DateTime::from_timestamp(seconds, nanos).map(|dt| dt.naive_utc())
}

fn decode_date_time(s: &PackStreamStructure) -> Option<DateTime<FixedOffset>> {
    let local = decode_local_date_time(s)?;
    let offset = i32::try_from(s.fields.get(2)?.as_int()?).ok()?;
    FixedOffset::east_opt(offset)?
        .from_local_datetime(&local)
        .single()
}

pub(crate) fn encode_date(date: NaiveDate) -> PackStreamValue {
    let days = i64::from(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE);
    PackStreamValue::structure(DATE_TAG, vec![PackStreamValue::Integer(days)])
}

pub(crate) fn encode_local_date_time(dt: &NaiveDateTime) -> PackStreamValue {
    let utc = dt.and_utc();
    PackStreamValue::structure(
        LOCAL_DATE_TIME_TAG,
        vec![
            PackStreamValue::Integer(utc.timestamp()),
            PackStreamValue::Integer(i64::from(utc.timestamp_subsec_nanos())),
        ],
    )
}

/// 초는 오프셋이 적용된 현지 시각 기준
pub(crate) fn encode_date_time(dt: &DateTime<FixedOffset>) -> PackStreamValue {
    let local = dt.naive_local().and_utc();
    PackStreamValue::structure(
        DATE_TIME_TAG,
        vec![
            PackStreamValue::Integer(local.timestamp()),
            PackStreamValue::Integer(i64::from(local.timestamp_subsec_nanos())),
            PackStreamValue::Integer(i64::from(dt.offset().local_minus_utc())),
        ],
    )
}

// ============================================================================
// Values
// ============================================================================

/// 값 디코드 (엄격)
///
/// 깨진 경로 구조체는 에러로 전달됩니다.
pub fn try_decode_value(value: PackStreamValue) -> DriverResult<Value> {
    match value {
        PackStreamValue::List(items) => items
            .into_iter()
            .map(try_decode_value)
            .collect::<DriverResult<Vec<_>>>()
            .map(Value::List),
        PackStreamValue::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| try_decode_value(v).map(|v| (k, v)))
            .collect::<DriverResult<HashMap<_, _>>>()
            .map(Value::Map),
        PackStreamValue::Structure(s) if s.tag == PATH_TAG => {
            let value = PackStreamValue::Structure(s);
            match decode_path(&value)? {
                Some(path) => Ok(Value::Path(path)),
                None => Ok(decode_value(value)),
            }
        }
        other => Ok(decode_value(other)),
    }
}

/// 값 디코드 (최선)
///
/// 알 수 없거나 깨진 구조체는 `_tag`와 `_0`, `_1`, ... 필드를 가진 Map이 됩니다.
pub fn decode_value(value: PackStreamValue) -> Value {
    match value {
        PackStreamValue::Null => Value::Null,
        PackStreamValue::Boolean(b) => Value::Boolean(b),
        PackStreamValue::Integer(i) => Value::Integer(i),
        PackStreamValue::Float(f) => Value::Float(f),
        PackStreamValue::String(s) => Value::String(s),
        PackStreamValue::Bytes(b) => Value::Bytes(b),
        PackStreamValue::List(l) => Value::List(l.into_iter().map(decode_value).collect()),
        PackStreamValue::Map(m) => {
            Value::Map(m.into_iter().map(|(k, v)| (k, decode_value(v))).collect())
        }
        PackStreamValue::Structure(s) => decode_structure(s),
    }
}

fn decode_structure(s: PackStreamStructure) -> Value {
    let decoded = match s.tag {
        NODE_TAG => decode_node(&PackStreamValue::Structure(s.clone())).map(Value::Node),
        RELATIONSHIP_TAG => {
            decode_relationship(&PackStreamValue::Structure(s.clone())).map(Value::Relationship)
        }
        PATH_TAG => decode_path(&PackStreamValue::Structure(s.clone()))
            .ok()
            .flatten()
            .map(Value::Path),
        DATE_TAG => decode_date(&s).map(Value::Date),
        LOCAL_DATE_TIME_TAG => decode_local_date_time(&s).map(Value::LocalDateTime),
        DATE_TIME_TAG => decode_date_time(&s).map(Value::DateTime),
        _ => None,
    };

    decoded.unwrap_or_else(|| {
        let mut map = HashMap::new();
        map.insert("_tag".to_string(), Value::Integer(i64::from(s.tag)));
        for (i, field) in s.fields.into_iter().enumerate() {
            map.insert(format!("_{}", i), decode_value(field));
        }
        Value::Map(map)
    })
}

// ============================================================================
// Encoding (graph values sent back as parameters)
// ============================================================================

fn encode_properties(properties: &HashMap<String, Value>) -> PackStreamValue {
    PackStreamValue::Map(
        properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().into()))
            .collect(),
    )
}

fn id_or_null(id: Option<i64>) -> PackStreamValue {
    id.map_or(PackStreamValue::Null, PackStreamValue::Integer)
}

/// 노드를 와이어 구조체로 인코드
pub fn encode_node(node: &Node) -> PackStreamValue {
    PackStreamValue::structure(
        NODE_TAG,
        vec![
            id_or_null(node.id),
            PackStreamValue::string_list(node.labels.iter().cloned()),
            encode_properties(&node.properties),
        ],
    )
}

/// 관계를 와이어 구조체로 인코드
pub fn encode_relationship(rel: &Relationship) -> PackStreamValue {
    PackStreamValue::structure(
        RELATIONSHIP_TAG,
        vec![
            id_or_null(rel.id),
            id_or_null(rel.from_node_id()),
            id_or_null(rel.to_node_id()),
            PackStreamValue::String(rel.rel_type.clone()),
            encode_properties(&rel.properties),
        ],
    )
}

/// 경로를 와이어 구조체로 인코드
///
/// 저장된 노드는 id 기준으로 한 번씩만 목록에 들어갑니다.
/// id가 없는 노드는 서로 구별할 수 없으므로 매번 새 항목이 됩니다.
pub fn encode_path(path: &Path) -> PackStreamValue {
    fn index_of<'a>(nodes: &mut Vec<&'a Node>, node: &'a Node) -> i64 {
        let existing = node.id.and_then(|id| nodes.iter().position(|n| n.id == Some(id)));
        match existing {
            Some(i) => i as i64,
            None => {
                nodes.push(node);
                (nodes.len() - 1) as i64
            }
        }
    }

    let mut nodes: Vec<&Node> = Vec::new();
    let mut unbound = Vec::with_capacity(path.len());
    let mut sequence = Vec::with_capacity(path.len() * 2);

    if let Some(start) = path.start() {
        index_of(&mut nodes, start);
    }
    for (i, segment) in path.segments.iter().enumerate() {
        let rel = &segment.relationship;
        unbound.push(PackStreamValue::structure(
            UNBOUND_RELATIONSHIP_TAG,
            vec![
                id_or_null(rel.id),
                PackStreamValue::String(rel.rel_type.clone()),
                encode_properties(&rel.properties),
            ],
        ));

        let rel_index = i as i64 + 1;
        let signed = match rel.direction {
            RelationshipDirection::From => rel_index,
            RelationshipDirection::To => -rel_index,
        };
        sequence.push(PackStreamValue::Integer(signed));
        sequence.push(PackStreamValue::Integer(index_of(&mut nodes, &segment.end)));
    }

    PackStreamValue::structure(
        PATH_TAG,
        vec![
            PackStreamValue::List(nodes.into_iter().map(encode_node).collect()),
            PackStreamValue::List(unbound),
            PackStreamValue::List(sequence),
        ],
    )
}

// ============================================================================
// Stats / metadata
// ============================================================================

/// 요약 메시지들에서 통계 추출
///
/// 처음 발견된 stats 맵만 사용하고, 없으면 모두 0입니다.
pub fn decode_stats<'a, I>(summaries: I) -> QueryStats
where
    I: IntoIterator<Item = &'a SuccessMessage>,
{
    let mut stats = QueryStats::default();
    let mut counters_found = false;

    for summary in summaries {
        if !counters_found {
            if let Some(map) = summary.stats() {
                let counter = |key: &str| map.get(key).and_then(|v| v.as_int()).unwrap_or(0);
                stats.nodes_created = counter("nodes-created");
                stats.nodes_deleted = counter("nodes-deleted");
                stats.relationships_created = counter("relationships-created");
                stats.relationships_deleted = counter("relationships-deleted");
                stats.properties_set = counter("properties-set");
                stats.labels_added = counter("labels-added");
                stats.labels_removed = counter("labels-removed");
                counters_found = true;
            }
        }
        if stats.query_type.is_none() {
            stats.query_type = summary.query_type().map(str::to_string);
        }
        if stats.result_available_after.is_none() {
            stats.result_available_after = summary.result_available_after();
        }
        if stats.result_consumed_after.is_none() {
            stats.result_consumed_after = summary.result_consumed_after();
        }
    }

    stats
}

// ============================================================================
// Tests
// ============================================================================
