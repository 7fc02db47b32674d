//! 출력 객체 -- 처리된 이벤트와 매칭된 룰을 응답의 `output` JSON으로 변환합니다.
//!
//! ```json
//! {
//!   "timestamp": "2024-07-01T12:00:00.000+0000",
//!   "rule": { "level": 5, "description": "...", "id": "5710", "firedtimes": 1, "groups": ["sshd"] },
//!   "agent": { "id": "000", "name": "logtest" },
//!   "manager": { "name": "logtest" },
//!   "id": "1719835200.0",
//!   "full_log": "...",
//!   "predecoder": { "timestamp": "Jul  1 12:00:00", "hostname": "host", "program_name": "sshd" },
//!   "decoder": { "name": "sshd" },
//!   "data": { "srcip": "10.0.0.5" },
//!   "location": "/var/log/auth.log"
//! }
//! ```

use serde_json::{Map, Value, json};

use crate::event::Event;
use crate::rule::{RuleState, RuleTree};

/// 로컬 에이전트 ID
pub const LOCAL_AGENT_ID: &str = "000";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// 이벤트를 출력 객체로 변환합니다.
pub fn render(event: &Event, rules: &RuleTree, state: &RuleState, manager_name: &str) -> Value {
    let mut out = Map::new();

    out.insert(
        "timestamp".to_owned(),
        Value::String(event.generate_time.format(TIMESTAMP_FORMAT).to_string()),
    );

    if let Some(idx) = event.generated_rule {
        if let Some(rule) = rules.get(idx) {
            let mut rule_obj = Map::new();
            rule_obj.insert("level".to_owned(), json!(rule.level()));
            rule_obj.insert(
                "description".to_owned(),
                Value::String(rule.render_description(event)),
            );
            rule_obj.insert("id".to_owned(), Value::String(rule.id().to_string()));
            if let Some(frequency) = rule.frequency() {
                rule_obj.insert("frequency".to_owned(), json!(frequency));
            }
            rule_obj.insert("firedtimes".to_owned(), json!(state.firedtimes(idx)));
            rule_obj.insert("groups".to_owned(), json!(rule.groups()));
            out.insert("rule".to_owned(), Value::Object(rule_obj));
        }
    }

    out.insert(
        "agent".to_owned(),
        json!({ "id": LOCAL_AGENT_ID, "name": manager_name }),
    );
    out.insert("manager".to_owned(), json!({ "name": manager_name }));
    out.insert("id".to_owned(), Value::String(event.alert_id.clone()));
    out.insert("full_log".to_owned(), Value::String(event.full_log.clone()));

    let mut predecoder = Map::new();
    if let Some(ts) = &event.header_timestamp {
        predecoder.insert("timestamp".to_owned(), Value::String(ts.clone()));
    }
    if let Some(host) = &event.hostname {
        predecoder.insert("hostname".to_owned(), Value::String(host.clone()));
    }
    if let Some(program) = &event.program_name {
        predecoder.insert("program_name".to_owned(), Value::String(program.clone()));
    }
    if !predecoder.is_empty() {
        out.insert("predecoder".to_owned(), Value::Object(predecoder));
    }

    if let Some(decoder) = &event.decoder {
        let mut decoder_obj = Map::new();
        if let Some(parent) = &decoder.parent {
            decoder_obj.insert("parent".to_owned(), Value::String(parent.clone()));
        }
        decoder_obj.insert("name".to_owned(), Value::String(decoder.name.clone()));
        out.insert("decoder".to_owned(), Value::Object(decoder_obj));
    }

    if !event.fields.is_empty() {
        let mut data = Map::new();
        for (name, value) in &event.fields {
            insert_nested(&mut data, name, value);
        }
        out.insert("data".to_owned(), Value::Object(data));
    }

    out.insert("location".to_owned(), Value::String(event.location.clone()));

    if !event.previous_output.is_empty() {
        out.insert(
            "previous_output".to_owned(),
            Value::String(event.previous_output.join("\n")),
        );
    }

    Value::Object(out)
}

/// 점(.)으로 구분된 필드 이름을 중첩 객체로 펼칩니다.
///
/// 중간 경로에 이미 문자열 값이 있으면 평탄한 키로 저장합니다.
fn insert_nested(data: &mut Map<String, Value>, name: &str, value: &str) {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 1 && parts.iter().all(|p| !p.is_empty()) {
        if let Some(slot) = nested_slot(data, &parts) {
            *slot = Value::String(value.to_owned());
            return;
        }
    }
    data.insert(name.to_owned(), Value::String(value.to_owned()));
}

fn nested_slot<'a>(data: &'a mut Map<String, Value>, parts: &[&str]) -> Option<&'a mut Value> {
    let (last, parents) = parts.split_last()?;
    let mut current = data;
    for part in parents {
        let entry = current
            .entry((*part).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        current = entry.as_object_mut()?;
    }
    if current.get(*last).is_some_and(Value::is_object) {
        return None;
    }
    Some(
        current
            .entry((*last).to_owned())
            .or_insert(Value::Null),
    )
}
