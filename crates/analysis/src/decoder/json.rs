//! JSON 플러그인 디코더 -- 객체를 점(.) 구분 필드로 평탄화합니다.

use serde_json::Value;

/// 평탄화할 최대 중첩 깊이
const MAX_DEPTH: usize = 16;

/// `text`가 JSON 객체이면 평탄화된 (필드, 값) 목록을 반환합니다.
///
/// 배열은 JSON 문자열 그대로, `null`은 건너뜁니다.
pub fn decode(text: &str) -> Option<Vec<(String, String)>> {
    let Value::Object(map) = serde_json::from_str::<Value>(text.trim()).ok()? else {
        return None;
    };

    let mut fields = Vec::new();
    for (key, value) in &map {
        flatten(key, value, 0, &mut fields);
    }
    Some(fields)
}

fn flatten(prefix: &str, value: &Value, depth: usize, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push((prefix.to_owned(), b.to_string())),
        Value::Number(n) => out.push((prefix.to_owned(), n.to_string())),
        Value::String(s) => out.push((prefix.to_owned(), s.clone())),
        Value::Array(_) => out.push((prefix.to_owned(), value.to_string())),
        Value::Object(map) if depth < MAX_DEPTH => {
            for (key, nested) in map {
                flatten(&format!("{prefix}.{key}"), nested, depth + 1, out);
            }
        }
        Value::Object(_) => out.push((prefix.to_owned(), value.to_string())),
    }
}
