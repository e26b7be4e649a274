//! 구조화 데이터 → 텍스트 직렬화
//!
//! INI와 YAML 파서가 공유합니다. 파싱한 중첩 값을 `serde_json::Value`로
//! 정규화한 뒤 정렬된 키 순서의 pretty JSON으로 출력하므로,
//! 같은 입력은 항상 같은 텍스트가 됩니다.

use serde_json::{Map, Number, Value};

/// 중첩 값을 결정적인 텍스트로 직렬화
pub fn render(value: &Value) -> String {
    let canonical = sort_keys(value);
    serde_json::to_string_pretty(&canonical).unwrap_or_else(|_| canonical.to_string())
}

/// 모든 객체의 키를 정렬된 순서로 다시 삽입
///
/// serde_json의 `preserve_order` 기능이 켜져 있어도 출력 순서가 같아야 함
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// YAML 값을 JSON 값으로 변환
///
/// 문자열이 아닌 키는 문자열로 바꾸고, 태그는 내부 값만 남깁니다.
pub fn from_yaml(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(from_yaml).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(yaml_key(&key), from_yaml(value));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        // NaN / inf는 JSON 숫자로 표현 불가
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(n.to_string()))
    }
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Tagged(tagged) => yaml_key(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

// ============================================================================
// Tests
// ============================================================================
