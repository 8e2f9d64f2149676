//! 行分类器
//!
//! 对单行文本做结构化解码和字段提取。上游生产者没有固定 schema，
//! 所有字段都是按存在性尽力提取，解码失败降级为 Raw 而不是报错。

use crate::types::LineContent;
use serde_json::Value;

/// 分类结果 (不含行号，行号由解析器分配)
#[derive(Debug, Clone)]
pub struct Classified {
    pub content: LineContent,
    pub message_type: Option<String>,
    pub message_timestamp: Option<String>,
    pub metadata: Option<Value>,
}

/// 分类单行
///
/// 总函数：永不失败。解码成功时按优先级提取:
/// 1. `type` 字段 → message_type
/// 2. `role` 字段 → message_type (type 缺失时)
/// 3. `timestamp` 字段 → message_timestamp (原样保留)
/// 4. `metadata` 字段 → metadata
///
/// 解码失败时返回 `LineContent::Raw`，所有可选字段为 None。
pub fn classify(raw: &str) -> Classified {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            let message_type = field_str(&value, "type").or_else(|| field_str(&value, "role"));
            let message_timestamp = extract_timestamp(&value);
            let metadata = value
                .get("metadata")
                .filter(|m| !m.is_null())
                .cloned();

            Classified {
                message_type,
                message_timestamp,
                metadata,
                content: LineContent::Decoded(value),
            }
        }
        Err(_) => Classified {
            content: LineContent::Raw,
            message_type: None,
            message_timestamp: None,
            metadata: None,
        },
    }
}

/// 提取字符串字段
fn field_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(String::from)
}

/// 提取 timestamp 字段 (字符串原样保留，数字渲染为十进制)
fn extract_timestamp(value: &Value) -> Option<String> {
    match value.get("timestamp") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
