//! 数据类型定义

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 文件处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            _ => Err(format!("Invalid processing status: {}", s)),
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

/// 行内容的两种形态
///
/// 软错误计数直接来源于 `Raw` 变体的数量，不走 try/catch 兜底。
#[derive(Debug, Clone, PartialEq)]
pub enum LineContent {
    /// 解码成功的结构化值
    Decoded(serde_json::Value),
    /// 解码失败，仅保留原文 (原文存放在 ParsedLine.raw_text)
    Raw,
}

impl LineContent {
    pub fn is_decoded(&self) -> bool {
        matches!(self, LineContent::Decoded(_))
    }

    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            LineContent::Decoded(v) => Some(v),
            LineContent::Raw => None,
        }
    }
}

/// 解析后的行 (每个非空源行一条，解码失败不丢数据)
#[derive(Debug, Clone)]
pub struct ParsedLine {
    /// 文件内 1-based 行号 (按非空行顺序编号)，幂等 upsert 的键
    pub line_number: i64,
    /// 原始行文本，始终保留
    pub raw_text: String,
    /// 解码结果
    pub content: LineContent,
    /// 分类标签: type 字段优先，缺失时回退 role 字段
    pub message_type: Option<String>,
    /// timestamp 字段，原样保留不做校验
    pub message_timestamp: Option<String>,
    /// metadata 字段
    pub metadata: Option<serde_json::Value>,
}

impl ParsedLine {
    /// 尽力解析 message_timestamp 为毫秒时间戳
    ///
    /// 支持 RFC 3339 字符串和纯数字毫秒值，解析失败返回 None。
    pub fn timestamp_ms(&self) -> Option<i64> {
        let ts = self.message_timestamp.as_deref()?;
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(ts) {
            return Some(dt.timestamp_millis());
        }
        ts.parse::<i64>().ok()
    }
}

/// 已持久化的行记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRecord {
    pub id: i64,
    pub file_id: String,
    pub line_number: i64,
    pub raw_text: String,
    pub content: Option<serde_json::Value>,
    pub message_type: Option<String>,
    pub message_timestamp: Option<String>,
    pub timestamp_ms: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// 文件处理状态行 (完整)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileState {
    pub id: i64,
    pub file_id: String,
    pub processing_status: ProcessingStatus,
    pub processed_lines: i64,
    pub processing_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// 状态查询视图 (轮询客户端用)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub status: ProcessingStatus,
    pub processed_lines: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 摄取结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
    pub success: bool,
    /// 本次结束时文件的总非空行数
    pub processed_lines: i64,
    /// 本次新写入且解码成功的行数
    pub new_lines: i64,
    /// 本次软错误 (解码失败) 行数
    pub errors: i64,
    /// 致命错误消息 (仅 success = false 时设置)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 统计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub file_count: i64,
    pub line_count: i64,
}
