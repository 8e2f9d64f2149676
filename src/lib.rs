//! ai-session-ingest - 会话转录摄取管线
//!
//! 为团队仪表盘提供 AI 会话 JSONL 转录的增量摄取与查询层。
//! 上传处理器把原始内容交给 [`Ingestor`]，仪表盘侧通过
//! [`StatusReporter`] 轮询进度、通过 [`SessionStore`] 读取解析行。
//!
//! # 核心功能
//!
//! - **逐行分类**: type/role/timestamp/metadata 按存在性尽力提取
//! - **容错解析**: 单行解码失败只计软错误，原文保留不丢数据
//! - **幂等存储**: 以 (file_id, line_number) 为键的批量 upsert
//! - **增量续传**: 追加上传从已处理行数之后继续，不重复存储
//! - **进度可观测**: 每批 flush 后持久化 processed_lines 供轮询
//!
//! # 策略选择
//!
//! 内容不超过 10 MB 走缓冲模式，超过走流式模式；两种模式对相同输入
//! 产生相同的最终存储状态。

pub mod batch;
pub mod classifier;
pub mod config;
pub mod error;
pub mod ingestor;
pub mod migrations;
pub mod parser;
pub mod schema;
pub mod status;
pub mod store;
pub mod types;

// Re-exports
pub use batch::{BatchWriter, BATCH_CAPACITY};
pub use classifier::{classify, Classified};
pub use config::{ConnectionMode, StoreConfig};
pub use error::{Error, Result};
pub use ingestor::{CancelToken, Ingestor};
pub use parser::{parse_buffered, parse_streaming, ParseStats, STREAMING_THRESHOLD_BYTES};
pub use status::StatusReporter;
pub use store::{RecordStore, SessionStore};
pub use types::{
    FileState, FileStatus, IngestResult, LineContent, LineRecord, ParsedLine, ProcessingStatus,
    Stats,
};
