//! 摄取编排器
//!
//! 公共入口: 按内容大小选择缓冲/流式策略，驱动解析器和批量写入器，
//! 管理文件状态机 (pending → processing → completed/failed)。

use crate::batch::{BatchWriter, BATCH_CAPACITY};
use crate::error::{Error, Result};
use crate::parser::{self, ParseStats, STREAMING_THRESHOLD_BYTES};
use crate::store::RecordStore;
use crate::types::{IngestResult, ParsedLine};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 协作式取消令牌
///
/// 每行检查一次。取消后状态保持 processing，已 flush 的批次保留，
/// 重试可以从已存储的行数继续。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// 摄取编排器
///
/// 存储由调用方构造并注入，生命周期归调用方所有。
pub struct Ingestor<'a> {
    store: &'a dyn RecordStore,
    batch_capacity: usize,
    cancel: CancelToken,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self {
            store,
            batch_capacity: BATCH_CAPACITY,
            cancel: CancelToken::new(),
        }
    }

    /// 覆盖批容量 (测试用)
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity;
        self
    }

    /// 获取取消令牌 (可跨线程持有)
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// 摄取一个文件的内容
    ///
    /// - `content`: 完整 JSONL 文本 (续传时包含整个文件)
    /// - `file_id`: 不透明标识，upsert 键空间 + 状态行键
    /// - `resume_from_line`: 此文件已处理的行数 (首次上传为 0)
    ///
    /// 内容不超过 10 MB 走缓冲模式，超过走流式模式；两种模式对相同
    /// 输入产生相同的最终存储状态。
    ///
    /// 同一 file_id 不允许并发调用——并发写会在续传偏移和批次交错上
    /// 竞争，需要的话由调用方按键串行化。
    pub fn ingest(&self, file_id: &str, content: &str, resume_from_line: i64) -> Result<IngestResult> {
        if content.len() <= STREAMING_THRESHOLD_BYTES {
            self.run_with(file_id, resume_from_line, |emit| {
                parser::parse_buffered(content, resume_from_line, emit)
            })
        } else {
            let cursor = std::io::Cursor::new(content.as_bytes());
            self.run_with(file_id, resume_from_line, |emit| {
                parser::parse_streaming(cursor, resume_from_line, emit)
            })
        }
    }

    /// 从流式源摄取 (内容以有界块到达，不要求整体驻留内存)
    pub fn ingest_streaming<R: BufRead>(
        &self,
        file_id: &str,
        reader: R,
        resume_from_line: i64,
    ) -> Result<IngestResult> {
        self.run_with(file_id, resume_from_line, |emit| {
            parser::parse_streaming(reader, resume_from_line, emit)
        })
    }

    /// 以已存储行数为续传偏移摄取 (追加上传场景的便捷入口)
    pub fn ingest_resuming(&self, file_id: &str, content: &str) -> Result<IngestResult> {
        let resume = self.store.stored_line_count(file_id)?;
        self.ingest(file_id, content, resume)
    }

    /// 状态机 + 主循环
    fn run_with<P>(&self, file_id: &str, resume_from_line: i64, parse: P) -> Result<IngestResult>
    where
        P: FnOnce(&mut dyn FnMut(ParsedLine) -> Result<()>) -> Result<ParseStats>,
    {
        // pending/completed/failed → processing；进度计数以续传偏移为起点
        self.store.begin_processing(file_id, resume_from_line)?;

        let mut writer = BatchWriter::with_capacity(self.store, file_id, self.batch_capacity);
        let cancel = self.cancel.clone();

        // flush 相对解析循环同步: 批边界处 flush 未确认前不会读后续行，
        // 致命 flush 错误因此能阻止该文件的任何后续批次。
        let parsed = {
            let mut emit = |line: ParsedLine| -> Result<()> {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                writer.add(line)
            };
            parse(&mut emit)
        };

        // 主循环结束后总要再 flush 一次收尾 (空批是 no-op)
        let outcome = parsed.and_then(|stats| {
            writer.flush()?;
            Ok(stats)
        });

        match outcome {
            Ok(stats) => {
                self.store.mark_completed(file_id, stats.total_lines)?;
                tracing::info!(
                    "摄取完成: file={} total={} new={} soft_errors={}",
                    file_id,
                    stats.total_lines,
                    stats.decoded,
                    stats.soft_errors
                );
                Ok(IngestResult {
                    success: true,
                    processed_lines: stats.total_lines,
                    new_lines: stats.decoded,
                    errors: stats.soft_errors,
                    error: None,
                })
            }
            Err(Error::Cancelled) => {
                // 状态保持 processing，已 flush 的行保留，重试即续传
                tracing::warn!(
                    "摄取已取消: file={} 已保留 {} 行",
                    file_id,
                    writer.flushed()
                );
                Err(Error::Cancelled)
            }
            Err(e) => {
                let message = e.to_string();
                self.store.mark_failed(file_id, &message)?;
                tracing::error!("摄取失败: file={} error={}", file_id, message);
                Ok(IngestResult {
                    success: false,
                    error: Some(message),
                    ..Default::default()
                })
            }
        }
    }
}
