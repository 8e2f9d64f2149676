//! 批量写入器
//!
//! 缓冲分类后的行，攒满一批做一次幂等 bulk upsert。
//! 单个文件处理期间独占持有，不跨文件/线程共享。

use crate::error::Result;
use crate::store::RecordStore;
use crate::types::ParsedLine;

/// 默认批容量
pub const BATCH_CAPACITY: usize = 100;

/// 批量写入器
pub struct BatchWriter<'a> {
    store: &'a dyn RecordStore,
    file_id: &'a str,
    capacity: usize,
    pending: Vec<ParsedLine>,
    /// 已成功 flush 的行数
    flushed: i64,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn RecordStore, file_id: &'a str) -> Self {
        Self::with_capacity(store, file_id, BATCH_CAPACITY)
    }

    pub fn with_capacity(store: &'a dyn RecordStore, file_id: &'a str, capacity: usize) -> Self {
        Self {
            store,
            file_id,
            capacity: capacity.max(1),
            pending: Vec::with_capacity(capacity.max(1)),
            flushed: 0,
        }
    }

    /// 追加一行，攒满容量时自动 flush
    ///
    /// flush 失败向上传播，调用方不得继续喂入后续行。
    pub fn add(&mut self, line: ParsedLine) -> Result<()> {
        self.pending.push(line);
        if self.pending.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// 把缓冲的行一次性 upsert，并更新持久化进度
    ///
    /// 空缓冲时是 no-op (主循环结束后总会再调用一次做收尾)。
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        self.store.upsert_lines(self.file_id, &self.pending)?;

        // 行号在单次运行内单调递增，最后一行的行号即当前进度
        let progress = self.pending.last().map(|l| l.line_number).unwrap_or(0);
        self.store.update_progress(self.file_id, progress)?;

        self.flushed += self.pending.len() as i64;
        tracing::debug!(
            "Flushed batch: file={} lines={} progress={}",
            self.file_id,
            self.pending.len(),
            progress
        );
        self.pending.clear();

        Ok(())
    }

    /// 累计 flush 成功的行数
    pub fn flushed(&self) -> i64 {
        self.flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{FileStatus, LineContent};
    use parking_lot::Mutex;

    /// 记录 flush 行为的 mock 存储
    #[derive(Default)]
    struct MockStore {
        flush_sizes: Mutex<Vec<usize>>,
        progress: Mutex<Vec<i64>>,
        fail_on_flush: Option<usize>, // 第 N 次 flush 时失败 (1-based)
    }

    impl RecordStore for MockStore {
        fn upsert_lines(&self, _file_id: &str, lines: &[ParsedLine]) -> Result<usize> {
            let mut sizes = self.flush_sizes.lock();
            if self.fail_on_flush == Some(sizes.len() + 1) {
                return Err(Error::Config("storage rejected".into()));
            }
            sizes.push(lines.len());
            Ok(lines.len())
        }

        fn update_progress(&self, _file_id: &str, processed_lines: i64) -> Result<()> {
            self.progress.lock().push(processed_lines);
            Ok(())
        }

        fn begin_processing(&self, _file_id: &str, _resume: i64) -> Result<()> {
            Ok(())
        }
        fn mark_completed(&self, _file_id: &str, _lines: i64) -> Result<()> {
            Ok(())
        }
        fn mark_failed(&self, _file_id: &str, _message: &str) -> Result<()> {
            Ok(())
        }
        fn stored_line_count(&self, _file_id: &str) -> Result<i64> {
            Ok(0)
        }
        fn get_file_status(&self, _file_id: &str) -> Result<Option<FileStatus>> {
            Ok(None)
        }
    }

    fn line(n: i64) -> ParsedLine {
        ParsedLine {
            line_number: n,
            raw_text: format!("{{\"n\":{}}}", n),
            content: LineContent::Decoded(serde_json::json!({ "n": n })),
            message_type: None,
            message_timestamp: None,
            metadata: None,
        }
    }

    #[test]
    fn test_auto_flush_at_capacity() {
        let store = MockStore::default();
        let mut writer = BatchWriter::with_capacity(&store, "file-1", 3);

        for n in 1..=7 {
            writer.add(line(n)).unwrap();
        }
        writer.flush().unwrap();

        // 3 + 3 + 1
        assert_eq!(*store.flush_sizes.lock(), vec![3, 3, 1]);
        assert_eq!(writer.flushed(), 7);
        // 每批 flush 后进度推进到批尾行号
        assert_eq!(*store.progress.lock(), vec![3, 6, 7]);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let store = MockStore::default();
        let mut writer = BatchWriter::with_capacity(&store, "file-1", 3);

        writer.flush().unwrap();
        writer.flush().unwrap();

        assert!(store.flush_sizes.lock().is_empty());
        assert!(store.progress.lock().is_empty());
    }

    #[test]
    fn test_flush_failure_propagates() {
        let store = MockStore {
            fail_on_flush: Some(1),
            ..Default::default()
        };
        let mut writer = BatchWriter::with_capacity(&store, "file-1", 2);

        writer.add(line(1)).unwrap();
        let err = writer.add(line(2)).unwrap_err();
        assert!(err.to_string().contains("storage rejected"));
        assert_eq!(writer.flushed(), 0);
    }
}
