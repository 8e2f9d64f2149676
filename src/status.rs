//! 状态查询
//!
//! 供轮询客户端读取文件处理状态。纯读，不触发也不阻塞摄取。

use crate::error::Result;
use crate::store::RecordStore;
use crate::types::FileStatus;

/// 状态查询器
pub struct StatusReporter<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> StatusReporter<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// 查询文件的处理状态
    ///
    /// 未知 file_id 返回 `None`，与任何处理状态都是不同的结果。
    /// 正常摄取期间轮询方会看到 processing 且 processed_lines 递增，
    /// 成功后是 completed + 最终行数，失败后是 failed + 错误消息。
    pub fn get_status(&self, file_id: &str) -> Result<Option<FileStatus>> {
        self.store.get_file_status(file_id)
    }
}
