//! 记录存储 (SQLite)
//!
//! 持久化两张表: session_files (文件处理状态) 和 session_lines (解析行)。
//! 摄取管线通过 `RecordStore` trait 访问存储，便于测试时替换为 mock。

use crate::config::{ConnectionMode, StoreConfig};
use crate::error::{Error, Result};
use crate::migrations;
use crate::schema;
use crate::types::{FileState, FileStatus, LineRecord, ParsedLine, ProcessingStatus, Stats};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// 摄取管线对存储的最小依赖
///
/// 由调用方构造并注入 (请求级或进程级生命周期)，不做模块级单例。
pub trait RecordStore: Send + Sync {
    /// 批量幂等 upsert，键为 (file_id, line_number)
    fn upsert_lines(&self, file_id: &str, lines: &[ParsedLine]) -> Result<usize>;

    /// 更新进度计数 (每批 flush 后调用，轮询方据此观察前进)
    fn update_progress(&self, file_id: &str, processed_lines: i64) -> Result<()>;

    /// 进入 processing 状态；行不存在时先注册为 pending
    ///
    /// processed_lines 以续传偏移为起点 (首次上传为 0 即重置)。
    fn begin_processing(&self, file_id: &str, resume_from_line: i64) -> Result<()>;

    /// 标记完成，processed_lines 设为总行数
    fn mark_completed(&self, file_id: &str, processed_lines: i64) -> Result<()>;

    /// 标记失败并记录错误消息；已 flush 的批次保留不回滚
    fn mark_failed(&self, file_id: &str, message: &str) -> Result<()>;

    /// 已存储的行数 (续传偏移来源)
    fn stored_line_count(&self, file_id: &str) -> Result<i64>;

    /// 状态查询 (纯读，不触发摄取)；未知 file_id 返回 None
    fn get_file_status(&self, file_id: &str) -> Result<Option<FileStatus>>;
}

/// SQLite 记录存储
pub struct SessionStore {
    pub(crate) conn: Arc<Mutex<Connection>>,
    #[allow(dead_code)]
    config: StoreConfig,
}

impl SessionStore {
    /// 连接存储
    pub fn connect(config: StoreConfig) -> Result<Self> {
        match config.mode {
            ConnectionMode::Local => Self::connect_local(&config),
            ConnectionMode::Remote => Err(Error::Config("远程连接暂不支持".into())),
        }
    }

    /// 连接本地 SQLite
    fn connect_local(config: &StoreConfig) -> Result<Self> {
        let path = Path::new(&config.url);

        // 确保目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // 执行数据库迁移（先于 schema，为老数据库添加缺失的列）
        migrations::run_migrations(&conn)?;

        // 初始化 schema（创建表和索引）
        conn.execute_batch(schema::SCHEMA_SQL)?;

        tracing::info!("记录存储已连接: {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config: config.clone(),
        })
    }

    /// 获取底层连接 (用于测试)
    #[doc(hidden)]
    pub fn connection(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    // ==================== 文件状态操作 ====================

    /// 注册文件 (首次出现时创建 pending 行，已存在则不动)
    pub fn register_file(&self, file_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = current_time_ms();

        conn.execute(
            r#"
            INSERT INTO session_files (file_id, processing_status, created_at, updated_at)
            VALUES (?1, 'pending', ?2, ?2)
            ON CONFLICT(file_id) DO NOTHING
            "#,
            params![file_id, now],
        )?;

        Ok(())
    }

    /// 获取完整文件状态行
    pub fn get_file_state(&self, file_id: &str) -> Result<Option<FileState>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
            SELECT id, file_id, processing_status, processed_lines, processing_error,
                   created_at, updated_at
            FROM session_files
            WHERE file_id = ?1
            "#,
            params![file_id],
            |row| {
                let status: String = row.get(2)?;
                Ok(FileState {
                    id: row.get(0)?,
                    file_id: row.get(1)?,
                    processing_status: status
                        .parse::<ProcessingStatus>()
                        .unwrap_or(ProcessingStatus::Pending),
                    processed_lines: row.get(3)?,
                    processing_error: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    /// 列出所有文件状态 (仪表盘用，按更新时间倒序)
    pub fn list_files(&self, limit: usize, offset: usize) -> Result<Vec<FileState>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, file_id, processing_status, processed_lines, processing_error,
                   created_at, updated_at
            FROM session_files
            ORDER BY updated_at DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            let status: String = row.get(2)?;
            Ok(FileState {
                id: row.get(0)?,
                file_id: row.get(1)?,
                processing_status: status
                    .parse::<ProcessingStatus>()
                    .unwrap_or(ProcessingStatus::Pending),
                processed_lines: row.get(3)?,
                processing_error: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // ==================== 行查询操作 ====================

    /// 按键点查单行
    pub fn get_line(&self, file_id: &str, line_number: i64) -> Result<Option<LineRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
            SELECT id, file_id, line_number, raw_text, content, message_type,
                   message_timestamp, timestamp_ms, metadata, created_at, updated_at
            FROM session_lines
            WHERE file_id = ?1 AND line_number = ?2
            "#,
            params![file_id, line_number],
            map_line_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// 获取文件的行记录 (按行号排序，支持分页)
    pub fn list_lines(&self, file_id: &str, limit: usize, offset: usize) -> Result<Vec<LineRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, file_id, line_number, raw_text, content, message_type,
                   message_timestamp, timestamp_ms, metadata, created_at, updated_at
            FROM session_lines
            WHERE file_id = ?1
            ORDER BY line_number
            LIMIT ?2 OFFSET ?3
            "#,
        )?;

        let rows = stmt.query_map(params![file_id, limit as i64, offset as i64], map_line_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// 文件的已存储行数
    pub fn count_lines(&self, file_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM session_lines WHERE file_id = ?1",
            params![file_id],
            |row| row.get(0),
        )
        .map_err(Into::into)
    }

    /// 全局统计
    pub fn get_stats(&self) -> Result<Stats> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM session_files),
                (SELECT COUNT(*) FROM session_lines)
            "#,
            [],
            |row| {
                Ok(Stats {
                    file_count: row.get(0)?,
                    line_count: row.get(1)?,
                })
            },
        )
        .map_err(Into::into)
    }
}

impl RecordStore for SessionStore {
    fn upsert_lines(&self, file_id: &str, lines: &[ParsedLine]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = current_time_ms();

        for line in lines {
            let content_json = match line.content.as_value() {
                Some(v) => Some(serde_json::to_string(v)?),
                None => None,
            };
            let metadata_json = match &line.metadata {
                Some(m) => Some(serde_json::to_string(m)?),
                None => None,
            };

            tx.execute(
                r#"
                INSERT INTO session_lines (file_id, line_number, raw_text, content, message_type,
                                           message_timestamp, timestamp_ms, metadata, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                ON CONFLICT(file_id, line_number) DO UPDATE SET
                    raw_text = excluded.raw_text,
                    content = excluded.content,
                    message_type = excluded.message_type,
                    message_timestamp = excluded.message_timestamp,
                    timestamp_ms = excluded.timestamp_ms,
                    metadata = excluded.metadata,
                    updated_at = excluded.updated_at
                "#,
                params![
                    file_id,
                    line.line_number,
                    &line.raw_text,
                    content_json,
                    &line.message_type,
                    &line.message_timestamp,
                    line.timestamp_ms(),
                    metadata_json,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(lines.len())
    }

    fn update_progress(&self, file_id: &str, processed_lines: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE session_files SET processed_lines = ?1, updated_at = ?2 WHERE file_id = ?3",
            params![processed_lines, current_time_ms(), file_id],
        )?;
        Ok(())
    }

    fn begin_processing(&self, file_id: &str, resume_from_line: i64) -> Result<()> {
        let conn = self.conn.lock();
        let now = current_time_ms();

        // 终止态可重入: pending/completed/failed 都允许再次进入 processing。
        // 同一 file_id 的并发调用由调用方串行化 (见 Ingestor::ingest 文档)。
        conn.execute(
            r#"
            INSERT INTO session_files (file_id, processing_status, processed_lines, created_at, updated_at)
            VALUES (?1, 'processing', ?2, ?3, ?3)
            ON CONFLICT(file_id) DO UPDATE SET
                processing_status = 'processing',
                processed_lines = excluded.processed_lines,
                processing_error = NULL,
                updated_at = excluded.updated_at
            "#,
            params![file_id, resume_from_line, now],
        )?;

        Ok(())
    }

    fn mark_completed(&self, file_id: &str, processed_lines: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            UPDATE session_files SET
                processing_status = 'completed',
                processed_lines = ?1,
                processing_error = NULL,
                updated_at = ?2
            WHERE file_id = ?3
            "#,
            params![processed_lines, current_time_ms(), file_id],
        )?;
        Ok(())
    }

    fn mark_failed(&self, file_id: &str, message: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            UPDATE session_files SET
                processing_status = 'failed',
                processing_error = ?1,
                updated_at = ?2
            WHERE file_id = ?3
            "#,
            params![message, current_time_ms(), file_id],
        )?;
        Ok(())
    }

    fn stored_line_count(&self, file_id: &str) -> Result<i64> {
        self.count_lines(file_id)
    }

    fn get_file_status(&self, file_id: &str) -> Result<Option<FileStatus>> {
        Ok(self.get_file_state(file_id)?.map(|state| FileStatus {
            status: state.processing_status,
            processed_lines: state.processed_lines,
            error: state.processing_error,
        }))
    }
}

/// 行记录的 row mapper
fn map_line_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LineRecord> {
    let content: Option<String> = row.get(4)?;
    let metadata: Option<String> = row.get(8)?;

    Ok(LineRecord {
        id: row.get(0)?,
        file_id: row.get(1)?,
        line_number: row.get(2)?,
        raw_text: row.get(3)?,
        content: content.and_then(|s| serde_json::from_str(&s).ok()),
        message_type: row.get(5)?,
        message_timestamp: row.get(6)?,
        timestamp_ms: row.get(7)?,
        metadata: metadata.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// 当前毫秒时间戳
pub(crate) fn current_time_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
