//! 数据库 Schema 定义

/// 核心 Schema SQL
pub const SCHEMA_SQL: &str = r#"
-- 文件处理状态表 (每个上传的 JSONL 文件一行)
CREATE TABLE IF NOT EXISTS session_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id TEXT NOT NULL UNIQUE,
    processing_status TEXT NOT NULL DEFAULT 'pending',  -- pending | processing | completed | failed
    processed_lines INTEGER NOT NULL DEFAULT 0,         -- 已处理行数 (轮询进度用，批次内单调递增)
    processing_error TEXT,                              -- 最近一次致命错误 (仅 failed 时设置)
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);

-- 解析行表 (每个非空行一条记录)
CREATE TABLE IF NOT EXISTS session_lines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id TEXT NOT NULL,
    line_number INTEGER NOT NULL,   -- 1-based，按过滤后的非空行顺序编号
    raw_text TEXT NOT NULL,         -- 原始行文本，解码失败也保留
    content TEXT,                   -- 解码后的 JSON (序列化存储)，解码失败为 NULL
    message_type TEXT,              -- "user" | "assistant" | "summary" | 自定义 type/role
    message_timestamp TEXT,         -- timestamp 字段原样保留
    timestamp_ms INTEGER,           -- 尽力解析的毫秒时间戳 (排序用)
    metadata TEXT,                  -- metadata 字段 (JSON)
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),

    UNIQUE(file_id, line_number),   -- 幂等 upsert 的键
    FOREIGN KEY (file_id) REFERENCES session_files(file_id)
);

-- 索引
CREATE INDEX IF NOT EXISTS idx_files_status ON session_files(processing_status);
CREATE INDEX IF NOT EXISTS idx_files_updated ON session_files(updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_lines_file ON session_lines(file_id);
CREATE INDEX IF NOT EXISTS idx_lines_type ON session_lines(message_type);
CREATE INDEX IF NOT EXISTS idx_lines_timestamp ON session_lines(timestamp_ms);
"#;
