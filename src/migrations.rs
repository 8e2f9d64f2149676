//! 数据库迁移模块

use rusqlite::{Connection, Result as SqliteResult};
use tracing::info;

/// 迁移版本
const MIGRATION_VERSION: i64 = 1;

/// 初始化迁移系统
pub fn initialize_migrations(conn: &Connection) -> SqliteResult<()> {
    // 创建迁移版本表
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )
        "#,
        [],
    )?;

    Ok(())
}

/// 获取当前数据库版本
fn get_current_version(conn: &Connection) -> SqliteResult<i64> {
    let version: SqliteResult<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        });

    match version {
        Ok(v) => Ok(v),
        Err(_) => Ok(0), // 如果表为空，返回 0
    }
}

/// 记录迁移版本
fn record_migration(conn: &Connection, version: i64) -> SqliteResult<()> {
    let current_time_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    conn.execute(
        "INSERT OR REPLACE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        [version, current_time_ms],
    )?;

    Ok(())
}

/// 检查表是否存在
fn table_exists(conn: &Connection, table: &str) -> SqliteResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// 检查列是否存在
fn column_exists(conn: &Connection, table: &str, column: &str) -> SqliteResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt.query_map([], |row| {
        let col_name: String = row.get(1)?;
        Ok(col_name)
    })?;

    for col_name in columns.flatten() {
        if col_name == column {
            return Ok(true);
        }
    }

    Ok(false)
}

/// 迁移 1: 为 session_lines 添加 timestamp_ms / metadata 列
///
/// 早期版本只保留 message_timestamp 原文，没有可排序的毫秒列。
fn migration_001_add_line_columns(conn: &Connection) -> SqliteResult<()> {
    info!("Running migration 001: add timestamp_ms / metadata columns");

    // 如果表不存在，跳过迁移（schema 会创建完整表）
    if !table_exists(conn, "session_lines")? {
        return Ok(());
    }

    if !column_exists(conn, "session_lines", "timestamp_ms")? {
        info!("Adding timestamp_ms column");
        conn.execute("ALTER TABLE session_lines ADD COLUMN timestamp_ms INTEGER", [])?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_lines_timestamp ON session_lines(timestamp_ms)",
            [],
        )?;
    }

    if !column_exists(conn, "session_lines", "metadata")? {
        info!("Adding metadata column");
        conn.execute("ALTER TABLE session_lines ADD COLUMN metadata TEXT", [])?;
    }

    Ok(())
}

/// 执行所有待应用的迁移
pub fn run_migrations(conn: &Connection) -> SqliteResult<()> {
    initialize_migrations(conn)?;

    let current = get_current_version(conn)?;
    if current >= MIGRATION_VERSION {
        return Ok(());
    }

    if current < 1 {
        migration_001_add_line_columns(conn)?;
        record_migration(conn, 1)?;
    }

    info!("Migrations complete: v{} -> v{}", current, MIGRATION_VERSION);
    Ok(())
}
