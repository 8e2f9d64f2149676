//! 流式解析器
//!
//! 按换行切分内容，跳过空行，从续传偏移之后逐行分类并交给回调。
//! 两种模式共用同一个逐行推进器，保证缓冲/流式结果完全一致。

use crate::classifier::classify;
use crate::error::Result;
use crate::types::{LineContent, ParsedLine};
use std::io::BufRead;

/// 流式模式阈值: 内容超过 10 MB 走流式读取
pub const STREAMING_THRESHOLD_BYTES: usize = 10 * 1024 * 1024;

/// 行回调类型 (路由到 BatchWriter)
pub type EmitFn<'a> = dyn FnMut(ParsedLine) -> Result<()> + 'a;

/// 单次解析的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// 文件的非空行总数 (包含续传偏移之前的行)
    pub total_lines: i64,
    /// 本次实际发出的行数
    pub emitted: i64,
    /// 本次发出且解码成功的行数
    pub decoded: i64,
    /// 本次发出且解码失败 (软错误) 的行数
    pub soft_errors: i64,
}

/// 逐行推进器
///
/// 空行跳过且不占行号槽位；非空行按过滤后顺序从 1 开始编号。
/// 注意: 行号不等于物理行号，空行布局变化会影响续传语义 (源格式约定)。
struct LineWalker<F> {
    resume_from_line: i64,
    stats: ParseStats,
    emit: F,
}

impl<F: FnMut(ParsedLine) -> Result<()>> LineWalker<F> {
    fn new(resume_from_line: i64, emit: F) -> Self {
        Self {
            resume_from_line,
            stats: ParseStats::default(),
            emit,
        }
    }

    /// 处理一个物理行 (不含行尾换行符)
    fn feed(&mut self, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        self.stats.total_lines += 1;
        if self.stats.total_lines <= self.resume_from_line {
            // 已摄取过的前缀，只计数不重发
            return Ok(());
        }

        let classified = classify(line);
        match classified.content {
            LineContent::Decoded(_) => self.stats.decoded += 1,
            LineContent::Raw => self.stats.soft_errors += 1,
        }
        self.stats.emitted += 1;

        (self.emit)(ParsedLine {
            line_number: self.stats.total_lines,
            raw_text: line.to_string(),
            content: classified.content,
            message_type: classified.message_type,
            message_timestamp: classified.message_timestamp,
            metadata: classified.metadata,
        })
    }
}

/// 缓冲模式: 内容已全部在内存中，直接迭代
pub fn parse_buffered(
    content: &str,
    resume_from_line: i64,
    emit: &mut EmitFn<'_>,
) -> Result<ParseStats> {
    let mut walker = LineWalker::new(resume_from_line, emit);
    for line in content.lines() {
        walker.feed(line)?;
    }
    Ok(walker.stats)
}

/// 流式模式: 从有界内存的源逐行读取，不要求内容一次性驻留
///
/// 行缓冲复用，读错误作为致命错误向上传播。
pub fn parse_streaming<R: BufRead>(
    mut reader: R,
    resume_from_line: i64,
    emit: &mut EmitFn<'_>,
) -> Result<ParseStats> {
    let mut walker = LineWalker::new(resume_from_line, emit);
    let mut buf = String::new();

    loop {
        buf.clear();
        let n = reader.read_line(&mut buf)?;
        if n == 0 {
            break;
        }

        // 去掉行尾换行符，与 str::lines 的切分行为保持一致
        let line = buf.strip_suffix('\n').unwrap_or(&buf);
        let line = line.strip_suffix('\r').unwrap_or(line);
        walker.feed(line)?;
    }

    Ok(walker.stats)
}
