//! 行缓冲
//!
//! 串口读取按字节块到达，一行可能跨越多次读取。`LineBuffer` 累积字节，
//! 只有遇到 `\n` 才交出完整的一行，半行永远不会被上层看到。

use tracing::warn;

/// 单行最大长度，超过后丢弃（噪声或波特率不匹配）
pub const MAX_LINE_LEN: usize = 1024;

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加新到达的字节
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > MAX_LINE_LEN && !self.pending.contains(&b'\n') {
            warn!(
                "Discarding {} bytes without line terminator",
                self.pending.len()
            );
            self.pending.clear();
        }
    }

    /// 取出下一整行（去掉 `\r\n`，非 UTF-8 字节按有损方式替换）
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&raw);
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// 尚未成行的字节数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
