/// 自定义错误类型
///
/// 使用 thiserror 定义精确的错误类型，替代泛型的 anyhow::Error
/// 这样每个泵可以对自己的终止原因做精确分类
use std::io;
use thiserror::Error;

/// 中继的主要错误类型
#[derive(Error, Debug)]
pub enum RelayError {
    /// 上游拨号失败
    #[error("Failed to connect to {addr}: {source}")]
    DialFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 配置错误（非法压缩级别、无法解析的端口等）
    #[error("Configuration error: {0}")]
    Config(String),

    /// 数据源读取失败
    #[error("Read error: {0}")]
    Read(#[source] io::Error),

    /// 目标写入失败
    #[error("Write error: {0}")]
    Write(#[source] io::Error),

    /// 压缩刷新失败
    #[error("Flush error: {0}")]
    Flush(#[source] io::Error),

    /// 压缩流终结失败
    #[error("Close error: {0}")]
    Close(#[source] io::Error),

    /// 目标在没有报错的情况下接受了少于给定的字节数
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// 目标报告写入了多于给定的字节数
    #[error("invalid write result: {reported} bytes reported for a {expected} byte write")]
    InvalidWriteResult { reported: usize, expected: usize },
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// 创建拨号失败错误
    pub fn dial_failed(addr: impl Into<String>, source: io::Error) -> Self {
        Self::DialFailed {
            addr: addr.into(),
            source,
        }
    }

    /// 创建配置错误
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// 检查是否为拨号失败
    pub fn is_dial_failed(&self) -> bool {
        matches!(self, Self::DialFailed { .. })
    }

    /// 检查是否为配置错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// 检查是否为短写
    pub fn is_short_write(&self) -> bool {
        matches!(self, Self::ShortWrite { .. })
    }

    /// 检查是否为非法写入结果
    pub fn is_invalid_write_result(&self) -> bool {
        matches!(self, Self::InvalidWriteResult { .. })
    }
}

/// 复制循环的终止错误
///
/// 携带失败前已成功写入的字节总数；数据流结束（EOF）不产生这个
/// 错误，它是泵的正常结束信号
#[derive(Error, Debug)]
#[error("{source} (after {written} bytes)")]
pub struct CopyError {
    written: u64,
    #[source]
    source: RelayError,
}

impl CopyError {
    pub fn new(written: u64, source: RelayError) -> Self {
        Self { written, source }
    }

    /// 失败前已成功写入的字节数
    pub fn written(&self) -> u64 {
        self.written
    }

    /// 终止原因
    pub fn source(&self) -> &RelayError {
        &self.source
    }

    /// 拆出字节数和终止原因
    pub fn into_parts(self) -> (u64, RelayError) {
        (self.written, self.source)
    }
}
