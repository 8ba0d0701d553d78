/// 压缩写入器模块
///
/// 把目标写入端包装成带显式刷新的流式 DEFLATE 压缩写入器。
/// 每次 flush 把压缩器内部累积的状态作为可解码前缀写到目标上，
/// 不关闭压缩流；close 写出最终块，使输出成为完整可解码的流
use crate::error::RelayError;
use async_trait::async_trait;
use flate2::{Compress, Compression, FlushCompress, Status};
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// 压缩输出缓冲区大小
const ENCODE_BUF_SIZE: usize = 16 * 1024;

/// 写入端能力接口：写入 + 显式刷新 + 终结
///
/// 复制循环只依赖这个接口，与具体压缩算法解耦
#[async_trait]
pub trait FlushWrite {
    /// 写入数据，返回压缩器消费的字节数
    ///
    /// 返回值只在目标写入失败时可能小于输入长度；调用者在 flush
    /// 返回前不能假设输入字节和产出字节一一对应
    async fn write(&mut self, buf: &[u8]) -> Result<usize, RelayError>;

    /// 把压缩器内部状态刷新为可解码前缀写到目标上
    ///
    /// 可以重复调用，也可以在每次写入后调用
    async fn flush(&mut self) -> Result<(), RelayError>;

    /// 终结压缩流（写出最终块），不关闭底层连接
    ///
    /// 由调用方保证恰好调用一次
    async fn close(&mut self) -> Result<(), RelayError>;
}

/// 基于 flate2 的 DEFLATE 压缩写入器
///
/// 使用原始 DEFLATE 格式（无 zlib 头），压缩器状态由创建它的泵
/// 独占，不跨会话共享
#[derive(Debug)]
pub struct DeflateWriter<W> {
    inner: W,
    compress: Compress,
    buf: Box<[u8]>,
}

/// 校验压缩级别：-1 表示默认级别，0-9 为显式级别，其余拒绝
fn compression_for_level(level: i32) -> Result<Compression, RelayError> {
    match level {
        -1 => Ok(Compression::default()),
        0..=9 => Ok(Compression::new(level as u32)),
        _ => Err(RelayError::config_error(format!(
            "Invalid compression level: {} (expected -1 or 0-9)",
            level
        ))),
    }
}

impl<W: AsyncWrite + Unpin + Send> DeflateWriter<W> {
    /// 创建压缩写入器；非法压缩级别在这里被拒绝，此时目标写入端
    /// 被丢弃（即关闭），不会写出任何字节
    pub fn new(inner: W, level: i32) -> Result<Self, RelayError> {
        let level = compression_for_level(level)?;
        Ok(Self {
            inner,
            compress: Compress::new(level, false),
            buf: vec![0u8; ENCODE_BUF_SIZE].into_boxed_slice(),
        })
    }

    /// 获取目标写入端的引用
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// 获取目标写入端的可变引用
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// 消费写入器，返回目标写入端
    ///
    /// close 只终结压缩流；关闭底层连接是调用方在此之后的事
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// 以给定刷新模式驱动压缩器，把产生的输出全部写到目标上
    async fn drain(&mut self, mode: FlushCompress) -> io::Result<Status> {
        loop {
            let before_out = self.compress.total_out();
            let status = self
                .compress
                .compress(&[], &mut self.buf, mode)
                .map_err(io::Error::other)?;
            let produced = (self.compress.total_out() - before_out) as usize;

            if produced > 0 {
                self.inner.write_all(&self.buf[..produced]).await?;
            }

            // 输出缓冲区未被填满说明压缩器已无待刷新数据
            if produced < self.buf.len() {
                return Ok(status);
            }
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FlushWrite for DeflateWriter<W> {
    async fn write(&mut self, data: &[u8]) -> Result<usize, RelayError> {
        let mut consumed = 0;
        while consumed < data.len() {
            let before_in = self.compress.total_in();
            let before_out = self.compress.total_out();
            self.compress
                .compress(&data[consumed..], &mut self.buf, FlushCompress::None)
                .map_err(|e| RelayError::Write(io::Error::other(e)))?;
            consumed += (self.compress.total_in() - before_in) as usize;
            let produced = (self.compress.total_out() - before_out) as usize;

            if produced > 0 {
                self.inner
                    .write_all(&self.buf[..produced])
                    .await
                    .map_err(RelayError::Write)?;
            }
        }
        Ok(consumed)
    }

    async fn flush(&mut self) -> Result<(), RelayError> {
        self.drain(FlushCompress::Sync)
            .await
            .map_err(RelayError::Flush)?;
        self.inner.flush().await.map_err(RelayError::Flush)
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        loop {
            match self.drain(FlushCompress::Finish).await {
                Ok(Status::StreamEnd) => break,
                Ok(_) => continue,
                Err(e) => return Err(RelayError::Close(e)),
            }
        }
        self.inner.flush().await.map_err(RelayError::Close)
    }
}
