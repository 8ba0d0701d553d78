/// 有限读取器模块
///
/// 为声明了剩余字节上限的数据源建模：读取量不会超过剩余预算，
/// 预算耗尽后返回 EOF（不是错误）
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// 有限读取器 - 声明一个可读字节数上限，读满即 EOF
pub struct LimitedReader<R> {
    inner: R,
    remaining: usize,
    limit: usize,
}

impl<R> LimitedReader<R> {
    /// 创建新的有限读取器
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            remaining: limit,
            limit,
        }
    }

    /// 获取剩余可读字节数
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// 获取总限制
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 获取已读取字节数
    pub fn read_count(&self) -> usize {
        self.limit - self.remaining
    }

    /// 获取内部读取器的引用
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// 获取内部读取器的可变引用
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// 消费 LimitedReader，返回内部读取器
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LimitedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        // 预算耗尽即 EOF
        if self.remaining == 0 {
            return Poll::Ready(Ok(()));
        }

        let limit = self.remaining.min(buf.remaining());
        let mut limited = buf.take(limit);
        ready!(Pin::new(&mut self.inner).poll_read(cx, &mut limited))?;

        // take 出来的缓冲区不会自动推进原缓冲区，手动同步
        let filled = limited.filled().len();
        let initialized = limited.initialized().len();
        unsafe {
            buf.assume_init(initialized);
        }
        buf.advance(filled);
        self.remaining -= filled;

        Poll::Ready(Ok(()))
    }
}
