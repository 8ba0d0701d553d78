/// 刷新同步复制循环
///
/// 与通用的流复制不同，这个循环在每次成功写入后强制执行一次
/// flush：上游每个读取返回的字节范围都会作为一个以 flush 结尾的
/// 压缩段先到达目标，再发起下一次读取。通用的缓冲复制会让压缩器
/// 把多个读取批在一起输出，实时数据流的端到端延迟会因此上升
use crate::compress::FlushWrite;
use crate::error::{CopyError, RelayError};
use crate::limited_reader::LimitedReader;
use tokio::io::{AsyncRead, AsyncReadExt};

/// 默认传输缓冲区大小
pub const DEFAULT_COPY_BUF_SIZE: usize = 32 * 1024;

/// 根据数据源声明的剩余字节上限决定传输缓冲区大小
///
/// 上限小于默认缓冲区时收缩到上限，避免越过逻辑边界读取；
/// 最小 1 字节
pub(crate) fn transfer_buf_size(remaining: Option<usize>) -> usize {
    match remaining {
        Some(n) if n < DEFAULT_COPY_BUF_SIZE => n.max(1),
        _ => DEFAULT_COPY_BUF_SIZE,
    }
}

/// 从数据源复制到带刷新能力的目标，每次读取后 flush 一次
///
/// 返回成功写入的字节总数；EOF 是正常结束，不是错误。失败时
/// [`CopyError`] 携带失败前已写入的字节数
pub async fn copy_with_flush<R, W>(src: &mut R, dst: &mut W) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: FlushWrite + ?Sized + Send,
{
    copy_with_flush_sized(src, dst, DEFAULT_COPY_BUF_SIZE).await
}

/// 带剩余上限数据源的复制变体
///
/// 传输缓冲区收缩到数据源声明的剩余字节数。生产环境的套接字
/// 数据源不声明上限，走 [`copy_with_flush`]；这个入口为有上限的
/// 数据源保留
pub async fn copy_with_flush_bounded<R, W>(
    src: &mut LimitedReader<R>,
    dst: &mut W,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin,
    W: FlushWrite + ?Sized + Send,
{
    let size = transfer_buf_size(Some(src.remaining()));
    copy_with_flush_sized(src, dst, size).await
}

async fn copy_with_flush_sized<R, W>(
    src: &mut R,
    dst: &mut W,
    buf_size: usize,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: FlushWrite + ?Sized + Send,
{
    let mut buf = vec![0u8; buf_size];
    let mut written: u64 = 0;

    loop {
        let nr = match src.read(&mut buf).await {
            // EOF 是泵的正常结束信号
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(e) => return Err(CopyError::new(written, RelayError::Read(e))),
        };

        match dst.write(&buf[..nr]).await {
            Ok(nw) if nw > nr => {
                return Err(CopyError::new(
                    written,
                    RelayError::InvalidWriteResult {
                        reported: nw,
                        expected: nr,
                    },
                ));
            }
            Ok(nw) if nw < nr => {
                // 部分写入计入总数后终止
                written += nw as u64;
                return Err(CopyError::new(
                    written,
                    RelayError::ShortWrite {
                        written: nw,
                        expected: nr,
                    },
                ));
            }
            Ok(nw) => written += nw as u64,
            Err(e) => return Err(CopyError::new(written, e)),
        }

        if let Err(e) = dst.flush().await {
            return Err(CopyError::new(written, e));
        }
    }
}
