/// 连接桥接模块
///
/// 每个会话由一个客户端套接字和一个上游 TLS 套接字组成，生命周期
/// 内恰好运行两个方向泵：客户端→上游原样转发，上游→客户端经过
/// 压缩写入器。两个泵是相互独立的失败域，会话在两者都返回后才算
/// 结束
use crate::compress::{DeflateWriter, FlushWrite};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::pump::copy_with_flush;
use crate::stats::RelayStatsTracker;
use anyhow::{Context, Result};
use socket2::{SockRef, TcpKeepalive};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info, warn};

/// 上游连接 TCP keepalive 参数
const KEEPALIVE_TIME: Duration = Duration::from_secs(60);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// 运行中继：绑定监听端口并无限接受连接
///
/// 每个接受的连接派生一个会话任务，不做连接数限制；接受失败记录
/// 日志后继续。只有监听套接字无法打开时返回错误
pub async fn run_relay(config: RelayConfig, connector: TlsConnector) -> Result<()> {
    let port = config
        .listen_port_number()
        .context("Invalid listen port configuration")?;
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind to 0.0.0.0:{}", port))?;

    info!(
        "Relay listening on 0.0.0.0:{} (upstream {})",
        port, config.upstream_addr
    );

    let stats = RelayStatsTracker::new();
    stats.clone().start_reporter();
    let config = Arc::new(config);

    loop {
        match listener.accept().await {
            Ok((client, peer_addr)) => {
                if let Err(e) = client.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY for client connection: {}", e);
                }
                debug!("Accepted connection from {}", peer_addr);

                let config = config.clone();
                let connector = connector.clone();
                let stats = stats.clone();
                tokio::spawn(async move {
                    serve(client, config, connector, stats).await;
                });
            }
            Err(e) => {
                // 接受失败不致命，继续服务
                error!("Accept error: {}", e);
            }
        }
    }
}

/// 通过 TLS 连接上游
pub async fn dial_upstream(
    config: &RelayConfig,
    connector: &TlsConnector,
) -> Result<TlsStream<TcpStream>, RelayError> {
    let addr = &config.upstream_addr;
    let tcp = TcpStream::connect(addr)
        .await
        .map_err(|e| RelayError::dial_failed(addr, e))?;

    if let Err(e) = tcp.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY for upstream connection: {}", e);
    }
    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_TIME)
        .with_interval(KEEPALIVE_INTERVAL);
    if let Err(e) = SockRef::from(&tcp).set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keepalive for upstream connection: {}", e);
    }

    let host = config.upstream_host()?;
    let server_name = ServerName::try_from(host.to_string()).map_err(|e| {
        RelayError::dial_failed(addr, std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    })?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| RelayError::dial_failed(addr, e))
}

/// 处理一个会话：拨号上游，并发运行两个方向泵，等待两者结束
pub async fn serve(
    client: TcpStream,
    config: Arc<RelayConfig>,
    connector: TlsConnector,
    stats: RelayStatsTracker,
) {
    let session = format!("session_{}", uuid::Uuid::new_v4());

    let upstream = match dial_upstream(&config, &connector).await {
        Ok(stream) => stream,
        Err(e) => {
            // 唯一一个不启动任何泵的失败路径：直接关闭客户端
            error!("{}: dial upstream: {}", session, e);
            drop(client);
            return;
        }
    };
    info!("{}: connected to upstream {}", session, config.upstream_addr);

    stats.session_started();

    let (mut client_read, client_write) = client.into_split();
    let (mut upstream_read, mut upstream_write) = tokio::io::split(upstream);

    let uplink = async {
        let sent = run_uplink(&mut client_read, &mut upstream_write, &session).await;
        stats.add_bytes_up(sent);
    };
    let downlink = async {
        let received = run_downlink(
            &mut upstream_read,
            client_write,
            config.compression_level,
            &session,
        )
        .await;
        stats.add_bytes_down(received);
    };

    // 两个泵相互独立；join 保证两者都结束后会话才算完成
    tokio::join!(uplink, downlink);

    stats.session_ended();
    info!("{}: session closed", session);
}

/// 客户端→上游方向：原样转发；结束后总是尝试关闭上游写入端
async fn run_uplink<R, W>(src: &mut R, dst: &mut W, session: &str) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let sent = match tokio::io::copy(src, dst).await {
        Ok(n) => {
            debug!("{}: client to upstream: {} bytes", session, n);
            n
        }
        Err(e) => {
            error!("{}: copy client to upstream: {}", session, e);
            0
        }
    };

    if let Err(e) = dst.shutdown().await {
        warn!("{}: close upstream connection: {}", session, e);
    }
    sent
}

/// 上游→客户端方向：经过压缩写入器，每次读取后刷新一次；结束后
/// 先终结压缩流，再关闭客户端写入端
async fn run_downlink<R, W>(src: &mut R, dst: W, level: i32, session: &str) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut writer = match DeflateWriter::new(dst, level) {
        Ok(writer) => writer,
        Err(e) => {
            // 构造失败：泵不读取任何数据，丢弃写入端即关闭客户端
            error!("{}: compressing writer: {}", session, e);
            return 0;
        }
    };

    let received = match copy_with_flush(src, &mut writer).await {
        Ok(n) => {
            debug!("{}: upstream to client: {} bytes", session, n);
            n
        }
        Err(e) => {
            error!("{}: copy upstream to client: {}", session, e);
            e.written()
        }
    };

    // 无论哪种结束方式，压缩流都恰好终结一次，保证输出可解码；
    // 终结失败只记录，不覆盖复制阶段已报告的错误
    if let Err(e) = writer.close().await {
        error!("{}: close compressing writer: {}", session, e);
    }
    let mut client_write = writer.into_inner();
    if let Err(e) = client_write.shutdown().await {
        warn!("{}: close client connection: {}", session, e);
    }
    received
}
