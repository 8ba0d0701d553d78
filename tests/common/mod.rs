/// Common utilities for integration tests
use flate2::read::DeflateDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use stream_relay::config::RelayConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, TlsConnector};

/// Find an available port
pub fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to random port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Build a TLS acceptor with an in-memory self-signed certificate
pub fn tls_acceptor() -> TlsAcceptor {
    let cert = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .expect("Failed to generate test certificate");

    let cert_der = cert.cert.der().clone();
    let key_der = PrivatePkcs8KeyDer::from(cert.signing_key.serialize_der());

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], PrivateKeyDer::Pkcs8(key_der))
        .expect("Failed to build server TLS config");

    TlsAcceptor::from(Arc::new(config))
}

/// Start the relay on the given port, pointed at the given upstream
///
/// The upstream certificate is self-signed, so the relay runs with
/// skip_verify enabled.
pub async fn start_relay(
    listen_port: u16,
    upstream_addr: String,
    compression_level: i32,
) -> tokio::task::JoinHandle<()> {
    let config = RelayConfig {
        compression_level,
        listen_port: listen_port.to_string(),
        upstream_addr,
        insecure_skip_verify: true,
    };

    let tls_config =
        stream_relay::tls::load_upstream_config(true).expect("Failed to load upstream TLS config");
    let connector = TlsConnector::from(tls_config);

    tokio::spawn(async move {
        stream_relay::relay::run_relay(config, connector).await.ok();
    })
}

/// Create a TLS echo server for testing
pub async fn start_tls_echo_server(port: u16) -> tokio::task::JoinHandle<()> {
    let acceptor = tls_acceptor();

    tokio::spawn(async move {
        let listener = TokioTcpListener::bind(format!("127.0.0.1:{}", port))
            .await
            .expect("Failed to bind echo server");

        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let acceptor = acceptor.clone();
                    tokio::spawn(async move {
                        let Ok(mut stream) = acceptor.accept(socket).await else {
                            return;
                        };
                        let mut buf = vec![0u8; 8192];
                        loop {
                            match stream.read(&mut buf).await {
                                Ok(0) => break, // Connection closed
                                Ok(n) => {
                                    if stream.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                    if stream.flush().await.is_err() {
                                        break;
                                    }
                                }
                                Err(_) => break,
                            }
                        }
                        let _ = stream.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    })
}

/// Wait for server to be ready
pub async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    for _ in 0..max_attempts {
        if TcpStream::connect(format!("127.0.0.1:{}", port))
            .await
            .is_ok()
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

/// Incremental decoder for the relay's raw deflate output
///
/// Feeds arbitrary compressed chunks and accumulates decoded payload,
/// the way a relay client would consume the sync-flushed stream.
pub struct StreamDecoder {
    decomp: Decompress,
    pub output: Vec<u8>,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            decomp: Decompress::new(false),
            output: Vec::new(),
        }
    }

    pub fn feed(&mut self, mut input: &[u8]) {
        let mut buf = [0u8; 8192];
        while !input.is_empty() {
            let before_in = self.decomp.total_in();
            let before_out = self.decomp.total_out();
            let status = self
                .decomp
                .decompress(input, &mut buf, FlushDecompress::None)
                .expect("invalid deflate data from relay");
            let consumed = (self.decomp.total_in() - before_in) as usize;
            let produced = (self.decomp.total_out() - before_out) as usize;
            self.output.extend_from_slice(&buf[..produced]);
            input = &input[consumed..];

            if matches!(status, Status::StreamEnd) {
                break;
            }
            if consumed == 0 && produced == 0 {
                // Needs more input
                break;
            }
        }
    }
}

/// Decode a complete (finalized) raw deflate stream
pub fn decode_full(data: &[u8]) -> Vec<u8> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .expect("compressed stream not finalized");
    out
}
