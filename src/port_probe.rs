use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::ports::TLS_PORTS;
use crate::probe::Probe;

pub const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_millis(2_500);
const BANNER_READ_TIMEOUT: Duration = Duration::from_millis(200);
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Raw result of one TCP connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortOutcome {
    Connected {
        banner: Option<String>,
        elapsed_ms: u64,
    },
    /// Connection actively refused or reset.
    Refused { elapsed_ms: u64 },
    /// No answer within the connect timeout.
    TimedOut { elapsed_ms: u64 },
    /// Any other immediate failure, including name resolution.
    Failed { message: String, elapsed_ms: u64 },
}

impl PortOutcome {
    pub fn elapsed_ms(&self) -> u64 {
        match self {
            PortOutcome::Connected { elapsed_ms, .. }
            | PortOutcome::Refused { elapsed_ms }
            | PortOutcome::TimedOut { elapsed_ms }
            | PortOutcome::Failed { elapsed_ms, .. } => *elapsed_ms,
        }
    }
}

/// Genuine TCP connect against one host, one port per call.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into().trim().to_string(),
            timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl Probe for TcpProbe {
    type Item = u16;
    type Outcome = PortOutcome;

    async fn probe(&self, port: &u16) -> PortOutcome {
        let port = *port;
        let start = Instant::now();
        let connect_res =
            time::timeout(self.timeout, TcpStream::connect((self.host.as_str(), port))).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match connect_res {
            Ok(Ok(mut stream)) => {
                let banner = if TLS_PORTS.contains(&port) {
                    read_tls_banner(stream, &self.host).await
                } else {
                    read_banner(&mut stream).await
                };
                PortOutcome::Connected { banner, elapsed_ms }
            }
            Ok(Err(e)) => match e.kind() {
                ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
                    PortOutcome::Refused { elapsed_ms }
                }
                ErrorKind::TimedOut => PortOutcome::TimedOut { elapsed_ms },
                _ => {
                    debug!(host = %self.host, port, error = %e, "connect failed");
                    PortOutcome::Failed {
                        message: e.to_string(),
                        elapsed_ms,
                    }
                }
            },
            Err(_elapsed) => PortOutcome::TimedOut { elapsed_ms },
        }
    }
}

/// Try to read up to 256 bytes from the stream with a short timeout and convert to a lossy UTF-8 string.
async fn read_banner(stream: &mut TcpStream) -> Option<String> {
    let mut buf = vec![0u8; 256];
    match time::timeout(BANNER_READ_TIMEOUT, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => {
            buf.truncate(n);
            let s = String::from_utf8_lossy(&buf).trim_end().to_string();
            let s = s.replace('\n', "\\n").replace('\r', "\\r");
            Some(s)
        }
        _ => None,
    }
}

/// Handshake without verification and report the peer certificate subject.
async fn read_tls_banner(stream: TcpStream, host: &str) -> Option<String> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .ok()?;
    let connector = tokio_native_tls::TlsConnector::from(connector);
    let tls = time::timeout(TLS_HANDSHAKE_TIMEOUT, connector.connect(host, stream))
        .await
        .ok()?
        .ok()?;
    let cert = tls.get_ref().peer_certificate().ok()??;
    let der = cert.to_der().ok()?;
    let (_, x509) = x509_parser::parse_x509_certificate(&der).ok()?;
    Some(format!("TLS: {}", x509.subject()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_port_reports_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"220 ready\r\n").await.unwrap();
            time::sleep(Duration::from_millis(300)).await;
        });

        let probe = TcpProbe::new("127.0.0.1", Duration::from_secs(2));
        match probe.probe(&port).await {
            PortOutcome::Connected { banner, .. } => {
                assert_eq!(banner.as_deref(), Some("220 ready"));
            }
            other => panic!("expected connected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_port_is_refused() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = TcpProbe::new("127.0.0.1", Duration::from_secs(2));
        assert!(matches!(
            probe.probe(&port).await,
            PortOutcome::Refused { .. }
        ));
    }
}
