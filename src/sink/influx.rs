//! InfluxDB 1.x sink speaking the HTTP line protocol.

use crate::config::InfluxConfig;
use crate::error::{CollectorError, Result};
use crate::metrics::data::{FieldValue, MetricPoint};
use crate::metrics::traits::MetricsSink;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, info};

/// Writes metric points to one InfluxDB database.
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: reqwest::Client,
    base_url: String,
    database: String,
}

impl InfluxSink {
    /// Create a sink for the configured server.
    ///
    /// `write_timeout` bounds every request. System proxy settings are
    /// ignored; the database is expected on the local network.
    pub fn new(config: &InfluxConfig, write_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(write_timeout)
            .no_proxy()
            .build()
            .map_err(|e| CollectorError::config_error(format!("Invalid HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            database: config.database.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Create the database if it does not exist yet.
    pub async fn ensure_database(&self) -> Result<()> {
        let statement = format!("CREATE DATABASE \"{}\"", self.database.replace('"', "\\\""));
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .query(&[("q", statement.as_str())])
            .send()
            .await
            .map_err(|e| CollectorError::sink_error(format!("{} unreachable: {}", self.base_url, e)))?;

        check_status(response).await?;
        info!("Database {} ready on {}", self.database, self.base_url);
        Ok(())
    }
}

#[async_trait]
impl MetricsSink for InfluxSink {
    async fn write_batch(&self, points: &[MetricPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let body = encode_batch(points);
        debug!("Writing {} points ({} bytes) to {}", points.len(), body.len(), self.database);

        let response = self
            .client
            .post(format!("{}/write", self.base_url))
            .query(&[("db", self.database.as_str())])
            .body(body)
            .send()
            .await
            .map_err(|e| CollectorError::sink_error(format!("{} unreachable: {}", self.base_url, e)))?;

        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollectorError::sink_error(format!(
        "server answered {}: {}",
        status,
        body.trim()
    )))
}

/// Encode points as newline-separated line protocol, without timestamps.
pub fn encode_batch(points: &[MetricPoint]) -> String {
    points
        .iter()
        .map(to_line_protocol)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Encode a single point.
///
/// Tags with empty values are dropped; InfluxDB rejects them.
pub fn to_line_protocol(point: &MetricPoint) -> String {
    let mut line = escape(&point.measurement, &[',', ' ']);

    for (key, value) in point.tags.iter().filter(|(_, v)| !v.is_empty()) {
        let _ = write!(
            line,
            ",{}={}",
            escape(key, &[',', '=', ' ']),
            escape(value, &[',', '=', ' '])
        );
    }

    let fields = point
        .fields
        .iter()
        .map(|(key, value)| {
            let value = match value {
                FieldValue::Integer(v) => format!("{}i", v),
                FieldValue::Text(s) => format!("\"{}\"", escape(s, &['"', '\\'])),
            };
            format!("{}={}", escape(key, &[',', '=', ' ']), value)
        })
        .collect::<Vec<_>>()
        .join(",");

    line.push(' ');
    line.push_str(&fields);
    line
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sample_point() -> MetricPoint {
        MetricPoint::interface()
            .with_tag("host", "sw1")
            .with_tag("ifDesc", "uplink to core")
            .with_field("IfIndex", "1".to_string())
            .with_field("IfAdminStatus", 1_i64)
            .with_field("IfMtu", 1500_i64)
    }

    #[test]
    fn test_line_protocol() {
        assert_eq!(
            to_line_protocol(&sample_point()),
            r#"interface,host=sw1,ifDesc=uplink\ to\ core IfAdminStatus=1i,IfIndex="1",IfMtu=1500i"#
        );
    }

    #[test]
    fn test_line_protocol_escapes_tag_specials() {
        let point = MetricPoint::interface()
            .with_tag("ifDesc", "a,b=c")
            .with_field("IfIndex", "say \"hi\"".to_string());
        assert_eq!(
            to_line_protocol(&point),
            r#"interface,ifDesc=a\,b\=c IfIndex="say \"hi\"""#
        );
    }

    #[test]
    fn test_empty_tag_is_dropped() {
        let point = MetricPoint::interface()
            .with_tag("host", "sw1")
            .with_tag("ifDesc", "")
            .with_field("IfMtu", 9000_i64);
        assert_eq!(to_line_protocol(&point), "interface,host=sw1 IfMtu=9000i");
    }

    #[test]
    fn test_encode_batch_one_line_per_point() {
        let body = encode_batch(&[sample_point(), sample_point()]);
        assert_eq!(body.lines().count(), 2);
    }

    /// Accept one HTTP request, answer with `status_line`, return the raw request.
    async fn serve_once(listener: TcpListener, status_line: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!("{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    }

    async fn local_sink() -> (InfluxSink, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = InfluxConfig::new("127.0.0.1", port, "switches");
        let sink = InfluxSink::new(&config, Duration::from_secs(5)).unwrap();
        (sink, listener)
    }

    #[tokio::test]
    async fn test_write_batch_posts_line_protocol() {
        let (sink, listener) = local_sink().await;
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 204 No Content"));

        sink.write_batch(&[sample_point()]).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /write?db=switches HTTP/1.1"));
        assert!(request.contains("interface,host=sw1,ifDesc=uplink\\ to\\ core"));
    }

    #[tokio::test]
    async fn test_write_batch_rejected() {
        let (sink, listener) = local_sink().await;
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 400 Bad Request"));

        let err = sink.write_batch(&[sample_point()]).await.unwrap_err();
        assert!(matches!(err, CollectorError::SinkWrite(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_sent() {
        let config = InfluxConfig::new("127.0.0.1", 9, "switches");
        let sink = InfluxSink::new(&config, Duration::from_millis(200)).unwrap();
        // nothing listens on port 9; an attempted request would fail
        sink.write_batch(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_database() {
        let (sink, listener) = local_sink().await;
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 200 OK"));

        sink.ensure_database().await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /query?q=CREATE+DATABASE+%22switches%22"));
    }
}
