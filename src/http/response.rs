//! Response assembly.

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A status line plus body; every response this server sends carries the
/// same three headers (`Content-Type`, `Content-Length`, `Lamport-Clock`),
/// so callers only need to supply the status and the body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub body: Vec<u8>,
    pub lamport_clock: u64,
}

impl HttpResponse {
    pub fn new(status: u16, reason: &'static str, body: Vec<u8>, lamport_clock: u64) -> Self {
        Self {
            status,
            reason,
            body,
            lamport_clock,
        }
    }

    pub fn empty(status: u16, reason: &'static str, lamport_clock: u64) -> Self {
        Self::new(status, reason, Vec::new(), lamport_clock)
    }

    /// Serialize the status line, headers, and body exactly as they go on
    /// the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nLamport-Clock: {}\r\n\r\n",
            self.status,
            self.reason,
            self.body.len(),
            self.lamport_clock,
        )
        .into_bytes();
        out.extend_from_slice(&self.body);
        out
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_exact_content_length() {
        let resp = HttpResponse::new(200, "OK", b"{\"id\":\"A\"}".to_vec(), 5);
        let bytes = resp.to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 11\r\n"));
        assert!(text.contains("Lamport-Clock: 5\r\n"));
        assert!(text.ends_with("{\"id\":\"A\"}"));
    }
}
