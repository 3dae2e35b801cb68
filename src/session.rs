// ABOUTME: Per-connection state machine: parse request, auth challenge, stream multipart parts
// ABOUTME: Runs on its own OS thread with blocking sockets, one thread per accepted client

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::auth::{AuthConfig, AuthMode};
use crate::clock::{now_secs, Ewma};
use crate::error::SessionError;
use crate::hub::{ClientId, ClientStats, FrameHub};
use crate::{BOUNDARY, SERVER_VERSION};

const REQUEST_BUF_LEN: usize = 4096;
const METHOD_MAX: usize = 9;
const URI_MAX: usize = 1023;
const VERSION_MAX: usize = 9;

/// The parsed first line and relevant headers of an HTTP request.
#[derive(Debug, Default)]
struct ParsedRequest {
    method: String,
    uri: String,
    http_version: String,
    authorization_basic_token: Option<String>,
}

/// Unregisters a client from the hub when dropped, so every exit path out
/// of `serve_client` — a parse error, a failed auth challenge, a dropped
/// connection mid-stream — leaves the registry consistent without each
/// call site having to remember to call `hub.unregister` itself.
struct RegistryGuard {
    hub: Arc<FrameHub>,
    id: ClientId,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

/// Runs one client session to completion: reads the request, challenges
/// for auth if configured, streams multipart frames until the connection
/// drops or shutdown is requested, then unregisters from `hub`.
///
/// `id`/`stats` are assigned by the caller at accept time, before this
/// session has read a single byte, so the registry's client count bounds
/// accepted connections rather than only fully-authenticated ones.
///
/// Never panics on malformed network input and never propagates an error
/// past this function — failures here are logged and end only this
/// session.
pub fn serve_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    hub: Arc<FrameHub>,
    auth: Arc<AuthConfig>,
    client_timeout: Duration,
    id: ClientId,
    stats: Arc<ClientStats>,
) {
    let _guard = RegistryGuard {
        hub: hub.clone(),
        id,
    };

    let _ = stream.set_read_timeout(Some(client_timeout));
    let _ = stream.set_write_timeout(Some(client_timeout));

    let request = match read_request(&mut stream) {
        Ok(raw) => raw,
        Err(e) => {
            error!(%peer, "failed to read client request: {e}");
            return;
        }
    };

    let parsed = match parse_request(&request) {
        Ok(p) => p,
        Err(e) => {
            error!(%peer, "failed to read client request: {e}");
            return;
        }
    };
    debug!(%peer, method = %parsed.method, uri = %parsed.uri, version = %parsed.http_version, "received request header");

    if auth.mode() == AuthMode::Basic
        && !auth.authorize(parsed.authorization_basic_token.as_deref())
    {
        if parsed.authorization_basic_token.is_some() {
            error!(%peer, "authentication error");
        } else {
            debug!(%peer, "authentication required");
        }
        if let Err(e) = write_auth_challenge(&mut stream, auth.realm()) {
            error!(%peer, "failed to write response header: {e}");
        }
        return;
    }
    debug!(%peer, "authentication successful");

    if let Err(e) = write_ok_header(&mut stream) {
        error!(%peer, "failed to write response header: {e}");
        return;
    }

    stream_frames(&mut stream, peer, &hub, id, &stats);
}

fn stream_frames(
    stream: &mut TcpStream,
    peer: SocketAddr,
    hub: &FrameHub,
    id: crate::hub::ClientId,
    stats: &Arc<crate::hub::ClientStats>,
) {
    let mut scratch = Vec::new();
    let mut ewma = Ewma::new();
    let mut last_frame_time = now_secs();

    loop {
        if !hub.wait_for_frame(id, &mut scratch) {
            break;
        }

        let now = now_secs();
        let interval = ewma.update(now - last_frame_time);
        last_frame_time = now;
        stats.set_interval(interval);
        debug!(%peer, fps = 1.0 / interval.max(f64::EPSILON), "current fps");

        if !hub.is_running() {
            break; // speeds up shutdown rather than writing one last frame
        }

        match write_multipart_part(stream, &scratch) {
            WriteOutcome::Ok => {}
            WriteOutcome::Closed => {
                info!(%peer, "connection closed");
                break;
            }
            WriteOutcome::Fatal => break,
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Result<Vec<u8>, SessionError> {
    let mut buf = vec![0u8; REQUEST_BUF_LEN];
    let mut offs = 0usize;

    loop {
        if offs >= REQUEST_BUF_LEN {
            return Err(SessionError::HeaderTooLarge);
        }

        match stream.read(&mut buf[offs..]) {
            Ok(0) => return Err(SessionError::ConnectionClosed),
            Ok(n) => {
                offs += n;
                if find_subslice(&buf[..offs], b"\r\n\r\n").is_some() {
                    buf.truncate(offs);
                    return Ok(buf);
                }
            }
            Err(e) if is_timeout(&e) => return Err(SessionError::Timeout),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                // Stop reading; whatever bytes arrived so far get parsed as-is,
                // which ordinarily fails the request-line scan below.
                buf.truncate(offs);
                return Ok(buf);
            }
            Err(e) => return Err(SessionError::Io(e)),
        }
    }
}

fn parse_request(raw: &[u8]) -> Result<ParsedRequest, SessionError> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.split("\r\n");

    let first_line = lines.next().unwrap_or("");
    let mut fields = first_line.split_whitespace();
    let (Some(method), Some(uri), Some(version)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(SessionError::InvalidRequestLine);
    };

    let mut parsed = ParsedRequest {
        method: truncate(method, METHOD_MAX),
        uri: truncate(uri, URI_MAX),
        http_version: truncate(version, VERSION_MAX),
        authorization_basic_token: None,
    };

    for line in lines {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim_start();
        if name.eq_ignore_ascii_case("Authorization") {
            let mut parts = value.splitn(2, ' ');
            match (parts.next(), parts.next()) {
                (Some("Basic"), Some(token)) => {
                    parsed.authorization_basic_token = Some(token.to_string());
                }
                (Some(scheme), _) => {
                    warn!("unknown authorization header: {scheme}");
                }
                _ => warn!("missing authorization hash"),
            }
        }
    }

    Ok(parsed)
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

enum WriteOutcome {
    Ok,
    /// EPIPE/EINTR on write: benign, the peer is simply gone.
    Closed,
    Fatal,
}

fn write_client_bytes(stream: &mut TcpStream, buf: &[u8]) -> WriteOutcome {
    match stream.write(buf) {
        Ok(n) if n == buf.len() => WriteOutcome::Ok,
        Ok(_) => {
            error!("not all data could be written");
            WriteOutcome::Fatal
        }
        Err(e)
            if e.kind() == std::io::ErrorKind::BrokenPipe
                || e.kind() == std::io::ErrorKind::Interrupted =>
        {
            WriteOutcome::Closed
        }
        Err(e) => {
            error!("write() failed: {e}");
            WriteOutcome::Fatal
        }
    }
}

fn write_ok_header(stream: &mut TcpStream) -> std::io::Result<()> {
    let header = format!(
        "HTTP/1.1 200 OK\r\n\
         Server: streamEye/{SERVER_VERSION}\r\n\
         Connection: close\r\n\
         Max-Age: 0\r\n\
         Expires: 0\r\n\
         Cache-Control: no-cache, private\r\n\
         Pragma: no-cache\r\n\
         Content-Type: multipart/x-mixed-replace; boundary={BOUNDARY}\r\n"
    );
    match write_client_bytes(stream, header.as_bytes()) {
        WriteOutcome::Ok => Ok(()),
        _ => Err(std::io::Error::other("failed to write OK header")),
    }
}

fn write_auth_challenge(stream: &mut TcpStream, realm: &str) -> std::io::Result<()> {
    let header = format!(
        "HTTP/1.1 401 Not Authorized\r\n\
         Server: streamEye/{SERVER_VERSION}\r\n\
         Connection: close\r\n\
         WWW-Authenticate: Basic realm=\"{realm}\"\r\n\r\n"
    );
    match write_client_bytes(stream, header.as_bytes()) {
        WriteOutcome::Ok => Ok(()),
        _ => Err(std::io::Error::other("failed to write auth challenge")),
    }
}

fn write_multipart_part(stream: &mut TcpStream, frame: &[u8]) -> WriteOutcome {
    let preamble = format!(
        "\r\n{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        frame.len()
    );
    match write_client_bytes(stream, preamble.as_bytes()) {
        WriteOutcome::Ok => {}
        other => return other,
    }
    write_client_bytes(stream, frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_uri_version() {
        let req = parse_request(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.uri, "/");
        assert_eq!(req.http_version, "HTTP/1.1");
    }

    #[test]
    fn extracts_basic_authorization_token() {
        let req = parse_request(
            b"GET / HTTP/1.1\r\nAuthorization: Basic YWxpY2U6c2VjcmV0\r\n\r\n",
        )
        .unwrap();
        assert_eq!(
            req.authorization_basic_token.as_deref(),
            Some("YWxpY2U6c2VjcmV0")
        );
    }

    #[test]
    fn missing_authorization_header_leaves_token_none() {
        let req = parse_request(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(req.authorization_basic_token.is_none());
    }

    #[test]
    fn unknown_scheme_is_logged_and_ignored() {
        let req = parse_request(b"GET / HTTP/1.1\r\nAuthorization: Digest abc\r\n\r\n").unwrap();
        assert!(req.authorization_basic_token.is_none());
    }

    #[test]
    fn malformed_request_line_is_an_error() {
        assert!(matches!(
            parse_request(b"garbage\r\n\r\n"),
            Err(SessionError::InvalidRequestLine)
        ));
    }

    #[test]
    fn overlong_fields_are_truncated_not_rejected() {
        let long_method = "A".repeat(50);
        let req = parse_request(format!("{long_method} / HTTP/1.1\r\n\r\n").as_bytes()).unwrap();
        assert_eq!(req.method.len(), METHOD_MAX);
    }

    #[test]
    fn other_headers_are_ignored_without_error() {
        let req = parse_request(
            b"GET / HTTP/1.1\r\nUser-Agent: test\r\nAccept: */*\r\n\r\n",
        )
        .unwrap();
        assert_eq!(req.method, "GET");
    }
}
