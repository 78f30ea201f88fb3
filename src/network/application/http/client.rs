use super::headers::{RequestHeaders, ResponseHeaders};
use super::url::{Scheme, Url};
use crate::cookies::CookieJar;
use crate::network::error::Error;
use crate::network::{Close, Connect, Read, Write};
use std::borrow::Cow;
use std::sync::Arc;

/// Most requests a single [`HttpEngine::get`] issues while following
/// redirects, counting the first one.
pub const MAX_REDIRECTS: usize = 5;

const READ_CHUNK: usize = 1024;
const HEADER_END: &[u8] = b"\r\n\r\n";
const REDIRECT_SCHEMES: [Scheme; 4] = [Scheme::Http, Scheme::Https, Scheme::Ws, Scheme::Wss];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    /// POST and PUT always describe their body; PATCH only when it has one.
    fn sends_content_headers(&self, body: &[u8]) -> bool {
        match self {
            Method::Post | Method::Put => true,
            Method::Patch => !body.is_empty(),
            _ => false,
        }
    }
}

/// The most recent response received by an [`HttpEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status_code: i32,
    headers: ResponseHeaders,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status_code: -1,
            headers: ResponseHeaders::default(),
            body: Vec::new(),
        }
    }
}

impl Response {
    /// Status code, or `-1` if no status line has been parsed.
    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    /// All headers received.
    pub fn headers(&self) -> &ResponseHeaders {
        &self.headers
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// A connection handed over after a protocol upgrade request.
#[derive(Debug)]
pub struct Upgraded<C> {
    /// Status of the upgrade response; `101` means the switch happened.
    pub status: u16,
    /// The connection, positioned right after the response headers.
    pub connection: C,
    /// Bytes already read past the response headers.
    pub buffered: Vec<u8>,
}

/// A blocking HTTP/1.1 client bound to one URL at a time.
///
/// Every request carries `Connection: close` and the response body runs until
/// the server closes the connection, so each [`open`](Self::open) serves one
/// request. Cookies for the host are attached from, and `Set-Cookie` headers
/// recorded into, the shared [`CookieJar`].
pub struct HttpEngine<T: Connect> {
    transport: T,
    cookies: Arc<CookieJar>,
    url: Option<Url>,
    connection: Option<T::Connection>,
    headers: RequestHeaders,
    response: Response,
}

impl<T: Connect> core::fmt::Debug for HttpEngine<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpEngine")
            .field("url", &self.url.as_ref().map(Url::to_string))
            .field("open", &self.connection.is_some())
            .field("status_code", &self.response.status_code)
            .finish_non_exhaustive()
    }
}

impl<T: Connect> HttpEngine<T> {
    pub fn new(transport: T, cookies: Arc<CookieJar>) -> Self {
        Self {
            transport,
            cookies,
            url: None,
            connection: None,
            headers: RequestHeaders::new(),
            response: Response::default(),
        }
    }

    /// Connects to `url`, dropping any previous connection, request headers
    /// and response.
    pub fn open(&mut self, url: &str) -> Result<(), Error> {
        self.close();
        self.headers.clear();
        self.response = Response::default();
        self.url = None;

        let parsed = Url::parse(url).inspect_err(|e| {
            log::error!("[http] cannot open {url}: {e}");
        })?;
        let connection = self
            .transport
            .connect(&parsed.host, parsed.port, parsed.scheme.is_secure())?;
        log::debug!("[http] connected to {parsed}");
        self.url = Some(parsed);
        self.connection = Some(connection);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// The URL of the current connection.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Sets a request header for the requests on this connection.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.set(name, value);
    }

    pub fn request_headers(&self) -> &RequestHeaders {
        &self.headers
    }

    /// Sends a GET, following up to [`MAX_REDIRECTS`] `301`/`302` responses.
    ///
    /// Each hop reconnects to the `Location` target with fresh request
    /// headers. The status of the last response is returned.
    pub fn get(&mut self) -> Result<u16, Error> {
        for attempt in 1..=MAX_REDIRECTS {
            self.send_request(Method::Get, &[], "")?;
            self.read_response(false)?;

            let status = self.response.status_code;
            if attempt == MAX_REDIRECTS || !matches!(status, 301 | 302) {
                break;
            }
            let Some(location) = self
                .response
                .headers
                .last("location")
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_owned)
            else {
                break;
            };
            let target = match &self.url {
                Some(url) => url.resolve(&location, &REDIRECT_SCHEMES),
                None => location,
            };
            log::info!("[http] {status} redirect to {target}");
            self.open(&target)?;
        }
        self.final_status()
    }

    pub fn post(&mut self, body: &[u8], content_type: &str) -> Result<u16, Error> {
        self.request(Method::Post, body, content_type)
    }

    pub fn put(&mut self, body: &[u8], content_type: &str) -> Result<u16, Error> {
        self.request(Method::Put, body, content_type)
    }

    pub fn patch(&mut self, body: &[u8], content_type: &str) -> Result<u16, Error> {
        self.request(Method::Patch, body, content_type)
    }

    pub fn delete(&mut self) -> Result<u16, Error> {
        self.request(Method::Delete, &[], "")
    }

    pub fn head(&mut self) -> Result<u16, Error> {
        self.request(Method::Head, &[], "")
    }

    /// Sends one request without following redirects.
    pub fn request(&mut self, method: Method, body: &[u8], content_type: &str) -> Result<u16, Error> {
        self.send_request(method, body, content_type)?;
        self.read_response(false)?;
        self.final_status()
    }

    /// Sends a GET and stops reading at the end of the response headers,
    /// handing the connection to the caller.
    pub fn upgrade(&mut self) -> Result<Upgraded<T::Connection>, Error> {
        self.send_request(Method::Get, &[], "")?;
        let buffered = self.read_response(true)?;
        let status = self.final_status()?;
        let connection = self.connection.take().ok_or(Error::NotOpen)?;
        Ok(Upgraded { status, connection, buffered })
    }

    /// Status of the last response, `-1` if none was parsed.
    pub fn status_code(&self) -> i32 {
        self.response.status_code
    }

    /// Last value of response header `name`, matched case-insensitively.
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response.headers.last(name)
    }

    pub fn response_headers(&self) -> &ResponseHeaders {
        &self.response.headers
    }

    pub fn response_body(&self) -> &[u8] {
        &self.response.body
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn cookies(&self) -> &Arc<CookieJar> {
        &self.cookies
    }

    /// Closes the current connection, if any. The last response stays
    /// readable.
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                log::debug!("[http] close failed: {e}");
            }
        }
    }

    fn final_status(&self) -> Result<u16, Error> {
        u16::try_from(self.response.status_code).map_err(|_| Error::ProtocolError)
    }

    fn send_request(&mut self, method: Method, body: &[u8], content_type: &str) -> Result<(), Error> {
        let url = self.url.as_ref().ok_or(Error::NotOpen)?;
        let cookie = self.cookies.valid_cookie_header(&url.host);
        let request = build_request(method, url, &cookie, &self.headers, body, content_type);

        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        connection.write_all(&request).inspect_err(|_| {
            log::error!("[http] sending {} failed", method.as_str());
        })?;
        connection.flush()
    }

    /// Reads a response. Returns the bytes past the headers when
    /// `stop_after_headers` is set, otherwise reads the body to end of stream.
    fn read_response(&mut self, stop_after_headers: bool) -> Result<Vec<u8>, Error> {
        self.response = Response::default();
        let host = self.url.as_ref().map(|u| u.host.clone()).unwrap_or_default();
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;

        let mut buf = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];
        let mut scanned = 0;
        let head_end = loop {
            if let Some(pos) = find(&buf[scanned..], HEADER_END) {
                break scanned + pos;
            }
            scanned = buf.len().saturating_sub(HEADER_END.len() - 1);
            let n = connection.read(&mut chunk)?;
            if n == 0 {
                log::warn!("[http] connection closed before response headers");
                return Err(Error::ConnectionClosed);
            }
            buf.extend_from_slice(&chunk[..n]);
        };

        let head = String::from_utf8_lossy(&buf[..head_end]);
        let (status_code, headers) = parse_head(&head)?;
        for value in headers.all("set-cookie") {
            self.cookies.process_set_cookie(value, &host);
        }
        self.response.status_code = status_code;
        self.response.headers = headers;

        let rest = buf.split_off(head_end + HEADER_END.len());
        if stop_after_headers {
            return Ok(rest);
        }

        let mut body = rest;
        loop {
            match connection.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => body.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    log::warn!("[http] error while reading body: {e}");
                    break;
                }
            }
        }
        self.response.body = body;
        Ok(Vec::new())
    }
}

fn build_request(
    method: Method,
    url: &Url,
    cookie: &str,
    headers: &RequestHeaders,
    body: &[u8],
    content_type: &str,
) -> Vec<u8> {
    let mut head = format!("{} {} HTTP/1.1\r\n", method.as_str(), url.path);
    if !headers.contains("host") {
        head.push_str(&format!("Host: {}\r\n", url.authority()));
    }
    if !cookie.is_empty() {
        head.push_str(&format!("Cookie: {cookie}\r\n"));
    }
    for (name, value) in headers.iter() {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    if method.sends_content_headers(body) {
        if !content_type.is_empty() {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    if !headers.contains("connection") {
        head.push_str("Connection: close\r\n");
    }
    head.push_str("\r\n");

    let mut request = head.into_bytes();
    request.extend_from_slice(body);
    request
}

/// Parses the status line and header lines of a response head.
fn parse_head(head: &str) -> Result<(i32, ResponseHeaders), Error> {
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut tokens = status_line.split_whitespace();
    let status_code = match (tokens.next(), tokens.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code.parse::<i32>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        log::warn!("[http] malformed status line: {status_line:?}");
        Error::ProtocolError
    })?;

    let mut headers = ResponseHeaders::default();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.append(name.trim(), value.trim());
        }
    }
    Ok((status_code, headers))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_build_get() {
        let mut headers = RequestHeaders::new();
        headers.set("Accept", "*/*");
        let req = build_request(Method::Get, &url("http://h:8080/x?y=1"), "a=1; b=2", &headers, &[], "");
        assert_eq!(
            String::from_utf8(req).unwrap(),
            "GET /x?y=1 HTTP/1.1\r\nHost: h:8080\r\nCookie: a=1; b=2\r\nAccept: */*\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn test_build_post_with_caller_host() {
        let mut headers = RequestHeaders::new();
        headers.set("host", "override");
        let req = build_request(Method::Post, &url("https://h/api"), "", &headers, b"{}", "application/json");
        assert_eq!(
            String::from_utf8(req).unwrap(),
            "POST /api HTTP/1.1\r\nhost: override\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}"
        );
    }

    #[test]
    fn test_content_headers_by_method() {
        let empty = RequestHeaders::new();
        let u = url("http://h/");
        let text = |m, body: &[u8]| String::from_utf8(build_request(m, &u, "", &empty, body, "text/plain")).unwrap();
        assert!(text(Method::Put, b"").contains("Content-Length: 0\r\n"));
        assert!(!text(Method::Patch, b"").contains("Content-Length"));
        assert!(text(Method::Patch, b"x").contains("Content-Length: 1\r\n"));
        assert!(!text(Method::Delete, b"").contains("Content-Type"));
        assert!(text(Method::Head, b"").starts_with("HEAD / HTTP/1.1\r\n"));
    }

    #[test]
    fn test_caller_connection_header_replaces_close() {
        let mut headers = RequestHeaders::new();
        headers.set("Connection", "Upgrade");
        let req = String::from_utf8(build_request(Method::Get, &url("ws://h/"), "", &headers, &[], "")).unwrap();
        assert!(req.contains("Connection: Upgrade\r\n"));
        assert!(!req.contains("Connection: close"));
    }

    #[test]
    fn test_parse_head() {
        let (status, headers) = parse_head(
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\nX-A: 1\r\nx-a: 2\r\nbroken line",
        )
        .unwrap();
        assert_eq!(status, 404);
        assert_eq!(headers.last("content-type"), Some("text/html"));
        assert_eq!(headers.all("X-A"), ["1", "2"]);

        assert_eq!(parse_head("HTTP/1.0 200").unwrap().0, 200);
        assert_eq!(parse_head("garbage").unwrap_err(), Error::ProtocolError);
        assert_eq!(parse_head("HTTP/1.1 abc OK").unwrap_err(), Error::ProtocolError);
    }
}
