use core::fmt::Write;
use heapless::Vec as HVec;

use crate::{Result, SipError};

pub const MAX_URI_LEN: usize = 256;
pub const MAX_HEADERS: usize = 16;
/// Largest response datagram read from the registrar.
pub const MAX_RESPONSE_LEN: usize = 4096;
/// Upper bound for one rendered request. Challenge values are echoed back
/// and may double in size when escaped, so this must stay well above twice
/// [`MAX_RESPONSE_LEN`].
pub const MAX_DATAGRAM_LEN: usize = 4 * MAX_RESPONSE_LEN;

pub type SmallString<const N: usize> = heapless::String<N>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const SIP_2_0: Version = Version { major: 2, minor: 0 };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> Self {
        Header {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Outgoing request. Bodies are never sent, so only the start line and the
/// headers are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub uri: SmallString<MAX_URI_LEN>,
    pub version: Version,
    pub headers: HVec<Header, MAX_HEADERS>,
}

impl Request {
    pub fn new(method: Method, uri: &str) -> Result<Self> {
        let mut uri_buf: SmallString<MAX_URI_LEN> = SmallString::new();
        uri_buf.push_str(uri).map_err(|_| SipError::Capacity)?;

        Ok(Self {
            method,
            uri: uri_buf,
            version: Version::SIP_2_0,
            headers: HVec::new(),
        })
    }

    pub fn add_header(&mut self, header: Header) -> Result<()> {
        self.headers.push(header).map_err(|_| SipError::Capacity)
    }

    /// Serialise with CRLF line endings and the terminating blank line.
    pub fn render<const N: usize>(&self) -> Result<SmallString<N>> {
        let mut out: SmallString<N> = SmallString::new();
        write!(
            out,
            "{} {} SIP/{}.{}\r\n",
            self.method, self.uri, self.version.major, self.version.minor
        )
        .map_err(|_| SipError::Capacity)?;
        for header in &self.headers {
            write!(out, "{}: {}\r\n", header.name, header.value)
                .map_err(|_| SipError::Capacity)?;
        }
        out.push_str("\r\n").map_err(|_| SipError::Capacity)?;
        Ok(out)
    }
}

impl core::fmt::Display for Method {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Method::Register => write!(f, "REGISTER"),
        }
    }
}

/// A received response, split into its first line and its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status_line: String,
    pub headers: Vec<Header>,
}

impl Response {
    /// 401 Unauthorized or 407 Proxy Authentication Required.
    pub fn is_challenge(&self) -> bool {
        self.status_line.contains("401") || self.status_line.contains("407")
    }

    pub fn is_success(&self) -> bool {
        self.status_line.contains("200 OK")
    }

    /// Numeric status, when the first line is a well-formed SIP status line.
    pub fn status_code(&self) -> Option<u16> {
        let mut parts = self.status_line.split_whitespace();
        if !parts.next()?.starts_with("SIP/2.0") {
            return None;
        }
        parts.next()?.parse().ok()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// Split a datagram into status line and headers.
///
/// Never fails: header lines without a `:` are skipped, and lines starting
/// with whitespace continue the previous header. Parsing stops at the first
/// blank line. Accepts bare LF line endings as well as CRLF.
pub fn parse_response(input: &str) -> Response {
    let mut lines = input.lines();
    let status_line = lines.next().unwrap_or_default().trim().to_string();

    let mut headers: Vec<Header> = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            match headers.last_mut() {
                Some(last) => {
                    last.value.push(' ');
                    last.value.push_str(line.trim());
                }
                None => log::debug!("dropping continuation with no header: {line:?}"),
            }
            continue;
        }
        match line.split_once(':') {
            Some((name, value)) => headers.push(Header::new(name.trim(), value.trim())),
            None => log::debug!("skipping malformed header line: {line:?}"),
        }
    }

    Response {
        status_line,
        headers,
    }
}

pub fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}
