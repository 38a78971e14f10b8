//! Request head parsing
//!
//! A head is the request line plus headers, terminated by an empty line:
//!
//! ```text
//! POST /set?x=1 HTTP/1.1\r\n
//! Content-Type: application/x-www-form-urlencoded\r\n
//! Content-Length: 21\r\n
//! \r\n
//! ```
//!
//! Only `Content-Length` and `Content-Type` are kept; every other header
//! is checked for shape and skipped.

use heapless::String;

/// Largest head the server buffers before giving up. Browsers add
/// cookies and client hints, so this matches the socket receive buffer.
pub const MAX_HEAD_LEN: usize = 2048;

/// Maximum request target (path + query) length
pub const MAX_TARGET_LEN: usize = 256;

/// Maximum stored `Content-Type` value length
pub const MAX_CONTENT_TYPE_LEN: usize = 128;

const HEAD_END: &[u8] = b"\r\n\r\n";

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Method {
    Get,
    Post,
    /// Anything else; routed to 404
    Other,
}

/// Errors from head parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeadError {
    /// Head is not valid UTF-8
    InvalidUtf8,
    /// Request line is not `METHOD /target HTTP/x.y`
    MalformedRequestLine,
    /// Header line without a `:` separator
    MalformedHeader,
    /// Target or a kept header value exceeds its buffer
    TooLong,
    /// `Content-Length` is not a decimal integer
    InvalidContentLength,
}

/// Parsed request head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method
    pub method: Method,
    /// `Content-Length`, if present
    pub content_length: Option<usize>,
    target: String<MAX_TARGET_LEN>,
    content_type: String<MAX_CONTENT_TYPE_LEN>,
}

impl RequestHead {
    /// Path component of the target, without the query string
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// Raw query string after `?`, if any
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// `Content-Type` header value, if present
    pub fn content_type(&self) -> Option<&str> {
        if self.content_type.is_empty() {
            None
        } else {
            Some(&self.content_type)
        }
    }

    /// Multipart boundary from the `Content-Type` header
    pub fn boundary(&self) -> Option<&str> {
        crate::multipart::boundary(self.content_type()?)
    }
}

/// Length of the head in `buf` including the terminating blank line, or
/// `None` if the blank line has not arrived yet.
pub fn head_len(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_END.len())
        .position(|window| window == HEAD_END)
        .map(|pos| pos + HEAD_END.len())
}

/// Parse a request head from the start of `buf`.
///
/// Returns `Ok(None)` when `buf` does not yet contain a complete head.
/// On success, also returns the head length; anything after it is body.
pub fn parse_head(buf: &[u8]) -> Result<Option<(RequestHead, usize)>, HeadError> {
    let Some(len) = head_len(buf) else {
        return Ok(None);
    };

    let text =
        core::str::from_utf8(&buf[..len - HEAD_END.len()]).map_err(|_| HeadError::InvalidUtf8)?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().ok_or(HeadError::MalformedRequestLine)?;
    let mut parts = request_line.split(' ');

    let method = match parts.next() {
        Some("GET") => Method::Get,
        Some("POST") => Method::Post,
        Some(other) if !other.is_empty() => Method::Other,
        _ => return Err(HeadError::MalformedRequestLine),
    };

    let target = parts
        .next()
        .filter(|target| target.starts_with('/'))
        .ok_or(HeadError::MalformedRequestLine)?;

    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => return Err(HeadError::MalformedRequestLine),
    }
    if parts.next().is_some() {
        return Err(HeadError::MalformedRequestLine);
    }

    let mut head = RequestHead {
        method,
        content_length: None,
        target: String::try_from(target).map_err(|_| HeadError::TooLong)?,
        content_type: String::new(),
    };

    for line in lines {
        let (name, value) = line.split_once(':').ok_or(HeadError::MalformedHeader)?;
        let value = value.trim();

        if name.eq_ignore_ascii_case("content-length") {
            let length = value
                .parse()
                .map_err(|_| HeadError::InvalidContentLength)?;
            head.content_length = Some(length);
        } else if name.eq_ignore_ascii_case("content-type") {
            head.content_type = String::try_from(value).map_err(|_| HeadError::TooLong)?;
        }
    }

    Ok(Some((head, len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_head_needs_more() {
        let buf = b"GET / HTTP/1.1\r\nHost: glance\r\n";
        assert_eq!(parse_head(buf), Ok(None));
    }

    #[test]
    fn test_parse_get_root() {
        let buf = b"GET / HTTP/1.1\r\nHost: 192.168.1.20\r\nAccept: */*\r\n\r\n";
        let (head, len) = parse_head(buf).unwrap().unwrap();

        assert_eq!(len, buf.len());
        assert_eq!(head.method, Method::Get);
        assert_eq!(head.path(), "/");
        assert_eq!(head.query(), None);
        assert_eq!(head.content_length, None);
        assert_eq!(head.content_type(), None);
    }

    #[test]
    fn test_parse_post_with_body_following() {
        let buf = b"POST /set?offset=3600 HTTP/1.1\r\n\
                    Content-Type: application/x-www-form-urlencoded\r\n\
                    content-length: 9\r\n\r\nbright=40";
        let (head, len) = parse_head(buf).unwrap().unwrap();

        assert_eq!(head.method, Method::Post);
        assert_eq!(head.path(), "/set");
        assert_eq!(head.query(), Some("offset=3600"));
        assert_eq!(head.content_length, Some(9));
        assert_eq!(
            head.content_type(),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(&buf[len..], b"bright=40");
    }

    #[test]
    fn test_multipart_boundary_from_head() {
        let buf = b"POST /update HTTP/1.1\r\n\
                    Content-Type: multipart/form-data; boundary=----WebKitFormBoundaryX3\r\n\r\n";
        let (head, _) = parse_head(buf).unwrap().unwrap();
        assert_eq!(head.boundary(), Some("----WebKitFormBoundaryX3"));
    }

    #[test]
    fn test_unknown_method_is_other() {
        let buf = b"DELETE /set HTTP/1.1\r\n\r\n";
        let (head, _) = parse_head(buf).unwrap().unwrap();
        assert_eq!(head.method, Method::Other);
    }

    #[test]
    fn test_malformed_request_lines() {
        for buf in [
            &b"GET\r\n\r\n"[..],
            b"GET index.html HTTP/1.1\r\n\r\n",
            b"GET / SPDY/3\r\n\r\n",
            b" / HTTP/1.1\r\n\r\n",
        ] {
            assert_eq!(parse_head(buf), Err(HeadError::MalformedRequestLine));
        }
    }

    #[test]
    fn test_bad_headers() {
        let buf = b"GET / HTTP/1.1\r\nno separator here\r\n\r\n";
        assert_eq!(parse_head(buf), Err(HeadError::MalformedHeader));

        let buf = b"POST /set HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
        assert_eq!(parse_head(buf), Err(HeadError::InvalidContentLength));
    }
}
