//! Response status lines and headers

use core::fmt::{self, Write};

/// Response status codes the device emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Ok,
    SeeOther,
    BadRequest,
    NotFound,
    PayloadTooLarge,
}

impl Status {
    /// Numeric status code
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::SeeOther => 303,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::PayloadTooLarge => 413,
        }
    }

    /// Reason phrase
    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::SeeOther => "See Other",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::PayloadTooLarge => "Payload Too Large",
        }
    }
}

/// Status line plus headers of a response.
///
/// Every response closes the connection; the server handles one request
/// per accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead<'a> {
    pub status: Status,
    pub content_type: Option<&'a str>,
    pub content_length: Option<usize>,
    pub location: Option<&'a str>,
}

impl<'a> ResponseHead<'a> {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            content_type: None,
            content_length: None,
            location: None,
        }
    }

    /// `text/html` body of `len` bytes
    pub fn html(len: usize) -> Self {
        Self::new(Status::Ok).with_body("text/html", len)
    }

    /// `text/plain` body of `len` bytes with the given status
    pub fn text(status: Status, len: usize) -> Self {
        Self::new(status).with_body("text/plain", len)
    }

    /// 303 redirect to `location`
    pub fn redirect(location: &'a str) -> Self {
        Self {
            location: Some(location),
            content_length: Some(0),
            ..Self::new(Status::SeeOther)
        }
    }

    pub fn with_body(mut self, content_type: &'a str, len: usize) -> Self {
        self.content_type = Some(content_type);
        self.content_length = Some(len);
        self
    }

    /// Write the head, including the terminating blank line
    pub fn encode<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "HTTP/1.1 {} {}\r\n",
            self.status.code(),
            self.status.reason()
        )?;
        if let Some(content_type) = self.content_type {
            write!(out, "Content-Type: {content_type}\r\n")?;
        }
        if let Some(len) = self.content_length {
            write!(out, "Content-Length: {len}\r\n")?;
        }
        if let Some(location) = self.location {
            write!(out, "Location: {location}\r\n")?;
        }
        out.write_str("Connection: close\r\n\r\n")
    }
}
