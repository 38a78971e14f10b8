//! Streaming `multipart/form-data` parser
//!
//! Body layout for a single file field:
//!
//! ```text
//! --BOUNDARY\r\n
//! Content-Disposition: form-data; name="update"; filename="glance.bin"\r\n
//! Content-Type: application/octet-stream\r\n
//! \r\n
//! <file bytes>\r\n--BOUNDARY--\r\n
//! ```
//!
//! The body is fed in whatever chunks the socket hands out. File content is
//! passed through as borrowed slices; only part headers are buffered. A
//! delimiter that straddles two chunks is held back until it either
//! completes or turns out to be file content.

use heapless::String;

/// RFC 2046 limit on boundary length
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Longest single part header line that is buffered
pub const MAX_PART_HEADER_LEN: usize = 256;

/// Stored length of a part's `name` parameter
pub const MAX_FIELD_LEN: usize = 32;

/// Stored length of a part's `filename` parameter
pub const MAX_FILENAME_LEN: usize = 64;

const DELIMITER_CAP: usize = MAX_BOUNDARY_LEN + 4;

/// Errors from multipart parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MultipartError {
    /// Boundary is empty or longer than [`MAX_BOUNDARY_LEN`]
    InvalidBoundary,
    /// A part header line exceeds [`MAX_PART_HEADER_LEN`]
    HeaderTooLong,
    /// A part header is not `Name: value` UTF-8
    InvalidHeader,
    /// Delimiter followed by something other than `\r\n` or `--`
    MalformedDelimiter,
}

/// One step of parser output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part<'a> {
    /// Headers of a file part are complete; content follows
    FileStart {
        field: String<MAX_FIELD_LEN>,
        filename: String<MAX_FILENAME_LEN>,
    },
    /// A run of file content
    Data(&'a [u8]),
    /// The current file part ended
    FileEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for the next delimiter; content is surfaced only for file parts
    Scan { emit: bool },
    /// Delimiter seen; next two bytes pick another part or the close
    AfterDelimiter,
    /// Reading part header lines
    Headers,
    /// Closing delimiter seen; the epilogue is ignored
    Done,
}

/// Incremental multipart parser
#[derive(Debug, Clone)]
pub struct MultipartParser {
    delimiter: heapless::Vec<u8, DELIMITER_CAP>,
    matched: usize,
    state: State,
    after: heapless::Vec<u8, 2>,
    line: heapless::Vec<u8, MAX_PART_HEADER_LEN>,
    field: String<MAX_FIELD_LEN>,
    filename: Option<String<MAX_FILENAME_LEN>>,
}

impl MultipartParser {
    /// Create a parser for bodies delimited by `boundary`
    pub fn new(boundary: &str) -> Result<Self, MultipartError> {
        if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
            return Err(MultipartError::InvalidBoundary);
        }

        let mut delimiter = heapless::Vec::new();
        delimiter
            .extend_from_slice(b"\r\n--")
            .and_then(|()| delimiter.extend_from_slice(boundary.as_bytes()))
            .map_err(|_| MultipartError::InvalidBoundary)?;

        Ok(Self {
            delimiter,
            // The first delimiter opens the body without a leading CRLF.
            matched: 2,
            state: State::Scan { emit: false },
            after: heapless::Vec::new(),
            line: heapless::Vec::new(),
            field: String::new(),
            filename: None,
        })
    }

    /// True once the closing delimiter has been consumed
    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    /// Advance over `input`, returning the next part event.
    ///
    /// Consumed bytes are removed from the front of `input`. `Ok(None)`
    /// means `input` is exhausted and more body is needed (or, after
    /// [`is_finished`](Self::is_finished), that nothing else will come).
    pub fn poll<'a, 'i: 'a>(
        &'a mut self,
        input: &mut &'i [u8],
    ) -> Result<Option<Part<'a>>, MultipartError> {
        loop {
            match self.state {
                State::Done => {
                    *input = &[];
                    return Ok(None);
                }
                State::AfterDelimiter => {
                    while self.after.len() < 2 {
                        let current: &'i [u8] = *input;
                        let Some((&byte, rest)) = current.split_first() else {
                            return Ok(None);
                        };
                        *input = rest;
                        let _ = self.after.push(byte);
                    }

                    self.state = match self.after.as_slice() {
                        b"\r\n" => State::Headers,
                        b"--" => State::Done,
                        _ => return Err(MultipartError::MalformedDelimiter),
                    };
                    self.after.clear();
                    self.line.clear();
                    self.field.clear();
                    self.filename = None;
                }
                State::Headers => {
                    let current: &'i [u8] = *input;
                    let Some(newline) = current.iter().position(|&b| b == b'\n') else {
                        self.line
                            .extend_from_slice(current)
                            .map_err(|_| MultipartError::HeaderTooLong)?;
                        *input = &[];
                        return Ok(None);
                    };

                    self.line
                        .extend_from_slice(&current[..newline])
                        .map_err(|_| MultipartError::HeaderTooLong)?;
                    *input = &current[newline + 1..];

                    if self.line.last() == Some(&b'\r') {
                        self.line.pop();
                    }

                    if !self.line.is_empty() {
                        self.parse_header_line()?;
                        self.line.clear();
                        continue;
                    }

                    match self.filename.take() {
                        Some(filename) => {
                            self.state = State::Scan { emit: true };
                            let field = core::mem::take(&mut self.field);
                            return Ok(Some(Part::FileStart { field, filename }));
                        }
                        None => self.state = State::Scan { emit: false },
                    }
                }
                State::Scan { emit } => {
                    let current: &'i [u8] = *input;

                    if self.matched > 0 {
                        let mut rest = current;
                        while let Some((&byte, tail)) = rest.split_first() {
                            if self.matched == self.delimiter.len()
                                || byte != self.delimiter[self.matched]
                            {
                                break;
                            }
                            self.matched += 1;
                            rest = tail;
                        }
                        *input = rest;

                        if self.matched == self.delimiter.len() {
                            self.matched = 0;
                            self.state = State::AfterDelimiter;
                            if emit {
                                return Ok(Some(Part::FileEnd));
                            }
                            continue;
                        }
                        if rest.is_empty() {
                            return Ok(None);
                        }

                        // The held bytes were content after all. Only index 0
                        // of the delimiter is a CR, so no shorter match can
                        // start inside them.
                        let held = self.matched;
                        self.matched = 0;
                        if emit {
                            return Ok(Some(Part::Data(&self.delimiter[..held])));
                        }
                        continue;
                    }

                    if current.is_empty() {
                        return Ok(None);
                    }

                    match current.iter().position(|&b| b == b'\r') {
                        Some(0) => {
                            self.matched = 1;
                            *input = &current[1..];
                        }
                        Some(pos) => {
                            let (data, rest) = current.split_at(pos);
                            *input = rest;
                            if emit {
                                return Ok(Some(Part::Data(data)));
                            }
                        }
                        None => {
                            *input = &[];
                            if emit {
                                return Ok(Some(Part::Data(current)));
                            }
                        }
                    }
                }
            }
        }
    }

    fn parse_header_line(&mut self) -> Result<(), MultipartError> {
        let line = core::str::from_utf8(&self.line).map_err(|_| MultipartError::InvalidHeader)?;
        let (name, value) = line.split_once(':').ok_or(MultipartError::InvalidHeader)?;

        if !name.trim().eq_ignore_ascii_case("content-disposition") {
            return Ok(());
        }

        for param in value.split(';').skip(1) {
            let Some((key, raw)) = param.split_once('=') else {
                continue;
            };
            let raw = raw.trim().trim_matches('"');
            let key = key.trim();

            if key.eq_ignore_ascii_case("name") {
                self.field = truncated(raw);
            } else if key.eq_ignore_ascii_case("filename") {
                self.filename = Some(truncated(raw));
            }
        }
        Ok(())
    }
}

fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    for ch in value.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Extract the boundary parameter from a `multipart/form-data` content type
pub fn boundary(content_type: &str) -> Option<&str> {
    let (mime, params) = content_type.split_once(';')?;
    if !mime.trim().eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }

    params
        .split(';')
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"'))
        })
        .filter(|boundary| !boundary.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::vec::Vec;

    const BOUNDARY: &str = "----glanceZ";

    #[derive(Debug, PartialEq, Eq)]
    enum Seen {
        Start(std::string::String, std::string::String),
        Data(Vec<u8>),
        End,
    }

    fn file_body(content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"------glanceZ\r\n");
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"update\"; filename=\"glance.bin\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n------glanceZ--\r\n");
        body
    }

    /// Feed `chunks` in order, merging adjacent data runs.
    fn run(parser: &mut MultipartParser, chunks: &[&[u8]]) -> Vec<Seen> {
        let mut seen = Vec::new();
        for chunk in chunks {
            let mut input: &[u8] = chunk;
            while let Some(part) = parser.poll(&mut input).unwrap() {
                match part {
                    Part::FileStart { field, filename } => {
                        seen.push(Seen::Start(field.as_str().into(), filename.as_str().into()))
                    }
                    Part::Data(data) => match seen.last_mut() {
                        Some(Seen::Data(buf)) => buf.extend_from_slice(data),
                        _ => seen.push(Seen::Data(data.to_vec())),
                    },
                    Part::FileEnd => seen.push(Seen::End),
                }
            }
            assert!(input.is_empty());
        }
        seen
    }

    fn split_at_all(body: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
        cuts.iter_mut().for_each(|cut| *cut %= body.len() + 1);
        cuts.sort_unstable();
        let mut chunks = Vec::new();
        let mut start = 0;
        for cut in cuts {
            chunks.push(&body[start..cut]);
            start = cut;
        }
        chunks.push(&body[start..]);
        chunks
    }

    #[test]
    fn test_single_file_in_one_chunk() {
        let body = file_body(b"\x7fELF firmware bytes");
        let mut parser = MultipartParser::new(BOUNDARY).unwrap();

        let seen = run(&mut parser, &[&body]);
        assert_eq!(
            seen,
            [
                Seen::Start("update".into(), "glance.bin".into()),
                Seen::Data(b"\x7fELF firmware bytes".to_vec()),
                Seen::End,
            ]
        );
        assert!(parser.is_finished());
    }

    #[test]
    fn test_byte_at_a_time() {
        let content = b"line one\r\nline two\r\n--not the boundary\r\r\n";
        let body = file_body(content);
        let chunks: Vec<&[u8]> = body.chunks(1).collect();
        let mut parser = MultipartParser::new(BOUNDARY).unwrap();

        let seen = run(&mut parser, &chunks);
        assert_eq!(seen[1], Seen::Data(content.to_vec()));
        assert_eq!(seen[2], Seen::End);
        assert!(parser.is_finished());
    }

    #[test]
    fn test_content_ending_in_partial_delimiter() {
        let content = b"payload\r\n--";
        let body = file_body(content);
        let mut parser = MultipartParser::new(BOUNDARY).unwrap();

        let seen = run(&mut parser, &[&body]);
        assert_eq!(seen[1], Seen::Data(content.to_vec()));
    }

    #[test]
    fn test_text_fields_are_skipped() {
        let mut body = Vec::new();
        body.extend_from_slice(b"preamble text\r\n------glanceZ\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"note\"\r\n\r\n");
        body.extend_from_slice(b"hello\r\n");
        body.extend_from_slice(&file_body(b"abc"));

        let mut parser = MultipartParser::new(BOUNDARY).unwrap();
        let seen = run(&mut parser, &[&body]);
        assert_eq!(
            seen,
            [
                Seen::Start("update".into(), "glance.bin".into()),
                Seen::Data(b"abc".to_vec()),
                Seen::End,
            ]
        );
    }

    #[test]
    fn test_truncated_body_is_unfinished() {
        let body = file_body(b"0123456789");
        let mut parser = MultipartParser::new(BOUNDARY).unwrap();

        let seen = run(&mut parser, &[&body[..body.len() - 12]]);
        assert_eq!(seen.len(), 2);
        assert!(!parser.is_finished());
    }

    #[test]
    fn test_malformed_delimiter() {
        let mut parser = MultipartParser::new(BOUNDARY).unwrap();
        let mut input: &[u8] = b"------glanceZxx";
        assert_eq!(
            parser.poll(&mut input),
            Err(MultipartError::MalformedDelimiter)
        );
    }

    #[test]
    fn test_header_too_long() {
        let mut body = Vec::new();
        body.extend_from_slice(b"------glanceZ\r\nX-Long: ");
        body.extend(core::iter::repeat(b'a').take(MAX_PART_HEADER_LEN));
        let mut parser = MultipartParser::new(BOUNDARY).unwrap();
        let mut input: &[u8] = &body;
        assert_eq!(parser.poll(&mut input), Err(MultipartError::HeaderTooLong));
    }

    #[test]
    fn test_invalid_boundary() {
        assert_eq!(
            MultipartParser::new("").unwrap_err(),
            MultipartError::InvalidBoundary
        );
        let long = "b".repeat(MAX_BOUNDARY_LEN + 1);
        assert_eq!(
            MultipartParser::new(&long).unwrap_err(),
            MultipartError::InvalidBoundary
        );
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary("multipart/form-data; boundary=----WebKitFormBoundary7MA4"),
            Some("----WebKitFormBoundary7MA4")
        );
        assert_eq!(
            boundary("Multipart/Form-Data; charset=utf-8; boundary=\"quoted\""),
            Some("quoted")
        );
        assert_eq!(boundary("application/x-www-form-urlencoded"), None);
        assert_eq!(boundary("multipart/form-data"), None);
        assert_eq!(boundary("multipart/form-data; boundary="), None);
    }

    proptest! {
        #[test]
        fn prop_content_survives_any_chunking(
            content in proptest::collection::vec(
                proptest::sample::select(vec![b'\r', b'\n', b'-', b'g', b'l', 0x00, 0xFF]),
                0..400,
            ),
            cuts in proptest::collection::vec(any::<usize>(), 0..12),
        ) {
            let body = file_body(&content);
            let mut parser = MultipartParser::new(BOUNDARY).unwrap();

            let seen = run(&mut parser, &split_at_all(&body, cuts));
            let data: Vec<u8> = seen
                .iter()
                .filter_map(|s| match s {
                    Seen::Data(d) => Some(d.clone()),
                    _ => None,
                })
                .flatten()
                .collect();

            prop_assert_eq!(data, content);
            prop_assert_eq!(seen.last(), Some(&Seen::End));
            prop_assert!(parser.is_finished());
        }
    }
}
