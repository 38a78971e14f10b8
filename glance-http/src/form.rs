//! `application/x-www-form-urlencoded` decoding
//!
//! Browsers submit the settings form as `offset=3600&bright=80`. Names
//! and values are percent-encoded with `+` standing in for a space.

/// Iterator over raw (still encoded) `name=value` pairs
#[derive(Debug, Clone)]
pub struct Pairs<'a> {
    rest: &'a str,
}

/// Split `input` into raw `name=value` pairs.
///
/// A pair without `=` yields an empty value; empty segments are skipped.
pub fn pairs(input: &str) -> Pairs<'_> {
    Pairs { rest: input }
}

impl<'a> Iterator for Pairs<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let (segment, rest) = match self.rest.split_once('&') {
                Some((segment, rest)) => (segment, rest),
                None => (self.rest, ""),
            };
            self.rest = rest;

            if segment.is_empty() {
                continue;
            }
            return Some(segment.split_once('=').unwrap_or((segment, "")));
        }
        None
    }
}

/// Raw value of the first field called `name`, if present
pub fn field<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    pairs(input)
        .find(|(key, _)| decoded(key).eq(name.bytes()))
        .map(|(_, value)| value)
}

/// Iterator over the percent-decoded bytes of a raw value
#[derive(Debug, Clone)]
pub struct Decoded<'a> {
    bytes: core::slice::Iter<'a, u8>,
}

/// Percent-decode `raw` lazily.
///
/// Malformed escapes (`%` not followed by two hex digits) pass through
/// unchanged.
pub fn decoded(raw: &str) -> Decoded<'_> {
    Decoded {
        bytes: raw.as_bytes().iter(),
    }
}

impl Iterator for Decoded<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        match *self.bytes.next()? {
            b'+' => Some(b' '),
            b'%' => {
                let lookahead = self.bytes.as_slice();
                match (
                    lookahead.first().copied().and_then(hex_value),
                    lookahead.get(1).copied().and_then(hex_value),
                ) {
                    (Some(high), Some(low)) => {
                        self.bytes.nth(1);
                        Some(high << 4 | low)
                    }
                    _ => Some(b'%'),
                }
            }
            byte => Some(byte),
        }
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Lenient integer conversion of a raw value.
///
/// Skips leading whitespace, accepts one optional sign, then reads decimal
/// digits up to the first non-digit. Anything unparsable reads as 0 and
/// out-of-range values saturate.
pub fn to_int(raw: &str) -> i32 {
    let mut bytes = decoded(raw).skip_while(u8::is_ascii_whitespace).peekable();

    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    for byte in bytes {
        if !byte.is_ascii_digit() {
            break;
        }
        value = (value * 10 + i64::from(byte - b'0')).min(i64::from(i32::MAX) + 1);
    }

    let value = if negative { -value } else { value };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
