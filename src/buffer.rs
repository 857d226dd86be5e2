//! A dynamically grown byte buffer, the foundation the line reader (`ftp::tree`'s line-oriented
//! socket read) and the DNS wire codec both build on. Mirrors the teacher's `Vec<u8>`-based
//! `to_network_bytes` accumulation style but packaged as its own growable owner with the
//! trim/format/move-contents primitives the served-FTP side needs that a bare `Vec<u8>` doesn't
//! give you for free.
use std::fmt::Write as _;

/// A growable byte sequence. Appends amortise to O(1): `reserve_to` doubles capacity until it
/// covers the requested length, so a sequence of N one-byte appends costs O(N) total, not O(N^2).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Grows capacity (never shrinks) so it is at least `length`, doubling each step.
    pub fn reserve_to(&mut self, length: usize) {
        if self.data.capacity() >= length {
            return;
        }
        let mut target = self.data.capacity().max(1);
        while target < length {
            target *= 2;
        }
        self.data.reserve(target - self.data.len());
    }

    pub fn append_octet(&mut self, byte: u8) {
        self.reserve_to(self.data.len() + 1);
        self.data.push(byte);
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.reserve_to(self.data.len() + bytes.len());
        self.data.extend_from_slice(bytes);
    }

    /// Appends the ASCII digits of `value` rendered in `base` (2..=16). Negative values are
    /// prefixed with `-`; the magnitude is rendered unsigned.
    pub fn append_integer(&mut self, value: i64, base: u32) {
        debug_assert!((2..=16).contains(&base), "base must be in 2..=16");

        let mut magnitude = value.unsigned_abs();
        if value < 0 {
            self.append_octet(b'-');
        }

        let mut digits = Vec::new();
        if magnitude == 0 {
            digits.push(b'0');
        }
        while magnitude > 0 {
            let digit = (magnitude % base as u64) as u32;
            digits.push(std::char::from_digit(digit, base).unwrap() as u8);
            magnitude /= base as u64;
        }
        digits.reverse();
        self.append_bytes(&digits);
    }

    /// A small `printf`-style formatter supporting `%c`, `%d`/`%i`, `%s`, `%f` and `%%`.
    /// An unrecognised conversion character is emitted literally, preceded by the `%` that
    /// introduced it, rather than failing the whole append.
    pub fn append_formatted(&mut self, format: &str, args: &[FormatArg<'_>]) {
        let mut chars = format.chars().peekable();
        let mut arg_index = 0usize;

        while let Some(c) = chars.next() {
            if c != '%' {
                let mut tmp = [0u8; 4];
                self.append_bytes(c.encode_utf8(&mut tmp).as_bytes());
                continue;
            }

            match chars.next() {
                Some('%') => self.append_octet(b'%'),
                Some('c') => {
                    if let Some(FormatArg::Char(ch)) = args.get(arg_index) {
                        let mut tmp = [0u8; 4];
                        self.append_bytes(ch.encode_utf8(&mut tmp).as_bytes());
                    }
                    arg_index += 1;
                }
                Some(conv @ ('d' | 'i')) => {
                    let _ = conv;
                    if let Some(FormatArg::Int(v)) = args.get(arg_index) {
                        self.append_integer(*v, 10);
                    }
                    arg_index += 1;
                }
                Some('s') => {
                    if let Some(FormatArg::Str(s)) = args.get(arg_index) {
                        self.append_bytes(s.as_bytes());
                    }
                    arg_index += 1;
                }
                Some('f') => {
                    if let Some(FormatArg::Float(v)) = args.get(arg_index) {
                        let mut rendered = String::new();
                        let _ = write!(rendered, "{:.6}", v);
                        self.append_bytes(rendered.as_bytes());
                    }
                    arg_index += 1;
                }
                Some(other) => {
                    self.append_octet(b'%');
                    let mut tmp = [0u8; 4];
                    self.append_bytes(other.encode_utf8(&mut tmp).as_bytes());
                }
                None => self.append_octet(b'%'),
            }
        }
    }

    /// Trims leading and trailing ASCII whitespace. `trim(trim(x)) == trim(x)` because a
    /// second pass over an already-trimmed buffer finds nothing to strip.
    pub fn trim(&mut self) {
        let start = self
            .data
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.data.len());
        let end = self
            .data
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map(|i| i + 1)
            .unwrap_or(0);

        if start >= end {
            self.data.clear();
        } else {
            self.data = self.data[start..end].to_vec();
        }
    }

    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Empties `other` into `self`, appending its bytes. `other` is left empty: this models
    /// the single-owner move-contents contract rather than a cheap `mem::swap`, since the
    /// caller may hold more appended data in `self` already.
    pub fn move_contents_from(&mut self, other: &mut ByteBuffer) {
        self.append_bytes(&other.data);
        other.data.clear();
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<ByteBuffer> for Vec<u8> {
    fn from(buffer: ByteBuffer) -> Self {
        buffer.data
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FormatArg<'a> {
    Char(char),
    Int(i64),
    Str(&'a str),
    Float(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_is_idempotent() {
        let mut b = ByteBuffer::from(b"  hello \t\r\n".to_vec());
        b.trim();
        assert_eq!(b.as_slice(), b"hello");
        let mut b2 = b.clone();
        b2.trim();
        assert_eq!(b, b2);
    }

    #[test]
    fn trim_all_whitespace_empties() {
        let mut b = ByteBuffer::from(b"   \t  ".to_vec());
        b.trim();
        assert!(b.is_empty());
    }

    #[test]
    fn append_concatenates() {
        let mut b = ByteBuffer::new();
        b.append_bytes(b"foo");
        b.append_bytes(b"bar");
        assert_eq!(b.as_slice(), b"foobar");
    }

    #[test]
    fn append_integer_bases() {
        let mut b = ByteBuffer::new();
        b.append_integer(255, 16);
        assert_eq!(b.as_slice(), b"ff");

        let mut b = ByteBuffer::new();
        b.append_integer(-42, 10);
        assert_eq!(b.as_slice(), b"-42");
    }

    #[test]
    fn append_formatted_basic_conversions() {
        let mut b = ByteBuffer::new();
        b.append_formatted(
            "%s is %d%% done%c",
            &[
                FormatArg::Str("build"),
                FormatArg::Int(42),
                FormatArg::Char('!'),
            ],
        );
        assert_eq!(b.as_slice(), b"build is 42% done!");
    }

    #[test]
    fn append_formatted_unknown_conversion_is_literal() {
        let mut b = ByteBuffer::new();
        b.append_formatted("%q", &[]);
        assert_eq!(b.as_slice(), b"%q");
    }

    #[test]
    fn move_contents_empties_source() {
        let mut src = ByteBuffer::from(b"payload".to_vec());
        let mut dst = ByteBuffer::new();
        dst.move_contents_from(&mut src);
        assert_eq!(dst.as_slice(), b"payload");
        assert!(src.is_empty());
    }

    #[test]
    fn reserve_to_doubles_capacity() {
        let mut b = ByteBuffer::new();
        b.reserve_to(10);
        assert!(b.data.capacity() >= 10);
        let cap_after_first = b.data.capacity();
        b.reserve_to(cap_after_first + 1);
        assert!(b.data.capacity() >= cap_after_first * 2);
    }
}
