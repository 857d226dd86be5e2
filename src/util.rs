//! Module for some utility functions, including debug
//!
use std::char;
use std::io::Cursor;

// A domain name is null terminated or terminated by a pointer as explained in the RFC1035
pub fn is_sentinel(x: u8) -> bool {
    x == 0 || x >= 192
}

// Top two bits set (0b11) mark a label-compression pointer rather than a length octet
pub fn is_pointer(x: u8) -> bool {
    x >= 192
}

// Parse a wireshark-style hex dump ("0000   76 86 81 a0 ...") used by test fixtures into
// a plain byte vector. Offset column and any trailing ASCII gutter are ignored; only the
// hex byte pairs are kept.
pub fn get_sample_slice(packet: &str) -> Vec<u8> {
    let mut bytes = Vec::new();

    for line in packet.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // skip the leading offset column (e.g. "0000")
        let mut fields = line.split_whitespace();
        fields.next();

        for field in fields {
            if let Ok(byte) = u8::from_str_radix(field, 16) {
                bytes.push(byte);
            }
        }
    }

    bytes
}

// Hex ("X") or printable-ASCII ("C") dump of a byte slice, used in debug logging.
#[macro_export]
macro_rules! format_buffer {
    ("X", $buffer:expr) => {{
        let mut s = String::new();
        for byte in $buffer.iter() {
            s.push_str(&format!("{:02X} ", byte));
        }
        s
    }};
    ("C", $buffer:expr) => {{
        let mut s = String::new();
        for byte in $buffer.iter() {
            if byte.is_ascii_graphic() || *byte == b' ' {
                s.push(*byte as char);
            } else {
                s.push('.');
            }
        }
        s
    }};
}

// Debug utility
pub fn pretty_cursor<'a>(buffer: &Cursor<&'a [u8]>) {
    let reference = buffer.get_ref();

    eprintln!("position={}", buffer.position());

    let mut i = 0usize;
    eprint!("index:");
    for _ in *reference {
        eprint!("{:02} ", i);
        i += 1;
    }
    eprintln!();

    eprint!("byte :");
    for x in *reference {
        eprint!("{:02X} ", x);
    }
    eprintln!();

    eprint!("ascii:");
    for x in *reference {
        let c = char::from_u32(*x as u32).unwrap();
        if c.is_ascii_alphanumeric() {
            eprint!("{:>2} ", char::from_u32(*x as u32).unwrap());
        } else {
            eprint!("   ");
        }
    }
    eprintln!();
}
