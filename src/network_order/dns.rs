//! All functions/trait to convert DNS structures to network order back & forth
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Result, Seek, SeekFrom};
use std::str;

use crate::derive_enum;
use crate::error::{DNSError, DNSResult};
use crate::network_order::ToFromNetworkOrder;
use crate::rfc1035::{
    CharacterString, DNSPacket, DNSPacketFlags, DnsResponse, DomainName, OpCode, PacketType,
    QClass, QType, ResponseCode,
};

// constants data used for tests
// cfg(doctest) doesn't work as expected
pub const SAMPLE_DOMAIN: &'static str = "www.google.ie";
pub const SAMPLE_SLICE: &[u8; 15] = &[
    0x03, 0x77, 0x77, 0x77, 0x06, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65, 0x02, 0x69, 0x65, 0x00,
];
pub const SAMPLE_SLICE_EXTENDED: &[u8; 19] = &[
    0x03, 0x77, 0x77, 0x77, 0x06, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65, 0x02, 0x69, 0x65, 0x00, 0x00,
    0x01, 0x00, 0x01,
];

impl<'a> ToFromNetworkOrder<'a> for CharacterString<'a> {
    /// ```
    /// use dnslib::network_order::ToFromNetworkOrder;
    /// use dnslib::rfc1035::CharacterString;
    ///
    /// let cs = CharacterString::from("google");
    /// let mut buffer: Vec<u8> = Vec::new();
    /// assert_eq!(cs.to_network_bytes(&mut buffer).unwrap(), 7);
    /// assert_eq!(buffer, &[0x06, b'g', b'o', b'o', b'g', b'l', b'e']);
    /// ```
    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> Result<usize> {
        buffer.write_u8(self.length)?;
        buffer.extend_from_slice(self.data.as_bytes());
        Ok(self.length as usize + 1)
    }

    /// ```
    /// use std::io::Cursor;
    /// use dnslib::network_order::ToFromNetworkOrder;
    /// use dnslib::rfc1035::CharacterString;
    ///
    /// let mut buffer = Cursor::new([0x06_u8, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65].as_slice());
    /// let mut cs = CharacterString::default();
    /// assert!(cs.from_network_bytes(&mut buffer).is_ok());
    /// assert_eq!(cs.data, "google");
    /// ```
    fn from_network_bytes(&mut self, buffer: &mut Cursor<&'a [u8]>) -> DNSResult<()> {
        let start = buffer.position() as usize;
        let data: &'a [u8] = *buffer.get_ref();

        if start >= data.len() {
            return Err(DNSError::new(
                "character-string decoding ran past end of buffer",
            ));
        }

        let size = data[start] as usize;
        if start + size + 1 > data.len() {
            return Err(DNSError::new(
                "character-string runs past end of buffer",
            ));
        }

        self.length = size as u8;
        self.data = str::from_utf8(&data[start + 1..start + size + 1])?;

        buffer.seek(SeekFrom::Start((start + size + 1) as u64))?;
        Ok(())
    }
}

impl<'a> ToFromNetworkOrder<'a> for DomainName<'a> {
    /// ```
    /// use dnslib::rfc1035::DomainName;
    /// use dnslib::network_order::ToFromNetworkOrder;
    /// use dnslib::network_order::dns::{SAMPLE_DOMAIN, SAMPLE_SLICE};
    ///
    /// let dn = DomainName::try_from(SAMPLE_DOMAIN).unwrap();
    /// let mut buffer: Vec<u8> = Vec::new();
    ///
    /// assert_eq!(dn.to_network_bytes(&mut buffer).unwrap(), 15);
    /// assert_eq!(&buffer, SAMPLE_SLICE);
    /// ```
    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> Result<usize> {
        let mut length = 0usize;

        for label in &self.labels {
            if let crate::rfc1035::LabelType::Label(cs) = label {
                buffer.write_u8(cs.data.len() as u8)?;
                buffer.extend_from_slice(cs.data.as_bytes());
                length += cs.data.len() + 1;
            }
        }

        // add sentinel 0x00
        buffer.write_u8(0)?;

        Ok(length + 1)
    }

    /// ```
    /// use std::io::Cursor;
    /// use dnslib::network_order::ToFromNetworkOrder;
    /// use dnslib::rfc1035::DomainName;
    /// use dnslib::network_order::dns::{SAMPLE_DOMAIN, SAMPLE_SLICE};
    ///
    /// let mut buffer = Cursor::new(SAMPLE_SLICE.as_slice());
    /// let mut dn = DomainName::default();
    /// assert!(dn.from_network_bytes(&mut buffer).is_ok());
    /// assert_eq!(dn.to_string(), SAMPLE_DOMAIN.to_owned() + ".");
    /// ```
    fn from_network_bytes(&mut self, buffer: &mut Cursor<&'a [u8]>) -> DNSResult<()> {
        // the rfc1035 module owns the single, cycle-bounded pointer-following decoder;
        // this impl only adapts it to the Cursor-based trait
        let start = buffer.position() as usize;
        let data: &'a [u8] = *buffer.get_ref();

        let end = self.from_position(start, &data)?;
        buffer.seek(SeekFrom::Start(end as u64))?;
        Ok(())
    }
}

// Impl QType & QClass enums. PacketType is never transmitted on its own (it lives inside
// the packed flags word) but gets a ToFromNetworkOrder impl too for symmetry/testing.
derive_enum!(QType, u16);
derive_enum!(QClass, u16);
derive_enum!(PacketType, u16);

impl<'a> ToFromNetworkOrder<'a> for DNSPacketFlags {
    /// ```
    /// use dnslib::network_order::ToFromNetworkOrder;
    /// use dnslib::rfc1035::{DNSPacketFlags, ResponseCode, OpCode, PacketType};
    ///
    /// let flags = DNSPacketFlags {
    ///     packet_type: PacketType::Response,
    ///     op_code: OpCode::IQuery,
    ///     authorative_answer: true,
    ///     truncated: true,
    ///     recursion_desired: true,
    ///     recursion_available: true,
    ///     z: false,
    ///     authentic_data: true,
    ///     checking_disabled: false,
    ///     response_code: ResponseCode::NoError
    /// };
    ///
    /// let mut buffer: Vec<u8> = Vec::new();
    /// assert!(flags.to_network_bytes(&mut buffer).is_ok());
    /// ```
    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> Result<usize> {
        // combine all flags according to structure
        //                               1  1  1  1  1  1
        // 0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
        // +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        // |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
        // +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        let mut flags = (self.packet_type as u16) << 15;
        flags |= (self.op_code as u16) << 11;
        flags |= (self.authorative_answer as u16) << 10;
        flags |= (self.truncated as u16) << 9;
        flags |= (self.recursion_desired as u16) << 8;
        flags |= (self.recursion_available as u16) << 7;
        flags |= (self.z as u16) << 6;
        flags |= (self.authentic_data as u16) << 5;
        flags |= (self.checking_disabled as u16) << 4;
        flags |= self.response_code as u16;

        buffer.write_u16::<BigEndian>(flags)?;
        Ok(2)
    }

    /// ```
    /// use std::io::Cursor;
    /// use dnslib::network_order::ToFromNetworkOrder;
    /// use dnslib::rfc1035::{DNSPacketFlags, ResponseCode, OpCode, PacketType};
    ///
    /// let b = vec![0b1000_1111, 0b1111_0000];
    /// let mut buffer = Cursor::new(b.as_slice());
    /// let mut v = DNSPacketFlags::default();
    /// assert!(v.from_network_bytes(&mut buffer).is_ok());
    /// assert_eq!(v.packet_type, PacketType::Response);
    /// assert_eq!(v.op_code, OpCode::IQuery);
    /// assert!(v.authorative_answer);
    /// assert!(v.truncated);
    /// assert!(v.recursion_desired);
    /// assert!(v.recursion_available);
    /// ```
    fn from_network_bytes(&mut self, buffer: &mut Cursor<&[u8]>) -> DNSResult<()> {
        // read as u16
        let flags = buffer.read_u16::<BigEndian>()?;

        // check for packet_type inconsistencies
        let packet_type = flags >> 15;
        debug_assert!(
            packet_type == 0_u16 || packet_type == 1,
            "QR is neither a question nor a response, value = {}",
            packet_type
        );

        self.packet_type = packet_type.try_into()?;
        self.op_code = OpCode::try_from(flags >> 11 & 0b1111)?;
        self.authorative_answer = (flags >> 10) & 1 == 1;
        self.truncated = (flags >> 9) & 1 == 1;
        self.recursion_desired = (flags >> 8) & 1 == 1;
        self.recursion_available = (flags >> 7) & 1 == 1;
        self.z = (flags >> 6) & 1 == 1;
        self.authentic_data = (flags >> 5) & 1 == 1;
        self.checking_disabled = (flags >> 4) & 1 == 1;
        self.response_code = ResponseCode::try_from(flags & 0b1111)?;

        Ok(())
    }
}

impl<'a> ToFromNetworkOrder<'a> for DnsResponse<'a> {
    fn to_network_bytes(&self, _buffer: &mut Vec<u8>) -> Result<usize> {
        Ok(0)
    }

    fn from_network_bytes(&mut self, buffer: &mut Cursor<&'a [u8]>) -> DNSResult<()> {
        self.name.from_network_bytes(buffer)?;
        self.r#type.from_network_bytes(buffer)?;
        self.class.from_network_bytes(buffer)?;
        self.ttl.from_network_bytes(buffer)?;
        self.rd_length.from_network_bytes(buffer)?;
        Ok(())
    }
}

impl<'a, T> ToFromNetworkOrder<'a> for DNSPacket<T>
where
    T: ToFromNetworkOrder<'a>,
{
    fn to_network_bytes(&self, buffer: &mut Vec<u8>) -> Result<usize> {
        let mut length = self.header.to_network_bytes(buffer)?;
        length += self.data.to_network_bytes(buffer)?;
        Ok(length)
    }

    fn from_network_bytes(&mut self, buffer: &mut Cursor<&'a [u8]>) -> DNSResult<()> {
        self.header.from_network_bytes(buffer)?;
        self.data.from_network_bytes(buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Seek, SeekFrom};

    use super::*;

    // sample is taken from real data using wireshark to be able to test
    // domain name compression
    const SAMPLE: &[u8] = &[
        0x41, 0x2a, 0x81, 0x80, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x06, 0x67, 0x6f,
        0x6f, 0x67, 0x6c, 0x65, 0x03, 0x63, 0x6f, 0x6d, 0x00, 0x00, 0x05, 0x00, 0x01, 0xc0, 0x0c,
        0x00, 0x06, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3c, 0x00, 0x26, 0x03, 0x6e, 0x73, 0x31, 0xc0,
        0x0c, 0x09, 0x64, 0x6e, 0x73, 0x2d, 0x61, 0x64, 0x6d, 0x69, 0x6e, 0xc0, 0x0c, 0x19, 0x1b,
        0xc0, 0x0c, 0x00, 0x00, 0x03, 0x84, 0x00, 0x00, 0x03, 0x84, 0x00, 0x00, 0x07, 0x08, 0x00,
        0x00, 0x00, 0x3c, 0x00, 0x00, 0x29, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn domain_name() {
        let mut buffer = Cursor::new(SAMPLE);

        buffer.seek(SeekFrom::Start(12)).unwrap();
        let mut dn = DomainName::default();
        assert!(dn.from_network_bytes(&mut buffer).is_ok());
        assert_eq!(&dn.to_string(), "google.com.");

        buffer.seek(SeekFrom::Start(28)).unwrap();
        let mut dn = DomainName::default();
        assert!(dn.from_network_bytes(&mut buffer).is_ok());
        assert_eq!(&dn.to_string(), "google.com.");

        buffer.seek(SeekFrom::Start(40)).unwrap();
        let mut dn = DomainName::default();
        assert!(dn.from_network_bytes(&mut buffer).is_ok());
        assert_eq!(&dn.to_string(), "ns1.google.com.");

        buffer.seek(SeekFrom::Start(46)).unwrap();
        let mut dn = DomainName::default();
        assert!(dn.from_network_bytes(&mut buffer).is_ok());
        assert_eq!(&dn.to_string(), "dns-admin.google.com.");
    }

    #[test]
    fn dnspacket_to_network() {
        let flags = DNSPacketFlags {
            packet_type: PacketType::Response,
            op_code: OpCode::IQuery,
            authorative_answer: true,
            truncated: true,
            recursion_desired: true,
            recursion_available: true,
            z: false,
            authentic_data: false,
            checking_disabled: false,
            response_code: ResponseCode::NoError,
        };

        let header = crate::rfc1035::DNSPacketHeader {
            id: 0x1234,
            flags,
            qd_count: 1,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        };

        let question = crate::rfc1035::DNSQuestion {
            name: DomainName::try_from(SAMPLE_DOMAIN).unwrap(),
            r#type: QType::A,
            class: QClass::IN,
        };

        let packet = DNSPacket::<crate::rfc1035::DNSQuestion> {
            header,
            data: question,
        };

        let mut buffer: Vec<u8> = Vec::new();
        let converted = packet.to_network_bytes(&mut buffer);
        assert!(converted.is_ok());
        assert_eq!(converted.unwrap(), 12 + 19);
    }

    #[test]
    fn domain_name_loop_is_rejected() {
        // a pointer at offset 0 pointing to itself
        let data: [u8; 2] = [0xc0, 0x00];
        let mut buffer = Cursor::new(data.as_slice());
        let mut dn = DomainName::default();
        assert!(dn.from_network_bytes(&mut buffer).is_err());
    }
}
