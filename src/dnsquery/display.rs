//! Display method: as we can't impl the Display trait outside the module where it's defined, and
//! to not put these methods in the lib, use a wrapper
use std::fmt;

use dnslib::rfc1035::{
    DNSMessage, DNSPacketFlags, DNSPacketHeader, DNSQuestion, DNSResourceRecord, DomainName,
    PacketType, QType, RData,
};

pub struct DisplayWrapper<'a, T>(pub &'a T);

// Now we can implement the Display trait for DisplayWrapper for all structure we want to display
impl fmt::Display for DisplayWrapper<'_, DomainName<'_>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DisplayWrapper<'_, DNSPacketHeader> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // output depends on whether it's a query or a response
        // because some fields are unnecessary when Query or Response
        write!(f, "id:{:X}({}) ", self.0.id, self.0.id)?;
        write!(f, "flags:[{}] ", DisplayWrapper(&self.0.flags))?;

        if self.0.flags.packet_type == PacketType::Query {
            write!(f, "qd:{}", self.0.qd_count)
        } else {
            write!(
                f,
                "qd:{}, an:{} ns:{} ar:{}",
                self.0.qd_count, self.0.an_count, self.0.ns_count, self.0.ar_count
            )
        }
    }
}

impl fmt::Display for DisplayWrapper<'_, DNSPacketFlags> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // output depends on whether it's a query or a response
        // because some fields are unnecessary when Query or Response
        write!(f, "{:?} ", self.0.packet_type)?;

        if self.0.packet_type == PacketType::Query {
            write!(
                f,
                "opcode:{:?} rd:{}",
                self.0.op_code, self.0.recursion_desired
            )
        } else {
            write!(
                f,
                "opcode:{:?} tc:{} ra:{} rcode:{:?}",
                self.0.op_code, self.0.truncated, self.0.recursion_available, self.0.response_code
            )
        }
    }
}

impl fmt::Display for DisplayWrapper<'_, DNSQuestion<'_>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "domain:{} qtype:{:?} class:{:?}",
            self.0.name, self.0.r#type, self.0.class
        )
    }
}

impl fmt::Display for DisplayWrapper<'_, DNSMessage<'_>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // header first
        write!(f, "{} ", DisplayWrapper(&self.0.header))?;

        // all questions (usually only 1)
        for (i, question) in self.0.question.iter().enumerate() {
            write!(f, "question#{}: [{}] ", i + 1, DisplayWrapper(question))?;
        }

        Ok(())
    }
}

/// Prints the interpreted RDATA of a single resource record. `message` must be the full
/// wire buffer the record was decoded from, to allow compressed names to be resolved.
pub fn display_rr(rr: &DNSResourceRecord, message: &[u8]) {
    print!(
        "name:{} qtype:{:?} qclass:{:?} ttl:{}\t",
        rr.name, rr.r#type, rr.class, rr.ttl
    );

    match rr.interpret_rdata(message) {
        Ok(RData::A(ip)) => println!("{}", ip),
        Ok(RData::Aaaa(ip)) => println!("{}", ip),
        Ok(RData::Ns(dn)) => println!("NS {}", dn),
        Ok(RData::Cname(dn)) => println!("CNAME {}", dn),
        Ok(RData::Ptr(dn)) => println!("PTR {}", dn),
        Ok(RData::Raw(raw)) => match rr.r#type {
            QType::TXT => println!("{:?}", String::from_utf8_lossy(raw)),
            _ => println!("{} bytes of RDATA: {:X?}", raw.len(), raw),
        },
        Err(e) => eprintln!("error interpreting RDATA: {:?}", e),
    }
}

/// Prints every section of a decoded message. `message` is the original buffer (needed
/// again here for the same compression-pointer reason as display_rr).
pub fn display_data(response: &DNSMessage, message: &[u8]) {
    for rr in &response.answer {
        display_rr(rr, message);
    }
    for rr in &response.authority {
        display_rr(rr, message);
    }
    for rr in &response.additional {
        display_rr(rr, message);
    }
}
