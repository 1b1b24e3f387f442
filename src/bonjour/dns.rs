use super::types::DnsRecordType;
use bytes::Bytes;

pub const DNS_HEADER_LEN: usize = 12;

const MAX_POINTER_JUMPS: usize = 10;
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

/// Counts from the DNS header (RFC 1035 Section 4.1.1)
///
/// ```text
///  0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    QDCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ANCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    NSCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ARCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DnsHeader {
    qd_count: u16,
    an_count: u16,
}

fn parse_header(data: &[u8]) -> Option<DnsHeader> {
    if data.len() < DNS_HEADER_LEN {
        return None;
    }

    Some(DnsHeader {
        qd_count: u16::from_be_bytes([data[4], data[5]]),
        an_count: u16::from_be_bytes([data[6], data[7]]),
    })
}

/// Classify a UDP payload as a DNS query or response.
///
/// Returns `Some(true)` when the message has at least one decodable question
/// and no answer records, `Some(false)` when it is well formed but carries
/// answers (or nothing to ask), and `None` when it does not decode as DNS.
/// Answer records themselves are not walked.
pub fn parse_dns_payload(payload: &[u8]) -> Option<bool> {
    let header = parse_header(payload)?;

    let mut offset = DNS_HEADER_LEN;
    for _ in 0..header.qd_count {
        skip_question(payload, &mut offset)?;
    }

    Some(header.qd_count > 0 && header.an_count == 0)
}

/// Name and type of the first question, used for log summaries.
pub fn first_question(payload: &[u8]) -> Option<(Bytes, DnsRecordType)> {
    let header = parse_header(payload)?;
    if header.qd_count == 0 {
        return None;
    }

    let mut offset = DNS_HEADER_LEN;
    let name = parse_domain_name(payload, &mut offset)?;
    if offset + 4 > payload.len() {
        return None;
    }
    let qtype = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
    Some((name, DnsRecordType::from_u16(qtype)))
}

/// Question entry: QNAME, QTYPE (2 bytes), QCLASS (2 bytes)
///
/// Type and class values are not checked; in mDNS the top bit of QCLASS is
/// the unicast-response flag (RFC 6762 Section 5.4).
fn skip_question(data: &[u8], offset: &mut usize) -> Option<()> {
    parse_domain_name(data, offset)?;
    if *offset + 4 > data.len() {
        return None;
    }

    *offset += 4;
    Some(())
}

/// Parse a domain name with compression support (RFC 1035 Section 4.1.4)
///
/// Labels are a length octet followed by that many bytes; a length with the
/// top two bits set (0xC0) is a 14-bit pointer to an earlier name. Pointer
/// chains are limited to 10 jumps, labels to 63 octets, names to 253.
///
/// On success `offset` is left just past the name as it appears in place
/// (after the terminator, or after the first pointer).
fn parse_domain_name(data: &[u8], offset: &mut usize) -> Option<Bytes> {
    let mut domain = Vec::new();
    let mut cursor = *offset;
    let mut resume_at = None;
    let mut jumps = 0;

    loop {
        let len = *data.get(cursor)? as usize;

        if len == 0 {
            cursor += 1;
            break;
        }

        if len & 0xC0 == 0xC0 {
            let low = *data.get(cursor + 1)? as usize;
            if resume_at.is_none() {
                resume_at = Some(cursor + 2);
            }

            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return None;
            }

            cursor = ((len & 0x3F) << 8) | low;
            continue;
        }

        // 0x40 and 0x80 prefixes are reserved
        if len > MAX_LABEL_LEN {
            return None;
        }

        cursor += 1;
        let label = data.get(cursor..cursor + len)?;
        if !domain.is_empty() {
            domain.push(b'.');
        }
        domain.extend_from_slice(label);
        cursor += len;

        if domain.len() > MAX_NAME_LEN {
            return None;
        }
    }

    *offset = resume_at.unwrap_or(cursor);
    Some(Bytes::from(domain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonjour::test_support::{dns_answer_payload, dns_query_payload};

    #[test]
    fn query_payload_is_a_query() {
        assert_eq!(parse_dns_payload(&dns_query_payload()), Some(true));
    }

    #[test]
    fn answer_payload_is_not_a_query() {
        assert_eq!(parse_dns_payload(&dns_answer_payload()), Some(false));
    }

    #[test]
    fn answer_with_echoed_question_is_not_a_query() {
        let mut payload = dns_query_payload();
        // ANCOUNT = 1; the record itself is never decoded
        payload[7] = 1;
        assert_eq!(parse_dns_payload(&payload), Some(false));
    }

    #[test]
    fn empty_message_is_not_a_query() {
        assert_eq!(parse_dns_payload(&[0u8; DNS_HEADER_LEN]), Some(false));
    }

    #[test]
    fn short_header_is_malformed() {
        assert_eq!(parse_dns_payload(&[0u8; 11]), None);
        assert_eq!(parse_dns_payload(&[]), None);
    }

    #[test]
    fn question_count_beyond_payload_is_malformed() {
        let mut payload = dns_query_payload();
        payload[5] = 2;
        assert_eq!(parse_dns_payload(&payload), None);
    }

    #[test]
    fn unusual_question_class_is_still_a_query() {
        let mut payload = dns_query_payload();
        let len = payload.len();
        payload[len - 1] = 0;
        assert_eq!(parse_dns_payload(&payload), Some(true));
    }

    #[test]
    fn truncated_question_fields_are_malformed() {
        let payload = dns_query_payload();
        assert_eq!(parse_dns_payload(&payload[..payload.len() - 2]), None);
    }

    #[test]
    fn unicast_response_bit_keeps_the_question_valid() {
        let mut payload = dns_query_payload();
        let len = payload.len();
        payload[len - 2] = 0x80;
        assert_eq!(parse_dns_payload(&payload), Some(true));
    }

    #[test]
    fn pointer_loop_is_malformed() {
        let mut payload = vec![0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0];
        // QNAME pointing at itself
        payload.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
        assert_eq!(parse_dns_payload(&payload), None);
    }

    #[test]
    fn compressed_question_names_decode() {
        let mut payload = vec![0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0];
        payload.extend_from_slice(b"\x05_http\x04_tcp\x05local\x00\x00\x0c\x00\x01");
        // "_ipp" + pointer to "_tcp.local" at offset 12 + 6
        payload.extend_from_slice(b"\x04_ipp\xC0\x12\x00\x0c\x00\x01");
        assert_eq!(parse_dns_payload(&payload), Some(true));

        let mut offset = 12 + 22;
        let name = parse_domain_name(&payload, &mut offset).unwrap();
        assert_eq!(&name[..], b"_ipp._tcp.local");
        assert_eq!(offset, 12 + 22 + 7);
    }

    #[test]
    fn first_question_reports_name_and_type() {
        let (name, qtype) = first_question(&dns_query_payload()).unwrap();
        assert_eq!(&name[..], b"example.com");
        assert_eq!(qtype, DnsRecordType::A);

        assert_eq!(first_question(&dns_answer_payload()), None);
    }
}
