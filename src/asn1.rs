use std::io::Result;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_ENUMERATED: u8 = 0x0a;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

pub fn write_tag(buf: &mut Vec<u8>, tag: u8) -> Result<()> {
    buf.write_u8(tag)
}

/// Definite length octets, long form above 127.
fn length_octets(len: usize) -> Result<Vec<u8>> {
    if len < 0x80 {
        return Ok(vec![len as u8]);
    }
    let len = u32::try_from(len).map_err(|_| std::io::Error::from(std::io::ErrorKind::Unsupported))?;
    let mut raw = [0u8; 4];
    BigEndian::write_u32(&mut raw, len);
    let skip = raw.iter().take_while(|b| **b == 0).count();
    let mut out = Vec::with_capacity(5);
    out.write_u8(0x80 | (4 - skip) as u8)?;
    out.extend_from_slice(&raw[skip..]);
    Ok(out)
}

pub fn write_len(buf: &mut Vec<u8>, len: usize) -> Result<()> {
    buf.extend_from_slice(&length_octets(len)?);
    Ok(())
}

pub fn write_int_with_tag(buf: &mut Vec<u8>, tag: u8, val: u32) -> Result<()> {
    let mut raw = [0u8; 5];
    BigEndian::write_u32(&mut raw[1..], val);
    // minimal two's complement: keep a leading zero only when the next
    // octet has its high bit set
    let mut start = 0;
    while start < 4 && raw[start] == 0 && raw[start + 1] & 0x80 == 0 {
        start += 1;
    }
    write_tag(buf, tag)?;
    write_len(buf, 5 - start)?;
    buf.extend_from_slice(&raw[start..]);
    Ok(())
}

pub fn write_int(buf: &mut Vec<u8>, val: u32) -> Result<()> {
    write_int_with_tag(buf, TAG_INTEGER, val)
}

pub fn write_enum(buf: &mut Vec<u8>, val: u8) -> Result<()> {
    write_int_with_tag(buf, TAG_ENUMERATED, val as u32)
}

pub fn write_bool_with_tag(buf: &mut Vec<u8>, tag: u8, val: bool) -> Result<()> {
    write_tag(buf, tag)?;
    write_len(buf, 1)?;
    buf.write_u8(if val { 0xff } else { 0x00 })
}

pub fn write_octet_string_with_tag(buf: &mut Vec<u8>, tag: u8, val: &[u8]) -> Result<()> {
    write_tag(buf, tag)?;
    write_len(buf, val.len())?;
    buf.extend_from_slice(val);
    Ok(())
}

#[derive(Debug)]
struct Asn1EncoderStackEntry {
    pos: usize
}

/// BER writer for nested constructed values. `start_seq` reserves one length
/// octet which `end_seq` patches, widening it to the long form when needed.
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
    stack: Vec<Asn1EncoderStackEntry>
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn start_seq(&mut self, tag: u8) -> Result<()> {
        write_tag(&mut self.buffer, tag)?;
        self.stack.push(Asn1EncoderStackEntry{ pos: self.buffer.len() - 1 });
        self.buffer.write_u8(0)
    }
    pub fn fix(&mut self) -> Result<()> {
        while !self.stack.is_empty() {
            self.end_seq()?
        }
        Ok(())
    }
    pub fn end_seq(&mut self) -> Result<()> {
        if let Some(a) = self.stack.pop() {
            let content = a.pos + 2;
            let len = length_octets(self.buffer.len() - content)?;
            self.buffer[a.pos + 1] = len[0];
            if len.len() > 1 {
                self.buffer.splice(content..content, len[1..].iter().copied());
            }
        }
        Ok(())
    }
    pub fn write_octet_string(&mut self, val: &[u8]) -> Result<()> {
        write_octet_string_with_tag(&mut self.buffer, TAG_OCTET_STRING, val)
    }
    pub fn write_octet_string_with_tag(&mut self, tag: u8, val: &[u8]) -> Result<()> {
        write_octet_string_with_tag(&mut self.buffer, tag, val)
    }
    pub fn write_enum(&mut self, val: u8) -> Result<()> {
        write_enum(&mut self.buffer, val)
    }
    pub fn write_int(&mut self, val: u32) -> Result<()> {
        write_int(&mut self.buffer, val)
    }
    pub fn write_int_with_tag(&mut self, tag: u8, val: u32) -> Result<()> {
        write_int_with_tag(&mut self.buffer, tag, val)
    }
    pub fn write_bool(&mut self, val: bool) -> Result<()> {
        write_bool_with_tag(&mut self.buffer, TAG_BOOLEAN, val)
    }
    pub fn write_bool_with_tag(&mut self, tag: u8, val: bool) -> Result<()> {
        write_bool_with_tag(&mut self.buffer, tag, val)
    }
    pub fn encode(mut self) -> Result<Vec<u8>> {
        self.fix()?;
        Ok(self.buffer)
    }
}

#[test]
fn a_test() {
    let mut buf = Vec::new();
    write_int(&mut buf, 127).unwrap();
    assert_eq!(buf, vec![0x02, 0x01, 0x7f]);

    let mut buf = Vec::new();
    write_int(&mut buf, 128).unwrap();
    assert_eq!(buf, vec![0x02, 0x02, 0x0, 0x80]);

    let mut buf = Vec::new();
    write_int(&mut buf, 256).unwrap();
    assert_eq!(buf, vec![0x02, 0x02, 0x1, 0x0]);

    let mut buf = Vec::new();
    write_int(&mut buf, 0).unwrap();
    assert_eq!(buf, vec![0x02, 0x01, 0x0]);

    let mut buf = Vec::new();
    write_int(&mut buf, u32::MAX).unwrap();
    assert_eq!(buf, vec![0x02, 0x05, 0x0, 0xff, 0xff, 0xff, 0xff]);
}

#[test]
fn length_test() {
    assert_eq!(length_octets(8).unwrap(), vec![0x08]);
    assert_eq!(length_octets(200).unwrap(), vec![0x81, 0xc8]);
    assert_eq!(length_octets(10034).unwrap(), vec![0x82, 0x27, 0x32]);
}

#[test]
fn nested_long_seq_test() {
    let mut e = Encoder::new();
    e.start_seq(TAG_SEQUENCE).unwrap();
    e.start_seq(TAG_SEQUENCE).unwrap();
    e.write_octet_string(&[0x61; 130]).unwrap();
    e.end_seq().unwrap();
    e.write_bool(true).unwrap();
    let out = e.encode().unwrap();
    // inner: 04 81 82 + 130 = 133 -> 30 81 85; outer: 136 + 3 = 139
    assert_eq!(&out[..6], &[0x30, 0x81, 0x8b, 0x30, 0x81, 0x85]);
    assert_eq!(&out[out.len() - 3..], &[0x01, 0x01, 0xff]);
    assert_eq!(out.len(), 142);
}
