//! Fixed-layout record encoding for kernel structures.
//!
//! Audit and connector records are laid out in host byte order, not a fixed
//! wire order. A [`Codec`] resolves that order once and applies it to every
//! field it writes or reads. Records are serialized field by field in ABI
//! order; nothing depends on the compiler's struct layout.
//!
//! # Example
//!
//! ```ignore
//! use nlaudit::netlink::codec::Codec;
//! use nlaudit::netlink::audit::AuditStatus;
//!
//! let codec = Codec::native();
//! let bytes = codec.encode(&AuditStatus::default());
//! let status: AuditStatus = codec.decode(&bytes)?;
//! ```

use winnow::binary::{self, Endianness};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;

use super::error::{Error, Result};

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Byte order of multi-byte record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    /// Byte order of the host, which is what the kernel uses.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    fn endianness(self) -> Endianness {
        match self {
            Self::Little => Endianness::Little,
            Self::Big => Endianness::Big,
        }
    }
}

/// A kernel structure with a fixed size and field order.
pub trait Record: Sized {
    /// Kernel name of the structure, used in error messages.
    const NAME: &'static str;

    /// Encoded size in bytes.
    const SIZE: usize;

    /// Write every field in ABI order.
    fn write(&self, w: &mut Writer<'_>);

    /// Parse every field in ABI order.
    fn parse(input: &mut &[u8], order: ByteOrder) -> PResult<Self>;
}

/// Appends fields to a buffer in the codec's byte order.
pub struct Writer<'a> {
    buf: &'a mut Vec<u8>,
    order: ByteOrder,
}

impl Writer<'_> {
    /// Write a u16.
    pub fn u16(&mut self, value: u16) {
        let bytes = match self.order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        self.buf.extend_from_slice(&bytes);
    }

    /// Write a u32.
    pub fn u32(&mut self, value: u32) {
        let bytes = match self.order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        self.buf.extend_from_slice(&bytes);
    }

    /// Write a u64.
    pub fn u64(&mut self, value: u64) {
        let bytes = match self.order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        self.buf.extend_from_slice(&bytes);
    }

    /// Write a u32 array.
    pub fn u32_slice(&mut self, values: &[u32]) {
        for &value in values {
            self.u32(value);
        }
    }
}

/// Parse a u16 in the given byte order.
pub fn parse_u16(input: &mut &[u8], order: ByteOrder) -> PResult<u16> {
    binary::u16(order.endianness()).parse_next(input)
}

/// Parse a u32 in the given byte order.
pub fn parse_u32(input: &mut &[u8], order: ByteOrder) -> PResult<u32> {
    binary::u32(order.endianness()).parse_next(input)
}

/// Parse a u64 in the given byte order.
pub fn parse_u64(input: &mut &[u8], order: ByteOrder) -> PResult<u64> {
    binary::u64(order.endianness()).parse_next(input)
}

/// Parse a fixed-length u32 array.
pub fn parse_u32_array<const N: usize>(input: &mut &[u8], order: ByteOrder) -> PResult<[u32; N]> {
    let mut out = [0u32; N];
    for slot in out.iter_mut() {
        *slot = parse_u32(input, order)?;
    }
    Ok(out)
}

pub(crate) fn parse_error(record: &str, err: ErrMode<ContextError>) -> Error {
    Error::MalformedMessage(format!("{}: {:?}", record, err))
}

/// Encoder/decoder for fixed-layout records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    order: ByteOrder,
}

impl Default for Codec {
    fn default() -> Self {
        Self::native()
    }
}

impl Codec {
    /// Codec using the host byte order.
    pub const fn native() -> Self {
        Self {
            order: ByteOrder::native(),
        }
    }

    /// Codec using an explicit byte order.
    pub const fn with_order(order: ByteOrder) -> Self {
        Self { order }
    }

    /// Byte order applied to every field.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Field writer appending to `buf`, for records with a variable tail.
    pub fn writer<'a>(&self, buf: &'a mut Vec<u8>) -> Writer<'a> {
        Writer {
            buf,
            order: self.order,
        }
    }

    /// Encode a record into a new buffer of exactly `R::SIZE` bytes.
    pub fn encode<R: Record>(&self, record: &R) -> Vec<u8> {
        let mut buf = Vec::with_capacity(R::SIZE);
        self.encode_into(record, &mut buf);
        buf
    }

    /// Append an encoded record to `buf`.
    pub fn encode_into<R: Record>(&self, record: &R, buf: &mut Vec<u8>) {
        let start = buf.len();
        record.write(&mut self.writer(buf));
        debug_assert_eq!(buf.len() - start, R::SIZE, "{} size drift", R::NAME);
    }

    /// Decode a record from the front of `bytes`.
    ///
    /// Bytes past `R::SIZE` are ignored.
    pub fn decode<R: Record>(&self, bytes: &[u8]) -> Result<R> {
        if bytes.len() < R::SIZE {
            return Err(Error::TruncatedRecord {
                record: R::NAME,
                expected: R::SIZE,
                actual: bytes.len(),
            });
        }

        let mut input = &bytes[..R::SIZE];
        R::parse(&mut input, self.order).map_err(|e| parse_error(R::NAME, e))
    }

    /// Decode a record and advance `input` past it.
    pub fn decode_next<R: Record>(&self, input: &mut &[u8]) -> Result<R> {
        let record = self.decode(input)?;
        *input = &input[R::SIZE..];
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sample {
        a: u16,
        b: u16,
        c: u32,
        d: u64,
    }

    impl Record for Sample {
        const NAME: &'static str = "sample";
        const SIZE: usize = 16;

        fn write(&self, w: &mut Writer<'_>) {
            w.u16(self.a);
            w.u16(self.b);
            w.u32(self.c);
            w.u64(self.d);
        }

        fn parse(input: &mut &[u8], order: ByteOrder) -> PResult<Self> {
            Ok(Self {
                a: parse_u16(input, order)?,
                b: parse_u16(input, order)?,
                c: parse_u32(input, order)?,
                d: parse_u64(input, order)?,
            })
        }
    }

    fn sample() -> Sample {
        Sample {
            a: 0x0102,
            b: 0xfffe,
            c: 0x0a0b0c0d,
            d: 0x1122334455667788,
        }
    }

    #[test]
    fn native_matches_host() {
        let bytes = Codec::native().encode(&sample());
        assert_eq!(&bytes[0..2], &0x0102u16.to_ne_bytes());
        assert_eq!(&bytes[4..8], &0x0a0b0c0du32.to_ne_bytes());
        assert_eq!(&bytes[8..16], &0x1122334455667788u64.to_ne_bytes());
    }

    #[test]
    fn explicit_orders() {
        let le = Codec::with_order(ByteOrder::Little).encode(&sample());
        let be = Codec::with_order(ByteOrder::Big).encode(&sample());
        assert_eq!(&le[4..8], &[0x0d, 0x0c, 0x0b, 0x0a]);
        assert_eq!(&be[4..8], &[0x0a, 0x0b, 0x0c, 0x0d]);
    }

    #[test]
    fn roundtrip_both_orders() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let codec = Codec::with_order(order);
            let bytes = codec.encode(&sample());
            assert_eq!(bytes.len(), Sample::SIZE);
            assert_eq!(codec.decode::<Sample>(&bytes).unwrap(), sample());
        }
    }

    #[test]
    fn short_input_is_truncated() {
        let codec = Codec::native();
        let bytes = codec.encode(&sample());
        match codec.decode::<Sample>(&bytes[..15]) {
            Err(Error::TruncatedRecord {
                record,
                expected,
                actual,
            }) => {
                assert_eq!(record, "sample");
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn decode_next_advances() {
        let codec = Codec::native();
        let mut bytes = codec.encode(&sample());
        bytes.extend_from_slice(&[0xaa, 0xbb]);

        let mut input = bytes.as_slice();
        let decoded: Sample = codec.decode_next(&mut input).unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(input, &[0xaa, 0xbb]);
    }

    #[test]
    fn u32_array() {
        let codec = Codec::native();
        let mut buf = Vec::new();
        codec.writer(&mut buf).u32_slice(&[1, 2, 3]);
        let mut input = buf.as_slice();
        let arr: [u32; 3] = parse_u32_array(&mut input, codec.order()).unwrap();
        assert_eq!(arr, [1, 2, 3]);
        assert!(input.is_empty());
    }
}
