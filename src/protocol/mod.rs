/// Types representing the bodies of fixed-size FastCGI records.
pub mod body;
mod fields;
/// An encoder and decoder for FastCGI name-value pairs.
pub mod nv;
/// An encoder and decoder for FastCGI's variable-length integers.
pub mod varint;

pub use fields::*;


/// The fixed FastCGI request ID for management records.
pub const FCGI_NULL_REQUEST_ID: u16 = 0;

/// The largest payload a single FastCGI record may carry.
///
/// The record header's content-length field is 16 bits wide, but we keep
/// header room under that limit so header plus content never exceed it.
/// Larger payloads are split across multiple records of the same type.
pub const MAX_CONTENT_LEN: usize = u16::MAX as usize - RecordHeader::LEN;


/// Error types that may occur while processing FastCGI protocol elements.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The FastCGI version field specifies an unknown version identifier.
    #[error("unknown FastCGI protocol version {0}")]
    UnknownVersion(u8),
    /// The FastCGI record type field specifies an unknown record type.
    #[error("unknown FastCGI record type {0}")]
    UnknownRecordType(u8),
    /// The FastCGI request role field specifies an unknown role identifier.
    #[error("unknown FastCGI role {0}")]
    UnknownRole(u16),
    /// The FastCGI request flags contain at least one unknown flag bit.
    #[error("unknown FastCGI request flags {0:#010b}")]
    UnknownFlags(u8),
    /// The FastCGI response protocol status specifies an unknown status.
    #[error("unknown FastCGI protocol status {0}")]
    UnknownStatus(u8),

    /// An EndRequest record carried a body shorter than its fixed size.
    #[error("EndRequest record has invalid length {0}, expected {expected}", expected = body::EndRequest::LEN)]
    InvalidEndRequestLen(u16),

    /// The input value is too large to be encoded as a FastCGI VarInt.
    #[error("input is too large to be encoded as a FastCGI VarInt")]
    InvalidVarInt,
}


/// A FastCGI record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordHeader {
    /// The FastCGI version of this record.
    pub version: Version,
    /// The type of this record, defining its payload.
    pub rtype: RecordType,
    /// The ID of the request this record belongs to.
    pub request_id: u16,
    /// The length of this record's payload.
    pub content_length: u16,
    /// The amount of padding following this record.
    pub padding_length: u8,
}

impl RecordHeader {
    /// Creates a new [`RecordHeader`] with [`Version::V1`] and all
    /// lengths set to 0.
    ///
    /// This function is intended to be used together with
    /// `RecordHeader::set_lengths` if the record should have a body.
    #[inline]
    #[must_use]
    pub fn new(rtype: RecordType, request_id: u16) -> Self {
        Self { version: Version::V1, rtype, request_id, content_length: 0, padding_length: 0 }
    }

    /// Sets `content_length` and automatically calculates an
    /// appropriate `padding_length`.
    ///
    /// Up to 7 bytes of padding are used such that
    /// `content_length + padding_length` is a multiple of 8. This is the amount
    /// recommended by the FastCGI specification.
    #[inline]
    pub fn set_lengths(&mut self, content_length: u16) {
        self.content_length = content_length;
        let mut padding = content_length % 8;
        if padding > 0 {
            padding = 8 - padding;
        }
        self.padding_length = padding as u8;
    }

    /// Returns a slice of `self.padding_length` zero bytes to be used as padding.
    #[inline]
    #[must_use]
    pub fn padding_bytes(self) -> &'static [u8] {
        static PADDING: [u8; u8::MAX as usize] = [0; u8::MAX as usize];
        &PADDING[..self.padding_length.into()]
    }

    /// The number of bytes in the wire format of a [`RecordHeader`].
    pub const LEN: usize = 8;

    /// Parses the input bytes into a FastCGI [`RecordHeader`].
    ///
    /// # Errors
    /// Returns an error if any of the header components are invalid.
    pub fn from_bytes(data: [u8; Self::LEN]) -> Result<Self, Error> {
        Ok(Self {
            version: Version::try_from(data[0])?,
            rtype: RecordType::try_from(data[1])?,
            request_id: u16::from_be_bytes([data[2], data[3]]),
            content_length: u16::from_be_bytes([data[4], data[5]]),
            padding_length: data[6],
        })
    }

    /// Encodes the [`RecordHeader`] into its binary wire format.
    #[inline]
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut buf = [0; Self::LEN];
        buf[0] = self.version.into();
        buf[1] = self.rtype.into();
        buf[2..4].copy_from_slice(&self.request_id.to_be_bytes());
        buf[4..6].copy_from_slice(&self.content_length.to_be_bytes());
        buf[6] = self.padding_length;
        buf
    }
}


/// A complete FastCGI record as read off the wire, padding already discarded.
#[derive(Debug, Clone)]
pub struct Record {
    /// The parsed header of this record.
    pub header: RecordHeader,
    /// The record's payload, `header.content_length` bytes long.
    pub content: Vec<u8>,
}

impl Record {
    /// The type of this record.
    #[inline]
    #[must_use]
    pub fn rtype(&self) -> RecordType {
        self.header.rtype
    }

    /// The ID of the request this record belongs to.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> u16 {
        self.header.request_id
    }
}


/// Encodes `content` as a sequence of `rtype` records into `out`.
///
/// Payloads longer than [`MAX_CONTENT_LEN`] are split into multiple records
/// sharing `request_id`, each with its own header and padding. Empty
/// `content` emits exactly one zero-length record, which FastCGI uses as the
/// end-of-stream marker for Params and Stdin.
pub fn encode_stream(rtype: RecordType, request_id: u16, content: &[u8], out: &mut Vec<u8>) {
    let mut chunks = content.chunks(MAX_CONTENT_LEN);
    loop {
        let chunk = chunks.next().unwrap_or_default();
        let mut head = RecordHeader::new(rtype, request_id);
        // chunk.len() <= MAX_CONTENT_LEN < u16::MAX
        #[allow(clippy::cast_possible_truncation)]
        head.set_lengths(chunk.len() as u16);
        out.extend_from_slice(&head.to_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(head.padding_bytes());
        if chunks.len() == 0 {
            return;
        }
    }
}
