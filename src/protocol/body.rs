use super::Error as ProtocolError;
use super::{ProtocolStatus, RequestFlags, Role};


/// The body of a [`RecordType::BeginRequest`](super::RecordType::BeginRequest)
/// FastCGI record, sent by this client to start a request.
#[derive(Debug, Clone, Copy)]
pub struct BeginRequest {
    /// The role of the FastCGI application in this request.
    pub role: Role,
    /// The control flags for this request.
    pub flags: RequestFlags,
}

impl BeginRequest {
    /// The number of bytes in the wire format of a [`BeginRequest`] body.
    pub const LEN: usize = 8;

    /// Parses the input bytes into a FastCGI [`BeginRequest`] record body.
    ///
    /// # Errors
    /// Returns an error if any of the body components are invalid.
    pub fn from_bytes(data: [u8; Self::LEN]) -> Result<Self, ProtocolError> {
        let role = u16::from_be_bytes([data[0], data[1]]);
        Ok(Self {
            role: Role::try_from(role)?,
            flags: RequestFlags::try_from(data[2])?,
        })
    }

    /// Encodes the [`BeginRequest`] record body into its binary wire format.
    ///
    /// The 5 reserved trailing bytes are set to zero.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut buf = [0; Self::LEN];
        buf[..2].copy_from_slice(&u16::to_be_bytes(self.role.into()));
        buf[2] = self.flags.into();
        buf
    }
}


/// The body of a [`RecordType::EndRequest`](super::RecordType::EndRequest)
/// FastCGI record, received by this client when a request finishes.
#[derive(Debug, Clone, Copy)]
pub struct EndRequest {
    /// The application's response status code, as would be set via exit(3)
    /// in regular CGI.
    pub app_status: u32,
    /// The protocol status code for this response.
    pub protocol_status: ProtocolStatus,
}

impl EndRequest {
    /// The number of bytes in the wire format of an [`EndRequest`] body.
    pub const LEN: usize = 8;

    /// Parses the input bytes into a FastCGI [`EndRequest`] record body.
    ///
    /// # Errors
    /// Returns an error if any of the body components are invalid.
    pub fn from_bytes(data: [u8; Self::LEN]) -> Result<Self, ProtocolError> {
        Ok(Self {
            app_status: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
            protocol_status: ProtocolStatus::try_from(data[4])?,
        })
    }

    /// Parses a record payload into a FastCGI [`EndRequest`] record body.
    ///
    /// Unlike `EndRequest::from_bytes`, this verifies the payload's length
    /// at runtime. Trailing reserved bytes are ignored.
    ///
    /// # Errors
    /// Returns an error if the payload is too short or any of the body
    /// components are invalid.
    pub fn from_record(content: &[u8]) -> Result<Self, ProtocolError> {
        match content.get(..Self::LEN).and_then(|b| <[u8; Self::LEN]>::try_from(b).ok()) {
            Some(data) => Self::from_bytes(data),
            #[allow(clippy::cast_possible_truncation)]
            None => Err(ProtocolError::InvalidEndRequestLen(content.len() as u16)),
        }
    }

    /// Encodes the [`EndRequest`] record body into its binary wire format.
    ///
    /// The 3 reserved trailing bytes are set to zero.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut buf = [0; Self::LEN];
        buf[..4].copy_from_slice(&u32::to_be_bytes(self.app_status));
        buf[4] = self.protocol_status.into();
        buf
    }
}
