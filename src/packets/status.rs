use std::io::Cursor;

use binrw::prelude::*;

/// NT status codes surfaced by this client, plus the `SEC_E_INVALID_TOKEN`
/// security status used by the authentication paths.
///
/// Message headers keep the raw `u32`; conversion happens at the API edge
/// via [`Status::try_from`].
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u32))]
pub enum Status {
    Success = 0x00000000,
    Pending = 0x00000103,
    InvalidSmb = 0x00010002,
    SmbBadTid = 0x00050002,
    SmbBadUid = 0x005B0002,
    BufferOverflow = 0x80000005,
    NoMoreFiles = 0x80000006,
    SecEInvalidToken = 0x80090308,
    NotImplemented = 0xC0000002,
    InvalidParameter = 0xC000000D,
    InvalidDeviceRequest = 0xC0000010,
    EndOfFile = 0xC0000011,
    MoreProcessingRequired = 0xC0000016,
    AccessDenied = 0xC0000022,
    BufferTooSmall = 0xC0000023,
    ObjectNameInvalid = 0xC0000033,
    ObjectNameNotFound = 0xC0000034,
    ObjectNameCollision = 0xC0000035,
    ObjectPathNotFound = 0xC000003A,
    SharingViolation = 0xC0000043,
    DeletePending = 0xC0000056,
    LogonFailure = 0xC000006D,
    InsufficientResources = 0xC000009A,
    IoTimeout = 0xC00000B5,
    FileIsADirectory = 0xC00000BA,
    NotSupported = 0xC00000BB,
    NetworkNameDeleted = 0xC00000C9,
    BadNetworkName = 0xC00000CC,
    DirectoryNotEmpty = 0xC0000101,
    Cancelled = 0xC0000120,
    FileClosed = 0xC0000128,
    UserSessionDeleted = 0xC0000203,
    NetworkSessionExpired = 0xC000035C,
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    /// Converts a raw status to a display string, falling back to hex for
    /// codes outside the [`Status`] enum.
    pub fn try_display(value: u32) -> String {
        match Self::try_from(value) {
            Ok(status) => format!("{}", status),
            Err(_) => format!("{:#010x}", value),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({:#010x})", self, *self as u32)
    }
}

impl TryFrom<u32> for Status {
    type Error = crate::Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Status::read_le(&mut Cursor::new(value.to_le_bytes()))
            .map_err(|_| crate::Error::UnexpectedMessageStatus(value))
    }
}
