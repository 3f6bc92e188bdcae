//! NetBIOS session service packets (RFC 1001 §4.3).
//!
//! Both transports use the same 4-byte framing: one type byte followed by a
//! 3-byte big-endian length. Direct TCP (port 445) only ever carries
//! Session Message packets; NetBIOS over TCP (port 139) additionally uses
//! the session establishment and keep-alive packet types.

use std::str::FromStr;

use binrw::{
    meta::{ReadEndian, WriteEndian},
    prelude::*,
};

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(big)]
pub struct NbssPacketHeader {
    pub ptype: NbssPacketType,
    #[br(parse_with = binrw::helpers::read_u24)]
    #[bw(write_with = binrw::helpers::write_u24)]
    pub length: u32,
}

impl NbssPacketHeader {
    pub const SIZE: usize = 4;
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u8))]
pub enum NbssPacketType {
    SessionMessage = 0x00,
    SessionRequest = 0x81,
    PositiveSessionResponse = 0x82,
    NegativeSessionResponse = 0x83,
    SessionRetargetResponse = 0x84,
    SessionKeepAlive = 0x85,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(big)]
pub struct NbSessionRequest {
    pub called_name: NetBiosName,
    pub calling_name: NetBiosName,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(big, repr(u8))]
pub enum NbNegativeResponseCode {
    NotListeningOnCalledName = 0x80,
    NotListeningForCallingName = 0x81,
    CalledNameNotPresent = 0x82,
    InsufficientResources = 0x83,
    UnspecifiedError = 0x8F,
}

/// A NetBIOS name in its first-level encoding: 15 space-padded characters
/// plus a one-byte service suffix, each byte split into two nibbles biased
/// by `'A'`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NetBiosName {
    name: String,
    suffix: u8,
}

impl NetBiosName {
    const NIBBLE_BIAS: u8 = b'A';
    const NAME_CHARS: usize = 15;

    /// The file server service suffix (`<20>`).
    pub const FILE_SERVER_SUFFIX: u8 = 0x20;
    /// The workstation service suffix (`<00>`).
    pub const WORKSTATION_SUFFIX: u8 = 0x00;
    /// The generic called name accepted by any server over TCP.
    pub const SMB_SERVER_NAME: &'static str = "*SMBSERVER";

    pub fn new(mut name: String, suffix: u8) -> Self {
        name.truncate(Self::NAME_CHARS);
        name = name.to_ascii_uppercase();
        name.push_str(&" ".repeat(Self::NAME_CHARS - name.len()));
        NetBiosName { name, suffix }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffix(&self) -> u8 {
        self.suffix
    }
}

impl std::fmt::Display for NetBiosName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}<{:02X}>",
            self.name.trim_end_matches(' '),
            self.suffix
        )
    }
}

impl BinRead for NetBiosName {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let number_of_bytes = u8::read_options(reader, endian, ())?;
        let number_of_chars = number_of_bytes as usize / 2;
        if number_of_chars != Self::NAME_CHARS + 1 {
            return Err(binrw::Error::AssertFail {
                pos: reader.stream_position().unwrap_or(0),
                message: format!("NetBIOS name length is not {} bytes", Self::NAME_CHARS + 1),
            });
        }

        let mut name = String::with_capacity(number_of_chars);
        let mut suffix = 0u8;
        for indx in 0..number_of_chars {
            let upper = u8::read_options(reader, endian, ())?;
            let lower = u8::read_options(reader, endian, ())?;
            let byte =
                ((upper.wrapping_sub(Self::NIBBLE_BIAS)) << 4) | lower.wrapping_sub(Self::NIBBLE_BIAS);
            if indx == number_of_chars - 1 {
                suffix = byte;
            } else {
                name.push(byte as char);
            }
        }
        let null_byte = u8::read_options(reader, endian, ())?;
        if null_byte != 0x00 {
            return Err(binrw::Error::AssertFail {
                pos: reader.stream_position().unwrap_or(0),
                message: "expected terminating null byte after NetBIOS name".to_string(),
            });
        }
        Ok(NetBiosName { name, suffix })
    }
}

impl ReadEndian for NetBiosName {
    const ENDIAN: binrw::meta::EndianKind = binrw::meta::EndianKind::None;
}

impl BinWrite for NetBiosName {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let number_of_bytes = (self.name.len() + 1) * 2;
        u8::write_options(&(number_of_bytes as u8), writer, endian, ())?;

        for c in self.name.chars().chain(std::iter::once(self.suffix as char)) {
            if c as u32 > 0x7F {
                return Err(binrw::Error::AssertFail {
                    pos: writer.stream_position().unwrap_or(0),
                    message: "NetBIOS name contains non-ASCII characters".to_string(),
                });
            }
            let first = ((c as u8) >> 4) + Self::NIBBLE_BIAS;
            let second = ((c as u8) & 0x0F) + Self::NIBBLE_BIAS;
            u8::write_options(&first, writer, endian, ())?;
            u8::write_options(&second, writer, endian, ())?;
        }
        u8::write_options(&0x00u8, writer, endian, ())?;
        Ok(())
    }
}

impl WriteEndian for NetBiosName {
    const ENDIAN: binrw::meta::EndianKind = binrw::meta::EndianKind::None;
}

impl FromStr for NetBiosName {
    type Err = crate::Error;

    /// Parses the `NAME<SS>` display format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || crate::Error::InvalidArgument(format!("malformed NetBIOS name: {s}"));
        let (name, rest) = s.split_once('<').ok_or_else(bad)?;
        if name.is_empty() || name.len() > Self::NAME_CHARS {
            return Err(bad());
        }
        let suffix_str = rest.strip_suffix('>').ok_or_else(bad)?;
        let suffix = u8::from_str_radix(suffix_str, 16).map_err(|_| bad())?;
        Ok(NetBiosName::new(name.to_string(), suffix))
    }
}
