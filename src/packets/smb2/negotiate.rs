use binrw::prelude::*;
use modular_bitfield::prelude::*;

use crate::packets::binrw_util::{FileTime, PosMarker};
use crate::packets::guid::Guid;

#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
#[brw(repr(u16))]
pub enum Dialect {
    Smb0202 = 0x0202,
    Smb021 = 0x0210,
}

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::Smb0202, Dialect::Smb021];
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Smb0202 => write!(f, "2.0.2"),
            Dialect::Smb021 => write!(f, "2.1"),
        }
    }
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct NegotiateSecurityMode {
    pub signing_enabled: bool,
    pub signing_required: bool,
    #[skip]
    __: B14,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct GlobalCapabilities {
    pub dfs: bool,
    pub leasing: bool,
    pub large_mtu: bool,
    pub multi_channel: bool,
    pub persistent_handles: bool,
    pub directory_leasing: bool,
    pub encryption: bool,
    #[skip]
    __: B25,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct NegotiateRequest {
    #[bw(calc = 36)]
    #[br(assert(_structure_size == 36))]
    _structure_size: u16,
    #[bw(try_calc(u16::try_from(dialects.len())))]
    dialect_count: u16,
    pub security_mode: NegotiateSecurityMode,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    pub capabilities: GlobalCapabilities,
    pub client_guid: Guid,
    /// For 2.x dialects this is the client start time. Always UTC.
    pub client_start_time: FileTime,
    #[br(count = dialect_count)]
    pub dialects: Vec<Dialect>,
}

impl NegotiateRequest {
    pub fn new(client_guid: Guid) -> Self {
        NegotiateRequest {
            security_mode: NegotiateSecurityMode::new().with_signing_enabled(true),
            capabilities: GlobalCapabilities::new(),
            client_guid,
            client_start_time: FileTime::now(),
            dialects: Dialect::ALL.to_vec(),
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct NegotiateResponse {
    #[bw(calc = 65)]
    #[br(assert(_structure_size == 65))]
    _structure_size: u16,
    pub security_mode: NegotiateSecurityMode,
    pub dialect_revision: Dialect,
    #[bw(calc = 0)]
    #[br(temp)]
    _negotiate_context_count: u16,
    pub server_guid: Guid,
    pub capabilities: GlobalCapabilities,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    pub system_time: FileTime,
    pub server_start_time: FileTime,
    #[bw(calc = PosMarker::default())]
    security_buffer_offset: PosMarker<u16>,
    #[bw(try_calc(u16::try_from(buffer.len())))]
    security_buffer_length: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _negotiate_context_offset: u32,
    #[br(seek_before = std::io::SeekFrom::Start(security_buffer_offset.value as u64), count = security_buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&security_buffer_offset))]
    pub buffer: Vec<u8>,
}
