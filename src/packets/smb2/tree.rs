use binrw::prelude::*;

use crate::packets::binrw_util::{from_utf16_le, write_utf16_aoff, PosMarker};

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct TreeConnectRequest {
    #[bw(calc = 9)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    #[bw(calc = PosMarker::default())]
    path_offset: PosMarker<u16>,
    #[bw(try_calc(u16::try_from(path.encode_utf16().count() * 2)))]
    path_length: u16,
    #[br(seek_before = std::io::SeekFrom::Start(path_offset.value as u64), count = path_length, map = |raw: Vec<u8>| from_utf16_le(&raw))]
    #[bw(write_with = write_utf16_aoff, args(&path_offset))]
    pub path: String,
}

impl TreeConnectRequest {
    pub fn new(path: &str) -> Self {
        TreeConnectRequest {
            path: path.to_string(),
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u8))]
pub enum ShareType {
    Disk = 0x01,
    Pipe = 0x02,
    Print = 0x03,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct TreeConnectResponse {
    #[bw(calc = 16)]
    #[br(assert(_structure_size == 16))]
    _structure_size: u16,
    pub share_type: ShareType,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    pub share_flags: u32,
    pub capabilities: u32,
    pub maximal_access: u32,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct TreeDisconnectRequest {
    #[bw(calc = 4)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct TreeDisconnectResponse {
    #[bw(calc = 4)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}
