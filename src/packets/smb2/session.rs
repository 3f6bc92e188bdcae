use binrw::prelude::*;
use modular_bitfield::prelude::*;

use crate::packets::binrw_util::PosMarker;

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct SessionSetupRequest {
    #[bw(calc = 25)]
    #[br(assert(_structure_size == 25))]
    _structure_size: u16,
    pub flags: u8,
    pub security_mode: u8,
    pub capabilities: u32,
    pub channel: u32,
    #[bw(calc = PosMarker::default())]
    security_buffer_offset: PosMarker<u16>,
    #[bw(try_calc(u16::try_from(buffer.len())))]
    security_buffer_length: u16,
    pub previous_session_id: u64,
    #[br(seek_before = std::io::SeekFrom::Start(security_buffer_offset.value as u64), count = security_buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&security_buffer_offset))]
    pub buffer: Vec<u8>,
}

impl SessionSetupRequest {
    pub fn new(buffer: Vec<u8>) -> Self {
        SessionSetupRequest {
            flags: 0,
            // Signing enabled, not required: signing is negotiated but not
            // enforced by this client.
            security_mode: 0x01,
            capabilities: 0,
            channel: 0,
            previous_session_id: 0,
            buffer,
        }
    }
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct SessionFlags {
    pub guest: bool,
    pub null_session: bool,
    pub encrypt_data: bool,
    #[skip]
    __: B13,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct SessionSetupResponse {
    #[bw(calc = 9)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    pub session_flags: SessionFlags,
    #[bw(calc = PosMarker::default())]
    security_buffer_offset: PosMarker<u16>,
    #[bw(try_calc(u16::try_from(buffer.len())))]
    security_buffer_length: u16,
    #[br(seek_before = std::io::SeekFrom::Start(security_buffer_offset.value as u64), count = security_buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&security_buffer_offset))]
    pub buffer: Vec<u8>,
}

impl SessionSetupResponse {
    pub fn new(buffer: Vec<u8>) -> Self {
        SessionSetupResponse {
            session_flags: SessionFlags::new(),
            buffer,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct LogoffRequest {
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
pub struct LogoffResponse {
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
pub struct EchoRequest {
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
pub struct EchoResponse {
    #[bw(calc = 4)]
    #[br(assert(_structure_size == 4))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}
