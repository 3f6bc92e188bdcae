use binrw::prelude::*;
use modular_bitfield::prelude::*;

use crate::packets::binrw_util::PosMarker;

use super::header::FileId;

/// FSCTL codes used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FsctlCode {
    PipeTransceive = 0x0011C017,
    PipeWait = 0x00110018,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct IoctlRequestFlags {
    pub is_fsctl: bool,
    #[skip]
    __: B31,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct IoctlRequest {
    #[bw(calc = 57)]
    #[br(assert(_structure_size == 57))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    pub ctl_code: u32,
    pub file_id: FileId,
    #[bw(calc = PosMarker::default())]
    input_offset: PosMarker<u32>,
    #[bw(try_calc(u32::try_from(buffer.len())))]
    input_count: u32,
    pub max_input_response: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _output_offset: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _output_count: u32,
    pub max_output_response: u32,
    pub flags: IoctlRequestFlags,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    #[br(seek_before = std::io::SeekFrom::Start(input_offset.value as u64), count = input_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&input_offset))]
    pub buffer: Vec<u8>,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct IoctlResponse {
    #[bw(calc = 49)]
    #[br(assert(_structure_size == 49))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    pub ctl_code: u32,
    pub file_id: FileId,
    #[bw(calc = 0)]
    #[br(temp)]
    _input_offset: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _input_count: u32,
    #[bw(calc = PosMarker::default())]
    output_offset: PosMarker<u32>,
    #[bw(try_calc(u32::try_from(buffer.len())))]
    output_count: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _flags: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    #[br(seek_before = std::io::SeekFrom::Start(output_offset.value as u64), count = output_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&output_offset))]
    pub buffer: Vec<u8>,
}

impl IoctlResponse {
    pub fn new(ctl_code: u32, file_id: FileId, buffer: Vec<u8>) -> Self {
        IoctlResponse {
            ctl_code,
            file_id,
            buffer,
        }
    }
}
