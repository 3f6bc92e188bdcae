use binrw::prelude::*;
use modular_bitfield::prelude::*;

use crate::packets::binrw_util::{from_utf16_le, write_utf16_aoff, PosMarker};

use super::header::FileId;

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct QueryDirectoryFlags {
    pub restart_scans: bool,
    pub return_single_entry: bool,
    pub index_specified: bool,
    #[skip]
    __: bool,
    pub reopen: bool,
    #[skip]
    __: B3,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct QueryDirectoryRequest {
    #[bw(calc = 33)]
    #[br(assert(_structure_size == 33))]
    _structure_size: u16,
    pub file_information_class: u8,
    pub flags: QueryDirectoryFlags,
    pub file_index: u32,
    pub file_id: FileId,
    #[bw(calc = PosMarker::default())]
    file_name_offset: PosMarker<u16>,
    #[bw(try_calc(u16::try_from(file_name.encode_utf16().count() * 2)))]
    file_name_length: u16,
    pub output_buffer_length: u32,
    #[br(seek_before = std::io::SeekFrom::Start(file_name_offset.value as u64), count = file_name_length, map = |raw: Vec<u8>| from_utf16_le(&raw))]
    #[bw(write_with = write_utf16_aoff, args(&file_name_offset))]
    pub file_name: String,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct QueryDirectoryResponse {
    #[bw(calc = 9)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    #[bw(calc = PosMarker::default())]
    output_buffer_offset: PosMarker<u16>,
    #[bw(try_calc(u32::try_from(buffer.len())))]
    output_buffer_length: u32,
    #[br(seek_before = std::io::SeekFrom::Start(output_buffer_offset.value as u64), count = output_buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&output_buffer_offset))]
    pub buffer: Vec<u8>,
}

impl QueryDirectoryResponse {
    pub fn new(buffer: Vec<u8>) -> Self {
        QueryDirectoryResponse { buffer }
    }
}
