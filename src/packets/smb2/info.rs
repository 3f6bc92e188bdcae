use binrw::prelude::*;

use crate::packets::binrw_util::PosMarker;

use super::header::FileId;

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u8))]
pub enum InfoType {
    File = 0x01,
    FileSystem = 0x02,
    Security = 0x03,
    Quota = 0x04,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct QueryInfoRequest {
    #[bw(calc = 41)]
    #[br(assert(_structure_size == 41))]
    _structure_size: u16,
    pub info_type: InfoType,
    pub file_info_class: u8,
    pub output_buffer_length: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _input_buffer_offset: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _input_buffer_length: u32,
    /// SECURITY_INFORMATION bits for security queries, zero otherwise.
    pub additional_information: u32,
    pub flags: u32,
    pub file_id: FileId,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct QueryInfoResponse {
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

impl QueryInfoResponse {
    pub fn new(buffer: Vec<u8>) -> Self {
        QueryInfoResponse { buffer }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct SetInfoRequest {
    #[bw(calc = 33)]
    #[br(assert(_structure_size == 33))]
    _structure_size: u16,
    pub info_type: InfoType,
    pub file_info_class: u8,
    #[bw(try_calc(u32::try_from(buffer.len())))]
    buffer_length: u32,
    #[bw(calc = PosMarker::default())]
    buffer_offset: PosMarker<u16>,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    pub additional_information: u32,
    pub file_id: FileId,
    #[br(seek_before = std::io::SeekFrom::Start(buffer_offset.value as u64), count = buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&buffer_offset))]
    pub buffer: Vec<u8>,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct SetInfoResponse {
    #[bw(calc = 2)]
    #[br(assert(_structure_size == 2))]
    _structure_size: u16,
}
