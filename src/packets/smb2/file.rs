use binrw::prelude::*;

use crate::packets::binrw_util::PosMarker;

use super::header::FileId;

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct ReadRequest {
    #[bw(calc = 49)]
    #[br(assert(_structure_size == 49))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _padding: u8,
    pub flags: u8,
    pub length: u32,
    pub offset: u64,
    pub file_id: FileId,
    pub minimum_count: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _channel: u32,
    pub remaining_bytes: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _read_channel_info_offset: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _read_channel_info_length: u16,
    // The structure carries one mandatory buffer byte.
    #[bw(calc = 0)]
    #[br(temp)]
    _buffer: u8,
}

impl ReadRequest {
    pub fn new(file_id: FileId, offset: u64, length: u32) -> Self {
        ReadRequest {
            flags: 0,
            length,
            offset,
            file_id,
            minimum_count: 0,
            remaining_bytes: 0,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct ReadResponse {
    #[bw(calc = 17)]
    #[br(assert(_structure_size == 17))]
    _structure_size: u16,
    #[bw(calc = PosMarker::default())]
    data_offset: PosMarker<u8>,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[bw(try_calc(u32::try_from(buffer.len())))]
    data_length: u32,
    pub data_remaining: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    #[br(seek_before = std::io::SeekFrom::Start(data_offset.value as u64), count = data_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&data_offset))]
    pub buffer: Vec<u8>,
}

impl ReadResponse {
    pub fn new(buffer: Vec<u8>) -> Self {
        ReadResponse {
            data_remaining: 0,
            buffer,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct WriteRequest {
    #[bw(calc = 49)]
    #[br(assert(_structure_size == 49))]
    _structure_size: u16,
    #[bw(calc = PosMarker::default())]
    data_offset: PosMarker<u16>,
    #[bw(try_calc(u32::try_from(buffer.len())))]
    length: u32,
    pub offset: u64,
    pub file_id: FileId,
    #[bw(calc = 0)]
    #[br(temp)]
    _channel: u32,
    pub remaining_bytes: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _write_channel_info_offset: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _write_channel_info_length: u16,
    pub flags: u32,
    #[br(seek_before = std::io::SeekFrom::Start(data_offset.value as u64), count = length)]
    #[bw(write_with = PosMarker::write_aoff, args(&data_offset))]
    pub buffer: Vec<u8>,
}

impl WriteRequest {
    pub fn new(file_id: FileId, offset: u64, buffer: Vec<u8>) -> Self {
        WriteRequest {
            offset,
            file_id,
            remaining_bytes: 0,
            flags: 0,
            buffer,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct WriteResponse {
    #[bw(calc = 17)]
    #[br(assert(_structure_size == 17))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    pub count: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _remaining: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _write_channel_info_offset: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _write_channel_info_length: u16,
}
