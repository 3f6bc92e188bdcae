use binrw::prelude::*;

use crate::packets::binrw_util::{to_utf16_le, FileTime, PosMarker};
use crate::packets::fscc::{
    CreateDisposition, CreateOptions, FileAccessMask, FileAttributes, ShareAccess,
};

use super::header::AndXBlock;

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct NtCreateRequest {
    #[bw(calc = 24)]
    #[br(assert(_word_count == 24))]
    _word_count: u8,
    pub andx: AndXBlock,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[bw(try_calc(u16::try_from(to_utf16_le(&name).len())))]
    name_length: u16,
    pub flags: u32,
    pub root_directory_fid: u32,
    pub desired_access: FileAccessMask,
    pub allocation_size: u64,
    pub ext_file_attributes: FileAttributes,
    pub share_access: ShareAccess,
    pub create_disposition: CreateDisposition,
    pub create_options: CreateOptions,
    pub impersonation_level: u32,
    pub security_flags: u8,
    #[bw(try_calc(u16::try_from(1 + to_utf16_le(&name).len())))]
    #[br(temp)]
    _byte_count: u16,
    // The name starts at header(32) + words(1 + 48) + byte count(2) = 83,
    // an odd offset, so the unicode name always takes one pad byte.
    #[bw(calc = 0)]
    #[br(temp)]
    _pad: u8,
    #[br(count = name_length, map = |raw: Vec<u8>| crate::packets::binrw_util::from_utf16_le(&raw))]
    #[bw(map = |s: &String| to_utf16_le(s))]
    pub name: String,
}

impl NtCreateRequest {
    pub fn new(
        name: &str,
        desired_access: FileAccessMask,
        file_attributes: FileAttributes,
        share_access: ShareAccess,
        create_disposition: CreateDisposition,
        create_options: CreateOptions,
    ) -> Self {
        NtCreateRequest {
            andx: AndXBlock::default(),
            flags: 0,
            root_directory_fid: 0,
            desired_access,
            allocation_size: 0,
            ext_file_attributes: file_attributes,
            share_access,
            create_disposition,
            create_options,
            // SEC_IMPERSONATE
            impersonation_level: 2,
            security_flags: 0,
            name: name.to_string(),
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct NtCreateResponse {
    #[br(assert(_word_count >= 34))]
    #[bw(calc = 34)]
    _word_count: u8,
    pub andx: AndXBlock,
    pub oplock_level: u8,
    pub fid: u16,
    pub create_disposition: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub ext_file_attributes: FileAttributes,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub resource_type: u16,
    pub nm_pipe_status: u16,
    #[br(map = |x: u8| x != 0)]
    #[bw(map = |&x| x as u8)]
    pub directory: bool,
    // Extended responses carry additional words (GUID, access masks).
    #[br(count = (_word_count as usize * 2).saturating_sub(68))]
    #[bw(calc = vec![])]
    _extra_words: Vec<u8>,
    #[bw(calc = 0)]
    #[br(temp)]
    _byte_count: u16,
}

impl NtCreateResponse {
    pub fn opened(fid: u16, create_disposition: u32, directory: bool) -> Self {
        NtCreateResponse {
            andx: AndXBlock::default(),
            oplock_level: 0,
            fid,
            create_disposition,
            creation_time: FileTime::default(),
            last_access_time: FileTime::default(),
            last_write_time: FileTime::default(),
            change_time: FileTime::default(),
            ext_file_attributes: FileAttributes::new(),
            allocation_size: 0,
            end_of_file: 0,
            resource_type: 0,
            nm_pipe_status: 0,
            directory,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct CloseRequest {
    #[bw(calc = 3)]
    #[br(assert(_word_count == 3))]
    _word_count: u8,
    pub fid: u16,
    /// UTIME of the last write, `0xFFFFFFFF` to leave unchanged.
    pub last_time_modified: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _byte_count: u16,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct CloseResponse {
    #[bw(calc = 0)]
    #[br(assert(_word_count == 0))]
    _word_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _byte_count: u16,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct ReadRequest {
    #[bw(calc = 12)]
    #[br(assert(_word_count == 12))]
    _word_count: u8,
    pub andx: AndXBlock,
    pub fid: u16,
    pub offset: u32,
    pub max_count: u16,
    pub min_count: u16,
    pub timeout: u32,
    pub remaining: u16,
    pub offset_high: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _byte_count: u16,
}

impl ReadRequest {
    pub fn new(fid: u16, offset: u64, max_count: u16) -> Self {
        ReadRequest {
            andx: AndXBlock::default(),
            fid,
            offset: offset as u32,
            max_count,
            min_count: 0,
            timeout: 0,
            remaining: 0,
            offset_high: (offset >> 32) as u32,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct ReadResponse {
    #[bw(calc = 12)]
    #[br(assert(_word_count == 12))]
    _word_count: u8,
    pub andx: AndXBlock,
    pub available: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _data_compaction_mode: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    #[bw(try_calc(u16::try_from(data.len())))]
    data_length: u16,
    #[bw(calc = PosMarker::default())]
    data_offset: PosMarker<u16>,
    #[bw(calc = [0u8; 10])]
    #[br(temp)]
    _reserved2: [u8; 10],
    #[bw(try_calc(u16::try_from(data.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(seek_before = std::io::SeekFrom::Start(data_offset.value as u64), count = data_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&data_offset))]
    pub data: Vec<u8>,
}

impl ReadResponse {
    pub fn new(data: Vec<u8>) -> Self {
        ReadResponse {
            andx: AndXBlock::default(),
            available: 0,
            data,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct WriteRequest {
    #[bw(calc = 14)]
    #[br(assert(_word_count == 14))]
    _word_count: u8,
    pub andx: AndXBlock,
    pub fid: u16,
    pub offset: u32,
    pub timeout: u32,
    pub write_mode: u16,
    pub remaining: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _data_length_high: u16,
    #[bw(try_calc(u16::try_from(data.len())))]
    data_length: u16,
    #[bw(calc = PosMarker::default())]
    data_offset: PosMarker<u16>,
    pub offset_high: u32,
    #[bw(try_calc(u16::try_from(data.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(seek_before = std::io::SeekFrom::Start(data_offset.value as u64), count = data_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&data_offset))]
    pub data: Vec<u8>,
}

impl WriteRequest {
    pub fn new(fid: u16, offset: u64, data: Vec<u8>) -> Self {
        WriteRequest {
            andx: AndXBlock::default(),
            fid,
            offset: offset as u32,
            timeout: 0,
            write_mode: 0,
            remaining: 0,
            offset_high: (offset >> 32) as u32,
            data,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct WriteResponse {
    #[bw(calc = 6)]
    #[br(assert(_word_count == 6))]
    _word_count: u8,
    pub andx: AndXBlock,
    pub count: u16,
    pub available: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _byte_count: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_create_request_word_region_size() {
        let req = NtCreateRequest::new(
            "x.txt",
            FileAccessMask::new().with_generic_read(true),
            FileAttributes::new().with_normal(true),
            ShareAccess::new().with_read(true),
            CreateDisposition::Open,
            CreateOptions::new(),
        );
        let mut cursor = Cursor::new(Vec::new());
        req.write(&mut cursor).unwrap();
        let buf = cursor.into_inner();
        // word count + 24 words + byte count + pad + name
        assert_eq!(buf.len(), 1 + 48 + 2 + 1 + 10);
        let parsed = NtCreateRequest::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(parsed.name, "x.txt");
    }
}
