use binrw::prelude::*;

use crate::packets::binrw_util::{from_utf16_le, write_utf16_aoff, FileTime, PosMarker};
use crate::packets::fscc::{
    CreateDisposition, CreateOptions, FileAccessMask, FileAttributes, ShareAccess,
};

use super::header::FileId;

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u32))]
pub enum ImpersonationLevel {
    Anonymous = 0,
    Identification = 1,
    Impersonation = 2,
    Delegate = 3,
}

/// The MS-SMB2 CREATE request. Create contexts are not used by this client.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct CreateRequest {
    #[bw(calc = 57)]
    #[br(assert(_structure_size == 57))]
    _structure_size: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _security_flags: u8,
    pub requested_oplock_level: u8,
    pub impersonation_level: ImpersonationLevel,
    #[bw(calc = 0)]
    #[br(temp)]
    _smb_create_flags: u64,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u64,
    pub desired_access: FileAccessMask,
    pub file_attributes: FileAttributes,
    pub share_access: ShareAccess,
    pub create_disposition: CreateDisposition,
    pub create_options: CreateOptions,
    #[bw(calc = PosMarker::default())]
    name_offset: PosMarker<u16>,
    #[bw(try_calc(u16::try_from(name.encode_utf16().count() * 2)))]
    name_length: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _create_contexts_offset: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _create_contexts_length: u32,
    #[br(seek_before = std::io::SeekFrom::Start(name_offset.value as u64), count = name_length, map = |raw: Vec<u8>| from_utf16_le(&raw))]
    #[bw(write_with = write_utf16_aoff, args(&name_offset))]
    pub name: String,
}

/// Disposition the server actually took for a create.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u32))]
pub enum CreateAction {
    Superseded = 0,
    Opened = 1,
    Created = 2,
    Overwritten = 3,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct CreateResponse {
    #[bw(calc = 89)]
    #[br(assert(_structure_size == 89))]
    _structure_size: u16,
    pub oplock_level: u8,
    pub flags: u8,
    pub create_action: CreateAction,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub file_attributes: FileAttributes,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    pub file_id: FileId,
    #[bw(calc = 0)]
    #[br(temp)]
    _create_contexts_offset: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _create_contexts_length: u32,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct CloseRequest {
    #[bw(calc = 24)]
    #[br(assert(_structure_size == 24))]
    _structure_size: u16,
    pub flags: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    pub file_id: FileId,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct CloseResponse {
    #[bw(calc = 60)]
    #[br(assert(_structure_size == 60))]
    _structure_size: u16,
    pub flags: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub file_attributes: FileAttributes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_close_request_size() {
        let req = CloseRequest {
            flags: 0,
            file_id: FileId {
                persistent: 1,
                volatile: 2,
            },
        };
        let mut cursor = Cursor::new(Vec::new());
        req.write(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner().len(), 24);
    }
}
