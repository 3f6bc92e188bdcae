use binrw::prelude::*;

use crate::packets::binrw_util::{to_utf16_le, PosMarker};

/// Trans2 subcommand codes used by this client.
pub mod trans2 {
    pub const FIND_FIRST2: u16 = 0x0001;
    pub const FIND_NEXT2: u16 = 0x0002;
    pub const QUERY_FS_INFORMATION: u16 = 0x0003;
    pub const QUERY_FILE_INFORMATION: u16 = 0x0007;
    pub const SET_FILE_INFORMATION: u16 = 0x0008;
}

/// NT Transact function codes used by this client.
pub mod nt_transact {
    pub const IOCTL: u16 = 0x0002;
    pub const NOTIFY_CHANGE: u16 = 0x0004;
}

/// The info-level passthrough base: FSCC class + 1000.
pub const INFO_PASSTHROUGH: u16 = 1000;
/// `SMB_FIND_FILE_DIRECTORY_INFO`, the find level matching the FSCC
/// FileDirectoryInformation class.
pub const FIND_FILE_DIRECTORY_INFO: u16 = 0x0101;

/// A SMB_COM_TRANSACTION2 request with a single setup word (the
/// subcommand). Parameter and data sections are opaque blobs built by the
/// caller; their offsets are measured from the start of the SMB header.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct Transaction2Request {
    #[bw(calc = 15)]
    #[br(assert(_word_count == 15))]
    _word_count: u8,
    #[bw(try_calc(u16::try_from(parameters.len())))]
    #[br(temp)]
    _total_parameter_count: u16,
    #[bw(try_calc(u16::try_from(data.len())))]
    #[br(temp)]
    _total_data_count: u16,
    pub max_parameter_count: u16,
    pub max_data_count: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _max_setup_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved1: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _flags: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _timeout: u32,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u16,
    #[bw(try_calc(u16::try_from(parameters.len())))]
    parameter_count: u16,
    #[bw(calc = PosMarker::default())]
    parameter_offset: PosMarker<u16>,
    #[bw(try_calc(u16::try_from(data.len())))]
    data_count: u16,
    #[bw(calc = PosMarker::default())]
    data_offset: PosMarker<u16>,
    #[bw(calc = 1)]
    #[br(temp)]
    _setup_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved3: u8,
    pub subcommand: u16,
    #[bw(try_calc(u16::try_from(parameters.len() + data.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(seek_before = std::io::SeekFrom::Start(parameter_offset.value as u64), count = parameter_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&parameter_offset))]
    pub parameters: Vec<u8>,
    #[br(seek_before = std::io::SeekFrom::Start(data_offset.value as u64), count = data_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&data_offset))]
    pub data: Vec<u8>,
}

impl Transaction2Request {
    pub fn new(subcommand: u16, parameters: Vec<u8>, data: Vec<u8>, max_data_count: u16) -> Self {
        Transaction2Request {
            max_parameter_count: 256,
            max_data_count,
            subcommand,
            parameters,
            data,
        }
    }
}

/// A SMB_COM_TRANSACTION2 response. Multi-part transaction responses
/// (non-zero displacements) are not reassembled by this client.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct Transaction2Response {
    #[br(assert(_word_count >= 10))]
    #[bw(calc = 10)]
    _word_count: u8,
    #[bw(try_calc(u16::try_from(parameters.len())))]
    #[br(temp)]
    _total_parameter_count: u16,
    #[bw(try_calc(u16::try_from(data.len())))]
    #[br(temp)]
    _total_data_count: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    #[bw(try_calc(u16::try_from(parameters.len())))]
    parameter_count: u16,
    #[bw(calc = PosMarker::default())]
    parameter_offset: PosMarker<u16>,
    #[bw(calc = 0)]
    #[br(temp)]
    _parameter_displacement: u16,
    #[bw(try_calc(u16::try_from(data.len())))]
    data_count: u16,
    #[bw(calc = PosMarker::default())]
    data_offset: PosMarker<u16>,
    #[bw(calc = 0)]
    #[br(temp)]
    _data_displacement: u16,
    #[bw(calc = 0)]
    _setup_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u8,
    #[br(count = _setup_count as usize * 2)]
    #[bw(calc = vec![])]
    _setup: Vec<u8>,
    #[bw(try_calc(u16::try_from(parameters.len() + data.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(seek_before = std::io::SeekFrom::Start(parameter_offset.value as u64), count = parameter_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&parameter_offset))]
    pub parameters: Vec<u8>,
    #[br(seek_before = std::io::SeekFrom::Start(data_offset.value as u64), count = data_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&data_offset))]
    pub data: Vec<u8>,
}

impl Transaction2Response {
    pub fn new(parameters: Vec<u8>, data: Vec<u8>) -> Self {
        Transaction2Response { parameters, data }
    }
}

/// A SMB_COM_NT_TRANSACT request with raw setup bytes.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct NtTransactRequest {
    #[bw(try_calc(u8::try_from(19 + setup.len() / 2)))]
    #[br(temp)]
    _word_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _max_setup_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved1: u16,
    #[bw(try_calc(u32::try_from(parameters.len())))]
    #[br(temp)]
    _total_parameter_count: u32,
    #[bw(try_calc(u32::try_from(data.len())))]
    #[br(temp)]
    _total_data_count: u32,
    pub max_parameter_count: u32,
    pub max_data_count: u32,
    #[bw(try_calc(u32::try_from(parameters.len())))]
    parameter_count: u32,
    #[bw(calc = PosMarker::default())]
    parameter_offset: PosMarker<u32>,
    #[bw(try_calc(u32::try_from(data.len())))]
    data_count: u32,
    #[bw(calc = PosMarker::default())]
    data_offset: PosMarker<u32>,
    #[bw(try_calc(u8::try_from(setup.len() / 2)))]
    setup_count: u8,
    pub function: u16,
    #[br(count = setup_count as usize * 2)]
    pub setup: Vec<u8>,
    #[bw(try_calc(u16::try_from(parameters.len() + data.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(seek_before = std::io::SeekFrom::Start(parameter_offset.value as u64), count = parameter_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&parameter_offset))]
    pub parameters: Vec<u8>,
    #[br(seek_before = std::io::SeekFrom::Start(data_offset.value as u64), count = data_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&data_offset))]
    pub data: Vec<u8>,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct NtTransactResponse {
    #[br(assert(_word_count >= 18))]
    #[bw(calc = 18)]
    _word_count: u8,
    #[bw(calc = [0u8; 3])]
    #[br(temp)]
    _reserved1: [u8; 3],
    #[bw(try_calc(u32::try_from(parameters.len())))]
    #[br(temp)]
    _total_parameter_count: u32,
    #[bw(try_calc(u32::try_from(data.len())))]
    #[br(temp)]
    _total_data_count: u32,
    #[bw(try_calc(u32::try_from(parameters.len())))]
    parameter_count: u32,
    #[bw(calc = PosMarker::default())]
    parameter_offset: PosMarker<u32>,
    #[bw(calc = 0)]
    #[br(temp)]
    _parameter_displacement: u32,
    #[bw(try_calc(u32::try_from(data.len())))]
    data_count: u32,
    #[bw(calc = PosMarker::default())]
    data_offset: PosMarker<u32>,
    #[bw(calc = 0)]
    #[br(temp)]
    _data_displacement: u32,
    #[bw(calc = 0)]
    _setup_count: u8,
    #[br(count = _setup_count as usize * 2)]
    #[bw(calc = vec![])]
    _setup: Vec<u8>,
    #[bw(try_calc(u16::try_from(parameters.len() + data.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(seek_before = std::io::SeekFrom::Start(parameter_offset.value as u64), count = parameter_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&parameter_offset))]
    pub parameters: Vec<u8>,
    #[br(seek_before = std::io::SeekFrom::Start(data_offset.value as u64), count = data_count)]
    #[bw(write_with = PosMarker::write_aoff, args(&data_offset))]
    pub data: Vec<u8>,
}

impl NtTransactResponse {
    pub fn new(parameters: Vec<u8>, data: Vec<u8>) -> Self {
        NtTransactResponse { parameters, data }
    }
}

/// Find flags (MS-CIFS 2.2.6.2.1).
pub const FIND_CLOSE_AT_EOS: u16 = 0x0002;
pub const FIND_CONTINUE_FROM_LAST: u16 = 0x0008;

/// Search-attribute mask used when enumerating directories: include
/// hidden, system and directory entries.
pub const SEARCH_ATTRIBUTES_ALL: u16 = 0x0016;

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct FindFirst2Params {
    pub search_attributes: u16,
    pub search_count: u16,
    pub flags: u16,
    pub information_level: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _search_storage_type: u32,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub file_name: Vec<u8>,
}

impl FindFirst2Params {
    pub fn new(pattern: &str, search_count: u16) -> Self {
        let mut file_name = to_utf16_le(pattern);
        file_name.extend_from_slice(&[0, 0]);
        FindFirst2Params {
            search_attributes: SEARCH_ATTRIBUTES_ALL,
            search_count,
            flags: FIND_CLOSE_AT_EOS,
            information_level: FIND_FILE_DIRECTORY_INFO,
            file_name,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct FindFirst2ReturnParams {
    pub sid: u16,
    pub search_count: u16,
    pub end_of_search: u16,
    pub ea_error_offset: u16,
    pub last_name_offset: u16,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct FindNext2Params {
    pub sid: u16,
    pub search_count: u16,
    pub information_level: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _resume_key: u32,
    pub flags: u16,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub file_name: Vec<u8>,
}

impl FindNext2Params {
    pub fn new(sid: u16, search_count: u16) -> Self {
        FindNext2Params {
            sid,
            search_count,
            information_level: FIND_FILE_DIRECTORY_INFO,
            flags: FIND_CLOSE_AT_EOS | FIND_CONTINUE_FROM_LAST,
            // Continuing from the last entry, no resume file name.
            file_name: vec![0, 0],
        }
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct FindNext2ReturnParams {
    pub search_count: u16,
    pub end_of_search: u16,
    pub ea_error_offset: u16,
    pub last_name_offset: u16,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct QueryFileInfoParams {
    pub fid: u16,
    pub information_level: u16,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct SetFileInfoParams {
    pub fid: u16,
    pub information_level: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct QueryFsInfoParams {
    pub information_level: u16,
}

/// Setup block of an NT Transact IOCTL.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct IoctlSetup {
    pub function_code: u32,
    pub fid: u16,
    pub is_fsctl: u8,
    pub is_flags: u8,
}

/// Setup block of an NT Transact NotifyChange.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct NotifyChangeSetup {
    pub completion_filter: u32,
    pub fid: u16,
    pub watch_tree: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
}
