use binrw::prelude::*;

use crate::packets::binrw_util::to_utf16_le;

use super::header::AndXBlock;

/// Generic "any type" service string for tree connects.
pub const SERVICE_ANY: &str = "?????";
/// Named pipe service string.
pub const SERVICE_NAMED_PIPE: &str = "IPC";

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct TreeConnectRequest {
    #[bw(calc = 4)]
    #[br(assert(_word_count == 4))]
    _word_count: u8,
    pub andx: AndXBlock,
    pub flags: u16,
    #[bw(try_calc(u16::try_from(password.len())))]
    password_length: u16,
    #[bw(try_calc(u16::try_from(password.len() + trailing.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(count = password_length)]
    pub password: Vec<u8>,
    /// Path and service strings (path unicode-padded as needed).
    #[br(parse_with = binrw::helpers::until_eof)]
    pub trailing: Vec<u8>,
}

impl TreeConnectRequest {
    /// 32-byte header, word count, 4 words, byte count.
    const BYTES_OFFSET: usize = 32 + 1 + 8 + 2;

    pub fn new(path: &str, service: &str, unicode: bool) -> Self {
        // No share-level security: a single null password byte.
        let password = vec![0u8];
        let mut trailing = Vec::new();
        if unicode {
            if (Self::BYTES_OFFSET + password.len()) % 2 != 0 {
                trailing.push(0);
            }
            trailing.extend_from_slice(&to_utf16_le(path));
            trailing.extend_from_slice(&[0, 0]);
        } else {
            trailing.extend_from_slice(path.as_bytes());
            trailing.push(0);
        }
        // The service string is always ASCII.
        trailing.extend_from_slice(service.as_bytes());
        trailing.push(0);
        TreeConnectRequest {
            andx: AndXBlock::default(),
            flags: 0,
            password,
            trailing,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct TreeConnectResponse {
    #[br(assert(_word_count >= 3))]
    #[bw(calc = 3)]
    _word_count: u8,
    pub andx: AndXBlock,
    pub optional_support: u16,
    // Extended responses carry additional access-mask words.
    #[br(count = (_word_count as usize * 2).saturating_sub(6))]
    #[bw(calc = vec![])]
    _extra_words: Vec<u8>,
    #[bw(try_calc(u16::try_from(trailing.len())))]
    #[br(temp)]
    _byte_count: u16,
    /// Service and native file system strings.
    #[br(parse_with = binrw::helpers::until_eof)]
    pub trailing: Vec<u8>,
}

impl TreeConnectResponse {
    pub fn new(service: &str) -> Self {
        let mut trailing = service.as_bytes().to_vec();
        trailing.push(0);
        TreeConnectResponse {
            andx: AndXBlock::default(),
            optional_support: 0,
            trailing,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct TreeDisconnectRequest {
    #[bw(calc = 0)]
    #[br(assert(_word_count == 0))]
    _word_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _byte_count: u16,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct TreeDisconnectResponse {
    #[bw(calc = 0)]
    #[br(assert(_word_count == 0))]
    _word_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _byte_count: u16,
}
