//! FSCC (MS-FSCC) information classes and access masks, shared by both
//! dialects: SMB2 carries these structures directly, and SMB1 carries them
//! through the Trans2 info-level passthrough.

use std::io::Cursor;

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use super::binrw_util::{from_utf16_le, to_utf16_le, FileTime};

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct FileAccessMask {
    pub file_read_data: bool,
    pub file_write_data: bool,
    pub file_append_data: bool,
    pub file_read_ea: bool,
    pub file_write_ea: bool,
    pub file_execute: bool,
    pub file_delete_child: bool,
    pub file_read_attributes: bool,
    pub file_write_attributes: bool,
    #[skip]
    __: B7,
    pub delete: bool,
    pub read_control: bool,
    pub write_dac: bool,
    pub write_owner: bool,
    pub synchronize: bool,
    #[skip]
    __: B3,
    pub access_system_security: bool,
    pub maximum_allowed: bool,
    #[skip]
    __: B2,
    pub generic_all: bool,
    pub generic_execute: bool,
    pub generic_write: bool,
    pub generic_read: bool,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct FileAttributes {
    pub readonly: bool,
    pub hidden: bool,
    pub system: bool,
    #[skip]
    __: bool,
    pub directory: bool,
    pub archive: bool,
    #[skip]
    __: bool,
    pub normal: bool,
    pub temporary: bool,
    pub sparse_file: bool,
    pub reparse_point: bool,
    pub compressed: bool,
    pub offline: bool,
    pub not_content_indexed: bool,
    pub encrypted: bool,
    #[skip]
    __: B17,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct ShareAccess {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    #[skip]
    __: B29,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u32))]
pub enum CreateDisposition {
    Supersede = 0,
    #[default]
    Open = 1,
    Create = 2,
    OpenIf = 3,
    Overwrite = 4,
    OverwriteIf = 5,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct CreateOptions {
    pub directory_file: bool,
    pub write_through: bool,
    pub sequential_only: bool,
    pub no_intermediate_buffering: bool,
    pub synchronous_io_alert: bool,
    pub synchronous_io_nonalert: bool,
    pub non_directory_file: bool,
    #[skip]
    __: B4,
    pub random_access: bool,
    pub delete_on_close: bool,
    #[skip]
    __: B19,
}

/// File information classes supported by `get_file_information`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFileInfoClass {
    Basic,
    Standard,
}

impl QueryFileInfoClass {
    pub fn class_id(&self) -> u8 {
        match self {
            QueryFileInfoClass::Basic => 4,
            QueryFileInfoClass::Standard => 5,
        }
    }
}

/// File system information classes supported by
/// `get_file_system_information`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFsInfoClass {
    Volume,
    Size,
    Attribute,
}

impl QueryFsInfoClass {
    pub fn class_id(&self) -> u8 {
        match self {
            QueryFsInfoClass::Volume => 1,
            QueryFsInfoClass::Size => 3,
            QueryFsInfoClass::Attribute => 5,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[brw(little)]
pub struct FileBasicInformation {
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub file_attributes: FileAttributes,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[brw(little)]
pub struct FileStandardInformation {
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub number_of_links: u32,
    #[br(map = |x: u8| x != 0)]
    #[bw(map = |&x| x as u8)]
    pub delete_pending: bool,
    #[br(map = |x: u8| x != 0)]
    #[bw(map = |&x| x as u8)]
    pub directory: bool,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq, Clone)]
#[brw(little)]
pub struct FileFsVolumeInformation {
    pub volume_creation_time: FileTime,
    pub volume_serial_number: u32,
    #[bw(try_calc(u32::try_from(volume_label.encode_utf16().count() * 2)))]
    #[br(temp)]
    volume_label_length: u32,
    #[br(map = |x: u8| x != 0)]
    #[bw(map = |&x| x as u8)]
    pub supports_objects: bool,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[br(count = volume_label_length, map = |raw: Vec<u8>| from_utf16_le(&raw))]
    #[bw(map = |s: &String| to_utf16_le(s))]
    pub volume_label: String,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[brw(little)]
pub struct FileFsSizeInformation {
    pub total_allocation_units: u64,
    pub available_allocation_units: u64,
    pub sectors_per_allocation_unit: u32,
    pub bytes_per_sector: u32,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq, Clone)]
#[brw(little)]
pub struct FileFsAttributeInformation {
    pub file_system_attributes: u32,
    pub maximum_component_name_length: u32,
    #[bw(try_calc(u32::try_from(file_system_name.encode_utf16().count() * 2)))]
    #[br(temp)]
    file_system_name_length: u32,
    #[br(count = file_system_name_length, map = |raw: Vec<u8>| from_utf16_le(&raw))]
    #[bw(map = |s: &String| to_utf16_le(s))]
    pub file_system_name: String,
}

/// Typed result of `get_file_information`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileInformation {
    Basic(FileBasicInformation),
    Standard(FileStandardInformation),
}

impl FileInformation {
    pub fn decode(class: QueryFileInfoClass, data: &[u8]) -> crate::Result<Self> {
        let mut cursor = Cursor::new(data);
        Ok(match class {
            QueryFileInfoClass::Basic => {
                FileInformation::Basic(FileBasicInformation::read(&mut cursor)?)
            }
            QueryFileInfoClass::Standard => {
                FileInformation::Standard(FileStandardInformation::read(&mut cursor)?)
            }
        })
    }
}

/// Typed result of `get_file_system_information`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsInformation {
    Volume(FileFsVolumeInformation),
    Size(FileFsSizeInformation),
    Attribute(FileFsAttributeInformation),
}

impl FsInformation {
    pub fn decode(class: QueryFsInfoClass, data: &[u8]) -> crate::Result<Self> {
        let mut cursor = Cursor::new(data);
        Ok(match class {
            QueryFsInfoClass::Volume => {
                FsInformation::Volume(FileFsVolumeInformation::read(&mut cursor)?)
            }
            QueryFsInfoClass::Size => FsInformation::Size(FileFsSizeInformation::read(&mut cursor)?),
            QueryFsInfoClass::Attribute => {
                FsInformation::Attribute(FileFsAttributeInformation::read(&mut cursor)?)
            }
        })
    }
}

/// Settable file information, encoded per class for `set_file_information`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetFileInformation {
    Basic(FileBasicInformation),
    Rename { file_name: String, replace_if_exists: bool },
    Disposition { delete_pending: bool },
    EndOfFile(u64),
}

impl SetFileInformation {
    pub fn class_id(&self) -> u8 {
        match self {
            SetFileInformation::Basic(_) => 4,
            SetFileInformation::Rename { .. } => 10,
            SetFileInformation::Disposition { .. } => 13,
            SetFileInformation::EndOfFile(_) => 20,
        }
    }

    pub fn encode(&self) -> crate::Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        match self {
            SetFileInformation::Basic(info) => info.write(&mut cursor)?,
            SetFileInformation::Rename {
                file_name,
                replace_if_exists,
            } => {
                let rename = FileRenameInformation {
                    replace_if_exists: *replace_if_exists,
                    root_directory: 0,
                    file_name: file_name.clone(),
                };
                rename.write(&mut cursor)?;
            }
            SetFileInformation::Disposition { delete_pending } => {
                (*delete_pending as u8).write_le(&mut cursor)?
            }
            SetFileInformation::EndOfFile(eof) => eof.write_le(&mut cursor)?,
        }
        Ok(cursor.into_inner())
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq, Clone)]
#[brw(little)]
pub struct FileRenameInformation {
    #[br(map = |x: u8| x != 0)]
    #[bw(map = |&x| x as u8)]
    pub replace_if_exists: bool,
    #[bw(calc = [0u8; 7])]
    #[br(temp)]
    _reserved: [u8; 7],
    pub root_directory: u64,
    #[bw(try_calc(u32::try_from(file_name.encode_utf16().count() * 2)))]
    #[br(temp)]
    file_name_length: u32,
    #[br(count = file_name_length, map = |raw: Vec<u8>| from_utf16_le(&raw))]
    #[bw(map = |s: &String| to_utf16_le(s))]
    pub file_name: String,
}

/// FileDirectoryInformation (class 1): the directory entry format used by
/// SMB2 QueryDirectory and the matching SMB1 `SMB_FIND_FILE_DIRECTORY_INFO`
/// find level.
#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq, Clone)]
#[brw(little)]
pub struct FileDirectoryInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub file_attributes: FileAttributes,
    #[bw(try_calc(u32::try_from(file_name.encode_utf16().count() * 2)))]
    #[br(temp)]
    file_name_length: u32,
    #[br(count = file_name_length, map = |raw: Vec<u8>| from_utf16_le(&raw))]
    #[bw(map = |s: &String| to_utf16_le(s))]
    pub file_name: String,
}

impl FileDirectoryInformation {
    pub fn named(file_name: &str) -> Self {
        FileDirectoryInformation {
            file_name: file_name.to_string(),
            ..Default::default()
        }
    }

    /// Parses a `NextEntryOffset`-chained buffer of entries.
    pub fn parse_chain(buffer: &[u8]) -> crate::Result<Vec<Self>> {
        let mut entries = Vec::new();
        let mut position = 0usize;
        loop {
            if position >= buffer.len() {
                break;
            }
            let mut cursor = Cursor::new(&buffer[position..]);
            let entry = Self::read(&mut cursor)?;
            let next = entry.next_entry_offset as usize;
            entries.push(entry);
            if next == 0 {
                break;
            }
            position += next;
        }
        Ok(entries)
    }

    /// Encodes entries into one chained buffer, aligning each entry to 8
    /// bytes and fixing up `NextEntryOffset` values.
    pub fn encode_chain(entries: &[Self]) -> crate::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        for (indx, entry) in entries.iter().enumerate() {
            let mut cursor = Cursor::new(Vec::new());
            entry.write(&mut cursor)?;
            let mut encoded = cursor.into_inner();
            let last = indx == entries.len() - 1;
            if !last {
                while encoded.len() % 8 != 0 {
                    encoded.push(0);
                }
            }
            let next_entry_offset = if last { 0u32 } else { encoded.len() as u32 };
            encoded[0..4].copy_from_slice(&next_entry_offset.to_le_bytes());
            buffer.extend_from_slice(&encoded);
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_mask_bits() {
        let mask = FileAccessMask::new()
            .with_file_read_data(true)
            .with_file_write_data(true)
            .with_synchronize(true);
        let bytes = FileAccessMask::into_bytes(mask);
        assert_eq!(u32::from_le_bytes(bytes), 0x0010_0003);
    }

    #[test]
    fn test_file_attributes_bits() {
        let attrs = FileAttributes::new().with_directory(true).with_normal(true);
        assert_eq!(u32::from_le_bytes(FileAttributes::into_bytes(attrs)), 0x90);
    }

    #[test]
    fn test_basic_information_size() {
        let mut cursor = Cursor::new(Vec::new());
        FileBasicInformation::default().write(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner().len(), 40);
    }

    #[test]
    fn test_standard_information_round_trip() {
        let info = FileStandardInformation {
            allocation_size: 4096,
            end_of_file: 1234,
            number_of_links: 1,
            delete_pending: false,
            directory: true,
        };
        let mut cursor = Cursor::new(Vec::new());
        info.write(&mut cursor).unwrap();
        let buf = cursor.into_inner();
        assert_eq!(buf.len(), 24);
        assert_eq!(
            FileStandardInformation::read(&mut Cursor::new(&buf)).unwrap(),
            info
        );
    }

    #[test]
    fn test_directory_chain_round_trip() {
        let entries = vec![
            FileDirectoryInformation::named("."),
            FileDirectoryInformation::named(".."),
            FileDirectoryInformation::named("a-much-longer-file-name.txt"),
        ];
        let buffer = FileDirectoryInformation::encode_chain(&entries).unwrap();
        let parsed = FileDirectoryInformation::parse_chain(&buffer).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(
            parsed.iter().map(|e| e.file_name.as_str()).collect::<Vec<_>>(),
            vec![".", "..", "a-much-longer-file-name.txt"]
        );
    }

    #[test]
    fn test_set_information_encoding() {
        let eof = SetFileInformation::EndOfFile(0x1122334455667788);
        assert_eq!(eof.class_id(), 20);
        assert_eq!(
            eof.encode().unwrap(),
            [0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );

        let disp = SetFileInformation::Disposition {
            delete_pending: true,
        };
        assert_eq!(disp.class_id(), 13);
        assert_eq!(disp.encode().unwrap(), [0x01]);
    }
}
