//! The dialect-independent file store surface: one trait implemented by
//! both the SMB1 and SMB2 stores, a tagged handle type that rejects
//! cross-dialect misuse, and the common create arguments.

use crate::packets::fscc::{
    CreateDisposition, CreateOptions, FileAccessMask, FileAttributes, FileDirectoryInformation,
    FileInformation, FsInformation, QueryFileInfoClass, QueryFsInfoClass, SetFileInformation,
    ShareAccess,
};
use crate::packets::smb2::FileId;
use crate::packets::status::Status;
use crate::Error;

/// An open file, owned by the tree (file store) that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileHandle {
    Smb1 { fid: u16, tree_id: u16 },
    Smb2 { file_id: FileId, tree_id: u32 },
}

impl FileHandle {
    pub(crate) fn smb1(&self) -> crate::Result<u16> {
        match self {
            FileHandle::Smb1 { fid, .. } => Ok(*fid),
            FileHandle::Smb2 { .. } => Err(Error::InvalidHandle),
        }
    }

    pub(crate) fn smb2(&self) -> crate::Result<FileId> {
        match self {
            FileHandle::Smb2 { file_id, .. } => Ok(*file_id),
            FileHandle::Smb1 { .. } => Err(Error::InvalidHandle),
        }
    }
}

/// What a create actually did, mapped from the server's create action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Superseded,
    Opened,
    Created,
    Overwritten,
}

impl FileStatus {
    /// Maps the wire `CreateAction`; unknown actions count as opened.
    pub fn from_create_action(action: u32) -> FileStatus {
        match action {
            0 => FileStatus::Superseded,
            2 => FileStatus::Created,
            3 => FileStatus::Overwritten,
            _ => FileStatus::Opened,
        }
    }
}

/// Arguments to [`FileStore::create_file`].
#[derive(Debug, Clone, Default)]
pub struct CreateFileArgs {
    pub desired_access: FileAccessMask,
    pub file_attributes: FileAttributes,
    pub share_access: ShareAccess,
    pub create_disposition: CreateDisposition,
    pub create_options: CreateOptions,
}

impl CreateFileArgs {
    /// Arguments for reading an existing file.
    pub fn read(disposition: CreateDisposition) -> Self {
        CreateFileArgs {
            desired_access: FileAccessMask::new()
                .with_file_read_data(true)
                .with_file_read_attributes(true)
                .with_synchronize(true),
            file_attributes: FileAttributes::new().with_normal(true),
            share_access: ShareAccess::new().with_read(true),
            create_disposition: disposition,
            create_options: CreateOptions::new()
                .with_non_directory_file(true)
                .with_synchronous_io_nonalert(true),
        }
    }

    /// Arguments for reading and writing a file.
    pub fn read_write(disposition: CreateDisposition) -> Self {
        let mut args = Self::read(disposition);
        args.desired_access = args
            .desired_access
            .with_file_write_data(true)
            .with_file_append_data(true)
            .with_file_write_attributes(true)
            .with_delete(true);
        args
    }

    /// Arguments for opening a named pipe such as `srvsvc`.
    pub fn pipe() -> Self {
        CreateFileArgs {
            desired_access: FileAccessMask::new()
                .with_file_read_data(true)
                .with_file_write_data(true)
                .with_synchronize(true),
            file_attributes: FileAttributes::new().with_normal(true),
            share_access: ShareAccess::new().with_read(true).with_write(true),
            create_disposition: CreateDisposition::Open,
            create_options: CreateOptions::new()
                .with_non_directory_file(true)
                .with_synchronous_io_nonalert(true),
        }
    }

    /// Arguments for opening a directory to enumerate it.
    pub fn directory() -> Self {
        CreateFileArgs {
            desired_access: FileAccessMask::new()
                .with_file_read_data(true)
                .with_file_read_attributes(true)
                .with_synchronize(true),
            file_attributes: FileAttributes::new(),
            share_access: ShareAccess::new().with_read(true).with_write(true),
            create_disposition: CreateDisposition::Open,
            create_options: CreateOptions::new()
                .with_directory_file(true)
                .with_synchronous_io_nonalert(true),
        }
    }
}

/// File-level operations over one connected tree.
///
/// The surface is identical across dialects. Operations the underlying
/// dialect implementation does not support report
/// [`Error::NotImplemented`]; protocol failures carry the wire status in
/// [`Error::ServerError`].
pub trait FileStore: Send + Sync {
    fn create_file(
        &self,
        path: &str,
        args: &CreateFileArgs,
    ) -> crate::Result<(FileHandle, FileStatus)>;

    fn close_file(&self, handle: &FileHandle) -> crate::Result<()>;

    fn read_file(&self, handle: &FileHandle, offset: u64, length: u32) -> crate::Result<Vec<u8>>;

    fn write_file(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> crate::Result<u32>;

    /// Enumerates a directory. SMB1 matches `pattern` against a path
    /// (the handle is unused); SMB2 enumerates the open directory
    /// `handle`. Returns the entries plus the final status, normally
    /// `STATUS_NO_MORE_FILES`.
    fn query_directory(
        &self,
        handle: Option<&FileHandle>,
        pattern: &str,
    ) -> crate::Result<(Vec<FileDirectoryInformation>, Status)>;

    fn get_file_information(
        &self,
        handle: &FileHandle,
        class: QueryFileInfoClass,
    ) -> crate::Result<FileInformation>;

    fn set_file_information(
        &self,
        handle: &FileHandle,
        info: &SetFileInformation,
    ) -> crate::Result<()>;

    /// Queries file system information. With `None`, the store opens the
    /// share root itself and closes it afterwards.
    fn get_file_system_information(
        &self,
        handle: Option<&FileHandle>,
        class: QueryFsInfoClass,
    ) -> crate::Result<FsInformation>;

    fn set_file_system_information(&self) -> crate::Result<()> {
        Err(Error::NotImplemented("SetFileSystemInformation"))
    }

    /// Returns the raw security descriptor bytes.
    fn get_security_information(
        &self,
        _handle: &FileHandle,
        _security_information: u32,
    ) -> crate::Result<Vec<u8>> {
        Err(Error::NotImplemented("GetSecurityInformation"))
    }

    fn set_security_information(&self, _handle: &FileHandle) -> crate::Result<()> {
        Err(Error::NotImplemented("SetSecurityInformation"))
    }

    /// Watches a directory for changes, returning the raw notify data.
    fn notify_change(
        &self,
        _handle: &FileHandle,
        _completion_filter: u32,
        _watch_tree: bool,
    ) -> crate::Result<Vec<u8>> {
        Err(Error::NotImplemented("NotifyChange"))
    }

    fn device_io_control(
        &self,
        handle: &FileHandle,
        ctl_code: u32,
        input: &[u8],
        max_output: u32,
    ) -> crate::Result<Vec<u8>>;

    fn flush_file_buffers(&self, _handle: &FileHandle) -> crate::Result<()> {
        Err(Error::NotImplemented("FlushFileBuffers"))
    }

    fn lock_file(&self, _handle: &FileHandle, _offset: u64, _length: u64) -> crate::Result<()> {
        Err(Error::NotImplemented("LockFile"))
    }

    fn unlock_file(&self, _handle: &FileHandle, _offset: u64, _length: u64) -> crate::Result<()> {
        Err(Error::NotImplemented("UnlockFile"))
    }

    fn cancel(&self) -> crate::Result<()> {
        Err(Error::NotImplemented("Cancel"))
    }

    /// Largest read this store will issue in one request.
    fn max_read_size(&self) -> u32;

    /// Largest write this store will issue in one request.
    fn max_write_size(&self) -> u32;

    /// Disconnects the tree. Open handles must be closed first.
    fn disconnect(&self) -> crate::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_dialect_mismatch_rejected() {
        let h1 = FileHandle::Smb1 { fid: 1, tree_id: 2 };
        let h2 = FileHandle::Smb2 {
            file_id: FileId::default(),
            tree_id: 3,
        };
        assert!(h1.smb1().is_ok());
        assert!(matches!(h1.smb2(), Err(Error::InvalidHandle)));
        assert!(h2.smb2().is_ok());
        assert!(matches!(h2.smb1(), Err(Error::InvalidHandle)));
    }

    #[test]
    fn test_create_action_mapping() {
        assert_eq!(FileStatus::from_create_action(0), FileStatus::Superseded);
        assert_eq!(FileStatus::from_create_action(1), FileStatus::Opened);
        assert_eq!(FileStatus::from_create_action(2), FileStatus::Created);
        assert_eq!(FileStatus::from_create_action(3), FileStatus::Overwritten);
        assert_eq!(FileStatus::from_create_action(99), FileStatus::Opened);
    }
}
