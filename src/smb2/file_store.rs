use std::sync::Arc;

use crate::filestore::{CreateFileArgs, FileHandle, FileStatus, FileStore};
use crate::packets::fscc::{
    FileDirectoryInformation, FileInformation, FsInformation, QueryFileInfoClass, QueryFsInfoClass,
    SetFileInformation,
};
use crate::packets::smb2::{
    CloseRequest, Content, CreateRequest, ImpersonationLevel, InfoType, IoctlRequest,
    IoctlRequestFlags, Message, QueryDirectoryFlags, QueryDirectoryRequest, QueryInfoRequest,
    ReadRequest, SetInfoRequest, TreeDisconnectRequest, WriteRequest,
};
use crate::packets::status::Status;
use crate::Error;

use super::client::Smb2Connection;

/// FileDirectoryInformation, the directory entry class this client
/// requests.
const DIRECTORY_INFO_CLASS: u8 = 0x01;

/// One connected SMB2 tree.
pub struct Smb2FileStore {
    conn: Arc<Smb2Connection>,
    tree_id: u32,
    max_transact_size: u32,
    max_read_size: u32,
    max_write_size: u32,
}

impl Smb2FileStore {
    pub(crate) fn new(
        conn: Arc<Smb2Connection>,
        tree_id: u32,
        max_transact_size: u32,
        max_read_size: u32,
        max_write_size: u32,
    ) -> Self {
        Smb2FileStore {
            conn,
            tree_id,
            max_transact_size,
            max_read_size,
            max_write_size,
        }
    }

    pub fn tree_id(&self) -> u32 {
        self.tree_id
    }

    /// Sends one command on this tree; a missing response (timeout or
    /// abandoned `STATUS_PENDING` wait) is the synthetic
    /// `STATUS_INVALID_SMB`.
    fn transact(&self, content: Content) -> crate::Result<Message> {
        self.conn
            .transact(content, self.tree_id)?
            .ok_or(Error::ServerError(Status::InvalidSmb))
    }

    /// Like [`Self::transact`] but requires `STATUS_SUCCESS`.
    fn transact_success(&self, content: Content) -> crate::Result<Message> {
        let response = self.transact(content)?;
        if response.header.status != Status::Success as u32 {
            return Err(Error::ServerError(response.header.status()?));
        }
        Ok(response)
    }

    fn query_info(
        &self,
        file_id: crate::packets::smb2::FileId,
        info_type: InfoType,
        class: u8,
        additional_information: u32,
    ) -> crate::Result<Vec<u8>> {
        let response = self.transact_success(Content::QueryInfoRequest(QueryInfoRequest {
            info_type,
            file_info_class: class,
            output_buffer_length: self.max_transact_size,
            additional_information,
            flags: 0,
            file_id,
        }))?;
        match response.content {
            Content::QueryInfoResponse(body) => Ok(body.buffer),
            other => Err(Error::InvalidMessage(format!(
                "Expected a query info response, got {other:?}"
            ))),
        }
    }
}

impl FileStore for Smb2FileStore {
    fn create_file(
        &self,
        path: &str,
        args: &CreateFileArgs,
    ) -> crate::Result<(FileHandle, FileStatus)> {
        let response = self.transact_success(Content::CreateRequest(CreateRequest {
            requested_oplock_level: 0,
            impersonation_level: ImpersonationLevel::Impersonation,
            desired_access: args.desired_access,
            file_attributes: args.file_attributes,
            share_access: args.share_access,
            create_disposition: args.create_disposition,
            create_options: args.create_options,
            name: path.to_string(),
        }))?;
        match response.content {
            Content::CreateResponse(body) => Ok((
                FileHandle::Smb2 {
                    file_id: body.file_id,
                    tree_id: self.tree_id,
                },
                FileStatus::from_create_action(body.create_action as u32),
            )),
            other => Err(Error::InvalidMessage(format!(
                "Expected a create response, got {other:?}"
            ))),
        }
    }

    fn close_file(&self, handle: &FileHandle) -> crate::Result<()> {
        let file_id = handle.smb2()?;
        self.transact_success(Content::CloseRequest(CloseRequest { flags: 0, file_id }))?;
        Ok(())
    }

    fn read_file(&self, handle: &FileHandle, offset: u64, length: u32) -> crate::Result<Vec<u8>> {
        let file_id = handle.smb2()?;
        let length = length.min(self.max_read_size);
        let response = self.transact_success(Content::ReadRequest(ReadRequest::new(
            file_id, offset, length,
        )))?;
        match response.content {
            Content::ReadResponse(body) => Ok(body.buffer),
            other => Err(Error::InvalidMessage(format!(
                "Expected a read response, got {other:?}"
            ))),
        }
    }

    fn write_file(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> crate::Result<u32> {
        let file_id = handle.smb2()?;
        let chunk = &data[..data.len().min(self.max_write_size as usize)];
        let response = self.transact_success(Content::WriteRequest(WriteRequest::new(
            file_id,
            offset,
            chunk.to_vec(),
        )))?;
        match response.content {
            Content::WriteResponse(body) => Ok(body.count),
            other => Err(Error::InvalidMessage(format!(
                "Expected a write response, got {other:?}"
            ))),
        }
    }

    /// Pages through the open directory: the first request reopens the
    /// scan, follow-ups continue it until the server reports a
    /// non-success status (normally `STATUS_NO_MORE_FILES`).
    fn query_directory(
        &self,
        handle: Option<&FileHandle>,
        pattern: &str,
    ) -> crate::Result<(Vec<FileDirectoryInformation>, Status)> {
        let handle = handle.ok_or_else(|| {
            Error::InvalidArgument("SMB2 directory enumeration requires an open handle".to_string())
        })?;
        let file_id = handle.smb2()?;

        let mut entries = Vec::new();
        let mut reopen = true;
        loop {
            let response = self.transact(Content::QueryDirectoryRequest(QueryDirectoryRequest {
                file_information_class: DIRECTORY_INFO_CLASS,
                flags: QueryDirectoryFlags::new().with_reopen(reopen),
                file_index: 0,
                file_id,
                output_buffer_length: self.max_transact_size,
                file_name: pattern.to_string(),
            }))?;
            if response.header.status != Status::Success as u32 {
                return Ok((entries, response.header.status()?));
            }
            match response.content {
                Content::QueryDirectoryResponse(body) => {
                    entries.extend(FileDirectoryInformation::parse_chain(&body.buffer)?);
                }
                other => {
                    return Err(Error::InvalidMessage(format!(
                        "Expected a query directory response, got {other:?}"
                    )))
                }
            }
            reopen = false;
        }
    }

    fn get_file_information(
        &self,
        handle: &FileHandle,
        class: QueryFileInfoClass,
    ) -> crate::Result<FileInformation> {
        let buffer = self.query_info(handle.smb2()?, InfoType::File, class.class_id(), 0)?;
        FileInformation::decode(class, &buffer)
    }

    fn set_file_information(
        &self,
        handle: &FileHandle,
        info: &SetFileInformation,
    ) -> crate::Result<()> {
        let file_id = handle.smb2()?;
        self.transact_success(Content::SetInfoRequest(SetInfoRequest {
            info_type: InfoType::File,
            file_info_class: info.class_id(),
            additional_information: 0,
            file_id,
            buffer: info.encode()?,
        }))?;
        Ok(())
    }

    fn get_file_system_information(
        &self,
        handle: Option<&FileHandle>,
        class: QueryFsInfoClass,
    ) -> crate::Result<FsInformation> {
        match handle {
            Some(handle) => {
                let buffer = self.query_info(
                    handle.smb2()?,
                    InfoType::FileSystem,
                    class.class_id(),
                    0,
                )?;
                FsInformation::decode(class, &buffer)
            }
            None => {
                // Self-open the share root, query it, and close it.
                let (root, _) = self.create_file("", &CreateFileArgs::directory())?;
                let result = self
                    .query_info(root.smb2()?, InfoType::FileSystem, class.class_id(), 0)
                    .and_then(|buffer| FsInformation::decode(class, &buffer));
                self.close_file(&root).ok();
                result
            }
        }
    }

    fn get_security_information(
        &self,
        handle: &FileHandle,
        security_information: u32,
    ) -> crate::Result<Vec<u8>> {
        self.query_info(
            handle.smb2()?,
            InfoType::Security,
            0,
            security_information,
        )
    }

    fn set_security_information(&self, _handle: &FileHandle) -> crate::Result<()> {
        Err(Error::ServerError(Status::NotSupported))
    }

    fn device_io_control(
        &self,
        handle: &FileHandle,
        ctl_code: u32,
        input: &[u8],
        max_output: u32,
    ) -> crate::Result<Vec<u8>> {
        let file_id = handle.smb2()?;
        let response = self.transact(Content::IoctlRequest(IoctlRequest {
            ctl_code,
            file_id,
            max_input_response: 0,
            max_output_response: max_output,
            flags: IoctlRequestFlags::new().with_is_fsctl(true),
            buffer: input.to_vec(),
        }))?;
        // BUFFER_OVERFLOW still delivers (truncated) output data.
        let delivers_data = response.header.status == Status::Success as u32
            || response.header.status == Status::BufferOverflow as u32;
        if !delivers_data {
            return Err(Error::ServerError(response.header.status()?));
        }
        match response.content {
            Content::IoctlResponse(body) => Ok(body.buffer),
            other => Err(Error::InvalidMessage(format!(
                "Expected an ioctl response, got {other:?}"
            ))),
        }
    }

    fn max_read_size(&self) -> u32 {
        self.max_read_size
    }

    fn max_write_size(&self) -> u32 {
        self.max_write_size
    }

    fn disconnect(&self) -> crate::Result<()> {
        self.transact_success(Content::TreeDisconnectRequest(
            TreeDisconnectRequest::default(),
        ))?;
        log::debug!("Disconnected from tree #{}", self.tree_id);
        Ok(())
    }
}
