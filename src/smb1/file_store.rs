use std::sync::Arc;

use crate::filestore::{CreateFileArgs, FileHandle, FileStatus, FileStore};
use crate::packets::binrw_util::{decode_le, encode_le};
use crate::packets::fscc::{
    FileDirectoryInformation, FileInformation, FsInformation, QueryFileInfoClass, QueryFsInfoClass,
    SetFileInformation,
};
use crate::packets::smb1::{
    nt_transact, trans2, Body, CloseRequest, Command, FindFirst2Params, FindFirst2ReturnParams,
    FindNext2Params, FindNext2ReturnParams, IoctlSetup, Message, NotifyChangeSetup,
    NtCreateRequest, NtTransactRequest, NtTransactResponse, QueryFileInfoParams, QueryFsInfoParams,
    ReadRequest, SetFileInfoParams, Transaction2Request, Transaction2Response,
    TreeDisconnectRequest, WriteRequest, INFO_PASSTHROUGH,
};
use crate::packets::status::Status;
use crate::smb1::client::Smb1Connection;
use crate::Error;

/// Entries requested per FindFirst2/FindNext2 page.
const FIND_SEARCH_COUNT: u16 = 512;

/// One connected SMB1 tree.
pub struct Smb1FileStore {
    conn: Arc<Smb1Connection>,
    tree_id: u16,
    unicode: bool,
    info_level_passthrough: bool,
    server_max_buffer_size: u32,
    client_max_buffer_size: u32,
}

impl Smb1FileStore {
    /// Header, word count, byte count and the ReadAndX response
    /// parameter block, all of which share the receive buffer with the
    /// data.
    const READ_RESPONSE_OVERHEAD: u32 = 32 + 3 + 24;
    /// Same accounting for the WriteAndX request, plus the name padding.
    const WRITE_REQUEST_OVERHEAD: u32 = 32 + 3 + 28 + 4;

    pub(crate) fn new(
        conn: Arc<Smb1Connection>,
        tree_id: u16,
        info: &super::client::Smb1NegotiateInfo,
        client_max_buffer_size: u32,
    ) -> Self {
        Smb1FileStore {
            unicode: conn.unicode(),
            conn,
            tree_id,
            info_level_passthrough: info.info_level_passthrough,
            server_max_buffer_size: info.server_max_buffer_size,
            client_max_buffer_size,
        }
    }

    pub fn tree_id(&self) -> u16 {
        self.tree_id
    }

    fn transact(&self, command: Command, body: Body) -> crate::Result<Message> {
        self.conn
            .transact(command, self.tree_id, body)?
            .ok_or(Error::ServerError(Status::InvalidSmb))
    }

    fn transact_success(&self, command: Command, body: Body) -> crate::Result<Message> {
        let response = self.transact(command, body)?;
        if response.header.status != Status::Success as u32 {
            return Err(Error::ServerError(response.header.status()?));
        }
        Ok(response)
    }

    /// Runs one Trans2 subcommand, returning the raw status alongside
    /// the response (directory enumeration needs the status verbatim).
    fn trans2_raw(
        &self,
        subcommand: u16,
        parameters: Vec<u8>,
        data: Vec<u8>,
    ) -> crate::Result<(u32, Option<Transaction2Response>)> {
        let max_data_count = self
            .server_max_buffer_size
            .saturating_sub(512)
            .min(u16::MAX as u32) as u16;
        let response = self.transact(
            Command::Transaction2,
            Body::Transaction2Request(Transaction2Request::new(
                subcommand,
                parameters,
                data,
                max_data_count,
            )),
        )?;
        let status = response.header.status;
        match response.body {
            Body::Transaction2Response(body) => Ok((status, Some(body))),
            _ => Ok((status, None)),
        }
    }

    fn trans2(
        &self,
        subcommand: u16,
        parameters: Vec<u8>,
        data: Vec<u8>,
    ) -> crate::Result<Transaction2Response> {
        let (status, response) = self.trans2_raw(subcommand, parameters, data)?;
        if status != Status::Success as u32 {
            return Err(Error::ServerError(status.try_into()?));
        }
        response.ok_or(Error::ServerError(Status::InvalidSmb))
    }

    fn nt_transact(
        &self,
        function: u16,
        setup: Vec<u8>,
        data: Vec<u8>,
        max_data_count: u32,
    ) -> crate::Result<NtTransactResponse> {
        let response = self.transact(
            Command::NtTransact,
            Body::NtTransactRequest(NtTransactRequest {
                max_parameter_count: 1024,
                max_data_count,
                function,
                setup,
                parameters: Vec::new(),
                data,
            }),
        )?;
        if response.header.status != Status::Success as u32 {
            return Err(Error::ServerError(response.header.status()?));
        }
        match response.body {
            Body::NtTransactResponse(body) => Ok(body),
            other => Err(Error::InvalidMessage(format!(
                "Expected an NT Transact response, got {other:?}"
            ))),
        }
    }

    fn passthrough_level(&self, class_id: u8) -> crate::Result<u16> {
        if !self.info_level_passthrough {
            return Err(Error::ServerError(Status::NotSupported));
        }
        Ok(INFO_PASSTHROUGH + class_id as u16)
    }
}

impl FileStore for Smb1FileStore {
    fn create_file(
        &self,
        path: &str,
        args: &CreateFileArgs,
    ) -> crate::Result<(FileHandle, FileStatus)> {
        let response = self.transact_success(
            Command::NtCreateAndX,
            Body::NtCreateRequest(NtCreateRequest::new(
                path,
                args.desired_access,
                args.file_attributes,
                args.share_access,
                args.create_disposition,
                args.create_options,
            )),
        )?;
        match response.body {
            Body::NtCreateResponse(body) => Ok((
                FileHandle::Smb1 {
                    fid: body.fid,
                    tree_id: self.tree_id,
                },
                FileStatus::from_create_action(body.create_disposition),
            )),
            other => Err(Error::InvalidMessage(format!(
                "Expected a create response, got {other:?}"
            ))),
        }
    }

    fn close_file(&self, handle: &FileHandle) -> crate::Result<()> {
        let fid = handle.smb1()?;
        self.transact_success(
            Command::Close,
            Body::CloseRequest(CloseRequest {
                fid,
                last_time_modified: 0,
            }),
        )?;
        Ok(())
    }

    fn read_file(&self, handle: &FileHandle, offset: u64, length: u32) -> crate::Result<Vec<u8>> {
        let fid = handle.smb1()?;
        let length = length.min(self.max_read_size()) as u16;
        let response = self.transact_success(
            Command::ReadAndX,
            Body::ReadRequest(ReadRequest::new(fid, offset, length)),
        )?;
        match response.body {
            Body::ReadResponse(body) => Ok(body.data),
            other => Err(Error::InvalidMessage(format!(
                "Expected a read response, got {other:?}"
            ))),
        }
    }

    fn write_file(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> crate::Result<u32> {
        let fid = handle.smb1()?;
        let chunk = &data[..data.len().min(self.max_write_size() as usize)];
        let response = self.transact_success(
            Command::WriteAndX,
            Body::WriteRequest(WriteRequest::new(fid, offset, chunk.to_vec())),
        )?;
        match response.body {
            Body::WriteResponse(body) => Ok(body.count as u32),
            other => Err(Error::InvalidMessage(format!(
                "Expected a write response, got {other:?}"
            ))),
        }
    }

    /// Pages through FindFirst2/FindNext2. `pattern` is the full search
    /// path (for example `dir\*`); the handle is unused on SMB1.
    fn query_directory(
        &self,
        _handle: Option<&FileHandle>,
        pattern: &str,
    ) -> crate::Result<(Vec<FileDirectoryInformation>, Status)> {
        let params = encode_le(&FindFirst2Params::new(pattern, FIND_SEARCH_COUNT))?;
        let (status, response) = self.trans2_raw(trans2::FIND_FIRST2, params, Vec::new())?;
        if status != Status::Success as u32 {
            return Ok((Vec::new(), status.try_into()?));
        }
        let response = response.ok_or(Error::ServerError(Status::InvalidSmb))?;
        let first: FindFirst2ReturnParams = decode_le(&response.parameters)?;
        let mut entries = FileDirectoryInformation::parse_chain(&response.data)?;

        let mut end_of_search = first.end_of_search != 0;
        while !end_of_search {
            let params = encode_le(&FindNext2Params::new(first.sid, FIND_SEARCH_COUNT))?;
            let (status, response) = self.trans2_raw(trans2::FIND_NEXT2, params, Vec::new())?;
            if status != Status::Success as u32 {
                return Ok((entries, status.try_into()?));
            }
            let response = response.ok_or(Error::ServerError(Status::InvalidSmb))?;
            let next: FindNext2ReturnParams = decode_le(&response.parameters)?;
            entries.extend(FileDirectoryInformation::parse_chain(&response.data)?);
            end_of_search = next.end_of_search != 0 || next.search_count == 0;
        }
        Ok((entries, Status::NoMoreFiles))
    }

    fn get_file_information(
        &self,
        handle: &FileHandle,
        class: QueryFileInfoClass,
    ) -> crate::Result<FileInformation> {
        let fid = handle.smb1()?;
        let params = encode_le(&QueryFileInfoParams {
            fid,
            information_level: self.passthrough_level(class.class_id())?,
        })?;
        let response = self.trans2(trans2::QUERY_FILE_INFORMATION, params, Vec::new())?;
        FileInformation::decode(class, &response.data)
    }

    fn set_file_information(
        &self,
        handle: &FileHandle,
        info: &SetFileInformation,
    ) -> crate::Result<()> {
        let fid = handle.smb1()?;
        let params = encode_le(&SetFileInfoParams {
            fid,
            information_level: self.passthrough_level(info.class_id())?,
        })?;
        self.trans2(trans2::SET_FILE_INFORMATION, params, info.encode()?)?;
        Ok(())
    }

    /// Queries the file system through the tree itself; any handle is
    /// ignored.
    fn get_file_system_information(
        &self,
        _handle: Option<&FileHandle>,
        class: QueryFsInfoClass,
    ) -> crate::Result<FsInformation> {
        let params = encode_le(&QueryFsInfoParams {
            information_level: self.passthrough_level(class.class_id())?,
        })?;
        let response = self.trans2(trans2::QUERY_FS_INFORMATION, params, Vec::new())?;
        FsInformation::decode(class, &response.data)
    }

    fn notify_change(
        &self,
        handle: &FileHandle,
        completion_filter: u32,
        watch_tree: bool,
    ) -> crate::Result<Vec<u8>> {
        let fid = handle.smb1()?;
        let setup = encode_le(&NotifyChangeSetup {
            completion_filter,
            fid,
            watch_tree: watch_tree as u8,
        })?;
        let response =
            self.nt_transact(nt_transact::NOTIFY_CHANGE, setup, Vec::new(), 0)?;
        Ok(response.parameters)
    }

    fn device_io_control(
        &self,
        handle: &FileHandle,
        ctl_code: u32,
        input: &[u8],
        max_output: u32,
    ) -> crate::Result<Vec<u8>> {
        let fid = handle.smb1()?;
        let setup = encode_le(&IoctlSetup {
            function_code: ctl_code,
            fid,
            is_fsctl: 1,
            is_flags: 0,
        })?;
        let response =
            self.nt_transact(nt_transact::IOCTL, setup, input.to_vec(), max_output)?;
        Ok(response.data)
    }

    fn max_read_size(&self) -> u32 {
        self.client_max_buffer_size
            .saturating_sub(Self::READ_RESPONSE_OVERHEAD)
    }

    fn max_write_size(&self) -> u32 {
        let base = self
            .server_max_buffer_size
            .saturating_sub(Self::WRITE_REQUEST_OVERHEAD);
        if self.unicode {
            base.saturating_sub(1)
        } else {
            base
        }
    }

    fn disconnect(&self) -> crate::Result<()> {
        self.transact_success(
            Command::TreeDisconnect,
            Body::TreeDisconnectRequest(TreeDisconnectRequest::default()),
        )?;
        log::debug!("Disconnected from tree #{}", self.tree_id);
        Ok(())
    }
}
