use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::auth::{AuthMethod, Authenticator};
use crate::connection::config::ClientConfig;
use crate::connection::credits::CreditLedger;
use crate::connection::inbox::Inbox;
use crate::connection::reader::{spawn_reader, WireDialect};
use crate::connection::transport::{Transport, TransportWriter};
use crate::filestore::FileStore;
use crate::packets::guid::Guid;
use crate::packets::smb2::{
    Command, Content, Dialect, EchoRequest, Header, HeaderFlags, LogoffRequest, Message,
    NegotiateRequest, SessionSetupRequest, TreeConnectRequest,
};
use crate::packets::status::Status;
use crate::rpc::srvsvc;
use crate::Error;

use super::file_store::Smb2FileStore;

/// Poll granularity of SMB2 inbox waits.
const INBOX_POLL: Duration = Duration::from_millis(50);

/// Capability snapshot taken from a successful negotiate.
#[derive(Debug, Clone)]
pub struct Smb2NegotiateInfo {
    pub dialect: Dialect,
    pub signing_required: bool,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    pub security_blob: Vec<u8>,
}

impl Smb2NegotiateInfo {
    /// This client never transfers more than 64 KiB per request,
    /// whatever the server offers.
    const MAX_TRANSFER_SIZE: u32 = 65536;
}

/// Shared per-connection state: the write half, the inbox fed by the
/// background reader, the credit ledger, and the message-id sequence.
pub(crate) struct Smb2Connection {
    writer: Mutex<TransportWriter>,
    pub(crate) inbox: Arc<Inbox<Message>>,
    pub(crate) credits: Arc<CreditLedger>,
    next_message_id: Mutex<u64>,
    session_id: Mutex<u64>,
    timeout: Duration,
    pub(crate) peer_ip: IpAddr,
}

impl Smb2Connection {
    /// Stamps and sends one command. Blocks for a credit first; the
    /// actual socket write is fire-and-forget (failures surface as a
    /// response timeout).
    fn send(&self, content: Content, tree_id: u32) -> crate::Result<(Command, u64)> {
        let credit_request = self.credits.consume(1, self.timeout)?;
        let message_id = {
            let mut guard = self.next_message_id.lock()?;
            let id = *guard;
            *guard += 1;
            id
        };
        let command = content.command();
        let header = Header {
            credit_charge: 1,
            status: 0,
            command,
            credit_request,
            flags: HeaderFlags::new(),
            next_command: 0,
            message_id,
            tree_id: Some(tree_id),
            async_id: None,
            session_id: *self.session_id.lock()?,
            signature: 0,
        };
        let encoded = Message { header, content }.encode()?;
        log::trace!("Sending {command} (mid {message_id})");
        self.writer.lock()?.send_message(&encoded);
        Ok((command, message_id))
    }

    /// Waits for the response matching `(command, message_id)`.
    ///
    /// `None` means the wait timed out, or the matched response carried
    /// `STATUS_PENDING` (in which case it has been removed from the
    /// inbox and the wait is abandoned).
    fn wait(&self, command: Command, message_id: u64) -> crate::Result<Option<Message>> {
        let found = self.inbox.wait_for(self.timeout, INBOX_POLL, |m| {
            m.header.command == command && m.header.message_id == message_id
        })?;
        match found {
            Some(message) if message.header.status == Status::Pending as u32 => {
                log::debug!("{command} (mid {message_id}) is pending; abandoning wait");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub(crate) fn transact(
        &self,
        content: Content,
        tree_id: u32,
    ) -> crate::Result<Option<Message>> {
        let (command, message_id) = self.send(content, tree_id)?;
        self.wait(command, message_id)
    }

    pub(crate) fn shutdown(&self) {
        if let Ok(writer) = self.writer.lock() {
            writer.shutdown();
        }
    }
}

/// SMB2 decode and admission rules for the background reader.
struct Smb2Wire {
    credits: Arc<CreditLedger>,
}

impl WireDialect for Smb2Wire {
    type Message = Message;

    fn decode(&self, payload: &[u8]) -> crate::Result<Message> {
        Message::decode(payload)
    }

    fn admit(&self, message: Message) -> Option<Message> {
        // Unsolicited messages are only valid as oplock breaks.
        if message.header.message_id == u64::MAX
            && message.header.command != Command::OplockBreak
        {
            log::debug!(
                "Dropping unsolicited {} with no message id",
                message.header.command
            );
            return None;
        }
        self.credits.grant(message.header.credit_request);
        Some(message)
    }
}

/// An SMB2 (2.0.2 / 2.1) client.
///
/// Lifecycle: `connect` (TCP + negotiate) -> `login` -> `tree_connect`*
/// -> `logoff` -> `disconnect`.
pub struct Smb2Client {
    config: ClientConfig,
    conn: Option<Arc<Smb2Connection>>,
    reader: Option<JoinHandle<()>>,
    negotiate_info: Option<Smb2NegotiateInfo>,
    logged_in: bool,
    session_key: Option<[u8; 16]>,
}

impl Smb2Client {
    pub fn new(config: ClientConfig) -> Self {
        Smb2Client {
            config,
            conn: None,
            reader: None,
            negotiate_info: None,
            logged_in: false,
            session_key: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn
            .as_ref()
            .map(|c| !c.inbox.is_poisoned())
            .unwrap_or(false)
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in && self.is_connected()
    }

    pub fn negotiate_info(&self) -> Option<&Smb2NegotiateInfo> {
        self.negotiate_info.as_ref()
    }

    /// The NTLM session key of the current session, when logged in.
    pub fn session_key(&self) -> Option<[u8; 16]> {
        self.session_key
    }

    fn conn(&self) -> crate::Result<&Arc<Smb2Connection>> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Client is not connected".to_string()))
    }

    /// Connects over the configured transport and negotiates the
    /// dialect. On any negotiation failure the socket is torn down.
    pub fn connect(&mut self, server: &str) -> crate::Result<()> {
        if self.conn.is_some() {
            return Err(Error::InvalidState("Client is already connected".to_string()));
        }

        let transport = Transport::connect(
            self.config.transport,
            server,
            self.config.port,
            &self.config.machine_name,
        )?;
        let peer_ip = transport.peer_ip();
        let (read_half, writer) = transport.split()?;

        let inbox = Arc::new(Inbox::new());
        let credits = Arc::new(CreditLedger::new());
        let reader = spawn_reader(
            read_half,
            Smb2Wire {
                credits: credits.clone(),
            },
            inbox.clone(),
        );
        let conn = Arc::new(Smb2Connection {
            writer: Mutex::new(writer),
            inbox,
            credits,
            next_message_id: Mutex::new(0),
            session_id: Mutex::new(0),
            timeout: self.config.timeout,
            peer_ip,
        });
        self.conn = Some(conn);
        self.reader = Some(reader);

        if let Err(e) = self.negotiate() {
            self.disconnect();
            return Err(e);
        }
        Ok(())
    }

    fn negotiate(&mut self) -> crate::Result<()> {
        let conn = self.conn()?.clone();
        let client_guid = self.config.client_guid.unwrap_or_else(Guid::generate);
        let response = conn
            .transact(
                Content::NegotiateRequest(NegotiateRequest::new(client_guid)),
                0,
            )?
            .ok_or_else(|| Error::NegotiationError("No negotiate response".to_string()))?;

        if response.header.status != Status::Success as u32 {
            return Err(Error::NegotiationError(format!(
                "Negotiate failed: {}",
                Status::try_display(response.header.status)
            )));
        }
        let body = match response.content {
            Content::NegotiateResponse(body) => body,
            other => {
                return Err(Error::InvalidMessage(format!(
                    "Expected a negotiate response, got {other:?}"
                )))
            }
        };

        let info = Smb2NegotiateInfo {
            dialect: body.dialect_revision,
            signing_required: body.security_mode.signing_required(),
            max_transact_size: body
                .max_transact_size
                .min(Smb2NegotiateInfo::MAX_TRANSFER_SIZE),
            max_read_size: body.max_read_size.min(Smb2NegotiateInfo::MAX_TRANSFER_SIZE),
            max_write_size: body
                .max_write_size
                .min(Smb2NegotiateInfo::MAX_TRANSFER_SIZE),
            security_blob: body.buffer,
        };
        log::info!(
            "Negotiated SMB {} (signing required: {})",
            info.dialect,
            info.signing_required
        );
        self.negotiate_info = Some(info);
        Ok(())
    }

    /// Performs the two-step SPNEGO/NTLM session setup. The returned
    /// status is the server's verbatim answer: `STATUS_LOGON_FAILURE`
    /// and friends are values, not errors.
    pub fn login(
        &mut self,
        domain: &str,
        user_name: &str,
        password: &str,
        _method: AuthMethod,
    ) -> crate::Result<Status> {
        if !self.is_connected() || self.negotiate_info.is_none() {
            return Err(Error::InvalidState(
                "Login requires a connected client".to_string(),
            ));
        }
        let conn = self.conn()?.clone();

        let mut auth = Authenticator::build(
            domain,
            user_name,
            password.to_string(),
            &self.config.machine_name,
        )?;
        let Some(negotiate_token) = auth.next(&[])? else {
            return Ok(Status::SecEInvalidToken);
        };

        let response = conn.transact(
            Content::SessionSetupRequest(SessionSetupRequest::new(negotiate_token)),
            0,
        )?;
        let Some(response) = response else {
            return Ok(Status::InvalidSmb);
        };

        if response.header.status != Status::MoreProcessingRequired as u32 {
            // Single-round completion is not part of the NTLM exchange;
            // report whatever the server said.
            return response.header.status();
        }

        // Mirror the session id on every subsequent message.
        *conn.session_id.lock()? = response.header.session_id;

        let challenge = match response.content {
            Content::SessionSetupResponse(body) => body.buffer,
            _ => return Ok(Status::InvalidSmb),
        };
        let Some(authenticate_token) = auth.next(&challenge)? else {
            return Ok(Status::SecEInvalidToken);
        };

        let response = conn.transact(
            Content::SessionSetupRequest(SessionSetupRequest::new(authenticate_token)),
            0,
        )?;
        let Some(response) = response else {
            return Ok(Status::InvalidSmb);
        };

        if response.header.status == Status::Success as u32 {
            self.logged_in = true;
            self.session_key = auth.session_key().ok();
            log::info!("Session setup complete (session {:#x})", response.header.session_id);
        }
        response.header.status()
    }

    /// Binds to a share, returning its file store.
    pub fn tree_connect(&mut self, share: &str) -> crate::Result<Smb2FileStore> {
        if !self.is_logged_in() {
            return Err(Error::InvalidState(
                "Tree connect requires a logged-in client".to_string(),
            ));
        }
        let conn = self.conn()?.clone();
        let info = self.negotiate_info.as_ref().ok_or_else(|| {
            Error::InvalidState("Tree connect requires a negotiated connection".to_string())
        })?;

        let path = format!(r"\\{}\{}", conn.peer_ip, share);
        log::debug!("Connecting to tree {path}");
        let response = conn
            .transact(Content::TreeConnectRequest(TreeConnectRequest::new(&path)), 0)?
            .ok_or(Error::ServerError(Status::InvalidSmb))?;
        if response.header.status != Status::Success as u32 {
            return Err(Error::ServerError(response.header.status()?));
        }
        let tree_id = response.header.tree_id.unwrap_or(0);
        log::info!("Connected to tree {path} (#{tree_id})");
        Ok(Smb2FileStore::new(
            conn,
            tree_id,
            info.max_transact_size,
            info.max_read_size,
            info.max_write_size,
        ))
    }

    /// Enumerates the server's disk shares through the `srvsvc` pipe on
    /// `IPC$`.
    pub fn list_shares(&mut self) -> crate::Result<Vec<String>> {
        if !self.is_logged_in() {
            return Err(Error::InvalidState(
                "Share enumeration requires a logged-in client".to_string(),
            ));
        }
        let server_name = self.conn()?.peer_ip.to_string();
        let ipc = self.tree_connect("IPC$")?;
        let result = srvsvc::net_share_enum(&ipc, &server_name);
        ipc.disconnect().ok();

        Ok(result?
            .into_iter()
            .filter(|share| share.is_disk())
            .map(|share| share.name)
            .collect())
    }

    /// Round-trips an ECHO request, verifying the connection is alive.
    pub fn echo(&mut self) -> crate::Result<Status> {
        if !self.is_connected() {
            return Err(Error::InvalidState("Echo requires a connected client".to_string()));
        }
        let response = self
            .conn()?
            .transact(Content::EchoRequest(EchoRequest::default()), 0)?;
        match response {
            Some(response) => response.header.status(),
            None => Ok(Status::InvalidSmb),
        }
    }

    pub fn logoff(&mut self) -> crate::Result<Status> {
        if !self.logged_in {
            return Err(Error::InvalidState("Logoff requires a logged-in client".to_string()));
        }
        let conn = self.conn()?.clone();
        let response = conn.transact(Content::LogoffRequest(LogoffRequest::default()), 0)?;
        let status = match response {
            Some(response) => response.header.status()?,
            None => Status::InvalidSmb,
        };
        if status == Status::Success {
            self.logged_in = false;
            self.session_key = None;
            *conn.session_id.lock()? = 0;
        }
        Ok(status)
    }

    /// Closes the socket and joins the background reader. Safe to call
    /// in any state.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.shutdown();
        }
        if let Some(reader) = self.reader.take() {
            reader.join().ok();
        }
        self.negotiate_info = None;
        self.logged_in = false;
        self.session_key = None;
        log::info!("Disconnected");
    }
}

impl Drop for Smb2Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}
