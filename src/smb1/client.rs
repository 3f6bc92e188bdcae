use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::auth::ntlm::{
    self, generate_client_challenge, ntlm_v2_proof, ntowf_v2, NtlmV2ClientChallenge,
};
use crate::auth::{AuthMethod, Authenticator};
use crate::connection::config::ClientConfig;
use crate::connection::inbox::Inbox;
use crate::connection::reader::{spawn_reader, WireDialect};
use crate::connection::transport::{Transport, TransportWriter};
use crate::filestore::FileStore;
use crate::packets::binrw_util::{encode_le, FileTime};
use crate::packets::smb1::{
    Body, Capabilities, Command, EchoRequest, Header, HeaderFlags, HeaderFlags2, LogoffRequest,
    Message, NegotiateRequest, SessionSetupRequest, SessionSetupRequestExtended,
    TreeConnectRequest, SERVICE_ANY,
};
use crate::packets::status::Status;
use crate::rpc::srvsvc;
use crate::Error;

use super::file_store::Smb1FileStore;

/// SMB1 responses get a fixed 5 second wait, polled at 100 ms.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
const INBOX_POLL: Duration = Duration::from_millis(100);

/// The largest buffer this client advertises.
const CLIENT_MAX_BUFFER_SIZE: u16 = 0xFFFF;
const CLIENT_MAX_MPX_COUNT: u16 = 1;

/// Which security flavor the server negotiated. Exactly one applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Smb1Security {
    /// Pre-extended security: the 8-byte challenge arrives in the
    /// negotiate response and the NTLM responses travel in the session
    /// setup password fields.
    ServerChallenge([u8; 8]),
    /// Extended security: SPNEGO tokens, starting from the server's
    /// negotiate blob.
    SecurityBlob(Vec<u8>),
}

/// Capability snapshot taken from a successful negotiate.
#[derive(Debug, Clone)]
pub struct Smb1NegotiateInfo {
    pub unicode: bool,
    pub large_files: bool,
    pub nt_smb: bool,
    pub nt_status: bool,
    pub info_level_passthrough: bool,
    pub large_read: bool,
    pub large_write: bool,
    pub server_max_buffer_size: u32,
    pub max_mpx_count: u16,
    pub security: Smb1Security,
}

/// Shared per-connection state. SMB1 correlates responses by command
/// name only, so requests are strictly serialized through `op_guard`.
pub(crate) struct Smb1Connection {
    writer: Mutex<TransportWriter>,
    pub(crate) inbox: Arc<Inbox<Message>>,
    op_guard: Mutex<()>,
    uid: AtomicU16,
    unicode: AtomicBool,
    force_extended_security: bool,
    pub(crate) peer_ip: IpAddr,
}

impl Smb1Connection {
    fn header_for(&self, command: Command, tid: u16) -> Header {
        Header {
            command,
            status: 0,
            flags: HeaderFlags::new()
                .with_case_insensitive(true)
                .with_canonicalized_paths(true),
            flags2: HeaderFlags2::new()
                .with_long_names_allowed(true)
                .with_is_long_name(true)
                .with_nt_status(true)
                .with_unicode(self.unicode.load(Ordering::SeqCst))
                .with_extended_security(self.force_extended_security),
            pid_high: 0,
            security_features: 0,
            tid,
            pid_low: 0,
            uid: self.uid.load(Ordering::SeqCst),
            mid: 0,
        }
    }

    pub(crate) fn unicode(&self) -> bool {
        self.unicode.load(Ordering::SeqCst)
    }

    /// Sends one request and waits for a response with the same command.
    /// One request in flight at a time: two concurrent requests of the
    /// same command would be indistinguishable in the inbox.
    pub(crate) fn transact(
        &self,
        command: Command,
        tid: u16,
        body: Body,
    ) -> crate::Result<Option<Message>> {
        let _guard = self.op_guard.lock()?;
        let message = Message {
            header: self.header_for(command, tid),
            body,
        };
        let encoded = message.encode()?;
        log::trace!("Sending {command}");
        self.writer.lock()?.send_message(&encoded);
        self.inbox
            .wait_for(RESPONSE_TIMEOUT, INBOX_POLL, |m| m.header.command == command)
    }

    pub(crate) fn shutdown(&self) {
        if let Ok(writer) = self.writer.lock() {
            writer.shutdown();
        }
    }
}

/// SMB1 decode and admission rules for the background reader: a reply is
/// admitted when it answers this client (`PID = 0`, `MID = 0`) or is an
/// oplock break (`MID = 0xFFFF`); anything else is dropped.
struct Smb1Wire;

impl WireDialect for Smb1Wire {
    type Message = Message;

    fn decode(&self, payload: &[u8]) -> crate::Result<Message> {
        Message::decode(payload)
    }

    fn admit(&self, message: Message) -> Option<Message> {
        let header = &message.header;
        let oplock_break = header.mid == 0xFFFF;
        let ours = header.pid_low == 0 && header.pid_high == 0 && header.mid == 0;
        if oplock_break || ours {
            Some(message)
        } else {
            log::debug!(
                "Dropping unsolicited {} (pid {}, mid {})",
                header.command,
                header.pid_low,
                header.mid
            );
            None
        }
    }
}

/// An SMB1 / CIFS (`NT LM 0.12`) client.
///
/// Lifecycle: `connect` (TCP + negotiate) -> `login` -> `tree_connect`*
/// -> `logoff` -> `disconnect`.
pub struct Smb1Client {
    config: ClientConfig,
    conn: Option<Arc<Smb1Connection>>,
    reader: Option<JoinHandle<()>>,
    negotiate_info: Option<Smb1NegotiateInfo>,
    logged_in: bool,
    session_key: Option<[u8; 16]>,
}

impl Smb1Client {
    pub fn new(config: ClientConfig) -> Self {
        Smb1Client {
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

    pub fn negotiate_info(&self) -> Option<&Smb1NegotiateInfo> {
        self.negotiate_info.as_ref()
    }

    pub fn session_key(&self) -> Option<[u8; 16]> {
        self.session_key
    }

    fn conn(&self) -> crate::Result<&Arc<Smb1Connection>> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Client is not connected".to_string()))
    }

    /// Connects over the configured transport and negotiates the
    /// `NT LM 0.12` dialect. Any negotiation failure tears the socket
    /// down.
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
        let reader = spawn_reader(read_half, Smb1Wire, inbox.clone());
        let conn = Arc::new(Smb1Connection {
            writer: Mutex::new(writer),
            inbox,
            op_guard: Mutex::new(()),
            uid: AtomicU16::new(0),
            unicode: AtomicBool::new(false),
            force_extended_security: self.config.force_extended_security,
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
        let response = conn
            .transact(
                Command::Negotiate,
                0,
                Body::NegotiateRequest(NegotiateRequest::default()),
            )?
            .ok_or_else(|| Error::NegotiationError("No negotiate response".to_string()))?;

        if response.header.status != Status::Success as u32 {
            return Err(Error::NegotiationError(format!(
                "Negotiate failed: {}",
                Status::try_display(response.header.status)
            )));
        }
        let body = match response.body {
            Body::NegotiateResponse(body) => body,
            other => {
                return Err(Error::NegotiationError(format!(
                    "Expected a negotiate response, got {other:?}"
                )))
            }
        };

        let caps = body.capabilities;
        if !(caps.nt_smbs() && caps.rpc_remote_apis() && caps.nt_status()) {
            return Err(Error::NegotiationError(format!(
                "Server lacks required capabilities: {caps:?}"
            )));
        }

        let security = if body.is_extended_security() {
            Smb1Security::SecurityBlob(body.security_blob.clone())
        } else {
            if self.config.force_extended_security {
                return Err(Error::NegotiationError(
                    "Server does not support extended security".to_string(),
                ));
            }
            let challenge: [u8; 8] = body.challenge.as_slice().try_into().map_err(|_| {
                Error::NegotiationError(format!(
                    "Expected an 8-byte challenge, got {} bytes",
                    body.challenge.len()
                ))
            })?;
            Smb1Security::ServerChallenge(challenge)
        };

        conn.unicode.store(caps.unicode(), Ordering::SeqCst);
        self.negotiate_info = Some(Smb1NegotiateInfo {
            unicode: caps.unicode(),
            large_files: caps.large_files(),
            nt_smb: caps.nt_smbs(),
            nt_status: caps.nt_status(),
            info_level_passthrough: caps.info_level_passthrough(),
            large_read: caps.large_read(),
            large_write: caps.large_write(),
            server_max_buffer_size: body.max_buffer_size,
            max_mpx_count: body.max_mpx_count,
            security,
        });
        log::info!(
            "Negotiated NT LM 0.12 (unicode: {}, extended security: {})",
            caps.unicode(),
            body.is_extended_security()
        );
        Ok(())
    }

    /// The capability mask advertised in session setup requests.
    fn client_capabilities(info: &Smb1NegotiateInfo) -> Capabilities {
        Capabilities::new()
            .with_nt_smbs(true)
            .with_rpc_remote_apis(true)
            .with_nt_status(true)
            .with_nt_find(true)
            .with_unicode(info.unicode)
            .with_large_files(info.large_files)
            .with_large_read(info.large_read)
    }

    /// Authenticates the user. The returned status is the server's
    /// verbatim answer; `logged_in` turns true only on
    /// `STATUS_SUCCESS`.
    pub fn login(
        &mut self,
        domain: &str,
        user_name: &str,
        password: &str,
        method: AuthMethod,
    ) -> crate::Result<Status> {
        if !self.is_connected() {
            return Err(Error::InvalidState(
                "Login requires a connected client".to_string(),
            ));
        }
        let info = self
            .negotiate_info
            .clone()
            .ok_or_else(|| Error::InvalidState("Login requires a negotiated connection".to_string()))?;

        match &info.security {
            Smb1Security::ServerChallenge(challenge) => {
                self.login_pre_extended(domain, user_name, password, method, &info, *challenge)
            }
            Smb1Security::SecurityBlob(_) => {
                self.login_extended(domain, user_name, password, &info)
            }
        }
    }

    /// One-shot session setup with the NTLM responses in the password
    /// fields.
    fn login_pre_extended(
        &mut self,
        domain: &str,
        user_name: &str,
        password: &str,
        method: AuthMethod,
        info: &Smb1NegotiateInfo,
        challenge: [u8; 8],
    ) -> crate::Result<Status> {
        let (oem_password, unicode_password) = match method {
            AuthMethod::NtlmV1 => (
                ntlm::lm_v1_response(password, &challenge)?.to_vec(),
                ntlm::ntlm_v1_response(password, &challenge)?.to_vec(),
            ),
            AuthMethod::NtlmV2 => {
                let client_challenge = generate_client_challenge();
                let blob = NtlmV2ClientChallenge::new(
                    FileTime::now(),
                    client_challenge,
                    domain,
                    &self.config.machine_name,
                );
                let blob_bytes = encode_le(&blob)?;
                let key = ntowf_v2(password, user_name, domain)?;
                let proof = ntlm_v2_proof(&key, &challenge, &blob_bytes)?;
                let mut nt_response = proof.to_vec();
                nt_response.extend_from_slice(&blob_bytes);
                (
                    ntlm::lm_v2_response(
                        password,
                        user_name,
                        domain,
                        &challenge,
                        &client_challenge,
                    )?
                    .to_vec(),
                    nt_response,
                )
            }
            AuthMethod::NtlmV1ExtendedSessionSecurity => {
                return Err(Error::InvalidArgument(
                    "NTLMv1 extended session security requires extended-security negotiation"
                        .to_string(),
                ))
            }
        };

        let conn = self.conn()?.clone();
        let request = SessionSetupRequest::new(
            oem_password,
            unicode_password,
            user_name,
            domain,
            Self::client_capabilities(info),
            CLIENT_MAX_BUFFER_SIZE,
            CLIENT_MAX_MPX_COUNT,
            info.unicode,
        );
        let response = conn.transact(
            Command::SessionSetupAndX,
            0,
            Body::SessionSetupRequest(request),
        )?;
        let Some(response) = response else {
            return Ok(Status::InvalidSmb);
        };
        if response.header.status == Status::Success as u32 {
            conn.uid.store(response.header.uid, Ordering::SeqCst);
            self.logged_in = true;
            log::info!("Session setup complete (uid {})", response.header.uid);
        }
        response.header.status()
    }

    /// Two-step SPNEGO/NTLM session setup over the extended-security
    /// request shape.
    fn login_extended(
        &mut self,
        domain: &str,
        user_name: &str,
        password: &str,
        info: &Smb1NegotiateInfo,
    ) -> crate::Result<Status> {
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

        let capabilities = Self::client_capabilities(info).with_extended_security(true);
        let request = SessionSetupRequestExtended::new(
            negotiate_token,
            capabilities,
            CLIENT_MAX_BUFFER_SIZE,
            CLIENT_MAX_MPX_COUNT,
            info.unicode,
        );
        let response = conn.transact(
            Command::SessionSetupAndX,
            0,
            Body::SessionSetupRequestExtended(request),
        )?;
        let Some(response) = response else {
            return Ok(Status::InvalidSmb);
        };

        // Anything but MORE_PROCESSING_REQUIRED with a challenge body
        // ends the exchange; the status is returned as-is and the
        // session stays logged out.
        if response.header.status != Status::MoreProcessingRequired as u32 {
            return response.header.status();
        }
        let challenge_blob = match response.body {
            Body::SessionSetupResponseExtended(body) => body.security_blob,
            _ => return response.header.status(),
        };

        // The challenge response assigned our UID; mirror it from now on.
        conn.uid.store(response.header.uid, Ordering::SeqCst);

        let Some(authenticate_token) = auth.next(&challenge_blob)? else {
            return Ok(Status::SecEInvalidToken);
        };
        let request = SessionSetupRequestExtended::new(
            authenticate_token,
            capabilities,
            CLIENT_MAX_BUFFER_SIZE,
            CLIENT_MAX_MPX_COUNT,
            info.unicode,
        );
        let response = conn.transact(
            Command::SessionSetupAndX,
            0,
            Body::SessionSetupRequestExtended(request),
        )?;
        let Some(response) = response else {
            return Ok(Status::InvalidSmb);
        };

        if response.header.status == Status::Success as u32 {
            self.logged_in = true;
            self.session_key = auth.session_key().ok();
            log::info!("Session setup complete (uid {})", response.header.uid);
        }
        response.header.status()
    }

    /// Binds to a share, returning its file store. `path` is passed to
    /// the server as-is; use the `\\server\share` form.
    pub fn tree_connect(&mut self, path: &str) -> crate::Result<Smb1FileStore> {
        if !self.is_logged_in() {
            return Err(Error::InvalidState(
                "Tree connect requires a logged-in client".to_string(),
            ));
        }
        let conn = self.conn()?.clone();
        let info = self.negotiate_info.clone().ok_or_else(|| {
            Error::InvalidState("Tree connect requires a negotiated connection".to_string())
        })?;

        log::debug!("Connecting to tree {path}");
        let response = conn
            .transact(
                Command::TreeConnectAndX,
                0,
                Body::TreeConnectRequest(TreeConnectRequest::new(path, SERVICE_ANY, info.unicode)),
            )?
            .ok_or(Error::ServerError(Status::InvalidSmb))?;
        if response.header.status != Status::Success as u32 {
            return Err(Error::ServerError(response.header.status()?));
        }
        let tree_id = response.header.tid;
        log::info!("Connected to tree {path} (#{tree_id})");
        Ok(Smb1FileStore::new(
            conn,
            tree_id,
            &info,
            CLIENT_MAX_BUFFER_SIZE as u32,
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
        let ipc = self.tree_connect(&format!(r"\\{server_name}\IPC$"))?;
        let result = srvsvc::net_share_enum(&ipc, &server_name);
        ipc.disconnect().ok();

        Ok(result?
            .into_iter()
            .filter(|share| share.is_disk())
            .map(|share| share.name)
            .collect())
    }

    /// Round-trips an ECHO request. A single response is expected, so
    /// `count` is sent as 1.
    pub fn echo(&mut self) -> crate::Result<Status> {
        if !self.is_connected() {
            return Err(Error::InvalidState("Echo requires a connected client".to_string()));
        }
        let response = self.conn()?.transact(
            Command::Echo,
            0,
            Body::EchoRequest(EchoRequest {
                echo_count: 1,
                data: vec![0xAA, 0x55],
            }),
        )?;
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
        let response = conn.transact(
            Command::LogoffAndX,
            0,
            Body::LogoffRequest(LogoffRequest::default()),
        )?;
        let status = match response {
            Some(response) => response.header.status()?,
            None => Status::InvalidSmb,
        };
        if status == Status::Success {
            self.logged_in = false;
            self.session_key = None;
            conn.uid.store(0, Ordering::SeqCst);
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

impl Drop for Smb1Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}
