//! Authentication: the SPNEGO/NTLM token exchange used by extended
//! security (both dialects), and the raw NTLM response computations used
//! by the SMB1 pre-extended-security path.

pub mod ntlm;

use sspi::{
    ntlm::{Ntlm, NtlmConfig},
    AcquireCredentialsHandleResult, AuthIdentity, AuthIdentityBuffers, BufferType,
    ClientRequestFlags, CredentialUse, DataRepresentation, InitializeSecurityContextResult,
    Secret, SecurityBuffer, SecurityStatus, Sspi, SspiImpl, Username,
};

use crate::Error;

/// The NTLM flavor used by `login`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NtlmV1,
    NtlmV1ExtendedSessionSecurity,
    NtlmV2,
}

/// Drives the NTLM Negotiate -> Challenge -> Authenticate exchange for
/// the extended-security session setup paths.
pub struct Authenticator {
    ssp: Ntlm,
    cred_handle: AcquireCredentialsHandleResult<Option<AuthIdentityBuffers>>,
    current_state: Option<InitializeSecurityContextResult>,
}

impl Authenticator {
    pub fn build(
        domain: &str,
        user_name: &str,
        password: String,
        client_machine_name: &str,
    ) -> crate::Result<Authenticator> {
        let username = Username::new(user_name, Some(domain))
            .map_err(|e| Error::UsernameError(e.to_string()))?;
        let identity = AuthIdentity {
            username,
            password: Secret::new(password),
        };
        let mut ssp = Ntlm::with_config(NtlmConfig {
            client_computer_name: Some(client_machine_name.to_string()),
        });
        let cred_handle = ssp
            .acquire_credentials_handle()
            .with_credential_use(CredentialUse::Outbound)
            .with_auth_data(&identity)
            .execute(&mut ssp)?;

        Ok(Authenticator {
            ssp,
            cred_handle,
            current_state: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.current_state.as_ref().map(|s| s.status),
            Some(SecurityStatus::Ok)
        )
    }

    fn context_requirements() -> ClientRequestFlags {
        ClientRequestFlags::MUTUAL_AUTH
            | ClientRequestFlags::INTEGRITY
            | ClientRequestFlags::FRAGMENT_TO_FIT
            | ClientRequestFlags::USE_SESSION_KEY
    }

    /// Feeds the server's token (empty for the first round) into the
    /// security context and returns the next token to send, or `None`
    /// when the exchange produced nothing further.
    pub fn next(&mut self, input_token: &[u8]) -> crate::Result<Option<Vec<u8>>> {
        if self.is_authenticated() {
            return Ok(None);
        }

        let mut output_buffer = vec![SecurityBuffer::new(Vec::new(), BufferType::Token)];
        let mut builder = self
            .ssp
            .initialize_security_context()
            .with_credentials_handle(&mut self.cred_handle.credentials_handle)
            .with_context_requirements(Self::context_requirements())
            .with_target_data_representation(DataRepresentation::Native)
            .with_output(&mut output_buffer);

        let mut input_buffers = vec![SecurityBuffer::new(input_token.to_vec(), BufferType::Token)];
        if !input_token.is_empty() {
            builder = builder.with_input(&mut input_buffers);
        }

        let result = {
            let mut generator = self.ssp.initialize_security_context_impl(&mut builder)?;
            generator.resolve_to_result()?
        };
        self.current_state = Some(result);

        let token = output_buffer
            .pop()
            .map(|buf| buf.buffer)
            .filter(|buf| !buf.is_empty());
        Ok(token)
    }

    /// The 16-byte session key of a completed exchange.
    pub fn session_key(&self) -> crate::Result<[u8; 16]> {
        let key_info = self.ssp.query_context_session_key()?;
        let key = key_info.session_key.as_ref();
        key[..16]
            .try_into()
            .map_err(|_| Error::InvalidState("session key too short".to_string()))
    }
}
