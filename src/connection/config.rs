use std::time::Duration;

use crate::connection::transport::TransportKind;
use crate::packets::guid::Guid;

/// Client configuration shared by both dialects.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The transport to connect over. Defaults to Direct TCP (port 445).
    pub transport: TransportKind,

    /// Overrides the transport's default port.
    pub port: Option<u16>,

    /// Response/credit wait timeout for SMB2 operations.
    /// SMB1 responses use a fixed 5 second wait instead.
    pub timeout: Duration,

    /// The local machine name, used for the NetBIOS calling name and the
    /// NTLMv2 client challenge. Never read from the environment.
    pub machine_name: String,

    /// SMB1 only: reject servers that answer the negotiate without
    /// extended security.
    pub force_extended_security: bool,

    /// SMB2 only: fixes the client GUID instead of generating one per
    /// negotiate.
    pub client_guid: Option<Guid>,
}

impl ClientConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            transport: TransportKind::DirectTcp,
            port: None,
            timeout: Self::DEFAULT_TIMEOUT,
            machine_name: "SMBCLIENT".to_string(),
            force_extended_security: false,
            client_guid: None,
        }
    }
}
