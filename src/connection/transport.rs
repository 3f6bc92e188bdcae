use std::io::{Cursor, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use binrw::prelude::*;

use crate::packets::netbios::{
    NbNegativeResponseCode, NbSessionRequest, NbssPacketHeader, NbssPacketType, NetBiosName,
};
use crate::Error;

/// Which framed transport to speak.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// SMB over TCP, port 445.
    #[default]
    DirectTcp,
    /// NetBIOS session service, port 139, with a session request before
    /// any SMB traffic.
    NetBios,
}

impl TransportKind {
    pub fn default_port(&self) -> u16 {
        match self {
            TransportKind::DirectTcp => 445,
            TransportKind::NetBios => 139,
        }
    }
}

/// A connected framed transport. Splittable into the write half kept by
/// the connection and the read half moved into the background reader.
pub struct Transport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Transport {
    /// Connects to `server`, performing the NetBIOS session setup when
    /// the transport requires it.
    pub fn connect(
        kind: TransportKind,
        server: &str,
        port: Option<u16>,
        machine_name: &str,
    ) -> crate::Result<Transport> {
        let port = port.unwrap_or(kind.default_port());
        let addr = (server, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("{server}:{port}")))?;

        log::debug!("Connecting to {addr} ({kind:?})");
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let mut transport = Transport { stream, peer };

        if kind == TransportKind::NetBios {
            transport.netbios_session_setup(machine_name)?;
        }

        log::info!("Connected to {peer}");
        Ok(transport)
    }

    /// Sends the NetBIOS session request and waits for a positive
    /// response. Runs before the background reader exists, so it reads
    /// the socket directly.
    fn netbios_session_setup(&mut self, machine_name: &str) -> crate::Result<()> {
        let request = NbSessionRequest {
            called_name: NetBiosName::new(
                NetBiosName::SMB_SERVER_NAME.to_string(),
                NetBiosName::FILE_SERVER_SUFFIX,
            ),
            calling_name: NetBiosName::new(
                machine_name.to_string(),
                NetBiosName::WORKSTATION_SUFFIX,
            ),
        };
        let mut body = Cursor::new(Vec::new());
        request.write(&mut body)?;
        let body = body.into_inner();

        log::debug!("Sending NetBIOS session request");
        self.send_packet(NbssPacketType::SessionRequest, &body)?;

        let mut header_buf = [0u8; NbssPacketHeader::SIZE];
        self.stream.read_exact(&mut header_buf)?;
        let header = NbssPacketHeader::read(&mut Cursor::new(&header_buf))?;
        let mut trailer = vec![0u8; header.length as usize];
        self.stream.read_exact(&mut trailer)?;

        match header.ptype {
            NbssPacketType::PositiveSessionResponse => {
                log::debug!("NetBIOS session established");
                Ok(())
            }
            NbssPacketType::NegativeSessionResponse => {
                let code = NbNegativeResponseCode::read(&mut Cursor::new(&trailer)).ok();
                self.stream.shutdown(Shutdown::Both).ok();
                Err(Error::NegotiationError(format!(
                    "NetBIOS session refused: {code:?}"
                )))
            }
            other => {
                self.stream.shutdown(Shutdown::Both).ok();
                Err(Error::InvalidMessage(format!(
                    "Unexpected NetBIOS session response: {other:?}"
                )))
            }
        }
    }

    fn send_packet(&mut self, ptype: NbssPacketType, payload: &[u8]) -> crate::Result<()> {
        let mut packet = Cursor::new(Vec::with_capacity(NbssPacketHeader::SIZE + payload.len()));
        NbssPacketHeader {
            ptype,
            length: payload.len() as u32,
        }
        .write(&mut packet)?;
        packet.write_all(payload)?;
        self.stream.write_all(&packet.into_inner())?;
        Ok(())
    }

    pub fn peer_ip(&self) -> IpAddr {
        self.peer.ip()
    }

    /// Splits into the reader-thread half and the sender half.
    pub fn split(self) -> crate::Result<(TcpStream, TransportWriter)> {
        let read_half = self.stream.try_clone()?;
        Ok((
            read_half,
            TransportWriter {
                stream: self.stream,
            },
        ))
    }
}

/// The write half of a framed transport. Every payload goes out wrapped
/// in a Session Message packet.
pub struct TransportWriter {
    stream: TcpStream,
}

impl TransportWriter {
    /// Sends one SMB message. Send failures are swallowed by design: the
    /// caller observes them as a response timeout.
    pub fn send_message(&mut self, payload: &[u8]) {
        if let Err(e) = self.try_send(payload) {
            log::warn!("Failed to send {} bytes: {e}", payload.len());
        }
    }

    fn try_send(&mut self, payload: &[u8]) -> crate::Result<()> {
        let mut packet = Cursor::new(Vec::with_capacity(NbssPacketHeader::SIZE + payload.len()));
        NbssPacketHeader {
            ptype: NbssPacketType::SessionMessage,
            length: payload.len() as u32,
        }
        .write(&mut packet)?;
        packet.write_all(payload)?;
        self.stream.write_all(&packet.into_inner())?;
        log::trace!("Sent {} bytes", payload.len());
        Ok(())
    }

    /// Closes both socket directions, unblocking the reader thread.
    pub fn shutdown(&self) {
        self.stream.shutdown(Shutdown::Both).ok();
    }
}
