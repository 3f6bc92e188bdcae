use std::io::Read;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::inbox::Inbox;
use super::recv_buffer::{RecvBuffer, SessionPacket};

/// Per-dialect decode and admission rules applied by the background
/// reader. Admission may have side effects (the SMB2 implementation
/// grants credits here).
pub trait WireDialect: Send + Sync + 'static {
    type Message: Send + 'static;

    /// Decodes one session message payload. Errors are fatal for the
    /// connection.
    fn decode(&self, payload: &[u8]) -> crate::Result<Self::Message>;

    /// Filters unsolicited messages. `None` drops the message.
    fn admit(&self, message: Self::Message) -> Option<Self::Message>;
}

/// Spawns the background reader: the only thread that reads the socket
/// after connect. It drains complete session packets out of the receive
/// buffer and posts admitted messages to the inbox.
///
/// Terminal conditions (zero-byte read, socket error, negative session
/// response, any decode failure) poison the inbox and close the socket,
/// waking every blocked caller.
pub fn spawn_reader<D: WireDialect>(
    mut stream: TcpStream,
    dialect: D,
    inbox: Arc<Inbox<D::Message>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut buffer = RecvBuffer::new();
        let mut scratch = [0u8; 4096];
        let result = loop {
            match stream.read(&mut scratch) {
                Ok(0) => {
                    log::debug!("Server closed the connection");
                    break Ok(());
                }
                Ok(n) => buffer.append(&scratch[..n]),
                Err(e) => {
                    log::debug!("Socket read failed: {e}");
                    break Err(crate::Error::IoError(e));
                }
            }

            if let Err(e) = drain_packets(&mut buffer, &dialect, &inbox) {
                break Err(e);
            }
        };

        if let Err(e) = result {
            log::error!("Connection reader terminating: {e}");
        }
        stream.shutdown(Shutdown::Both).ok();
        inbox.poison();
    })
}

fn drain_packets<D: WireDialect>(
    buffer: &mut RecvBuffer,
    dialect: &D,
    inbox: &Inbox<D::Message>,
) -> crate::Result<()> {
    while let Some(packet) = buffer.dequeue_packet()? {
        match packet {
            SessionPacket::KeepAlive | SessionPacket::PositiveResponse => {
                log::trace!("Ignoring NetBIOS session service packet");
            }
            SessionPacket::NegativeResponse => {
                return Err(crate::Error::NegotiationError(
                    "Negative session response received".to_string(),
                ));
            }
            SessionPacket::Message(payload) => {
                let message = dialect.decode(&payload)?;
                match dialect.admit(message) {
                    Some(message) => inbox.post(message)?,
                    None => log::debug!("Dropped unsolicited message"),
                }
            }
        }
    }
    Ok(())
}
