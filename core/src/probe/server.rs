use std::net::SocketAddr;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};
use uascout_protocols::ua::{self, Hello, HEADER_LEN, Message, MessageType};

use super::AsyncProbe;

/// Confirms an OPC UA TCP stack by sending `HEL` and waiting for the answer.
///
/// An `ACK` is a hit. So is an `ERR`: only an OPC UA stack answers a hello with one,
/// even when it rejects the endpoint url.
#[derive(Debug, Default)]
pub struct UaServerProbe {
    attempts: usize,
}

impl UaServerProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AsyncProbe for UaServerProbe {
    fn reset(&mut self) -> bool {
        true
    }

    async fn interrogate(&mut self, stream: &mut TcpStream, endpoint: SocketAddr) -> anyhow::Result<bool> {
        self.attempts += 1;
        let hello: Vec<u8> = Message::Hello(Hello::new(format!("opc.tcp://{endpoint}")))
            .encode()
            .context("encoding hello")?;
        stream.write_all(&hello).await.context("sending hello")?;

        let mut header = [0u8; HEADER_LEN];
        stream
            .read_exact(&mut header)
            .await
            .context("reading response header")?;
        let (message_type, size) = match ua::decode_header(&header) {
            Ok(decoded) => decoded,
            Err(e) => {
                trace!("{endpoint} answered with a foreign header: {e}");
                return Ok(false);
            }
        };

        if message_type == MessageType::Hello {
            return Ok(false);
        }

        let mut message: Vec<u8> = vec![0u8; size as usize];
        message[..HEADER_LEN].copy_from_slice(&header);
        stream
            .read_exact(&mut message[HEADER_LEN..])
            .await
            .context("reading response body")?;

        match Message::decode(&message) {
            Ok(Message::Acknowledge(_)) => Ok(true),
            Ok(Message::Error(err)) => {
                debug!(
                    "{endpoint} rejected hello with 0x{:08X}: {}",
                    err.error, err.reason
                );
                Ok(true)
            }
            Ok(Message::Hello(_)) => Ok(false),
            Err(e) => {
                trace!("{endpoint} sent a malformed response: {e}");
                Ok(false)
            }
        }
    }

    fn dispose(&mut self) {
        trace!("OPC UA probe done after {} handshakes", self.attempts);
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
