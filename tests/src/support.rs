use std::net::SocketAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uascout_core::discovery::EventEmitter;
use uascout_protocols::ua::{self, Acknowledge, ErrorMessage, Message, HEADER_LEN};

/// How a stand-in server answers a hello.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Acknowledge,
    Error,
    Http,
    Silent,
}

/// Serves `reply` to every connection on an ephemeral loopback port.
pub async fn serve(reply: Reply) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut header = [0u8; HEADER_LEN];
                if socket.read_exact(&mut header).await.is_err() {
                    return;
                }
                if let Ok((_, size)) = ua::decode_header(&header) {
                    let mut body = vec![0u8; (size as usize).saturating_sub(HEADER_LEN)];
                    if socket.read_exact(&mut body).await.is_err() {
                        return;
                    }
                }
                let bytes: Vec<u8> = match reply {
                    Reply::Acknowledge => Message::Acknowledge(Acknowledge::default()).encode().unwrap(),
                    Reply::Error => Message::Error(ErrorMessage {
                        error: 0x8083_0000,
                        reason: "endpoint url rejected".to_string(),
                    })
                    .encode()
                    .unwrap(),
                    Reply::Http => b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec(),
                    Reply::Silent => {
                        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                        return;
                    }
                };
                let _ = socket.write_all(&bytes).await;
            });
        }
    });
    addr
}

/// A loopback port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[derive(Default)]
pub struct RecordingEmitter {
    pub batches: Mutex<Vec<Vec<Vec<u8>>>>,
}

#[async_trait]
impl EventEmitter for RecordingEmitter {
    async fn send(&self, messages: Vec<Vec<u8>>, _content_type: &str) -> anyhow::Result<()> {
        self.batches.lock().unwrap().push(messages);
        Ok(())
    }
}
