//! In-process WebSocket backend for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use snapwall_live::ConnectionState;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// Instruction for the most recently accepted connection.
pub enum Cmd {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

pub struct TestServer {
    pub port: u16,
    /// `(connection index, decoded JSON frame)` for every text frame received.
    pub frames: mpsc::UnboundedReceiver<(usize, Value)>,
    latest: Arc<Mutex<Option<mpsc::UnboundedSender<Cmd>>>>,
    accepted: Arc<Mutex<usize>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let latest: Arc<Mutex<Option<mpsc::UnboundedSender<Cmd>>>> = Arc::new(Mutex::new(None));
        let accepted = Arc::new(Mutex::new(0usize));

        let latest_slot = Arc::clone(&latest);
        let accepted_count = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let index = {
                    let mut count = accepted_count.lock().unwrap();
                    *count += 1;
                    *count - 1
                };
                let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
                *latest_slot.lock().unwrap() = Some(cmd_tx);
                let frames_tx = frames_tx.clone();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            incoming = ws.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    if let Ok(value) = serde_json::from_str(text.as_str()) {
                                        let _ = frames_tx.send((index, value));
                                    }
                                }
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                            cmd = cmd_rx.recv() => match cmd {
                                Some(Cmd::Text(text)) => {
                                    if ws.send(Message::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Cmd::Binary(bytes)) => {
                                    if ws.send(Message::Binary(bytes.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Cmd::Close) | None => {
                                    let _ = ws.close(None).await;
                                    break;
                                }
                            },
                        }
                    }
                });
            }
        });

        Self {
            port,
            frames,
            latest,
            accepted,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/events/abc123/ws", self.port)
    }

    pub fn accepted(&self) -> usize {
        *self.accepted.lock().unwrap()
    }

    pub fn push(&self, cmd: Cmd) {
        let slot = self.latest.lock().unwrap();
        slot.as_ref().expect("no client connected").send(cmd).ok();
    }

    pub fn push_json(&self, value: Value) {
        self.push(Cmd::Text(value.to_string()));
    }

    /// Next frame from the client, within two seconds.
    pub async fn next_frame(&mut self) -> (usize, Value) {
        timeout(Duration::from_secs(2), self.frames.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("server stopped")
    }

    /// Next frame that is not a heartbeat.
    pub async fn next_non_ping(&mut self) -> (usize, Value) {
        loop {
            let frame = self.next_frame().await;
            if frame.1["type"] != "ping" {
                return frame;
            }
        }
    }
}

/// A port with nothing listening on it.
pub async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub async fn wait_for_state(states: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    timeout(Duration::from_secs(5), states.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want:?}"))
        .expect("state channel closed");
}
