//! In-process MQTT 3.1.1 broker over TLS for driving the real channel.
//!
//! Speaks just enough of the protocol for a publishing client: CONNACK,
//! PUBACK, PINGRESP. The server identity is the checked-in fixture pair, so
//! clients must connect with `skip_server_verification`.

#![allow(dead_code)]

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ae_mqtt_channel::ConnectionConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;

pub const FIXTURE_CERT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client.pem");
pub const FIXTURE_KEY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client.key");

/// How the broker answers PUBLISH packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// PUBACK every QoS 1 publish.
    Ack,
    /// Never acknowledge.
    Silent,
    /// Close the socket as soon as a PUBLISH arrives.
    DropOnPublish,
    /// Close the socket right after CONNACK.
    DropAfterConnAck,
    /// Acknowledge the first publish after a delay, ignore the rest.
    LateFirstAck(Duration),
}

/// A publish as seen by the broker.
#[derive(Debug, Clone)]
pub struct Received {
    pub topic: String,
    pub qos: u8,
    pub payload_len: usize,
}

pub struct FakeBroker {
    port: u16,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Received>>>,
    task: JoinHandle<()>,
}

impl FakeBroker {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = TlsAcceptor::from(Arc::new(server_config()));
        let connections = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let connections = connections.clone();
            let received = received.clone();
            tokio::spawn(async move {
                while let Ok((tcp, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let acceptor = acceptor.clone();
                    let received = received.clone();
                    tokio::spawn(async move {
                        if let Ok(stream) = acceptor.accept(tcp).await {
                            serve(stream, behavior, received).await;
                        }
                    });
                }
            })
        };

        Self {
            port,
            connections,
            received,
            task,
        }
    }

    /// Client config pointed at this broker, with a one-second ack timeout.
    pub fn config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new("127.0.0.1", "sensor42")
            .with_client_auth(FIXTURE_CERT, FIXTURE_KEY);
        config.broker_port = self.port;
        config.skip_server_verification = true;
        config.connect_timeout_secs = 5;
        config.publish_timeout_secs = 1;
        config
    }

    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for FakeBroker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn server_config() -> ServerConfig {
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(FIXTURE_CERT).unwrap()))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(FIXTURE_KEY).unwrap()))
        .unwrap()
        .unwrap();
    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap()
}

async fn serve<S>(mut stream: S, behavior: Behavior, received: Arc<Mutex<Vec<Received>>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut publishes = 0usize;
    while let Some((header, body)) = read_packet(&mut stream).await {
        match header >> 4 {
            // CONNECT
            1 => {
                if write(&mut stream, &[0x20, 0x02, 0x00, 0x00]).await.is_err() {
                    return;
                }
                if behavior == Behavior::DropAfterConnAck {
                    return;
                }
            }
            // PUBLISH
            3 => {
                let qos = (header >> 1) & 0x03;
                let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
                let topic = String::from_utf8_lossy(&body[2..2 + topic_len]).into_owned();
                let mut offset = 2 + topic_len;
                let pkid = (qos > 0).then(|| {
                    offset += 2;
                    [body[offset - 2], body[offset - 1]]
                });
                received.lock().unwrap().push(Received {
                    topic,
                    qos,
                    payload_len: body.len() - offset,
                });
                publishes += 1;

                let Some([hi, lo]) = pkid else { continue };
                let ack = [0x40, 0x02, hi, lo];
                let sent = match behavior {
                    Behavior::Ack => write(&mut stream, &ack).await,
                    Behavior::DropOnPublish => return,
                    Behavior::LateFirstAck(delay) if publishes == 1 => {
                        tokio::time::sleep(delay).await;
                        write(&mut stream, &ack).await
                    }
                    _ => Ok(()),
                };
                if sent.is_err() {
                    return;
                }
            }
            // PINGREQ
            12 => {
                if write(&mut stream, &[0xD0, 0x00]).await.is_err() {
                    return;
                }
            }
            // DISCONNECT
            14 => return,
            _ => {}
        }
    }
}

async fn read_packet<S: AsyncRead + Unpin>(stream: &mut S) -> Option<(u8, Vec<u8>)> {
    let header = stream.read_u8().await.ok()?;
    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.ok()?;
        len |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; len];
    stream.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

async fn write<S: AsyncWrite + Unpin>(stream: &mut S, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await
}
