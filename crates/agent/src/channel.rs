// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control channel to the cloud controller.
//!
//! One full-duplex websocket, mutual TLS when client certificate material
//! is configured. The reader dispatches each frame on its own task so a
//! slow handler never stalls the channel; the writer drains an outbound
//! queue shared by replies and the 5-second heartbeat emitter, which runs
//! independently of request handling.

use crate::context::AgentContext;
use crate::dispatcher::TopicRegistry;
use anyhow::Context as _;
use chrono::{SecondsFormat, Utc};
use futures_util::{SinkExt, StreamExt};
use orc_wire::{Envelope, Heartbeat};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, connect_async_tls_with_config, Connector};
use tracing::{debug, error, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Connect once and serve the session until the peer goes away.
pub async fn run_session(ctx: Arc<AgentContext>, registry: Arc<TopicRegistry>) -> anyhow::Result<()> {
    let url = crate::env::server_url();
    info!(url = %url, "connecting to control channel");

    let stream = match tls_connector()? {
        Some(connector) => {
            let (stream, _) =
                connect_async_tls_with_config(url.as_str(), None, false, Some(connector))
                    .await
                    .context("TLS websocket connect failed")?;
            stream
        }
        None => {
            let (stream, _) = connect_async(url.as_str()).await.context("websocket connect failed")?;
            stream
        }
    };
    info!("control channel established");

    let (mut sink, mut source) = stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(64);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if let Err(e) = sink.send(message).await {
                warn!(error = %e, "control channel write failed");
                break;
            }
        }
    });
    let heartbeat = tokio::spawn(heartbeat_loop(outbound_tx.clone(), ctx.clone()));

    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let envelope = match Envelope::parse(text.as_str()) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        error!(error = %e, "failed to decode control message");
                        continue;
                    }
                };
                debug!(topic = %envelope.topic, "received control message");
                let ctx = ctx.clone();
                let registry = registry.clone();
                let outbound = outbound_tx.clone();
                tokio::spawn(async move {
                    if let Some(reply) = registry.dispatch(ctx, envelope).await {
                        match reply.to_frame() {
                            Ok(frame) => {
                                let _ = outbound.send(Message::Text(frame.into())).await;
                            }
                            Err(e) => error!(error = %e, "failed to encode reply"),
                        }
                    }
                });
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(_)) => {
                info!("control channel closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "control channel read error");
                break;
            }
        }
    }

    heartbeat.abort();
    writer.abort();
    Ok(())
}

/// Periodic heartbeat, independent of the request queue: a slow handler
/// cannot block it because it writes straight to the outbound channel.
async fn heartbeat_loop(outbound: mpsc::Sender<Message>, ctx: Arc<AgentContext>) {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // first tick is immediate; heartbeats start one interval in
    loop {
        interval.tick().await;
        let snapshot = ctx.stats.latest();
        let heartbeat = Heartbeat {
            cpu_usage: snapshot.cpu_pct,
            memory_usage: snapshot.memory_mb,
            disk_usage: snapshot.disk_mb,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        let envelope = Envelope::new("heartbeat", heartbeat);
        let Ok(frame) = envelope.to_frame() else { continue };
        if outbound.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }
}

/// Client-auth TLS connector from the configured certificate material, or
/// None to use the default connector (dev setups without mTLS).
fn tls_connector() -> anyhow::Result<Option<Connector>> {
    let Some(paths) = crate::env::tls_paths() else {
        return Ok(None);
    };

    let ca_file = std::fs::File::open(&paths.ca)
        .with_context(|| format!("opening CA bundle {}", paths.ca.display()))?;
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut std::io::BufReader::new(ca_file)) {
        roots.add(cert.context("reading CA certificate")?)?;
    }

    let cert_file = std::fs::File::open(&paths.cert)
        .with_context(|| format!("opening client certificate {}", paths.cert.display()))?;
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .context("reading client certificate chain")?;

    let key_file = std::fs::File::open(&paths.key)
        .with_context(|| format!("opening client key {}", paths.key.display()))?;
    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_file))
        .context("reading client key")?
        .context("no private key found")?;

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .context("building TLS client config")?;
    Ok(Some(Connector::Rustls(Arc::new(config))))
}
