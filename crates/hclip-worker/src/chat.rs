//! Chat monitoring task.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use hclip_chat::{ChatConfig, ChatConnection, ChatRateMonitor, HypeTracker, MonitorConfig};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Connect to chat and feed hype transitions into `tracker` until shutdown.
///
/// Returns `Ok` after a clean shutdown and [`WorkerError::FatalConnection`]
/// when the chat session cannot be kept alive.
pub async fn run_chat(
    config: ChatConfig,
    monitor_config: MonitorConfig,
    tracker: HypeTracker,
    shutdown: watch::Receiver<bool>,
) -> WorkerResult<()> {
    let connection = ChatConnection::connect(&config)
        .await
        .map_err(|e| WorkerError::fatal_connection(e.to_string()))?;
    monitor_chat(connection, ChatRateMonitor::new(monitor_config), tracker, shutdown).await
}

/// Drive `monitor` from an established connection.
pub async fn monitor_chat<S>(
    mut connection: ChatConnection<S>,
    mut monitor: ChatRateMonitor,
    tracker: HypeTracker,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("Chat monitor running");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Shutdown signal received, leaving chat");
                    break;
                }
            }
            result = connection.next_message() => match result {
                Ok(message) => {
                    debug!(user = message.user.as_deref().unwrap_or("-"), "Chat message");
                    if let Some(transition) = monitor.on_message(message.arrived_at) {
                        debug!(kind = transition.kind(), "Applying hype transition");
                        metrics::record_hype_transition(transition.kind());
                        tracker.apply(transition);
                    }
                }
                Err(e) if e.is_fatal() => {
                    return Err(WorkerError::fatal_connection(e.to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "Chat read interrupted");
                }
            }
        }
    }

    if let Err(e) = connection.disconnect().await {
        warn!(error = %e, "Failed to leave chat cleanly");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hclip_chat::RatePolicy;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn chat_config() -> ChatConfig {
        ChatConfig {
            channel: "streamer".to_string(),
            ..Default::default()
        }
    }

    fn fixed_monitor(threshold: usize) -> ChatRateMonitor {
        ChatRateMonitor::new(MonitorConfig {
            policy: RatePolicy::FixedThreshold { threshold },
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_burst_opens_hype_window_and_shutdown_parts() {
        let (client, mut server) = tokio::io::duplex(8192);
        let connection = ChatConnection::handshake(client, &chat_config()).await.unwrap();
        let tracker = HypeTracker::default();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(monitor_chat(
            connection,
            fixed_monitor(2),
            tracker.clone(),
            shutdown_rx,
        ));

        for i in 0..4 {
            let line = format!(":v{0}!v{0}@tmi PRIVMSG #streamer :POG\r\n", i);
            server.write_all(line.as_bytes()).await.unwrap();
        }

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while !tracker.is_active() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(tracker.is_active());

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        let mut sent = String::new();
        server.read_to_string(&mut sent).await.unwrap();
        assert!(sent.contains("JOIN #streamer"));
        assert!(sent.ends_with("PART #streamer\r\n"));
    }

    #[tokio::test]
    async fn test_server_close_is_fatal() {
        let (client, server) = tokio::io::duplex(8192);
        let connection = ChatConnection::handshake(client, &chat_config()).await.unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(server);

        let err = monitor_chat(connection, fixed_monitor(2), HypeTracker::default(), shutdown_rx)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
