//! Line-oriented IRC chat session.
//!
//! Only three things matter on the wire: logging in, answering keep-alive
//! PINGs, and noticing that a PRIVMSG arrived. Everything else is ignored.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::io::{
    split, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A chat message with its local arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub arrived_at: DateTime<Utc>,
    pub user: Option<String>,
    pub text: String,
}

/// Classification of one protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine {
    /// Server keep-alive carrying the payload to echo back
    Ping(String),
    /// Reply to our own liveness probe
    Pong,
    Message { user: Option<String>, text: String },
    /// Anything else, including malformed lines
    Other,
}

/// Classify a raw line.
pub fn parse_line(line: &str) -> ChatLine {
    let line = line.trim_end_matches(&['\r', '\n'][..]);

    if let Some(payload) = line.strip_prefix("PING") {
        return ChatLine::Ping(payload.trim().to_string());
    }

    // Skip IRCv3 tags and take the prefix, if any
    let rest = match line.strip_prefix('@') {
        Some(tagged) => match tagged.split_once(' ') {
            Some((_, rest)) => rest,
            None => return ChatLine::Other,
        },
        None => line,
    };
    let (prefix, rest) = match rest.strip_prefix(':') {
        Some(prefixed) => match prefixed.split_once(' ') {
            Some((prefix, rest)) => (Some(prefix), rest),
            None => return ChatLine::Other,
        },
        None => (None, rest),
    };

    let mut parts = rest.splitn(2, ' ');
    match parts.next() {
        Some("PONG") => ChatLine::Pong,
        Some("PRIVMSG") => {
            let Some((_target, text)) = parts.next().and_then(|p| p.split_once(" :")) else {
                return ChatLine::Other;
            };
            let user = prefix
                .and_then(|p| p.split('!').next())
                .filter(|u| !u.is_empty())
                .map(str::to_string);
            ChatLine::Message {
                user,
                text: text.to_string(),
            }
        }
        _ => ChatLine::Other,
    }
}

/// An authenticated, joined chat session.
pub struct ChatConnection<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    channel: String,
    read_timeout: Duration,
    probe_pending: bool,
    /// Bytes of the line being read; survives a timed-out read
    buf: Vec<u8>,
}

impl ChatConnection<TcpStream> {
    /// Open a TCP session and join the configured channel.
    pub async fn connect(config: &ChatConfig) -> ChatResult<Self> {
        config.validate()?;
        let address = config.address();

        let stream = tokio::time::timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| ChatError::Connect {
            address: address.clone(),
            message: "timed out".to_string(),
        })?
        .map_err(|e| ChatError::Connect {
            address: address.clone(),
            message: e.to_string(),
        })?;

        info!(address = %address, channel = %config.channel_tag(), "Connected to chat");
        Self::handshake(stream, config).await
    }
}

impl<S> ChatConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Log in and join on an already open stream.
    pub async fn handshake(stream: S, config: &ChatConfig) -> ChatResult<Self> {
        let (reader, writer) = split(stream);
        let mut conn = Self {
            reader: BufReader::new(reader),
            writer,
            channel: config.channel_tag(),
            read_timeout: Duration::from_secs(config.read_timeout_secs.max(1)),
            probe_pending: false,
            buf: Vec::new(),
        };

        if let Some(token) = &config.token {
            let token = if token.starts_with("oauth:") {
                token.clone()
            } else {
                format!("oauth:{}", token)
            };
            conn.send(&format!("PASS {}", token)).await?;
        }
        conn.send(&format!("NICK {}", config.nick)).await?;
        let join = format!("JOIN {}", conn.channel);
        conn.send(&join).await?;

        debug!(channel = %conn.channel, "Joined channel");
        Ok(conn)
    }

    async fn send(&mut self, line: &str) -> ChatResult<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Wait for the next chat message, answering PINGs along the way.
    ///
    /// A read timeout sends one liveness probe and returns
    /// [`ChatError::ReadTimeout`]; a second silent timeout is a lost connection.
    /// A line cut short by a timeout is completed on the next call. Invalid
    /// UTF-8 is replaced, never fatal.
    pub async fn next_message(&mut self) -> ChatResult<ChatMessage> {
        loop {
            let read = tokio::time::timeout(
                self.read_timeout,
                self.reader.read_until(b'\n', &mut self.buf),
            )
            .await;

            let bytes = match read {
                Ok(result) => result?,
                Err(_) if self.probe_pending => {
                    return Err(ChatError::connection_lost("no reply to liveness probe"));
                }
                Err(_) => {
                    warn!(channel = %self.channel, "No chat traffic, probing connection");
                    self.send("PING :hclip").await?;
                    self.probe_pending = true;
                    return Err(ChatError::ReadTimeout(self.read_timeout.as_secs()));
                }
            };
            if bytes == 0 {
                return Err(ChatError::connection_lost("server closed the connection"));
            }
            self.probe_pending = false;

            let line = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();

            match parse_line(&line) {
                ChatLine::Ping(payload) => {
                    let pong = format!("PONG {}", payload);
                    self.send(pong.trim_end()).await?;
                    trace!("Answered keep-alive");
                }
                ChatLine::Message { user, text } => {
                    return Ok(ChatMessage {
                        arrived_at: Utc::now(),
                        user,
                        text,
                    });
                }
                ChatLine::Pong | ChatLine::Other => {}
            }
        }
    }

    /// Leave the channel and close the write side.
    pub async fn disconnect(mut self) -> ChatResult<()> {
        let part = format!("PART {}", self.channel);
        self.send(&part).await?;
        self.writer.shutdown().await?;
        info!(channel = %self.channel, "Disconnected from chat");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn config() -> ChatConfig {
        ChatConfig {
            nick: "hypebot".to_string(),
            token: Some("abc123".to_string()),
            channel: "Streamer".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_privmsg() {
        let line = ":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #streamer :POGGERS that was insane\r\n";
        assert_eq!(
            parse_line(line),
            ChatLine::Message {
                user: Some("viewer".to_string()),
                text: "POGGERS that was insane".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_tagged_privmsg() {
        let line = "@badge-info=;color=#FF0000 :fan!fan@fan.tmi.twitch.tv PRIVMSG #streamer :W";
        assert!(matches!(parse_line(line), ChatLine::Message { text, .. } if text == "W"));
    }

    #[test]
    fn test_parse_ping_and_noise() {
        assert_eq!(
            parse_line("PING :tmi.twitch.tv"),
            ChatLine::Ping(":tmi.twitch.tv".to_string())
        );
        assert_eq!(parse_line(":tmi.twitch.tv 001 hypebot :Welcome, GLHF!"), ChatLine::Other);
        assert_eq!(parse_line(":tmi.twitch.tv PONG tmi.twitch.tv :hclip"), ChatLine::Pong);
    }

    #[test]
    fn test_malformed_privmsg_is_dropped() {
        assert_eq!(parse_line(":viewer PRIVMSG #streamer"), ChatLine::Other);
        assert_eq!(parse_line(":broken"), ChatLine::Other);
        assert_eq!(parse_line("@tags-only"), ChatLine::Other);
        assert_eq!(parse_line(""), ChatLine::Other);
    }

    #[tokio::test]
    async fn test_handshake_ping_and_message() {
        let stream = Builder::new()
            .write(b"PASS oauth:abc123\r\n")
            .write(b"NICK hypebot\r\n")
            .write(b"JOIN #streamer\r\n")
            .read(b":tmi.twitch.tv 001 hypebot :Welcome\r\n")
            .read(b"PING :tmi.twitch.tv\r\n")
            .write(b"PONG :tmi.twitch.tv\r\n")
            .read(b":a!a@a.tmi.twitch.tv PRIVMSG #streamer :KEKW\r\n")
            .build();

        let mut conn = ChatConnection::handshake(stream, &config()).await.unwrap();
        let message = conn.next_message().await.unwrap();
        assert_eq!(message.text, "KEKW");
        assert_eq!(message.user.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_eof_is_fatal() {
        let stream = Builder::new()
            .write(b"NICK justinfan31415\r\n")
            .write(b"JOIN #streamer\r\n")
            .read(b":bad line\r\n")
            .build();

        let anonymous = ChatConfig {
            channel: "streamer".to_string(),
            ..Default::default()
        };
        let mut conn = ChatConnection::handshake(stream, &anonymous).await.unwrap();
        let err = conn.next_message().await.unwrap_err();
        assert!(matches!(err, ChatError::ConnectionLost(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_kept() {
        let stream = Builder::new()
            .write(b"PASS oauth:abc123\r\n")
            .write(b"NICK hypebot\r\n")
            .write(b"JOIN #streamer\r\n")
            .read(b":a!a@a.tmi.twitch.tv PRIVMSG #streamer :caf\xe9\r\n")
            .read(b":b!b@b.tmi.twitch.tv PRIVMSG #streamer :LUL\r\n")
            .build();

        let mut conn = ChatConnection::handshake(stream, &config()).await.unwrap();
        let first = conn.next_message().await.unwrap();
        assert_eq!(first.text, "caf\u{FFFD}");
        let second = conn.next_message().await.unwrap();
        assert_eq!(second.text, "LUL");
        assert_eq!(second.user.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_line_split_across_timeout_is_resumed() {
        let stream = Builder::new()
            .write(b"PASS oauth:abc123\r\n")
            .write(b"NICK hypebot\r\n")
            .write(b"JOIN #streamer\r\n")
            .read(b":a!a@a.tmi.twitch.tv PRIVMSG #streamer :Pog")
            .write(b"PING :hclip\r\n")
            .read(b"Champ\r\n")
            .build();

        let cfg = ChatConfig {
            read_timeout_secs: 1,
            ..config()
        };
        let mut conn = ChatConnection::handshake(stream, &cfg).await.unwrap();

        let err = conn.next_message().await.unwrap_err();
        assert!(matches!(err, ChatError::ReadTimeout(1)));
        assert!(!err.is_fatal());

        let message = conn.next_message().await.unwrap();
        assert_eq!(message.text, "PogChamp");
    }
}
