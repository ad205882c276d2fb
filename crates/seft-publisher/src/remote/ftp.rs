//! FTP implementation of the remote store
//!
//! `suppaftp`'s blocking client does the protocol work. Each call runs on
//! tokio's blocking pool: the session moves its `FtpStream` into the blocking
//! task and takes it back afterwards, so the stream is never touched by two
//! threads at once and async workers are never stalled by socket I/O.
//!
//! All sessions use Extended Passive Mode (EPSV) for better NAT/firewall
//! compatibility and binary transfer type.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::ToSocketAddrs;
use suppaftp::types::{FileType, FtpResult};
use suppaftp::{FtpStream, Mode};
use tracing::{debug, warn};

use super::{FileMeta, RemoteSession, Session, SessionConnector};
use crate::config::FtpConfig;
use crate::error::{TransferError, TransferResult};

/// Opens FTP sessions with the configured address and credentials
#[derive(Debug, Clone)]
pub struct FtpConnector {
    config: FtpConfig,
}

impl FtpConnector {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    /// Connect, log in, switch to binary EPSV and enter the working directory
    fn handshake_sync(config: &FtpConfig) -> Result<FtpStream> {
        let address = config.address();
        let socket = address
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}", address))?
            .next()
            .with_context(|| format!("No address found for {}", address))?;

        debug!("Connecting to FTP server: {}", address);
        let mut stream = FtpStream::connect_timeout(socket, config.connect_timeout())
            .context("Failed to connect to FTP server")?;

        stream.set_mode(Mode::ExtendedPassive);

        debug!("Logging in as: {}", config.username);
        stream
            .login(&config.username, &config.password)
            .context("Failed to login to FTP server")?;

        stream
            .transfer_type(FileType::Binary)
            .context("Failed to set binary mode")?;

        stream
            .cwd(&config.working_directory)
            .with_context(|| format!("Failed to enter {}", config.working_directory))?;

        Ok(stream)
    }
}

#[async_trait]
impl SessionConnector for FtpConnector {
    fn address(&self) -> String {
        self.config.address()
    }

    async fn connect(&self) -> TransferResult<Session> {
        let config = self.config.clone();
        let address = self.config.address();

        let stream = tokio::task::spawn_blocking(move || Self::handshake_sync(&config))
            .await
            .map_err(|e| TransferError::Connect {
                address: address.clone(),
                reason: format!("FTP handshake task panicked: {}", e),
            })?
            .map_err(|e| TransferError::Connect {
                address: address.clone(),
                reason: format!("{:#}", e),
            })?;

        Ok(Box::new(FtpSession {
            stream: Some(stream),
            working_directory: self.config.working_directory.clone(),
        }))
    }
}

/// One logged-in FTP control connection
pub struct FtpSession {
    /// `None` once closed, or if a blocking call panicked while holding it
    stream: Option<FtpStream>,
    working_directory: String,
}

impl FtpSession {
    /// Run a blocking FTP command against this session's stream
    async fn run<T, F>(&mut self, command: F) -> std::result::Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> FtpResult<T> + Send + 'static,
    {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| "FTP session is closed".to_string())?;

        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = command(&mut stream);
            (stream, result)
        })
        .await
        .map_err(|e| format!("FTP task panicked: {}", e))?;

        self.stream = Some(stream);
        result.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl RemoteSession for FtpSession {
    async fn list(&mut self) -> TransferResult<Vec<FileMeta>> {
        let lines = self
            .run(|stream| stream.list(None))
            .await
            .map_err(|reason| TransferError::List {
                path: self.working_directory.clone(),
                reason,
            })?;

        Ok(lines.iter().filter_map(|line| parse_list_line(line)).collect())
    }

    async fn retrieve(&mut self, name: &str) -> TransferResult<Vec<u8>> {
        let path = name.to_string();
        let data = self
            .run(move |stream| stream.retr_as_buffer(&path).map(|cursor| cursor.into_inner()))
            .await
            .map_err(|reason| TransferError::Retrieve {
                file: name.to_string(),
                reason,
            })?;

        debug!("Downloaded {} bytes from {}", data.len(), name);
        Ok(data)
    }

    async fn delete(&mut self, name: &str) -> TransferResult<()> {
        let path = name.to_string();
        self.run(move |stream| stream.rm(&path))
            .await
            .map_err(|reason| TransferError::Delete {
                file: name.to_string(),
                reason,
            })
    }

    async fn noop(&mut self) -> TransferResult<()> {
        self.run(|stream| stream.noop())
            .await
            .map_err(|reason| TransferError::Connect {
                address: self.working_directory.clone(),
                reason,
            })
    }

    async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        match tokio::task::spawn_blocking(move || stream.quit()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => warn!("Failed to quit FTP session gracefully: {}", e),
            Err(e) => warn!("FTP quit task panicked: {}", e),
        }
    }
}

/// Parse one LIST line into a [`FileMeta`]
///
/// Handles the two common server formats:
/// `-rw-r--r--   1 ftp ftp  1234 Jan 15 12:00 survey 1.xlsx` (Unix) and
/// `01-15-24  12:00PM       1234 survey.xlsx` (MS-DOS).
pub fn parse_list_line(line: &str) -> Option<FileMeta> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }

    if parts[0].starts_with(|c: char| c.is_ascii_digit()) {
        let is_directory = parts[2].eq_ignore_ascii_case("<DIR>");
        return Some(FileMeta {
            name: remainder_after(line, 3)?.to_string(),
            is_directory,
            size: if is_directory { None } else { parts[2].parse().ok() },
        });
    }

    let name = if parts.len() >= 9 {
        remainder_after(line, 8)?
    } else {
        *parts.last()?
    };

    Some(FileMeta {
        name: name.to_string(),
        is_directory: parts[0].starts_with('d'),
        size: parts.get(4).and_then(|s| s.parse().ok()),
    })
}

/// The rest of `line` after skipping `fields` whitespace-separated fields
///
/// Whitespace inside the remainder is kept as sent by the server.
fn remainder_after(line: &str, fields: usize) -> Option<&str> {
    let mut rest = line.trim_start();
    for _ in 0..fields {
        let end = rest.find(char::is_whitespace)?;
        rest = rest[end..].trim_start();
    }
    let rest = rest.trim_end_matches(['\r', '\n']);
    (!rest.is_empty()).then_some(rest)
}
