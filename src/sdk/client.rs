use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::model::Book;
use crate::{Catalog, CatalogReader, CatalogSearcher, CatalogWriter, Error, Result};

const MAX_ATTEMPTS: u64 = 3;

/// Remote catalog speaking the daemon's line protocol.
pub struct Client {
    addr: String,
    inner: Mutex<Option<ClientInner>>,
}

struct ClientInner {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

/// A successful reply.
#[derive(Debug, PartialEq, Eq)]
enum Reply {
    Ok(String),
    NotFound,
}

fn parse_reply(line: &str) -> Result<Reply> {
    let (status, payload) = line.split_once(' ').unwrap_or((line, ""));
    match status {
        "OK" | "PONG" => Ok(Reply::Ok(payload.to_string())),
        "NOT_FOUND" => Ok(Reply::NotFound),
        "INVALID" => Err(Error::Rejected(payload.to_string())),
        "ERR" => Err(Error::Remote(payload.to_string())),
        _ => Err(Error::Protocol(format!("unexpected response status {:?}", status))),
    }
}

/// Request arguments must stay on one line.
fn single_line(arg: &str) -> String {
    arg.replace(['\r', '\n'], " ")
}

impl Client {
    pub async fn connect(addr: &str) -> Result<Self> {
        let inner = Client::connect_inner(addr).await?;
        Ok(Self {
            addr: addr.to_string(),
            inner: Mutex::new(Some(inner)),
        })
    }

    pub async fn ping(&self) -> Result<()> {
        self.send_and_receive("PING".to_string()).await?;
        Ok(())
    }

    async fn send_and_receive(&self, cmd: String) -> Result<Reply> {
        let mut inner_guard = self.inner.lock().await;

        // Reconnect on broken connections
        for attempt in 0..MAX_ATTEMPTS {
            if inner_guard.is_none() {
                match Client::connect_inner(&self.addr).await {
                    Ok(inner) => *inner_guard = Some(inner),
                    Err(e) => {
                        if attempt + 1 == MAX_ATTEMPTS {
                            return Err(e);
                        }
                        tokio::time::sleep(std::time::Duration::from_millis((attempt + 1) * 200)).await;
                        continue;
                    }
                }
            }

            let Some(inner) = inner_guard.as_mut() else {
                continue;
            };
            if inner.writer.write_all(format!("{}\n", cmd).as_bytes()).await.is_err() {
                *inner_guard = None;
                continue;
            }

            let mut resp = String::new();
            match inner.reader.read_line(&mut resp).await {
                Ok(0) | Err(_) => {
                    *inner_guard = None;
                    continue;
                }
                Ok(_) => return parse_reply(resp.trim()),
            }
        }

        Err(Error::Internal(format!("failed after {} attempts", MAX_ATTEMPTS)))
    }

    async fn connect_inner(addr: &str) -> Result<ClientInner> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(ClientInner {
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, cmd: String) -> Result<T> {
        match self.send_and_receive(cmd).await? {
            Reply::Ok(json) => Ok(serde_json::from_str(&json)?),
            Reply::NotFound => Err(Error::Protocol("unexpected NOT_FOUND".to_string())),
        }
    }
}

#[async_trait]
impl CatalogReader for Client {
    async fn fetch_by_key(&self, isbn: &str) -> Result<Option<Book>> {
        match self.send_and_receive(format!("GET {}", single_line(isbn))).await? {
            Reply::Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Reply::NotFound => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Book>> {
        self.fetch_json("LIST".to_string()).await
    }
}

#[async_trait]
impl CatalogWriter for Client {
    async fn upsert(&self, book: Book) -> Result<()> {
        let json = serde_json::to_string(&book)?;
        self.send_and_receive(format!("PUT {}", json)).await?;
        Ok(())
    }

    async fn upsert_all(&self, books: Vec<Book>) -> Result<usize> {
        let json = serde_json::to_string(&books)?;
        self.fetch_json(format!("PUT {}", json)).await
    }

    async fn remove_by_key(&self, isbn: &str) -> Result<bool> {
        match self.send_and_receive(format!("DEL {}", single_line(isbn))).await? {
            Reply::Ok(_) => Ok(true),
            Reply::NotFound => Ok(false),
        }
    }
}

#[async_trait]
impl CatalogSearcher for Client {
    async fn search(&self, text: &str) -> Result<Vec<Book>> {
        self.fetch_json(format!("SEARCH {}", single_line(text))).await
    }
}

#[async_trait]
impl Catalog for Client {
    async fn seed(&self) -> Result<usize> {
        let Reply::Ok(message) = self.send_and_receive("SEED".to_string()).await? else {
            return Err(Error::Protocol("unexpected NOT_FOUND".to_string()));
        };
        message
            .split_whitespace()
            .next()
            .and_then(|count| count.parse().ok())
            .ok_or_else(|| Error::Protocol(format!("invalid SEED response {:?}", message)))
    }
}
