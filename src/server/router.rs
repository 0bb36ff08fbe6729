use std::sync::Arc;

use log::{debug, error, info};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::catalog::escape_markup;
use crate::config::DEFAULT_MAX_CONNECTIONS;
use crate::model::Book;
use crate::{Catalog, Error, Result};

pub struct Router {
    catalog: Arc<dyn Catalog>,
    semaphore: Arc<Semaphore>,
}

/// Body of a `PUT` line: one book or an array of books.
#[derive(Deserialize)]
#[serde(untagged)]
enum PutPayload {
    Many(Vec<Book>),
    One(Book),
}

impl PutPayload {
    fn into_books(self) -> Vec<Book> {
        match self {
            PutPayload::Many(books) => books,
            PutPayload::One(book) => vec![book],
        }
    }
}

impl Router {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self::with_max_connections(catalog, DEFAULT_MAX_CONNECTIONS)
    }

    pub fn with_max_connections(catalog: Arc<dyn Catalog>, max_connections: usize) -> Self {
        Self {
            catalog,
            semaphore: Arc::new(Semaphore::new(max_connections)),
        }
    }

    pub async fn listen(&self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!("Shelf Store listening on port {}", port);
        self.serve(listener).await
    }

    /// Accepts connections on an already bound listener until it fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (socket, peer) = listener.accept().await?;
            debug!("Accepted connection from {}", peer);
            let catalog = self.catalog.clone();
            let sem = self.semaphore.clone();

            tokio::spawn(async move {
                let _permit = match sem.try_acquire() {
                    Ok(p) => p,
                    Err(_) => {
                        error!("Server busy: too many concurrent connections. Rejecting...");
                        let mut socket = socket;
                        let _ = socket.shutdown().await;
                        return;
                    }
                };

                if let Err(e) = handle_connection(socket, catalog).await {
                    error!("Connection error: {}", e);
                }
            });
        }
    }
}

pub async fn handle_connection(mut socket: TcpStream, catalog: Arc<dyn Catalog>) -> Result<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let Some(response) = respond(catalog.as_ref(), &line).await? else {
            break;
        };
        writer.write_all(format!("{}\n", response).as_bytes()).await?;
    }
    Ok(())
}

/// Executes one request line. Returns `None` when the client asked to quit.
pub async fn respond(catalog: &dyn Catalog, line: &str) -> Result<Option<String>> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let response = match verb.to_uppercase().as_str() {
        "GET" => match catalog.fetch_by_key(rest).await {
            Ok(Some(book)) => format!("OK {}", serde_json::to_string(&book)?),
            Ok(None) => not_found(rest),
            Err(e) => error_response(&e),
        },
        "PUT" => {
            if rest.is_empty() {
                "ERR missing arguments".to_string()
            } else {
                match serde_json::from_str::<PutPayload>(rest) {
                    Ok(payload) => match catalog.upsert_all(payload.into_books()).await {
                        Ok(count) => format!("OK {}", count),
                        Err(e) => error_response(&e),
                    },
                    Err(_) => "ERR invalid json value".to_string(),
                }
            }
        }
        "DEL" => match catalog.remove_by_key(rest).await {
            Ok(true) => format!("OK Book removed with isbn: {}", escape_markup(rest)),
            Ok(false) => not_found(rest),
            Err(e) => error_response(&e),
        },
        "LIST" => match catalog.list_all().await {
            Ok(books) => format!("OK {}", serde_json::to_string(&books)?),
            Err(e) => error_response(&e),
        },
        "SEARCH" => match catalog.search(rest).await {
            Ok(books) => format!("OK {}", serde_json::to_string(&books)?),
            Err(e) => error_response(&e),
        },
        "SEED" => match catalog.seed().await {
            Ok(count) => format!("OK {} books created", count),
            Err(e) => error_response(&e),
        },
        "PING" => "PONG".to_string(),
        "QUIT" => return Ok(None),
        _ => "ERR unknown command".to_string(),
    };

    Ok(Some(response))
}

fn not_found(isbn: &str) -> String {
    format!("NOT_FOUND No book found with ISBN: {}", escape_markup(isbn))
}

fn error_response(e: &Error) -> String {
    match e {
        Error::Validation(v) => format!("INVALID {}", escape_markup(&v.to_string())),
        other => {
            error!("Request failed: {}", other);
            format!("ERR {}", escape_markup(&other.to_string().to_lowercase()))
        }
    }
}
