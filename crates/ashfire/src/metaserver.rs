//! Server discovery.
//!
//! A metaserver answers a plain HTTP GET with a list of game servers, one
//! `START_SERVER_DATA` / `END_SERVER_DATA` block of `key=value` lines per
//! server. [`fetch_servers`] asks every configured metaserver in turn and
//! merges the answers, keeping the first entry seen for each address.

use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Metaservers asked when the config doesn't name any.
pub const DEFAULT_METASERVERS: [&str; 3] = [
    "http://crossfire.real-time.com/metaserver2/meta_client.php",
    "http://metaserver.eu.cross-fire.org/meta_client.php",
    "http://metaserver.us.cross-fire.org/meta_client.php",
];

/// Game port assumed when an entry doesn't carry one.
pub const DEFAULT_GAME_PORT: u16 = 13327;

/// Largest response read from a metaserver.
const MAX_RESPONSE: u64 = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum MetaserverError {
    #[error("unsupported metaserver url {0:?}")]
    InvalidUrl(String),

    #[error("metaserver {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metaserver {url} did not answer within {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("metaserver {url} answered {status:?}")]
    Status { url: String, status: String },
}

/// One game server as a metaserver lists it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerEntry {
    pub hostname: String,
    pub port: u16,
    pub html_comment: String,
    pub text_comment: String,
    pub archbase: String,
    pub mapbase: String,
    pub codebase: String,
    pub num_players: u32,
    pub in_bytes: u64,
    pub out_bytes: u64,
    /// Seconds.
    pub uptime: u64,
    pub version: String,
    pub sc_version: String,
    pub cs_version: String,
    /// Unix time of the server's last report to the metaserver.
    pub last_update: u64,
}

impl ServerEntry {
    /// `hostname:port`, ready for [`ClientConfig::server`](crate::ClientConfig::server).
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    fn set(&mut self, key: &str, value: &str) {
        let value = value.trim();
        match key {
            "hostname" => self.hostname = value.to_owned(),
            "port" => self.port = value.parse().unwrap_or(DEFAULT_GAME_PORT),
            "html_comment" => self.html_comment = value.to_owned(),
            "text_comment" => self.text_comment = value.to_owned(),
            "archbase" => self.archbase = value.to_owned(),
            "mapbase" => self.mapbase = value.to_owned(),
            "codebase" => self.codebase = value.to_owned(),
            "num_players" => self.num_players = value.parse().unwrap_or_default(),
            "in_bytes" => self.in_bytes = value.parse().unwrap_or_default(),
            "out_bytes" => self.out_bytes = value.parse().unwrap_or_default(),
            "uptime" => self.uptime = value.parse().unwrap_or_default(),
            "version" => self.version = value.to_owned(),
            "sc_version" => self.sc_version = value.to_owned(),
            "cs_version" => self.cs_version = value.to_owned(),
            "last_update" => self.last_update = value.parse().unwrap_or_default(),
            _ => {}
        }
    }
}

/// Parses a metaserver response body.
///
/// Entries without a hostname and unterminated blocks are dropped; lines
/// outside a block are ignored.
pub fn parse_server_entries(body: &str) -> Vec<ServerEntry> {
    let mut entries = Vec::new();
    let mut current: Option<ServerEntry> = None;
    for line in body.lines().map(str::trim) {
        match line {
            "START_SERVER_DATA" => {
                current = Some(ServerEntry {
                    port: DEFAULT_GAME_PORT,
                    ..Default::default()
                });
            }
            "END_SERVER_DATA" => {
                if let Some(entry) = current.take().filter(|e| !e.hostname.is_empty()) {
                    entries.push(entry);
                }
            }
            _ => {
                if let (Some(entry), Some((key, value))) = (current.as_mut(), line.split_once('=')) {
                    entry.set(key, value);
                }
            }
        }
    }
    entries
}

/// Appends the entries of `from` whose hostname and port aren't in `into`
/// yet. Returns how many were added.
pub fn merge_entries(into: &mut Vec<ServerEntry>, from: Vec<ServerEntry>) -> usize {
    let before = into.len();
    for entry in from {
        if !into
            .iter()
            .any(|known| known.hostname == entry.hostname && known.port == entry.port)
        {
            into.push(entry);
        }
    }
    into.len() - before
}

/// Asks every metaserver in `urls`, in order, and merges their lists.
///
/// A metaserver that can't be reached or answers badly is skipped with a
/// warning, so the result may be empty.
pub async fn fetch_servers(urls: &[String], timeout: Duration) -> Vec<ServerEntry> {
    let mut servers = Vec::new();
    for url in urls {
        match request_servers(url, timeout).await {
            Ok(entries) => {
                let listed = entries.len();
                let added = merge_entries(&mut servers, entries);
                tracing::debug!(%url, listed, added, "metaserver answered");
            }
            Err(e) => tracing::warn!(error = %e, "skipping metaserver"),
        }
    }
    servers
}

/// Fetches and parses the list of one metaserver.
///
/// # Errors
/// [`MetaserverError::InvalidUrl`] for anything but a plain `http://` url,
/// [`MetaserverError::Timeout`] when the whole exchange takes longer than
/// `timeout`, [`MetaserverError::Io`] on a connection error, and
/// [`MetaserverError::Status`] for an answer other than 200.
pub async fn request_servers(url: &str, timeout: Duration) -> Result<Vec<ServerEntry>, MetaserverError> {
    let target = HttpTarget::parse(url)?;
    let io_error = |source: std::io::Error| MetaserverError::Io {
        url: url.to_owned(),
        source,
    };

    let exchange = async {
        let mut stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
        let request = format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: ashfire\r\nConnection: close\r\n\r\n",
            target.path, target.host
        );
        stream.write_all(request.as_bytes()).await?;
        let mut response = Vec::new();
        stream.take(MAX_RESPONSE).read_to_end(&mut response).await?;
        Ok::<_, std::io::Error>(response)
    };
    let response = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| MetaserverError::Timeout {
            url: url.to_owned(),
            timeout,
        })?
        .map_err(io_error)?;

    let response = String::from_utf8_lossy(&response);
    let (head, body) = response
        .split_once("\r\n\r\n")
        .unwrap_or((response.as_ref(), ""));
    let status = head.lines().next().unwrap_or_default();
    if status.split_whitespace().nth(1) != Some("200") {
        return Err(MetaserverError::Status {
            url: url.to_owned(),
            status: status.to_owned(),
        });
    }
    Ok(parse_server_entries(body))
}

/// Host, port and path of an `http://` url.
#[derive(Debug, PartialEq, Eq)]
struct HttpTarget {
    host: String,
    port: u16,
    path: String,
}

impl HttpTarget {
    fn parse(url: &str) -> Result<Self, MetaserverError> {
        let invalid = || MetaserverError::InvalidUrl(url.to_owned());
        let rest = url.strip_prefix("http://").ok_or_else(invalid)?;
        let (authority, path) = match rest.find('/') {
            Some(at) => rest.split_at(at),
            None => (rest, "/"),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
            None => (authority, 80),
        };
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            host: host.to_owned(),
            port,
            path: path.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
START_SERVER_DATA
hostname=play.example.org
port=13327
text_comment=Friendly server
num_players=12
version=1.71.0
sc_version=1027
cs_version=1023
last_update=1700000000
END_SERVER_DATA
START_SERVER_DATA
hostname=
port=1
END_SERVER_DATA
START_SERVER_DATA
hostname=alt.example.org
num_players=lots
flags=x
END_SERVER_DATA
START_SERVER_DATA
hostname=cut.example.org
";

    fn entry(hostname: &str, port: u16) -> ServerEntry {
        ServerEntry {
            hostname: hostname.into(),
            port,
            ..Default::default()
        }
    }

    // =========================================================================
    // parse_server_entries
    // =========================================================================

    #[test]
    fn test_parse_server_entries_reads_blocks() {
        let entries = parse_server_entries(LISTING);

        assert_eq!(entries.len(), 2);
        let first = &entries[0];
        assert_eq!(first.address(), "play.example.org:13327");
        assert_eq!(first.text_comment, "Friendly server");
        assert_eq!(first.num_players, 12);
        assert_eq!(first.sc_version, "1027");
        assert_eq!(first.last_update, 1_700_000_000);
    }

    #[test]
    fn test_parse_server_entries_defaults_missing_and_bad_fields() {
        let entries = parse_server_entries(LISTING);

        assert_eq!(entries[1].port, DEFAULT_GAME_PORT);
        assert_eq!(entries[1].num_players, 0);
    }

    #[test]
    fn test_parse_server_entries_empty_body() {
        assert!(parse_server_entries("").is_empty());
        assert!(parse_server_entries("<html>maintenance</html>").is_empty());
    }

    // =========================================================================
    // merge_entries
    // =========================================================================

    #[test]
    fn test_merge_entries_keeps_first_per_address() {
        let mut servers = vec![ServerEntry {
            num_players: 3,
            ..entry("a.example.org", 13327)
        }];

        let added = merge_entries(
            &mut servers,
            vec![
                entry("a.example.org", 13327),
                entry("a.example.org", 13328),
                entry("b.example.org", 13327),
            ],
        );

        assert_eq!(added, 2);
        assert_eq!(servers.len(), 3);
        assert_eq!(servers[0].num_players, 3);
    }

    // =========================================================================
    // HttpTarget
    // =========================================================================

    #[test]
    fn test_http_target_parse() {
        assert_eq!(
            HttpTarget::parse("http://meta.example.org/metaserver2/meta_client.php").unwrap(),
            HttpTarget {
                host: "meta.example.org".into(),
                port: 80,
                path: "/metaserver2/meta_client.php".into(),
            }
        );
        assert_eq!(
            HttpTarget::parse("http://127.0.0.1:8080").unwrap(),
            HttpTarget {
                host: "127.0.0.1".into(),
                port: 8080,
                path: "/".into(),
            }
        );
    }

    #[test]
    fn test_http_target_rejects_unsupported() {
        for bad in ["https://meta.example.org/", "meta.example.org", "http://:80/", "http://h:x/"] {
            assert!(
                matches!(HttpTarget::parse(bad), Err(MetaserverError::InvalidUrl(_))),
                "{bad}"
            );
        }
    }
}
