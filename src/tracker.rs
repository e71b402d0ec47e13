use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::bencode::BencodeValue;
use crate::error::TrackerError;
use crate::metainfo::Metainfo;
use crate::SHA1_HASH_LEN;

const FAILURE_KEY: &str = "failure reason";
const INTERVAL_KEY: &str = "interval";
const PEERS_KEY: &str = "peers";
const COMPACT_PEER_LEN: usize = 6;

/// GET request to tracker
#[derive(Debug)]
pub struct Request {
    /// URL to make GET request to tracker
    pub url: Url,
}

impl Request {
    /// Create request
    ///
    /// The info hash is raw binary, so it is percent-encoded byte by byte rather than
    /// passed through the form encoder.
    pub fn new(
        tracker_url: &str,
        peer_id: &str,
        port: u16,
        info_hash: &[u8; SHA1_HASH_LEN],
        left: u64,
    ) -> Result<Request, TrackerError> {
        let info_hash_str = info_hash
            .iter()
            .map(|byte| format!("%{:02x}", byte))
            .collect::<Vec<String>>()
            .join("");
        let separator = if tracker_url.contains('?') { '&' } else { '?' };
        let string_url = format!("{}{}info_hash={}", tracker_url, separator, info_hash_str);
        let mut url = Url::parse(&string_url)?;
        url.query_pairs_mut()
            .append_pair("peer_id", peer_id)
            .append_pair("port", &port.to_string())
            .append_pair("uploaded", &0.to_string())
            .append_pair("downloaded", &0.to_string())
            .append_pair("compact", &1.to_string())
            .append_pair("left", &left.to_string());
        Ok(Request { url })
    }

    /// Request announcing the whole file as still to be downloaded
    pub fn for_metainfo(
        metainfo: &Metainfo,
        peer_id: &str,
        port: u16,
    ) -> Result<Request, TrackerError> {
        Request::new(
            &metainfo.announce,
            peer_id,
            port,
            &metainfo.info_hash,
            metainfo.info.length,
        )
    }

    /// Send request and return response body
    pub async fn send(self) -> Result<Bytes, TrackerError> {
        debug!("Querying tracker: {}", self.url);
        let response = reqwest::get(self.url).await?;
        Ok(response.bytes().await?)
    }
}

/// Successful response from tracker
#[derive(Debug, PartialEq)]
pub struct Response {
    /// Interval (in seconds) at which to reconnect to tracker to refresh peer list
    pub interval: Option<u64>,
    /// Peers of file reported by tracker
    pub peers: Vec<Peer>,
}

impl Response {
    /// Deserialise response message body
    pub fn deserialise(data: &[u8]) -> Result<Response, TrackerError> {
        let (value, _) = crate::decode::decode(data)?;
        if value.as_dict().is_none() {
            return Err(TrackerError::MissingField(PEERS_KEY));
        }
        if let Some(reason) = value.get(FAILURE_KEY) {
            let reason = reason
                .as_bytes()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .ok_or(TrackerError::MissingField(FAILURE_KEY))?;
            return Err(TrackerError::Failure(reason));
        }

        let interval = value
            .get(INTERVAL_KEY)
            .and_then(BencodeValue::as_integer)
            .and_then(|int| u64::try_from(int).ok());
        let peer_data = value
            .get(PEERS_KEY)
            .and_then(BencodeValue::as_bytes)
            .ok_or(TrackerError::MissingField(PEERS_KEY))?;
        let peers = Self::parse_peers(peer_data)?;
        Ok(Response { interval, peers })
    }

    /// Parse peers encoded in "compact" form
    fn parse_peers(data: &[u8]) -> Result<Vec<Peer>, TrackerError> {
        if data.len() % COMPACT_PEER_LEN != 0 {
            return Err(TrackerError::InvalidPeerList(data.len()));
        }
        Ok(data.chunks_exact(COMPACT_PEER_LEN).map(Peer::new).collect())
    }
}

/// Ask the tracker named in the metainfo for peers
pub async fn discover_peers(
    metainfo: &Metainfo,
    peer_id: &str,
    port: u16,
) -> Result<Vec<Peer>, TrackerError> {
    let body = Request::for_metainfo(metainfo, peer_id, port)?
        .send()
        .await?;
    let response = Response::deserialise(&body)?;
    debug!("Tracker returned {} peers", response.peers.len());
    Ok(response.peers)
}

/// Peer of file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peer {
    /// IP address of peer
    pub ip: Ipv4Addr,
    /// Port of peer
    pub port: u16,
}

impl Peer {
    /// Parse 4 address bytes followed by a big-endian port
    fn new(data: &[u8]) -> Peer {
        Peer {
            ip: Ipv4Addr::new(data[0], data[1], data[2], data[3]),
            port: u16::from_be_bytes([data[4], data[5]]),
        }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}
