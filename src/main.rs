use std::net::SocketAddrV4;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use piecemeal::{
    client::Client,
    decode::decode,
    download::{download_from_peer, Work},
    encode::encode,
    handshake::peer_id_bytes,
    metainfo::Metainfo,
    tracker::discover_peers,
    BencodeValue, PEER_ID,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Bencode codec and single-piece BitTorrent client")]
struct Cli {
    /// Peer id announced to trackers and peers, exactly 20 bytes
    #[arg(long, global = true, default_value = PEER_ID)]
    peer_id: String,

    /// Port announced to the tracker
    #[arg(long, global = true, default_value_t = 6881)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a bencoded value and print it as JSON
    Decode { value: String },
    /// Encode a JSON value as bencode
    Encode { json: String },
    /// Print the metainfo of a `.torrent` file
    Info { torrent: PathBuf },
    /// Print the peers the tracker reports for a `.torrent` file
    Peers { torrent: PathBuf },
    /// Handshake with a peer and print its peer id
    Handshake {
        torrent: PathBuf,
        /// Peer address as `ip:port`
        peer: SocketAddrV4,
    },
    /// Download and verify a single piece
    #[command(name = "download_piece")]
    DownloadPiece {
        /// Path to save the downloaded piece
        #[arg(short = 'o')]
        output: PathBuf,
        torrent: PathBuf,
        index: u32,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let peer_id = peer_id_bytes(&cli.peer_id).context("peer id must be exactly 20 bytes")?;

    match cli.command {
        Command::Decode { value } => {
            let (decoded, _) = decode(value.as_bytes())?;
            println!("{}", serde_json::Value::from(&decoded));
        }
        Command::Encode { json } => {
            let json = serde_json::from_str::<serde_json::Value>(&json)
                .context("argument is not valid JSON")?;
            let value = BencodeValue::try_from(&json)?;
            println!("{}", String::from_utf8_lossy(&encode(&value)));
        }
        Command::Info { torrent } => {
            let metainfo = load_metainfo(&torrent).await?;
            println!("Tracker URL: {}", metainfo.announce);
            println!("Length: {}", metainfo.info.length);
            println!("Info Hash: {}", hex::encode(metainfo.info_hash));
            println!("Piece Length: {}", metainfo.info.piece_length);
            println!("Piece Hashes:");
            for hash in metainfo.info.pieces() {
                println!("{}", hex::encode(hash));
            }
        }
        Command::Peers { torrent } => {
            let metainfo = load_metainfo(&torrent).await?;
            for peer in discover_peers(&metainfo, &cli.peer_id, cli.port).await? {
                println!("{}", peer);
            }
        }
        Command::Handshake { torrent, peer } => {
            let metainfo = load_metainfo(&torrent).await?;
            let socket = tokio::net::TcpStream::connect(peer)
                .await
                .with_context(|| format!("unable to connect to {}", peer))?;
            let client = Client::new(socket, metainfo.info_hash, peer_id).await?;
            println!("Peer ID: {}", hex::encode(client.remote_peer_id()));
        }
        Command::DownloadPiece {
            output,
            torrent,
            index,
        } => {
            let metainfo = load_metainfo(&torrent).await?;
            let work = Work {
                index,
                length: metainfo
                    .info
                    .piece_size(index)
                    .with_context(|| format!("piece index {} out of range", index))?,
                hash: metainfo
                    .info
                    .piece_hash(index)
                    .with_context(|| format!("piece index {} out of range", index))?,
            };
            let peers = discover_peers(&metainfo, &cli.peer_id, cli.port).await?;
            let peer = peers.first().context("tracker returned no peers")?;
            let piece = download_from_peer(peer, metainfo.info_hash, peer_id, work).await?;
            tokio::fs::write(&output, &piece.buf)
                .await
                .with_context(|| format!("unable to save piece to {:?}", output))?;
            info!("Saved piece {} to {:?}", index, output);
            println!("Piece {} downloaded to {}.", index, output.display());
        }
    }
    Ok(())
}

/// Read and derive metainfo from a `.torrent` file
async fn load_metainfo(path: &Path) -> anyhow::Result<Metainfo> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("unable to read metainfo file {:?}", path))?;
    Metainfo::from_bytes(&bytes).with_context(|| format!("invalid metainfo file {:?}", path))
}
