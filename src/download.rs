use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, instrument};

use crate::client::Client;
use crate::error::PeerError;
use crate::message::{Block, Message, MessageId};
use crate::piece::{block_requests, Piece, PieceBuffer, DEFAULT_BLOCK_SIZE};
use crate::tracker::Peer;
use crate::SHA1_HASH_LEN;

/// Piece to fetch and the hash it must match
#[derive(Debug, Clone, Copy)]
pub struct Work {
    /// Index of piece
    pub index: u32,
    /// Length of piece
    pub length: u32,
    /// SHA1 hash of piece
    pub hash: [u8; SHA1_HASH_LEN],
}

/// Connect to a peer, handshake and download a single verified piece
///
/// The connection is closed when this returns, whether or not the download succeeded.
#[instrument(skip(info_hash, peer_id, work), fields(piece = work.index))]
pub async fn download_from_peer(
    peer: &Peer,
    info_hash: [u8; SHA1_HASH_LEN],
    peer_id: [u8; 20],
    work: Work,
) -> Result<Piece, PeerError> {
    let socket = tokio::net::TcpStream::connect(peer.socket_addr()).await?;
    info!("Established TCP connection");
    let mut client = Client::new(socket, info_hash, peer_id).await?;
    info!("Established peer protocol");
    download_piece(&mut client, work).await
}

/// Download a single piece from a peer that has completed the handshake
pub async fn download_piece<T>(client: &mut Client<T>, work: Work) -> Result<Piece, PeerError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    await_unchoke(client).await?;
    let piece = fetch_piece(client, work).await?;
    info!("Downloaded piece with index {}", piece.index);
    Ok(piece)
}

/// Wait for the peer's bitfield, declare interest and wait to be unchoked
async fn await_unchoke<T>(client: &mut Client<T>) -> Result<(), PeerError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    client.wait_for(MessageId::Bitfield).await?;
    debug!("Received bitfield");
    client.send(&Message::empty(MessageId::Interested)).await?;
    client.wait_for(MessageId::Unchoke).await?;
    debug!("Unchoked by peer");
    Ok(())
}

/// Request every block of the piece, then read back one `piece` message per request
///
/// All requests are written before any response is read and nothing caps how many are
/// outstanding, so the number in flight grows with the piece length.
async fn fetch_piece<T>(client: &mut Client<T>, work: Work) -> Result<Piece, PeerError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let requests = block_requests(work.index, work.length, DEFAULT_BLOCK_SIZE);
    for request in &requests {
        client.send(&Message::from(*request)).await?;
    }
    debug!("Sent {} block requests for piece {}", requests.len(), work.index);

    let mut buffer = PieceBuffer::new(work.index, work.length);
    for _ in 0..requests.len() {
        let message = client.wait_for(MessageId::Piece).await?;
        let block = Block::try_from(&message)?;
        debug!("Received block at offset {} of piece {}", block.begin, block.index);
        buffer.insert(&block)?;
    }
    buffer.verify(&work.hash)
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::handshake::{peer_id_bytes, Handshake};
    use crate::message::BlockRequest;
    use crate::{HANDSHAKE_BYTES_LEN, PEER_ID};

    const THEIR_PEER_ID: &[u8; 20] = b"-DEF123-efgh12345678";

    fn info_hash() -> [u8; 20] {
        core::array::from_fn(|i| i as u8)
    }

    fn piece_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    fn piece_message(index: u32, begin: u32, block: &[u8]) -> Message {
        let mut payload = BytesMut::new();
        payload.put_u32(index);
        payload.put_u32(begin);
        payload.put_slice(block);
        Message::new(MessageId::Piece, payload.freeze())
    }

    /// Mock peer that handshakes, announces a bitfield and unchokes us
    fn builder_after_unchoke() -> tokio_test::io::Builder {
        let our_peer_id = peer_id_bytes(PEER_ID).unwrap();
        let mut builder = tokio_test::io::Builder::new();
        builder
            .write(&Handshake::new(info_hash(), our_peer_id).serialise())
            .read(&Handshake::new(info_hash(), *THEIR_PEER_ID).serialise())
            .read(&Message::new(MessageId::Bitfield, vec![0b11000000]).serialise())
            .write(&Message::empty(MessageId::Interested).serialise())
            .read(&Message::empty(MessageId::Unchoke).serialise());
        builder
    }

    #[tokio::test]
    async fn all_requests_are_sent_before_any_block_is_read() {
        // Two full blocks and a short one: three requests outstanding at once
        let length = 2 * DEFAULT_BLOCK_SIZE + 100;
        let data = piece_data(length as usize);
        let work = Work {
            index: 1,
            length,
            hash: sha1_smol::Sha1::from(&data).digest().bytes(),
        };

        let mut builder = builder_after_unchoke();
        for request in block_requests(1, length, DEFAULT_BLOCK_SIZE) {
            builder.write(&Message::from(request).serialise());
        }
        for request in block_requests(1, length, DEFAULT_BLOCK_SIZE) {
            let start = request.begin as usize;
            let end = start + request.length as usize;
            builder.read(&piece_message(1, request.begin, &data[start..end]).serialise());
        }
        let socket = builder.build();

        let mut client = Client::new(socket, info_hash(), peer_id_bytes(PEER_ID).unwrap())
            .await
            .unwrap();
        let piece = download_piece(&mut client, work).await.unwrap();
        assert_eq!(piece, Piece { index: 1, buf: data });
    }

    #[tokio::test]
    async fn messages_interleaved_with_blocks_are_skipped() {
        let length = 64;
        let data = piece_data(length as usize);
        let work = Work {
            index: 0,
            length,
            hash: sha1_smol::Sha1::from(&data).digest().bytes(),
        };

        let mut builder = builder_after_unchoke();
        builder.write(
            &Message::from(BlockRequest {
                index: 0,
                begin: 0,
                length: 64,
            })
            .serialise(),
        );
        // A `have` interleaved with the blocks is skipped
        builder
            .read(&Message::new(MessageId::Have, u32::to_be_bytes(1).to_vec()).serialise())
            .read(&piece_message(0, 0, &data).serialise());
        let socket = builder.build();

        let mut client = Client::new(socket, info_hash(), peer_id_bytes(PEER_ID).unwrap())
            .await
            .unwrap();
        let piece = download_piece(&mut client, work).await.unwrap();
        assert_eq!(piece.buf, data);
    }

    #[tokio::test]
    async fn return_protocol_violation_for_mismatched_piece_index() {
        let data = piece_data(64);
        let work = Work {
            index: 0,
            length: 64,
            hash: sha1_smol::Sha1::from(&data).digest().bytes(),
        };
        let mut builder = builder_after_unchoke();
        builder
            .write(&Message::from(block_requests(0, 64, DEFAULT_BLOCK_SIZE)[0]).serialise())
            .read(&piece_message(5, 0, &data).serialise());
        let socket = builder.build();

        let mut client = Client::new(socket, info_hash(), peer_id_bytes(PEER_ID).unwrap())
            .await
            .unwrap();
        let res = download_piece(&mut client, work).await;
        assert!(matches!(res, Err(PeerError::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn return_integrity_check_failed_for_corrupted_block() {
        let data = piece_data(64);
        let work = Work {
            index: 0,
            length: 64,
            hash: sha1_smol::Sha1::from(&data).digest().bytes(),
        };
        let mut corrupted = data.clone();
        corrupted[40] ^= 0x01;
        let mut builder = builder_after_unchoke();
        builder
            .write(&Message::from(block_requests(0, 64, DEFAULT_BLOCK_SIZE)[0]).serialise())
            .read(&piece_message(0, 0, &corrupted).serialise());
        let socket = builder.build();

        let mut client = Client::new(socket, info_hash(), peer_id_bytes(PEER_ID).unwrap())
            .await
            .unwrap();
        let res = download_piece(&mut client, work).await;
        assert!(matches!(
            res,
            Err(PeerError::IntegrityCheckFailed { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn return_connection_closed_if_peer_hangs_up_mid_piece() {
        let length = 2 * DEFAULT_BLOCK_SIZE;
        let data = piece_data(length as usize);
        let work = Work {
            index: 0,
            length,
            hash: sha1_smol::Sha1::from(&data).digest().bytes(),
        };
        let mut builder = builder_after_unchoke();
        for request in block_requests(0, length, DEFAULT_BLOCK_SIZE) {
            builder.write(&Message::from(request).serialise());
        }
        builder.read(&piece_message(0, 0, &data[..DEFAULT_BLOCK_SIZE as usize]).serialise());
        let socket = builder.build();

        let mut client = Client::new(socket, info_hash(), peer_id_bytes(PEER_ID).unwrap())
            .await
            .unwrap();
        let res = download_piece(&mut client, work).await;
        assert!(matches!(res, Err(PeerError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn downloads_piece_from_peer_over_tcp() {
        let length = DEFAULT_BLOCK_SIZE + 10;
        let data = piece_data(length as usize);
        let work = Work {
            index: 2,
            length,
            hash: sha1_smol::Sha1::from(&data).digest().bytes(),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = Peer {
            ip: std::net::Ipv4Addr::LOCALHOST,
            port: addr.port(),
        };

        let served = data.clone();
        let seeder = tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            let (mut socket, _) = listener.accept().await.unwrap();
            let mut handshake_buf = [0; HANDSHAKE_BYTES_LEN];
            socket.read_exact(&mut handshake_buf).await.unwrap();
            let response = Handshake::new(info_hash(), *THEIR_PEER_ID);
            socket.write_all(&response.serialise()).await.unwrap();
            socket
                .write_all(&Message::new(MessageId::Bitfield, vec![0xFF]).serialise())
                .await
                .unwrap();

            let mut interested_buf = [0; 5];
            socket.read_exact(&mut interested_buf).await.unwrap();
            assert_eq!(interested_buf, [0, 0, 0, 1, 2]);
            socket
                .write_all(&Message::empty(MessageId::Unchoke).serialise())
                .await
                .unwrap();

            let mut requests = Vec::new();
            for _ in 0..2 {
                let mut request_buf = [0; 17];
                socket.read_exact(&mut request_buf).await.unwrap();
                let begin = u32::from_be_bytes(request_buf[9..13].try_into().unwrap());
                let len = u32::from_be_bytes(request_buf[13..17].try_into().unwrap());
                requests.push((begin, len));
            }
            for (begin, len) in requests {
                let block = &served[begin as usize..(begin + len) as usize];
                socket
                    .write_all(&piece_message(2, begin, block).serialise())
                    .await
                    .unwrap();
            }
        });

        let piece = download_from_peer(&peer, info_hash(), peer_id_bytes(PEER_ID).unwrap(), work)
            .await
            .unwrap();
        seeder.await.unwrap();
        assert_eq!(piece.buf, data);
    }
}
