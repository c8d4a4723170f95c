//! LNDC Connections
//!
//! Wraps any byte stream in the encrypted framing used after the handshake.
//! Each message on the wire is an encrypted 2-byte big-endian length
//! (18 bytes with its MAC) followed by the encrypted body.

use k256::{PublicKey, SecretKey};
use log::debug;
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use super::address::lit_address_from_pubkey;
use super::noise::{
    serialize_pubkey, CipherState, HandshakeOutput, Initiator, Responder, ACT_ONE_LEN,
    ACT_THREE_LEN, ACT_TWO_LEN, MAC_LEN,
};
use super::{LndcError, LndcResult, MAX_MESSAGE_LEN};

const LENGTH_HEADER_LEN: usize = 2 + MAC_LEN;

/// Sending half of an encrypted connection
pub struct LndcWriter<W> {
    inner: W,
    cipher: CipherState,
}

impl<W: AsyncWrite + Unpin> LndcWriter<W> {
    /// Encrypt and send one message
    pub async fn write_message(&mut self, body: &[u8]) -> LndcResult<()> {
        if body.len() > MAX_MESSAGE_LEN {
            return Err(LndcError::MessageTooLarge(body.len()));
        }
        let header = self.cipher.encrypt(&[], &(body.len() as u16).to_be_bytes())?;
        let ciphertext = self.cipher.encrypt(&[], body)?;

        let mut frame = Vec::with_capacity(header.len() + ciphertext.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&ciphertext);
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

/// Receiving half of an encrypted connection
pub struct LndcReader<R> {
    inner: R,
    cipher: CipherState,
}

impl<R: AsyncRead + Unpin> LndcReader<R> {
    /// Receive and decrypt one message
    pub async fn read_message(&mut self) -> LndcResult<Vec<u8>> {
        let mut header = [0u8; LENGTH_HEADER_LEN];
        self.inner.read_exact(&mut header).await?;
        let length = self.cipher.decrypt(&[], &header)?;
        let length = u16::from_be_bytes([length[0], length[1]]) as usize;

        let mut body = vec![0u8; length + MAC_LEN];
        self.inner.read_exact(&mut body).await?;
        self.cipher.decrypt(&[], &body)
    }
}

/// An established, authenticated connection
pub struct LndcConn<S> {
    reader: LndcReader<ReadHalf<S>>,
    writer: LndcWriter<WriteHalf<S>>,
    remote_static: PublicKey,
}

impl<S: AsyncRead + AsyncWrite> LndcConn<S> {
    fn from_handshake(stream: S, output: HandshakeOutput) -> Self {
        let (rd, wr) = split(stream);
        Self {
            reader: LndcReader {
                inner: rd,
                cipher: output.recv,
            },
            writer: LndcWriter {
                inner: wr,
                cipher: output.send,
            },
            remote_static: output.remote_static,
        }
    }

    /// Run the initiator handshake over `stream`.
    ///
    /// When `expected_identity` is given, the responder's static key must
    /// hash to that lit address or the connection is refused before act three
    /// is sent.
    pub async fn connect(
        mut stream: S,
        local_static: &SecretKey,
        expected_identity: Option<&str>,
    ) -> LndcResult<Self>
    where
        S: Unpin,
    {
        let mut initiator = Initiator::new(local_static.clone());

        stream.write_all(&initiator.act_one()?).await?;
        stream.flush().await?;

        let mut act_two = [0u8; ACT_TWO_LEN];
        stream.read_exact(&mut act_two).await?;
        let remote_static = initiator.recv_act_two(&act_two)?;

        if let Some(expected) = expected_identity {
            let actual = lit_address_from_pubkey(&serialize_pubkey(&remote_static));
            if actual != expected {
                return Err(LndcError::IdentityMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let (act_three, output) = initiator.act_three()?;
        stream.write_all(&act_three).await?;
        stream.flush().await?;

        debug!("LNDC handshake complete");
        Ok(Self::from_handshake(stream, output))
    }

    /// Run the responder handshake over `stream`
    pub async fn accept(mut stream: S, local_static: &SecretKey) -> LndcResult<Self>
    where
        S: Unpin,
    {
        let mut responder = Responder::new(local_static.clone());

        let mut act_one = [0u8; ACT_ONE_LEN];
        stream.read_exact(&mut act_one).await?;
        responder.recv_act_one(&act_one)?;

        stream.write_all(&responder.act_two()?).await?;
        stream.flush().await?;

        let mut act_three = [0u8; ACT_THREE_LEN];
        stream.read_exact(&mut act_three).await?;
        let output = responder.recv_act_three(&act_three)?;

        Ok(Self::from_handshake(stream, output))
    }

    /// Lit address of the peer
    pub fn remote_address(&self) -> String {
        lit_address_from_pubkey(&serialize_pubkey(&self.remote_static))
    }

    pub fn into_split(self) -> (LndcReader<ReadHalf<S>>, LndcWriter<WriteHalf<S>>) {
        (self.reader, self.writer)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> LndcConn<S> {
    pub async fn write_message(&mut self, body: &[u8]) -> LndcResult<()> {
        self.writer.write_message(body).await
    }

    pub async fn read_message(&mut self) -> LndcResult<Vec<u8>> {
        self.reader.read_message().await
    }
}
