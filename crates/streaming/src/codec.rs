//! Frame codec for peer messages.
//!
//! Every message is a `u32` big-endian length prefix followed by the bincode
//! encoding of the payload.

use bytes::Bytes;
use corelib::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Largest accepted frame.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

pub type FramedStream = Framed<TcpStream, LengthDelimitedCodec>;

pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

pub fn framed(stream: TcpStream) -> FramedStream {
    Framed::new(stream, frame_codec())
}

pub fn encode<T: Serialize>(message: &T) -> Result<Bytes> {
    bincode::serialize(message)
        .map(Bytes::from)
        .map_err(|e| Error::Codec(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T> {
    bincode::deserialize(frame).map_err(|e| Error::Codec(e.to_string()))
}
