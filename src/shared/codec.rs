/// Framed codec for the event envelope.
///
/// Each frame is a 4-byte big-endian length prefix followed by one JSON document.
/// The JSON payload keeps the `kind`-tagged shape readable by any consumer; the
/// prefix lets stream readers split frames without scanning for delimiters.

use crate::shared::protocol::Action;
use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Default upper bound on one frame's payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Length-delimited JSON codec for any serde type.
pub struct JsonFrameCodec<T> {
    frames: LengthDelimitedCodec,
    _item: PhantomData<fn() -> T>,
}

impl<T> JsonFrameCodec<T> {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .length_field_length(4)
                .big_endian()
                .max_frame_length(max_frame_len)
                .new_codec(),
            _item: PhantomData,
        }
    }
}

impl<T> Default for JsonFrameCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> Encoder<T> for JsonFrameCodec<T> {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;
        self.frames.encode(Bytes::from(payload), dst)?;
        Ok(())
    }
}

impl<T: DeserializeOwned> Decoder for JsonFrameCodec<T> {
    type Item = T;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(frame) => Ok(Some(serde_json::from_slice(&frame)?)),
            None => Ok(None),
        }
    }
}

/// Codec for the merged action stream.
pub type ActionCodec = JsonFrameCodec<Action>;
