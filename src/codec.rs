use bytes::{Bytes, BytesMut};
use std::io;
use thiserror::Error as ThisError;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};

use crate::reply::Reply;

pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

#[derive(Debug, ThisError)]
pub enum CodecError {
    /// The client kept sending without a line terminator.
    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Newline-delimited requests in, [`Reply`] text out. Lines longer than the configured maximum
/// are rejected instead of buffered.
///
/// Lines come out as raw bytes: whether they are text is for the request parser to judge, so a
/// stray non-UTF-8 byte is answered like any other malformed line.
#[derive(Clone, Debug)]
pub struct LineCodec {
    lines: AnyDelimiterCodec,
    max_line_length: usize,
}

impl LineCodec {
    pub fn new(max_line_length: usize) -> LineCodec {
        LineCodec {
            lines: AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                Vec::new(),
                max_line_length,
            ),
            max_line_length,
        }
    }

    fn map_err(&self, err: AnyDelimiterCodecError) -> CodecError {
        match err {
            AnyDelimiterCodecError::MaxChunkLengthExceeded => CodecError::LineTooLong {
                max: self.max_line_length,
            },
            AnyDelimiterCodecError::Io(e) => CodecError::Io(e),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        LineCodec::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

fn without_carriage_return(mut line: Bytes) -> Bytes {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    line
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.lines
            .decode(src)
            .map(|line| line.map(without_carriage_return))
            .map_err(|e| self.map_err(e))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.lines
            .decode_eof(src)
            .map(|line| line.map(without_carriage_return))
            .map_err(|e| self.map_err(e))
    }
}

impl Encoder<Reply> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, reply: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes: Vec<u8> = reply.into();
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}
