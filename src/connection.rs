use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{split, AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};
use uuid::Uuid;

use crate::codec::{CodecError, LineCodec};
use crate::reply::Reply;

/// A client stream split into a line reader and a reply writer, so that the session can keep
/// watching for the client going away while it writes or waits on workers.
pub struct Connection<S> {
    pub id: Uuid,
    reader: FramedRead<ReadHalf<S>, LineCodec>,
    writer: FramedWrite<WriteHalf<S>, LineCodec>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(stream: S, max_line_length: usize) -> Connection<S> {
        let (read_half, write_half) = split(stream);
        let codec = LineCodec::new(max_line_length);

        Connection {
            id: Uuid::new_v4(),
            reader: FramedRead::new(read_half, codec.clone()),
            writer: FramedWrite::new(write_half, codec),
        }
    }

    /// Reads the next line, without its terminator. `None` once the client has closed the
    /// stream. Cancel safe.
    pub async fn read_line(&mut self) -> Result<Option<Bytes>, CodecError> {
        self.reader.next().await.transpose()
    }

    pub async fn write_reply(&mut self, reply: Reply) -> Result<(), CodecError> {
        self.writer.send(reply).await
    }
}
