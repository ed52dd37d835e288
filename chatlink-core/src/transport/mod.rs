//! TCP transport and the framed halves built on top of it

use chatlink_protocol::ChatCodec;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

pub mod socket_tuning;
pub mod tcp;
pub mod writer;

pub use writer::FrameWriter;

pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;
pub type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Inbound half: yields one [`chatlink_protocol::Decoded`] per frame.
pub type FrameReader = FramedRead<BoxedReader, ChatCodec>;

/// Split a connected stream into a frame reader and a shared frame writer.
pub fn split(stream: TcpStream, codec: ChatCodec) -> (FrameReader, FrameWriter) {
    let (read_half, write_half) = stream.into_split();
    framed(Box::pin(read_half), Box::pin(write_half), codec)
}

/// Frame arbitrary byte halves; used for TCP and for in-memory pipes.
pub fn framed(
    reader: BoxedReader,
    writer: BoxedWriter,
    codec: ChatCodec,
) -> (FrameReader, FrameWriter) {
    (
        FramedRead::new(reader, codec),
        FrameWriter::new(writer, codec),
    )
}
