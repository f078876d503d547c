//! Decode a captured byte stream with the tokio codec.
//!
//! Run with:
//!   cargo run --example async-decode --features async -- capture.bin

use bytes::BytesMut;
use rovlink::frame::RovlinkCodec;
use rovlink::records::RecordRegistry;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::codec::Decoder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: async-decode <FILE>")?;

    let mut file = File::open(&path).await?;
    let mut codec = RovlinkCodec::default();
    let registry = RecordRegistry::default();
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        while let Some(frame) = codec.decode(&mut buf)? {
            match registry.parse(&frame) {
                Ok(record) => println!("#{} {:?}", frame.sequence, record),
                Err(e) => eprintln!("#{} dropped: {e}", frame.sequence),
            }
        }
        if file.read_buf(&mut buf).await? == 0 {
            break;
        }
    }

    eprintln!(
        "rejected={} log_lines={}",
        codec.rejected(),
        codec.log_lines()
    );
    Ok(())
}
