//! Polls a TCP adapter from a tokio task and prints decoded signals.
//!
//! Run with:
//!   cargo run --example async-monitor --features async -- 192.168.0.10:8888

use dashcan::frame::{AsyncFrameChannel, ChannelConfig};
use dashcan::signal::SignalDecoder;
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{}", dashcan::transport::DEFAULT_DEVICE_PORT));

    let stream = TcpStream::connect(&address).await?;
    eprintln!("Connected to {address}");

    let channel = AsyncFrameChannel::spawn(stream, ChannelConfig::default(), None);
    let mut decoder = SignalDecoder::new();
    for id in decoder.ids() {
        channel.register_filter(id, id);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            frame = channel.pop() => match frame {
                Some(frame) => match decoder.decode(&frame) {
                    Ok(decoded) => {
                        if let Some(event) = decoded.event {
                            println!("{event:?}");
                        }
                    }
                    Err(err) => eprintln!("{err}"),
                },
                None if channel.is_stopped() || !channel.is_polling() => {
                    eprintln!("Adapter link closed");
                    break;
                }
                None => {}
            },
        }
    }

    channel.shutdown().await;
    Ok(())
}
