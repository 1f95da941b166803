/// Decode a raw capture of client-to-server bytes and print each message.
///
/// cargo run --example dump_capture -- capture.bin
/// RUST_LOG=debug cargo run --example dump_capture -- capture.bin
use anyhow::Context;
use pgwire_frontend::{FrontendMessage, FrontendStream, StartupPacket};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: dump_capture <capture-file>")?;
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("open {path}"))?;
    let mut conn = FrontendStream::new(tokio::io::BufReader::new(file));

    while let Some(packet) = conn.next_startup().await? {
        match packet {
            StartupPacket::SslRequest(_) => println!("SSLRequest"),
            StartupPacket::GssEncRequest => println!("GSSENCRequest"),
            StartupPacket::CancelRequest(c) => {
                println!("CancelRequest pid={} key={}", c.process_id, c.secret_key);
                return Ok(());
            }
            StartupPacket::Startup(m) => {
                println!(
                    "StartupMessage version={}.{} user={:?} database={:?} options={:?}",
                    m.major_version(),
                    m.minor_version(),
                    m.user,
                    m.database,
                    m.options
                );
                break;
            }
        }
    }

    while let Some(msg) = conn.next().await? {
        match msg {
            FrontendMessage::Password(_) => println!("PasswordMessage <redacted>"),
            FrontendMessage::Query(q) => println!("Query {:?}", q.query),
            FrontendMessage::Terminate(_) => println!("Terminate"),
            FrontendMessage::Unrecognized(tag) => {
                println!("unrecognized message 0x{tag:02x} ('{}')", tag as char)
            }
        }
    }

    Ok(())
}
