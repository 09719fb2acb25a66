//! Send one request to the local control API and print the raw response.

use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "api-probe")]
#[command(about = "Probe the node's local control API", long_about = None)]
struct Cli {
    /// Loopback port of the control API.
    #[arg(short, long, default_value_t = 5001)]
    port: u16,

    /// Request line to send.
    #[arg(short, long, default_value = "GET / HTTP/1.1")]
    request: String,

    /// Give up after this many milliseconds.
    #[arg(short, long, default_value_t = 5000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, cli.port));

    let budget = Duration::from_millis(cli.timeout_ms);
    match tokio::time::timeout(budget, probe(addr, &cli.request)).await {
        Ok(Ok(response)) if response.is_empty() => {
            eprintln!("connection closed without a response (at capacity or timed out)");
            ExitCode::from(2)
        }
        Ok(Ok(response)) => {
            print!("{}", String::from_utf8_lossy(&response));
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            eprintln!("probe failed: {}", e);
            ExitCode::FAILURE
        }
        Err(_) => {
            eprintln!("no response within {} ms", cli.timeout_ms);
            ExitCode::FAILURE
        }
    }
}

async fn probe(addr: SocketAddr, request: &str) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(format!("{}\r\n\r\n", request).as_bytes()).await?;

    let mut response = Vec::new();
    match stream.read_to_end(&mut response).await {
        Ok(_) => Ok(response),
        // A rejected connection may be reset rather than closed.
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
