//! Command line and its validation.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::arq::Method;
use crate::error::{Error, Result};
use crate::fault::TestCase;
use crate::session::SessionOptions;

pub const DEFAULT_PORT: u16 = 8088;
pub const DEFAULT_WINDOW: u16 = 5;

#[derive(Debug, Parser)]
#[command(name = "drtp", version, about = "Reliable file transfer over UDP")]
pub struct Cli {
    /// Run as the receiving server
    #[arg(short, long)]
    pub server: bool,

    /// Run as the sending client
    #[arg(short, long)]
    pub client: bool,

    /// Address to bind (server) or connect to (client)
    #[arg(short, long, default_value = "127.0.0.1")]
    pub ip: IpAddr,

    /// UDP port, 1024-65535
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Reliability method; both ends must agree
    #[arg(short = 'r', long, value_enum, default_value_t = Method::StopAndWait)]
    pub reliable_method: Method,

    /// File to send (client only)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Inject one lost ack (server) or one lost packet (client)
    #[arg(short, long, value_enum)]
    pub test_case: Option<TestCase>,

    /// Packets in flight for gbn and sr (client only) [default: 5]
    #[arg(short, long)]
    pub window_size: Option<u16>,

    /// Log every packet
    #[arg(short, long)]
    pub verbose: bool,

    /// Where the server writes received files
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Server gives up after this many seconds without a packet
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,

    /// Server keeps answering late packets this long after the transfer
    #[arg(long, default_value_t = 2000)]
    pub linger_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Server { output_dir: PathBuf },
    Client { file: PathBuf, window_size: u16 },
}

/// A validated invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    pub addr: SocketAddr,
    pub method: Method,
    pub test_case: Option<TestCase>,
    pub session: SessionOptions,
}

impl TryFrom<Cli> for Config {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Self> {
        if cli.port < 1024 {
            return Err(Error::Config(format!(
                "port {} is outside 1024-65535",
                cli.port
            )));
        }

        let role = match (cli.server, cli.client) {
            (true, true) => {
                return Err(Error::Config(
                    "--server and --client are mutually exclusive".into(),
                ))
            }
            (false, false) => {
                return Err(Error::Config("one of --server or --client is required".into()))
            }
            (true, false) => {
                if cli.file.is_some() {
                    return Err(Error::Config("the server does not take --file".into()));
                }
                if cli.window_size.is_some() {
                    return Err(Error::Config(
                        "the window size is chosen by the client".into(),
                    ));
                }
                if cli.test_case == Some(TestCase::SkipSeq) {
                    return Err(Error::Config("skip_seq is a client test case".into()));
                }
                Role::Server {
                    output_dir: cli.output_dir,
                }
            }
            (false, true) => {
                let file = cli
                    .file
                    .ok_or_else(|| Error::Config("the client needs --file".into()))?;
                if !file.is_file() {
                    return Err(Error::Config(format!("{} is not a file", file.display())));
                }
                let window_size = cli.window_size.unwrap_or(DEFAULT_WINDOW);
                if window_size == 0 {
                    return Err(Error::Config("window size must be at least 1".into()));
                }
                if cli.test_case == Some(TestCase::SkipAck) {
                    return Err(Error::Config("skip_ack is a server test case".into()));
                }
                Role::Client { file, window_size }
            }
        };

        let session = SessionOptions {
            idle_timeout: cli.idle_timeout_secs.map(Duration::from_secs),
            linger: Duration::from_millis(cli.linger_ms),
            ..SessionOptions::default()
        };

        Ok(Config {
            role,
            addr: SocketAddr::new(cli.ip, cli.port),
            method: cli.reliable_method,
            test_case: cli.test_case,
            session,
        })
    }
}
