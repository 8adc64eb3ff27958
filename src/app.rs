//! The client and server programs behind the command line.

use std::fs::{self, File};
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::arq::Method;
use crate::channel::UdpChannel;
use crate::clock::SystemClock;
use crate::config::{Config, Role};
use crate::error::{Error, Result};
use crate::fault::{FaultInjector, TestCase};
use crate::report;
use crate::session::{Receiver, Sender, SessionOptions, TransferStats};

pub fn run(config: Config) -> Result<()> {
    let Config {
        role,
        addr,
        method,
        test_case,
        session,
    } = config;
    match role {
        Role::Server { output_dir } => {
            let (path, stats) = serve(addr, method, test_case, &output_dir, session)?;
            info!(path = %path.display(), "file written");
            println!("{}", report::block(&report::server_summary(&stats)));
        }
        Role::Client { file, window_size } => {
            let stats = send_file(addr, method, window_size, test_case, &file, session)?;
            println!("{}", report::block(&report::client_summary(&stats)));
        }
    }
    Ok(())
}

/// Accept one transfer on `addr` and store it under `output_dir`.
pub fn serve(
    addr: SocketAddr,
    method: Method,
    test_case: Option<TestCase>,
    output_dir: &Path,
    opts: SessionOptions,
) -> Result<(PathBuf, TransferStats)> {
    let channel = UdpChannel::bind(addr)?;
    info!(%addr, method = method.long_name(), "listening");

    let mut receiver = Receiver::accept(channel, Arc::new(SystemClock), opts)?;
    if test_case == Some(TestCase::SkipAck) {
        receiver = receiver.with_fault(FaultInjector::from_entropy());
    }
    let announcement = receiver.expect_announcement(method)?;
    let (data, stats) = receiver.receive(method)?;

    let path = output_dir.join(received_name(&announcement.file_name));
    fs::write(&path, &data)?;
    Ok((path, stats))
}

/// Send `file` to the server at `addr`.
pub fn send_file(
    addr: SocketAddr,
    method: Method,
    window_size: u16,
    test_case: Option<TestCase>,
    file: &Path,
    opts: SessionOptions,
) -> Result<TransferStats> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Config(format!("{} has no usable file name", file.display())))?;
    let reader = BufReader::new(File::open(file)?);

    let channel = UdpChannel::connect(addr)?;
    let mut sender = Sender::connect(channel, addr, Arc::new(SystemClock), opts)?;
    if test_case == Some(TestCase::SkipSeq) {
        sender = sender.with_fault(FaultInjector::from_entropy());
    }
    sender.announce(name, method)?;
    sender.send(method, window_size, reader)
}

/// `photo.jpg` is stored as `photo-recv.jpg`.
pub fn received_name(file_name: &str) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-recv.{ext}"),
        None => format!("{stem}-recv"),
    }
}
