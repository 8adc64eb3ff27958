
use crate::arq::Method;
use crate::channel::mock::TxLog;
use crate::channel::MockChannel;
use crate::clock::{MockClock, SystemClock};
use crate::error::{Error, Result};
use crate::fault::FaultInjector;
use crate::packet::{Flags, MAX_PAYLOAD};
use crate::session::{Receiver, Sender, SessionOptions, TransferStats};
use packets::{acks, header, pattern, seqs, PacketFactory};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const FILE_NAME: &str = "payload.bin";

fn sender_addr() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn receiver_addr() -> SocketAddr {
    "127.0.0.1:8088".parse().unwrap()
}

fn test_opts() -> SessionOptions {
    SessionOptions {
        min_timeout: Duration::from_millis(150),
        idle_timeout: Some(Duration::from_secs(5)),
        linger: Duration::from_millis(300),
        ..SessionOptions::default()
    }
}

/// One end-to-end transfer over a pair of mock channels.
struct Transfer {
    method: Method,
    window: u16,
    data: Vec<u8>,
    sender_channel: MockChannel,
    receiver_channel: MockChannel,
    sender_fault: Option<FaultInjector>,
    receiver_fault: Option<FaultInjector>,
}

struct Outcome {
    received: Vec<u8>,
    sender: TransferStats,
    receiver: TransferStats,
    sender_log: Vec<Vec<u8>>,
    receiver_log: Vec<Vec<u8>>,
}

impl Transfer {
    fn new(method: Method, window: u16, data: Vec<u8>) -> Self {
        let (sender_channel, receiver_channel) = MockChannel::pair(sender_addr(), receiver_addr());
        Transfer {
            method,
            window,
            data,
            sender_channel,
            receiver_channel,
            sender_fault: None,
            receiver_fault: None,
        }
    }

    /// Lose matching datagrams sent by the sender.
    fn drop_sent(mut self, filter: impl FnMut(&[u8]) -> bool + Send + 'static) -> Self {
        self.sender_channel = self.sender_channel.with_drop_filter(filter);
        self
    }

    /// Lose matching datagrams sent by the receiver.
    fn drop_acks(mut self, filter: impl FnMut(&[u8]) -> bool + Send + 'static) -> Self {
        self.receiver_channel = self.receiver_channel.with_drop_filter(filter);
        self
    }

    fn run(self) -> Outcome {
        let method = self.method;
        let sender_log: TxLog = self.sender_channel.tx_log();
        let receiver_log: TxLog = self.receiver_channel.tx_log();

        let receiver_channel = self.receiver_channel;
        let receiver_fault = self.receiver_fault;
        let server = thread::spawn(move || -> Result<(Vec<u8>, TransferStats)> {
            let mut receiver = Receiver::accept(receiver_channel, Arc::new(SystemClock), test_opts())?;
            if let Some(fault) = receiver_fault {
                receiver = receiver.with_fault(fault);
            }
            let announcement = receiver.expect_announcement(method)?;
            assert_eq!(announcement.file_name, FILE_NAME);
            receiver.receive(method)
        });

        let mut sender = Sender::connect(
            self.sender_channel,
            receiver_addr(),
            Arc::new(SystemClock),
            test_opts(),
        )
        .unwrap();
        if let Some(fault) = self.sender_fault {
            sender = sender.with_fault(fault);
        }
        sender.announce(FILE_NAME, method).unwrap();
        let sent = sender
            .send(method, self.window, self.data.as_slice())
            .unwrap();

        let (received, receiver_stats) = server.join().unwrap().unwrap();
        let sender_log = sender_log.lock().unwrap().clone();
        let receiver_log = receiver_log.lock().unwrap().clone();
        Outcome {
            received,
            sender: sent,
            receiver: receiver_stats,
            sender_log,
            receiver_log,
        }
    }
}

/// Drop the first transmission of each listed data sequence number.
fn lose_once(seqs: &[u32]) -> impl FnMut(&[u8]) -> bool + Send + 'static {
    let mut pending: HashSet<u32> = seqs.iter().copied().collect();
    move |bytes| {
        let h = header(bytes);
        h.flags() == Flags::NONE && h.seq > 0 && pending.remove(&h.seq)
    }
}

#[test]
fn test_round_trip_all_methods_and_sizes() {
    for method in [Method::StopAndWait, Method::GoBackN, Method::SelectiveRepeat] {
        for len in [0, MAX_PAYLOAD, 2 * MAX_PAYLOAD, 3000, 50_000] {
            let data = pattern(len);
            let outcome = Transfer::new(method, 5, data.clone()).run();
            assert_eq!(outcome.received, data, "{method} with {len} bytes");
            assert_eq!(outcome.sender.bytes, len as u64);
            assert_eq!(outcome.receiver.bytes, len as u64);
        }
    }
}

#[test]
fn test_stop_and_wait_3000_bytes() {
    let data = pattern(3000);
    let outcome = Transfer::new(Method::StopAndWait, 5, data.clone()).run();

    assert_eq!(outcome.received, data);
    assert_eq!(outcome.sender.packets, 3, "1460 + 1460 + 80");
    assert_eq!(seqs(&outcome.sender_log), vec![1, 2, 3, 4]);

    let fin = header(outcome.sender_log.last().unwrap());
    assert!(fin.flags().fin, "transfer ends with a FIN");
    assert_eq!(fin.window, 0, "stop-and-wait advertises no window");
    assert_eq!(acks(&outcome.receiver_log), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_go_back_n_lost_packets_are_resent_in_order() {
    // 9 data packets: window of 4 covers 5..=8 in the second round
    let data = pattern(8 * MAX_PAYLOAD + 100);
    let outcome = Transfer::new(Method::GoBackN, 4, data.clone())
        .drop_sent(lose_once(&[5, 6]))
        .run();

    assert_eq!(outcome.received, data);
    assert!(outcome.sender.timeouts >= 1);

    let acked = acks(&outcome.receiver_log);
    let first = |n: u32| acked.iter().position(|&a| a == n).unwrap();
    assert!(first(6) < first(7), "7 acked before 6 arrived: {acked:?}");
    assert!(
        acked.windows(2).all(|w| w[0] <= w[1]),
        "cumulative acks never go backwards: {acked:?}"
    );

    // Whole window went out again after the timeout
    let sent = seqs(&outcome.sender_log);
    let resend = sent.iter().rposition(|&s| s == 5).unwrap();
    assert_eq!(&sent[resend..resend + 4], &[5, 6, 7, 8]);
    assert_eq!(header(&outcome.sender_log[3]).window, 4, "data advertises the window");
}

#[test]
fn test_selective_repeat_resends_only_the_lost_packet() {
    let data = pattern(6 * MAX_PAYLOAD);
    let outcome = Transfer::new(Method::SelectiveRepeat, 5, data.clone())
        .drop_sent(lose_once(&[2]))
        .run();

    assert_eq!(outcome.received, data);
    let sent = seqs(&outcome.sender_log);
    assert_eq!(sent.iter().filter(|&&s| s == 2).count(), 2);
    for seq in [1, 3, 4, 5] {
        assert_eq!(
            sent.iter().filter(|&&s| s == seq).count(),
            1,
            "seq {seq} was acked and must not be resent: {sent:?}"
        );
    }
}

#[test]
fn test_skip_ack_is_recovered() {
    let data = pattern(20 * MAX_PAYLOAD + 7);
    for (method, seed) in [
        (Method::StopAndWait, 1),
        (Method::GoBackN, 2),
        (Method::SelectiveRepeat, 3),
    ] {
        let mut transfer = Transfer::new(method, 5, data.clone());
        transfer.receiver_fault = Some(FaultInjector::seeded(seed));
        let outcome = transfer.run();
        assert_eq!(outcome.received, data, "{method}");
        assert_eq!(outcome.receiver.skipped, 1, "{method}");
    }
}

#[test]
fn test_skip_seq_is_recovered() {
    let data = pattern(20 * MAX_PAYLOAD + 7);
    for (method, seed) in [
        (Method::StopAndWait, 4),
        (Method::GoBackN, 5),
        (Method::SelectiveRepeat, 6),
    ] {
        let mut transfer = Transfer::new(method, 5, data.clone());
        transfer.sender_fault = Some(FaultInjector::seeded(seed));
        let outcome = transfer.run();
        assert_eq!(outcome.received, data, "{method}");
        assert_eq!(outcome.sender.skipped, 1, "{method}");
        assert!(outcome.sender.timeouts >= 1, "{method}");
    }
}

#[test]
fn test_lost_fin_ack_is_answered_while_lingering() {
    let data = pattern(2 * MAX_PAYLOAD);
    let mut dropped = false;
    let outcome = Transfer::new(Method::StopAndWait, 5, data.clone())
        .drop_acks(move |bytes| {
            let h = header(bytes);
            let hit = !dropped && h.flags() == Flags::ACK && h.ack == 3;
            dropped |= hit;
            hit
        })
        .run();

    assert_eq!(outcome.received, data);
    assert_eq!(seqs(&outcome.sender_log), vec![1, 2, 3, 3], "FIN sent twice");
    assert_eq!(outcome.sender.timeouts, 1);
}

#[test]
fn test_retries_exhausted_after_ten_rounds() {
    let channel = MockChannel::new(sender_addr());
    channel.inject("SYN-ACK", PacketFactory::syn_ack(1, 0), receiver_addr());
    let log = channel.tx_log();
    let opts = SessionOptions {
        min_timeout: Duration::from_millis(10),
        ..SessionOptions::default()
    };

    let mut sender = Sender::connect(channel, receiver_addr(), Arc::new(SystemClock), opts).unwrap();
    let result = sender.announce(FILE_NAME, Method::StopAndWait);
    assert!(
        matches!(result, Err(Error::RetriesExhausted(10))),
        "got {result:?}"
    );

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 12, "SYN, ACK and exactly ten announcements");
    assert!(log[2..].iter().all(|p| p == &log[2]));
}

#[test]
fn test_rtt_sets_timeout() {
    let clock = MockClock::new(Instant::now());
    let rtt = Duration::from_millis(30);
    let channel = MockChannel::new(sender_addr()).with_latency(clock.clone(), rtt);
    channel.inject("SYN-ACK", PacketFactory::syn_ack(1, 0), receiver_addr());
    let log = channel.tx_log();

    let sender = Sender::connect(channel, receiver_addr(), Arc::new(clock), SessionOptions::default())
        .unwrap();
    assert_eq!(sender.rtt(), rtt);
    assert_eq!(sender.timeout(), rtt * 4);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(header(&log[0]).flags(), Flags::SYN);
    let ack = header(&log[1]);
    assert_eq!(ack.flags(), Flags::ACK);
    assert_eq!(ack.seq, 0);
}

#[test]
fn test_handshake_failures_are_fatal() {
    let opts = SessionOptions {
        handshake_timeout: Duration::from_millis(50),
        ..SessionOptions::default()
    };

    // Silence
    let channel = MockChannel::new(sender_addr());
    let result = Sender::connect(channel, receiver_addr(), Arc::new(SystemClock), opts.clone());
    assert!(matches!(result, Err(Error::Handshake(_))));

    // Plain ACK instead of SYN-ACK
    let channel = MockChannel::new(sender_addr());
    channel.inject("ACK", PacketFactory::ack(1, 0), receiver_addr());
    let result = Sender::connect(channel, receiver_addr(), Arc::new(SystemClock), opts.clone());
    assert!(matches!(result, Err(Error::Handshake(_))));

    // SYN-ACK for the wrong sequence number
    let channel = MockChannel::new(sender_addr());
    channel.inject("SYN-ACK", PacketFactory::syn_ack(1, 5), receiver_addr());
    let result = Sender::connect(channel, receiver_addr(), Arc::new(SystemClock), opts.clone());
    assert!(matches!(result, Err(Error::Handshake(_))));

    // Truncated SYN-ACK
    let channel = MockChannel::new(sender_addr());
    channel.inject("runt", vec![0, 0, 0], receiver_addr());
    let result = Sender::connect(channel, receiver_addr(), Arc::new(SystemClock), opts.clone());
    assert!(matches!(
        result,
        Err(Error::MalformedHeader {
            expected: 12,
            actual: 3
        })
    ));
}

#[test]
fn test_receiver_handshake_rules() {
    let opts = SessionOptions {
        handshake_timeout: Duration::from_millis(50),
        idle_timeout: Some(Duration::from_millis(50)),
        ..SessionOptions::default()
    };

    // Data before SYN
    let channel = MockChannel::new(receiver_addr());
    channel.inject("data", PacketFactory::data(1, 0, b"x"), sender_addr());
    let result = Receiver::accept(channel, Arc::new(SystemClock), opts.clone());
    assert!(matches!(result, Err(Error::Handshake(_))));

    // Retransmitted SYN before the ACK
    let channel = MockChannel::new(receiver_addr());
    channel.inject("SYN", PacketFactory::syn(0), sender_addr());
    channel.inject("SYN again", PacketFactory::syn(0), sender_addr());
    channel.inject("ACK", PacketFactory::ack(0, 1), sender_addr());
    let log = channel.tx_log();
    let receiver = Receiver::accept(channel, Arc::new(SystemClock), opts.clone()).unwrap();
    assert_eq!(receiver.peer(), sender_addr());
    assert_eq!(log.lock().unwrap().len(), 1, "one SYN-ACK only");

    // Nobody shows up
    let channel = MockChannel::new(receiver_addr());
    let result = Receiver::accept(channel, Arc::new(SystemClock), opts.clone());
    assert!(matches!(result, Err(Error::Idle(_))));

    // SYN-ACK shape
    let channel = MockChannel::new(receiver_addr());
    channel.inject("SYN", PacketFactory::syn(0), sender_addr());
    channel.inject("ACK", PacketFactory::ack(0, 1), sender_addr());
    let log = channel.tx_log();
    let receiver = Receiver::accept(channel, Arc::new(SystemClock), opts).unwrap();
    assert_eq!(receiver.peer(), sender_addr());
    let syn_ack = header(&log.lock().unwrap()[0]);
    assert_eq!(syn_ack.flags(), Flags::SYN_ACK);
    assert_eq!((syn_ack.seq, syn_ack.ack, syn_ack.window), (1, 0, 64));
}

/// A receiver fed a fully scripted session.
fn scripted_receiver(script: Vec<(&str, Vec<u8>)>) -> (Receiver<MockChannel>, TxLog) {
    let channel = MockChannel::new(receiver_addr());
    for (desc, packet) in script {
        channel.inject(desc, packet, sender_addr());
    }
    let log = channel.tx_log();
    let opts = SessionOptions {
        idle_timeout: Some(Duration::from_millis(200)),
        linger: Duration::ZERO,
        ..SessionOptions::default()
    };
    let receiver = Receiver::accept(channel, Arc::new(SystemClock), opts).unwrap();
    (receiver, log)
}

#[test]
fn test_method_mismatch_is_fatal() {
    let (mut receiver, log) = scripted_receiver(vec![
        ("SYN", PacketFactory::syn(0)),
        ("ACK", PacketFactory::ack(0, 1)),
        ("announce gbn", PacketFactory::announcement(FILE_NAME, Method::GoBackN)),
    ]);
    let result = receiver.expect_announcement(Method::SelectiveRepeat);
    assert!(matches!(
        result,
        Err(Error::MethodMismatch {
            announced: Method::GoBackN,
            local: Method::SelectiveRepeat
        })
    ));
    assert_eq!(log.lock().unwrap().len(), 1, "only the SYN-ACK, no ack");
}

#[test]
fn test_duplicate_data_is_not_applied_twice() {
    for method in [Method::StopAndWait, Method::GoBackN, Method::SelectiveRepeat] {
        let window = method.advertised_window(4);
        let (mut receiver, log) = scripted_receiver(vec![
            ("SYN", PacketFactory::syn(0)),
            ("ACK", PacketFactory::ack(0, 1)),
            ("announce", PacketFactory::announcement(FILE_NAME, method)),
            ("announce again", PacketFactory::announcement(FILE_NAME, method)),
            ("data 1", PacketFactory::data(1, window, b"ab")),
            ("data 1 again", PacketFactory::data(1, window, b"ab")),
            ("data 2", PacketFactory::data(2, window, b"cd")),
            ("fin", PacketFactory::fin(3, window)),
        ]);
        receiver.expect_announcement(method).unwrap();
        let (received, stats) = receiver.receive(method).unwrap();

        assert_eq!(received, b"abcd", "{method}");
        assert_eq!(stats.bytes, 4);
        let log = log.lock().unwrap();
        assert_eq!(acks(&log), vec![0, 0, 1, 1, 2, 3], "{method}");

        // Receiver acks count up from zero on their own
        let ack_seqs: Vec<u32> = log[1..].iter().map(|p| header(p).seq).collect();
        assert_eq!(ack_seqs, vec![0, 1, 2, 3, 4, 5]);
    }
}

#[test]
fn test_idle_receiver_gives_up() {
    let (mut receiver, _log) = scripted_receiver(vec![
        ("SYN", PacketFactory::syn(0)),
        ("ACK", PacketFactory::ack(0, 1)),
        ("announce", PacketFactory::announcement(FILE_NAME, Method::GoBackN)),
        ("data 1", PacketFactory::data(1, 4, b"ab")),
    ]);
    receiver.expect_announcement(Method::GoBackN).unwrap();
    let result = receiver.receive(Method::GoBackN);
    assert!(matches!(result, Err(Error::Idle(_))));
}

#[test]
fn test_sender_rejects_non_ack_reply() {
    let channel = MockChannel::new(sender_addr());
    channel.inject("SYN-ACK", PacketFactory::syn_ack(1, 0), receiver_addr());
    channel.inject("data instead of ack", PacketFactory::data(9, 0, b"?"), receiver_addr());
    let mut sender =
        Sender::connect(channel, receiver_addr(), Arc::new(SystemClock), test_opts()).unwrap();
    let result = sender.announce(FILE_NAME, Method::StopAndWait);
    assert!(matches!(result, Err(Error::MissingAck(_))));
}

#[test]
fn test_repeated_syn_mid_session_is_ignored() {
    let (mut receiver, log) = scripted_receiver(vec![
        ("SYN", PacketFactory::syn(0)),
        ("ACK", PacketFactory::ack(0, 1)),
        ("SYN again", PacketFactory::syn(0)),
        ("announce", PacketFactory::announcement(FILE_NAME, Method::StopAndWait)),
        ("data 1", PacketFactory::data(1, 0, b"hello")),
        ("SYN once more", PacketFactory::syn(0)),
        ("fin", PacketFactory::fin(2, 0)),
    ]);
    receiver.expect_announcement(Method::StopAndWait).unwrap();
    let (received, stats) = receiver.receive(Method::StopAndWait).unwrap();

    assert_eq!(received, b"hello");
    assert_eq!(stats.packets, 1);
    let log = log.lock().unwrap();
    assert_eq!(acks(&log), vec![0, 1, 2]);
    assert_eq!(log.len(), 4, "SYN-ACK plus three acks");
}

#[test]
fn test_repeated_syn_ack_is_not_an_ack() {
    let opts = SessionOptions {
        min_timeout: Duration::from_millis(10),
        ..SessionOptions::default()
    };

    // Only the retransmitted SYN-ACK ever comes back
    let channel = MockChannel::new(sender_addr());
    channel.inject("SYN-ACK", PacketFactory::syn_ack(1, 0), receiver_addr());
    channel.inject("SYN-ACK again", PacketFactory::syn_ack(1, 0), receiver_addr());
    let log = channel.tx_log();
    let mut sender =
        Sender::connect(channel, receiver_addr(), Arc::new(SystemClock), opts.clone()).unwrap();
    let result = sender.announce(FILE_NAME, Method::StopAndWait);
    assert!(
        matches!(result, Err(Error::RetriesExhausted(10))),
        "got {result:?}"
    );
    assert_eq!(log.lock().unwrap().len(), 12);

    // The real ack behind it still completes the announcement
    let channel = MockChannel::new(sender_addr());
    channel.inject("SYN-ACK", PacketFactory::syn_ack(1, 0), receiver_addr());
    channel.inject("SYN-ACK again", PacketFactory::syn_ack(1, 0), receiver_addr());
    channel.inject("ack 0", PacketFactory::ack(0, 0), receiver_addr());
    let log = channel.tx_log();
    let mut sender =
        Sender::connect(channel, receiver_addr(), Arc::new(SystemClock), opts).unwrap();
    sender.announce(FILE_NAME, Method::StopAndWait).unwrap();
    assert_eq!(log.lock().unwrap().len(), 3, "SYN, ACK and one announcement");
}
