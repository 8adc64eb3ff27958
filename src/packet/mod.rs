mod flags;
mod header;

pub use self::flags::{flags_to_string, packet_kind, Flags};
pub use self::flags::{ACK, FIN, RESERVED, SYN};
pub use self::header::{encode, Header, Packet, HEADER_LEN, MAX_PACKET, MAX_PAYLOAD};
