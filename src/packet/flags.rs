//! Control flags carried in the low four bits of the header `flags` field.

use std::fmt;

/// SYN flag - synchronize, first leg of the handshake
pub const SYN: u16 = 1 << 3;
/// ACK flag - acknowledgment field is significant
pub const ACK: u16 = 1 << 2;
/// FIN flag - last packet of the transfer
pub const FIN: u16 = 1 << 1;
/// Reserved bit. Never set and never interpreted.
pub const RESERVED: u16 = 1 << 0;

/// Decoded view of the flag bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
}

impl Flags {
    /// No flags: a plain data packet.
    pub const NONE: Flags = Flags {
        syn: false,
        ack: false,
        fin: false,
    };
    pub const SYN: Flags = Flags {
        syn: true,
        ack: false,
        fin: false,
    };
    pub const ACK: Flags = Flags {
        syn: false,
        ack: true,
        fin: false,
    };
    pub const FIN: Flags = Flags {
        syn: false,
        ack: false,
        fin: true,
    };
    pub const SYN_ACK: Flags = Flags {
        syn: true,
        ack: true,
        fin: false,
    };

    /// Decode the wire value. Bit 0 is ignored.
    pub fn decode(raw: u16) -> Self {
        Flags {
            syn: raw & SYN != 0,
            ack: raw & ACK != 0,
            fin: raw & FIN != 0,
        }
    }

    /// Encode into the wire value. Bit 0 stays clear.
    pub fn encode(self) -> u16 {
        (self.syn as u16) << 3 | (self.ack as u16) << 2 | (self.fin as u16) << 1
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&flags_to_string(self.encode()))
    }
}

/// Combines flags for human-readable display, e.g. `SA-` for SYN+ACK
pub fn flags_to_string(flags: u16) -> String {
    format!(
        "{}{}{}",
        if flags & SYN != 0 { "S" } else { "-" },
        if flags & ACK != 0 { "A" } else { "-" },
        if flags & FIN != 0 { "F" } else { "-" },
    )
}

/// Short name of the packet kind, used in traffic logs.
pub fn packet_kind(flags: Flags) -> &'static str {
    if flags.fin {
        "fin"
    } else if flags.syn && flags.ack {
        "syn-ack"
    } else if flags.ack {
        "ack"
    } else if flags.syn {
        "syn"
    } else {
        "data"
    }
}
