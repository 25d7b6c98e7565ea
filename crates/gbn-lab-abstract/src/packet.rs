use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the sequence prefix carried by [`FrameMode::Sequenced`] data units.
pub const SEQ_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("acknowledgment is not a decimal sequence number: {0:?}")]
    MalformedAck(String),
    #[error("data unit of {0} bytes is too short for a sequence prefix")]
    Truncated(usize),
}

/// How data units are laid out on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameMode {
    /// The datagram is the bare payload; the receiver infers the sequence
    /// number from arrival order.
    #[default]
    Implicit,
    /// A 4-byte big-endian sequence number precedes the payload and the
    /// receiver checks it against the unit it expects.
    Sequenced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    Data,
    Ack,
}

/// A datagram travelling between the two endpoints.
///
/// `seq_num` is the originating endpoint's label (unit number or ack number)
/// and is used by channels and traces only. Packets rebuilt from raw
/// datagrams carry `None`; the endpoints always read `body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub kind: PacketKind,
    pub seq_num: Option<u32>,
    pub body: Bytes,
}

impl Packet {
    pub fn data(seq: u32, body: Bytes) -> Self {
        Self {
            kind: PacketKind::Data,
            seq_num: Some(seq),
            body,
        }
    }

    pub fn ack(ack: u32) -> Self {
        Self {
            kind: PacketKind::Ack,
            seq_num: Some(ack),
            body: encode_ack(ack),
        }
    }

    /// Wrap a datagram that arrived from the network.
    pub fn from_wire(kind: PacketKind, body: Bytes) -> Self {
        Self {
            kind,
            seq_num: None,
            body,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.kind == PacketKind::Ack
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// A data unit as seen by the receiver after unframing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// Sequence number carried on the wire, if the frame mode has one.
    pub seq: Option<u32>,
    pub payload: Bytes,
}

pub fn encode_data(seq: u32, payload: &[u8], mode: FrameMode) -> Bytes {
    match mode {
        FrameMode::Implicit => Bytes::copy_from_slice(payload),
        FrameMode::Sequenced => {
            let mut buf = BytesMut::with_capacity(SEQ_PREFIX_LEN + payload.len());
            buf.put_u32(seq);
            buf.put_slice(payload);
            buf.freeze()
        }
    }
}

pub fn decode_data(body: &Bytes, mode: FrameMode) -> Result<DataFrame, WireError> {
    match mode {
        FrameMode::Implicit => Ok(DataFrame {
            seq: None,
            payload: body.clone(),
        }),
        FrameMode::Sequenced => {
            if body.len() < SEQ_PREFIX_LEN {
                return Err(WireError::Truncated(body.len()));
            }
            let seq = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
            Ok(DataFrame {
                seq: Some(seq),
                payload: body.slice(SEQ_PREFIX_LEN..),
            })
        }
    }
}

/// Acks travel as the decimal numeral of the cumulative sequence number.
pub fn encode_ack(ack: u32) -> Bytes {
    Bytes::from(ack.to_string())
}

pub fn decode_ack(body: &[u8]) -> Result<u32, WireError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| WireError::MalformedAck(String::from_utf8_lossy(body).into_owned()))?;
    text.trim()
        .parse::<u32>()
        .map_err(|_| WireError::MalformedAck(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_is_plain_decimal_text() {
        assert_eq!(encode_ack(42).as_ref(), b"42");
        assert_eq!(encode_ack(0).as_ref(), b"0");
        assert_eq!(Packet::ack(17).body.as_ref(), b"17");
    }

    #[test]
    fn decode_ack_accepts_whitespace() {
        assert_eq!(decode_ack(b"7"), Ok(7));
        assert_eq!(decode_ack(b" 12\n"), Ok(12));
    }

    #[test]
    fn decode_ack_rejects_garbage() {
        assert!(matches!(decode_ack(b""), Err(WireError::MalformedAck(_))));
        assert!(matches!(decode_ack(b"ACK"), Err(WireError::MalformedAck(_))));
        assert!(matches!(decode_ack(b"-1"), Err(WireError::MalformedAck(_))));
        assert!(matches!(
            decode_ack(&[0xff, 0xfe]),
            Err(WireError::MalformedAck(_))
        ));
    }

    #[test]
    fn implicit_frames_carry_no_sequence() {
        let body = encode_data(9, b"XXXX", FrameMode::Implicit);
        assert_eq!(body.as_ref(), b"XXXX");
        let frame = decode_data(&body, FrameMode::Implicit).unwrap();
        assert_eq!(frame.seq, None);
        assert_eq!(frame.payload.as_ref(), b"XXXX");
    }

    #[test]
    fn sequenced_frames_prefix_big_endian_seq() {
        let body = encode_data(0x0102_0304, b"ab", FrameMode::Sequenced);
        assert_eq!(body.as_ref(), &[1, 2, 3, 4, b'a', b'b']);
        let frame = decode_data(&body, FrameMode::Sequenced).unwrap();
        assert_eq!(frame.seq, Some(0x0102_0304));
        assert_eq!(frame.payload.as_ref(), b"ab");
    }

    #[test]
    fn sequenced_frame_too_short() {
        let body = Bytes::from_static(&[0, 1]);
        assert_eq!(
            decode_data(&body, FrameMode::Sequenced),
            Err(WireError::Truncated(2))
        );
    }

    #[test]
    fn wire_packets_have_no_label() {
        let p = Packet::from_wire(PacketKind::Ack, Bytes::from_static(b"3"));
        assert!(p.is_ack());
        assert_eq!(p.seq_num, None);
        assert_eq!(p.len(), 1);
    }
}
