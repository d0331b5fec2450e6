#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `wire` encodes and decodes the three datagram kinds exchanged by the
//! sender and receiver: `META`, `DATA`, and `ACK_BATCH`. Every integer field
//! is big-endian and there is no padding between fields, so every frame has
//! a fixed, statically known minimum length that the decoder checks before
//! touching any byte of it.
//!
//! # Design
//!
//! The wire kinds are modeled as a closed sum type, [`Frame`], with one
//! variant per kind. [`parse_frame`] inspects the leading type byte and
//! dispatches to a per-kind decoder; there is no inheritance or trait-object
//! indirection because the set of kinds is closed and known at compile time.
//! A fourth type byte (`3`, [`TERMINATION_TYPE`]) is reserved by the wire
//! format but has no corresponding frame kind here — no termination frame is
//! ever produced or consumed.
//!
//! # Invariants
//!
//! - `encode(parse(x)) == x` for every well-formed frame `x`.
//! - Decoding never allocates beyond the frame's own fields, and never reads
//!   past the declared length of its kind.
//! - Decoders do not validate semantic constraints such as `chunk_id <
//!   total_chunks` or extension NUL-termination; that is the engines'
//!   responsibility, not the codec's.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Type byte identifying a [`MetaHeader`] frame.
pub const META_TYPE: u8 = 1;
/// Type byte identifying a [`DataHeader`] frame.
pub const DATA_TYPE: u8 = 2;
/// Type byte reserved for a termination frame. Not produced or consumed here.
pub const TERMINATION_TYPE: u8 = 3;
/// Type byte identifying an [`AckBatch`] frame.
pub const ACK_BATCH_TYPE: u8 = 4;

/// Exact wire length of a META frame.
pub const META_LEN: usize = 27;
/// Wire length of a DATA frame's header, not counting the payload.
pub const DATA_HEADER_LEN: usize = 15;
/// Wire length of an ACK_BATCH frame's header, not counting the ids.
pub const ACK_BATCH_HEADER_LEN: usize = 11;
/// Maximum number of chunk ids a single ACK_BATCH may carry.
pub const MAX_ACK_IDS: usize = 256;
/// Width in bytes of the `ext` field of a META frame.
pub const EXT_LEN: usize = 4;

/// Errors raised while decoding a frame from a datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer is shorter than the declared kind requires.
    #[error("frame shorter than required for its kind")]
    ShortFrame,
    /// The leading type byte does not match any known kind.
    #[error("unrecognized frame type byte {0}")]
    UnknownType(u8),
    /// An ACK_BATCH was asked to carry more ids than the wire format allows.
    #[error("ack batch carries {0} ids, more than the {MAX_ACK_IDS} allowed")]
    TooManyAcks(usize),
}

/// The fixed fields of a META frame, not including the leading type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetaHeader {
    /// Identifies one logical transfer; chosen by the sender.
    pub transfer_id: u64,
    /// Total size of the source file, in bytes.
    pub file_size: u64,
    /// Bytes per full chunk.
    pub chunk_size: u16,
    /// `ceil(file_size / chunk_size)`.
    pub total_chunks: u32,
    /// NUL-padded ASCII extension, at most 3 visible characters.
    pub ext: [u8; EXT_LEN],
}

impl MetaHeader {
    /// Builds the `ext` field from a path extension, truncating to the first
    /// 3 bytes and always leaving room for (and writing) a NUL terminator.
    pub fn ext_from_str(extension: &str) -> [u8; EXT_LEN] {
        let mut ext = [0u8; EXT_LEN];
        let bytes = extension.as_bytes();
        let take = bytes.len().min(EXT_LEN - 1);
        ext[..take].copy_from_slice(&bytes[..take]);
        ext
    }

    /// Renders `ext` back into a `String`, stopping at the first NUL.
    pub fn ext_as_str(&self) -> String {
        let end = self.ext.iter().position(|&b| b == 0).unwrap_or(EXT_LEN);
        String::from_utf8_lossy(&self.ext[..end]).into_owned()
    }
}

/// The fixed fields of a DATA frame's header, not including the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataHeader {
    /// Transfer this chunk belongs to.
    pub transfer_id: u64,
    /// Position of this chunk within the file, in `[0, total_chunks)`.
    pub chunk_id: u32,
    /// Number of payload bytes following the header.
    pub payload_length: u16,
}

/// A decoded ACK_BATCH: a transfer id plus the chunk ids being acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AckBatch {
    /// Transfer the acknowledged ids belong to.
    pub transfer_id: u64,
    /// Acknowledged chunk ids, in wire order. May contain duplicates.
    pub ids: Vec<u32>,
}

/// A decoded frame of one of the three known kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A META frame.
    Meta(MetaHeader),
    /// A DATA frame: header plus the payload bytes that followed it.
    Data { header: DataHeader, payload: Bytes },
    /// An ACK_BATCH frame.
    AckBatch(AckBatch),
}

fn read_u16(buf: &[u8], off: usize) -> Result<u16, FrameError> {
    let slice = buf.get(off..off + 2).ok_or(FrameError::ShortFrame)?;
    Ok(u16::from_be_bytes([slice[0], slice[1]]))
}

fn read_u32(buf: &[u8], off: usize) -> Result<u32, FrameError> {
    let slice = buf.get(off..off + 4).ok_or(FrameError::ShortFrame)?;
    Ok(u32::from_be_bytes(slice.try_into().unwrap()))
}

fn read_u64(buf: &[u8], off: usize) -> Result<u64, FrameError> {
    let slice = buf.get(off..off + 8).ok_or(FrameError::ShortFrame)?;
    Ok(u64::from_be_bytes(slice.try_into().unwrap()))
}

/// Encodes a META header, emitting exactly [`META_LEN`] bytes.
pub fn encode_meta(header: &MetaHeader) -> Bytes {
    let mut buf = BytesMut::with_capacity(META_LEN);
    buf.put_u8(META_TYPE);
    buf.put_u64(header.transfer_id);
    buf.put_u64(header.file_size);
    buf.put_u16(header.chunk_size);
    buf.put_u32(header.total_chunks);
    buf.put_slice(&header.ext);
    debug_assert_eq!(buf.len(), META_LEN);
    buf.freeze()
}

/// Encodes a DATA header, emitting exactly [`DATA_HEADER_LEN`] bytes. The
/// caller appends the payload as a separate buffer to support scatter-gather
/// sends instead of copying it into this one.
pub fn encode_data_header(header: &DataHeader) -> Bytes {
    let mut buf = BytesMut::with_capacity(DATA_HEADER_LEN);
    buf.put_u8(DATA_TYPE);
    buf.put_u64(header.transfer_id);
    buf.put_u32(header.chunk_id);
    buf.put_u16(header.payload_length);
    debug_assert_eq!(buf.len(), DATA_HEADER_LEN);
    buf.freeze()
}

/// Encodes an ACK_BATCH frame for `ids`, emitting
/// `ACK_BATCH_HEADER_LEN + 4 * ids.len()` bytes.
///
/// # Errors
///
/// Returns [`FrameError::TooManyAcks`] if `ids.len() > MAX_ACK_IDS`.
pub fn encode_ack_batch(transfer_id: u64, ids: &[u32]) -> Result<Bytes, FrameError> {
    if ids.len() > MAX_ACK_IDS {
        return Err(FrameError::TooManyAcks(ids.len()));
    }
    let mut buf = BytesMut::with_capacity(ACK_BATCH_HEADER_LEN + ids.len() * 4);
    buf.put_u8(ACK_BATCH_TYPE);
    buf.put_u64(transfer_id);
    buf.put_u16(ids.len() as u16);
    for id in ids {
        buf.put_u32(*id);
    }
    Ok(buf.freeze())
}

fn parse_meta(buf: &[u8]) -> Result<MetaHeader, FrameError> {
    if buf.len() < META_LEN {
        return Err(FrameError::ShortFrame);
    }
    let transfer_id = read_u64(buf, 1)?;
    let file_size = read_u64(buf, 9)?;
    let chunk_size = read_u16(buf, 17)?;
    let total_chunks = read_u32(buf, 19)?;
    let mut ext = [0u8; EXT_LEN];
    ext.copy_from_slice(&buf[23..23 + EXT_LEN]);
    Ok(MetaHeader {
        transfer_id,
        file_size,
        chunk_size,
        total_chunks,
        ext,
    })
}

fn parse_data(buf: &[u8]) -> Result<(DataHeader, Bytes), FrameError> {
    if buf.len() < DATA_HEADER_LEN {
        return Err(FrameError::ShortFrame);
    }
    let transfer_id = read_u64(buf, 1)?;
    let chunk_id = read_u32(buf, 9)?;
    let payload_length = read_u16(buf, 13)?;
    let payload = Bytes::copy_from_slice(&buf[DATA_HEADER_LEN..]);
    Ok((
        DataHeader {
            transfer_id,
            chunk_id,
            payload_length,
        },
        payload,
    ))
}

fn parse_ack_batch(buf: &[u8]) -> Result<AckBatch, FrameError> {
    if buf.len() < ACK_BATCH_HEADER_LEN {
        return Err(FrameError::ShortFrame);
    }
    let transfer_id = read_u64(buf, 1)?;
    let count = read_u16(buf, 9)? as usize;
    let needed = ACK_BATCH_HEADER_LEN + count * 4;
    if buf.len() < needed {
        return Err(FrameError::ShortFrame);
    }
    let mut ids = Vec::with_capacity(count);
    let mut off = ACK_BATCH_HEADER_LEN;
    for _ in 0..count {
        ids.push(read_u32(buf, off)?);
        off += 4;
    }
    Ok(AckBatch { transfer_id, ids })
}

/// Decodes `buf` into a [`Frame`] by inspecting its leading type byte.
///
/// # Errors
///
/// Returns [`FrameError::ShortFrame`] if `buf` is empty or shorter than the
/// minimum length of the kind its type byte declares, and
/// [`FrameError::UnknownType`] for any other type byte (including the
/// reserved [`TERMINATION_TYPE`]).
pub fn parse_frame(buf: &[u8]) -> Result<Frame, FrameError> {
    let kind = *buf.first().ok_or(FrameError::ShortFrame)?;
    match kind {
        META_TYPE => parse_meta(buf).map(Frame::Meta),
        DATA_TYPE => {
            let (header, payload) = parse_data(buf)?;
            Ok(Frame::Data { header, payload })
        }
        ACK_BATCH_TYPE => parse_ack_batch(buf).map(Frame::AckBatch),
        other => Err(FrameError::UnknownType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> MetaHeader {
        MetaHeader {
            transfer_id: 7,
            file_size: 5,
            chunk_size: 1200,
            total_chunks: 1,
            ext: MetaHeader::ext_from_str("txt"),
        }
    }

    #[test]
    fn meta_round_trips() {
        let meta = sample_meta();
        let bytes = encode_meta(&meta);
        assert_eq!(bytes.len(), META_LEN);
        match parse_frame(&bytes).unwrap() {
            Frame::Meta(parsed) => assert_eq!(parsed, meta),
            other => panic!("expected Meta, got {other:?}"),
        }
    }

    #[test]
    fn ext_truncates_to_three_visible_bytes_plus_nul() {
        let ext = MetaHeader::ext_from_str("jpeg");
        assert_eq!(&ext, b"jpe\0");
        let meta = MetaHeader {
            ext,
            ..sample_meta()
        };
        assert_eq!(meta.ext_as_str(), "jpe");
    }

    #[test]
    fn short_ext_is_nul_padded() {
        let ext = MetaHeader::ext_from_str("c");
        assert_eq!(&ext, b"c\0\0\0");
    }

    #[test]
    fn data_header_and_payload_round_trip() {
        let header = DataHeader {
            transfer_id: 42,
            chunk_id: 3,
            payload_length: 5,
        };
        let mut bytes = encode_data_header(&header).to_vec();
        bytes.extend_from_slice(b"aevin");
        match parse_frame(&bytes).unwrap() {
            Frame::Data {
                header: parsed,
                payload,
            } => {
                assert_eq!(parsed, header);
                assert_eq!(&payload[..], b"aevin");
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn ack_batch_round_trips() {
        let ids = vec![0, 1, 2, 2, 5];
        let bytes = encode_ack_batch(9, &ids).unwrap();
        assert_eq!(bytes.len(), ACK_BATCH_HEADER_LEN + ids.len() * 4);
        match parse_frame(&bytes).unwrap() {
            Frame::AckBatch(batch) => {
                assert_eq!(batch.transfer_id, 9);
                assert_eq!(batch.ids, ids);
            }
            other => panic!("expected AckBatch, got {other:?}"),
        }
    }

    #[test]
    fn ack_batch_rejects_too_many_ids() {
        let ids = vec![0u32; MAX_ACK_IDS + 1];
        assert_eq!(
            encode_ack_batch(1, &ids).unwrap_err(),
            FrameError::TooManyAcks(MAX_ACK_IDS + 1)
        );
    }

    #[test]
    fn empty_buffer_is_short_frame() {
        assert_eq!(parse_frame(&[]).unwrap_err(), FrameError::ShortFrame);
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        assert_eq!(parse_frame(&[9, 0, 0]).unwrap_err(), FrameError::UnknownType(9));
    }

    #[test]
    fn termination_type_byte_is_unknown_here() {
        assert_eq!(
            parse_frame(&[TERMINATION_TYPE, 0, 0]).unwrap_err(),
            FrameError::UnknownType(TERMINATION_TYPE)
        );
    }

    #[test]
    fn truncated_meta_is_short_frame() {
        let bytes = encode_meta(&sample_meta());
        assert_eq!(
            parse_frame(&bytes[..META_LEN - 1]).unwrap_err(),
            FrameError::ShortFrame
        );
    }

    #[test]
    fn ack_batch_declaring_more_ids_than_present_is_short_frame() {
        let mut bytes = encode_ack_batch(1, &[1, 2]).unwrap().to_vec();
        bytes.truncate(bytes.len() - 4);
        assert_eq!(parse_frame(&bytes).unwrap_err(), FrameError::ShortFrame);
    }

    #[test]
    fn data_frame_does_not_validate_declared_payload_length() {
        let header = DataHeader {
            transfer_id: 1,
            chunk_id: 0,
            payload_length: 100,
        };
        let mut bytes = encode_data_header(&header).to_vec();
        bytes.extend_from_slice(b"short");
        match parse_frame(&bytes).unwrap() {
            Frame::Data { header: h, payload } => {
                assert_eq!(h.payload_length, 100);
                assert_eq!(payload.len(), 5);
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }
}
