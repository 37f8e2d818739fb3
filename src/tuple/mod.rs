pub mod buffer;

/// Fixed size of one inbound tuple record.
pub const RECORD_LEN: usize = 18;

/// Offset of the value bytes within a record; the preceding 14 bytes are an
/// opaque header carried over from the upstream framing and never validated.
pub const VALUE_OFFSET: usize = 14;

/// Offset at which record decoding starts within a frame payload. The first
/// four payload bytes echo the frame's length field and are skipped.
pub const PAYLOAD_DATA_OFFSET: usize = 4;

/// Fixed header prepended to every outbound value record. The downstream
/// consumer matches these bytes exactly.
pub const RECORD_HEADER: [u8; 14] = [
    0x0e, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x18, 0x00,
];

/// Terminal end-of-stream marker record, also matched exactly downstream.
pub const EOS_MARKER: [u8; 4] = [0x00, 0x00, 0x04, 0x00];

/// Walk a frame payload and yield the value of each complete record.
///
/// A record exists only while a full 18 bytes remain; a shorter trailing
/// remainder silently ends the batch. That tolerance is part of the wire
/// contract, not an oversight.
pub fn record_values(payload: &[u8]) -> impl Iterator<Item = u32> + '_ {
    payload
        .get(PAYLOAD_DATA_OFFSET..)
        .unwrap_or(&[])
        .chunks_exact(RECORD_LEN)
        .map(|record| {
            u32::from_le_bytes([
                record[VALUE_OFFSET],
                record[VALUE_OFFSET + 1],
                record[VALUE_OFFSET + 2],
                record[VALUE_OFFSET + 3],
            ])
        })
}
