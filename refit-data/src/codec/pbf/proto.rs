//! The handful of protobuf encoding primitives the PBF writer needs.

const WIRE_VARINT: u64 = 0;
const WIRE_LEN: u64 = 2;

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Zig-zag mapping used by `sint32`/`sint64` fields.
pub(super) const fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// An encoded protobuf message under construction.
#[derive(Debug, Default, Clone)]
pub(super) struct Message {
    buf: Vec<u8>,
}

impl Message {
    pub(super) fn new() -> Self {
        Self::default()
    }

    fn key(&mut self, field: u32, wire: u64) {
        put_varint(&mut self.buf, (u64::from(field) << 3) | wire);
    }

    /// `uint32`, `uint64`, `bool` and enum fields.
    pub(super) fn uint(&mut self, field: u32, value: u64) {
        self.key(field, WIRE_VARINT);
        put_varint(&mut self.buf, value);
    }

    /// `int32` and `int64` fields; negative values take ten bytes.
    pub(super) fn int(&mut self, field: u32, value: i64) {
        self.uint(field, value as u64);
    }

    /// `sint32` and `sint64` fields.
    pub(super) fn sint(&mut self, field: u32, value: i64) {
        self.uint(field, zigzag(value));
    }

    pub(super) fn bytes(&mut self, field: u32, value: &[u8]) {
        self.key(field, WIRE_LEN);
        put_varint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value);
    }

    pub(super) fn string(&mut self, field: u32, value: &str) {
        self.bytes(field, value.as_bytes());
    }

    pub(super) fn message(&mut self, field: u32, value: &Self) {
        self.bytes(field, &value.buf);
    }

    /// Packed repeated varints; empty lists are omitted.
    pub(super) fn packed_uint(&mut self, field: u32, values: impl IntoIterator<Item = u64>) {
        let mut packed = Vec::new();
        for value in values {
            put_varint(&mut packed, value);
        }
        if !packed.is_empty() {
            self.bytes(field, &packed);
        }
    }

    /// Packed repeated zig-zag varints.
    pub(super) fn packed_sint(&mut self, field: u32, values: impl IntoIterator<Item = i64>) {
        self.packed_uint(field, values.into_iter().map(zigzag));
    }

    /// Packed repeated zig-zag varints of successive differences.
    pub(super) fn packed_delta(&mut self, field: u32, values: impl IntoIterator<Item = i64>) {
        let mut previous = 0_i64;
        self.packed_sint(
            field,
            values.into_iter().map(|value| {
                let delta = value.wrapping_sub(previous);
                previous = value;
                delta
            }),
        );
    }

    pub(super) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(super) fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(-1, 1)]
    #[case(1, 2)]
    #[case(-2, 3)]
    #[case(i64::MAX, u64::MAX - 1)]
    #[case(i64::MIN, u64::MAX)]
    fn zigzag_matches_protobuf(#[case] input: i64, #[case] expected: u64) {
        assert_eq!(zigzag(input), expected);
    }

    #[rstest]
    fn encodes_varint_fields() {
        let mut message = Message::new();
        message.uint(1, 300);
        assert_eq!(message.as_bytes(), &[0x08, 0xac, 0x02]);
    }

    #[rstest]
    fn encodes_length_delimited_fields() {
        let mut message = Message::new();
        message.string(2, "hi");
        assert_eq!(message.as_bytes(), &[0x12, 0x02, b'h', b'i']);
    }

    #[rstest]
    fn delta_packing_restarts_from_zero() {
        let mut message = Message::new();
        message.packed_delta(8, [5, 7, 6]);
        // deltas 5, 2, -1 zig-zag to 10, 4, 1
        assert_eq!(message.as_bytes(), &[0x42, 0x03, 10, 4, 1]);
    }

    #[rstest]
    fn empty_packed_fields_are_omitted() {
        let mut message = Message::new();
        message.packed_uint(2, std::iter::empty());
        assert_eq!(message.len(), 0);
    }
}
