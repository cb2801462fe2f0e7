//! Internal utilities.
//!
//! Size arithmetic for BER TLVs. The agent never encodes messages itself, but
//! it must know how large a response will be to honour the negotiated
//! maximum message size.

/// Octets used by a BER length field for `len` content octets.
#[inline]
pub(crate) fn length_encoded_len(len: usize) -> usize {
    if len < 0x80 {
        1
    } else {
        let mut octets = 0;
        let mut rest = len;
        while rest > 0 {
            octets += 1;
            rest >>= 8;
        }
        1 + octets
    }
}

/// Full TLV size (one tag octet) for `content_len` content octets.
#[inline]
pub(crate) fn tlv_len(content_len: usize) -> usize {
    1 + length_encoded_len(content_len) + content_len
}

/// Content octets of a two's-complement INTEGER.
pub(crate) fn integer_content_len(value: i32) -> usize {
    let mut len = 4;
    let bytes = value.to_be_bytes();
    while len > 1 {
        let first = bytes[4 - len];
        let next = bytes[4 - len + 1];
        let redundant = (first == 0x00 && next & 0x80 == 0) || (first == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        len -= 1;
    }
    len
}

/// Content octets of an unsigned value (a leading zero is added when the
/// high bit is set).
pub(crate) fn unsigned64_content_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let significant = 8 - (value.leading_zeros() as usize / 8);
    if value >> (significant * 8 - 1) & 1 == 1 {
        significant + 1
    } else {
        significant
    }
}

#[inline]
pub(crate) fn unsigned32_content_len(value: u32) -> usize {
    unsigned64_content_len(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_encoded_len() {
        assert_eq!(length_encoded_len(0), 1);
        assert_eq!(length_encoded_len(127), 1);
        assert_eq!(length_encoded_len(128), 2);
        assert_eq!(length_encoded_len(255), 2);
        assert_eq!(length_encoded_len(256), 3);
    }

    #[test]
    fn test_integer_content_len() {
        assert_eq!(integer_content_len(0), 1);
        assert_eq!(integer_content_len(127), 1);
        assert_eq!(integer_content_len(128), 2);
        assert_eq!(integer_content_len(-1), 1);
        assert_eq!(integer_content_len(-128), 1);
        assert_eq!(integer_content_len(-129), 2);
        assert_eq!(integer_content_len(i32::MAX), 4);
        assert_eq!(integer_content_len(i32::MIN), 4);
    }

    #[test]
    fn test_unsigned_content_len() {
        assert_eq!(unsigned32_content_len(0), 1);
        assert_eq!(unsigned32_content_len(127), 1);
        assert_eq!(unsigned32_content_len(128), 2);
        assert_eq!(unsigned32_content_len(u32::MAX), 5);
        assert_eq!(unsigned64_content_len(u64::MAX), 9);
    }
}
