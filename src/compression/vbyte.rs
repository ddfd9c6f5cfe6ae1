use crate::core::error::{Error, ErrorKind, Result};

/// Variable byte encoding for integers (best for small integers)
pub struct VByteEncoder;

impl VByteEncoder {
    /// Encode single u32 value
    /// Values < 128 use 1 byte, < 16384 use 2 bytes, etc.
    pub fn encode_u32(output: &mut Vec<u8>, mut value: u32) -> Result<()> {
        while value >= 128 {
            output.push((value & 127) as u8 | 128);  // Set continuation bit
            value >>= 7;
        }
        output.push(value as u8);  // Last byte without continuation bit
        Ok(())
    }

    /// Encode array of u32 values
    pub fn encode_u32_list(nums: &[u32]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        for &num in nums {
            Self::encode_u32(&mut output, num)?;
        }
        Ok(output)
    }

    /// Decode single u32 value, returns (value, bytes_consumed)
    pub fn decode_u32(input: &[u8]) -> Result<(u32, usize)> {
        let mut value = 0u32;
        let mut shift = 0;
        let mut consumed = 0;

        for &byte in input {
            consumed += 1;
            value |= ((byte & 127) as u32) << shift;

            if byte & 128 == 0 {  // No continuation bit
                return Ok((value, consumed));
            }

            shift += 7;
            if shift > 28 {  // Max 5 bytes for u32
                return Err(Error::new(ErrorKind::Parse, "VByte overflow".to_string()));
            }
        }

        Err(Error::new(ErrorKind::Parse, "Incomplete VByte".to_string()))
    }

    /// Decode array of u32 values
    pub fn decode_u32_list(data: &[u8]) -> Result<Vec<u32>> {
        let mut nums = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let (value, consumed) = Self::decode_u32(&data[pos..])?;
            nums.push(value);
            pos += consumed;
        }

        Ok(nums)
    }

    /// Encode single u64 value (used for docId).
    pub fn encode_u64(output: &mut Vec<u8>, mut value: u64) -> Result<()> {
        while value >= 128 {
            output.push((value & 127) as u8 | 128);
            value >>= 7;
        }
        output.push(value as u8);
        Ok(())
    }

    /// Decode single u64 value, returns (value, bytes_consumed). Errs if the
    /// read runs past `input`'s end without finding a terminating byte.
    pub fn decode_u64(input: &[u8]) -> Result<(u64, usize)> {
        let mut value = 0u64;
        let mut shift = 0;
        let mut consumed = 0;

        for &byte in input {
            consumed += 1;
            value |= ((byte & 127) as u64) << shift;

            if byte & 128 == 0 {
                return Ok((value, consumed));
            }

            shift += 7;
            if shift > 63 {
                return Err(Error::new(ErrorKind::Parse, "VByte overflow".to_string()));
            }
        }

        Err(Error::new(ErrorKind::Parse, "Incomplete VByte".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_round_trips_across_byte_boundaries() {
        for value in [0u32, 1, 127, 128, 16_383, 16_384, 2_097_151, u32::MAX] {
            let mut buf = Vec::new();
            VByteEncoder::encode_u32(&mut buf, value).unwrap();
            let (decoded, consumed) = VByteEncoder::decode_u32(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn u64_round_trips_a_large_value() {
        let mut buf = Vec::new();
        VByteEncoder::encode_u64(&mut buf, u64::MAX).unwrap();
        let (decoded, consumed) = VByteEncoder::decode_u64(&buf).unwrap();
        assert_eq!(decoded, u64::MAX);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn u32_list_round_trips() {
        let nums = vec![0u32, 1, 300, 70_000, 5];
        let encoded = VByteEncoder::encode_u32_list(&nums).unwrap();
        let decoded = VByteEncoder::decode_u32_list(&encoded).unwrap();
        assert_eq!(decoded, nums);
    }

    #[test]
    fn decode_fails_on_truncated_input() {
        let mut buf = Vec::new();
        VByteEncoder::encode_u32(&mut buf, 300).unwrap();
        buf.truncate(1);
        let err = VByteEncoder::decode_u32(&buf).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Parse));
    }
}