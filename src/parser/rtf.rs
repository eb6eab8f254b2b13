//! Compressed RTF (`PR_RTF_COMPRESSED`, MS-OXRTFCP) decompression.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ConvertError, Result};

const MAGIC_COMPRESSED: u32 = 0x7546_5A4C; // "LZFu"
const MAGIC_UNCOMPRESSED: u32 = 0x414C_454D; // "MELA"
const HEADER_LEN: usize = 16;
const DICT_SIZE: usize = 4096;
/// Upper bound on output bytes per compressed byte, used to size the buffer.
const MAX_EXPANSION: usize = 8;

/// Pre-loaded dictionary contents defined by the format.
const INITIAL_DICT: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}{\\f0\\fnil \\froman \
\\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArialTimes New RomanCourier\
{\\colortbl\\red0\\green0\\blue0\r\n\\par \\pard\\plain\\f0\\fs20\\b\\i\\u\\tab\\tx";

/// Decompress a `PR_RTF_COMPRESSED` stream into raw RTF bytes.
pub fn decompress_rtf(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < HEADER_LEN {
        return Err(ConvertError::Rtf(format!(
            "stream too short ({} bytes)",
            data.len()
        )));
    }
    let comp_size = LittleEndian::read_u32(&data[0..4]) as usize;
    let raw_size = LittleEndian::read_u32(&data[4..8]) as usize;
    let magic = LittleEndian::read_u32(&data[8..12]);

    // comp_size counts everything after its own field
    let end = comp_size.saturating_add(4).min(data.len());
    let body = &data[HEADER_LEN..end.max(HEADER_LEN)];

    match magic {
        MAGIC_UNCOMPRESSED => Ok(body[..raw_size.min(body.len())].to_vec()),
        MAGIC_COMPRESSED => Ok(decompress_lzfu(body, raw_size)),
        other => Err(ConvertError::Rtf(format!(
            "unknown compression type 0x{other:08X}"
        ))),
    }
}

fn decompress_lzfu(body: &[u8], raw_size: usize) -> Vec<u8> {
    let mut dict = [0u8; DICT_SIZE];
    dict[..INITIAL_DICT.len()].copy_from_slice(INITIAL_DICT);
    let mut write_pos = INITIAL_DICT.len();

    let mut out = Vec::with_capacity(raw_size.min(body.len().saturating_mul(MAX_EXPANSION)));
    let mut pos = 0;

    'outer: while pos < body.len() {
        let control = body[pos];
        pos += 1;

        for bit in 0..8 {
            if pos >= body.len() {
                break 'outer;
            }
            if control & (1 << bit) == 0 {
                let byte = body[pos];
                pos += 1;
                out.push(byte);
                dict[write_pos] = byte;
                write_pos = (write_pos + 1) % DICT_SIZE;
                continue;
            }

            if pos + 1 >= body.len() {
                break 'outer;
            }
            let token = u16::from_be_bytes([body[pos], body[pos + 1]]);
            pos += 2;
            let offset = usize::from(token >> 4);
            let length = usize::from(token & 0x0F) + 2;
            if offset == write_pos {
                break 'outer;
            }
            for i in 0..length {
                let byte = dict[(offset + i) % DICT_SIZE];
                out.push(byte);
                dict[write_pos] = byte;
                write_pos = (write_pos + 1) % DICT_SIZE;
            }
        }
    }

    out.truncate(raw_size);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(comp_size: usize, raw_size: usize, magic: u32) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(&(comp_size as u32).to_le_bytes());
        h.extend_from_slice(&(raw_size as u32).to_le_bytes());
        h.extend_from_slice(&magic.to_le_bytes());
        h.extend_from_slice(&0u32.to_le_bytes());
        h
    }

    /// Encode `text` as literal runs followed by the end-of-stream reference.
    fn compress_literals(text: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        let mut write_pos = INITIAL_DICT.len();
        let mut chunks = text.chunks(8).peekable();
        let mut terminated = false;
        while let Some(chunk) = chunks.next() {
            let last = chunks.peek().is_none();
            let mut control = 0u8;
            if last && chunk.len() < 8 {
                control |= 1 << chunk.len();
            }
            body.push(control);
            body.extend_from_slice(chunk);
            write_pos = (write_pos + chunk.len()) % DICT_SIZE;
            if last && chunk.len() < 8 {
                body.extend_from_slice(&((write_pos as u16) << 4).to_be_bytes());
                terminated = true;
            }
        }
        if !terminated {
            body.push(0x01);
            body.extend_from_slice(&((write_pos as u16) << 4).to_be_bytes());
        }
        let mut data = header(body.len() + 12, text.len(), MAGIC_COMPRESSED);
        data.extend_from_slice(&body);
        data
    }

    #[test]
    fn test_initial_dictionary_length() {
        assert_eq!(INITIAL_DICT.len(), 207);
    }

    #[test]
    fn test_literal_stream() {
        let rtf = b"{\\rtf1 hello world}";
        let data = compress_literals(rtf);
        assert_eq!(decompress_rtf(&data).unwrap(), rtf);
    }

    #[test]
    fn test_literal_stream_multiple_of_eight() {
        let rtf = b"{\\rtf1 abcdefgh}";
        assert_eq!(rtf.len() % 8, 0);
        assert_eq!(decompress_rtf(&compress_literals(rtf)).unwrap(), rtf);
    }

    #[test]
    fn test_reference_into_initial_dictionary() {
        // Control 0b0000_0101: one reference (offset 0, length 6 = "{\rtf1"),
        // then literal "}" and the end marker at write position 207 + 7
        let mut body = vec![0b0000_0101];
        body.extend_from_slice(&4u16.to_be_bytes());
        body.push(b'}');
        body.extend_from_slice(&((207u16 + 7) << 4).to_be_bytes());
        let mut data = header(body.len() + 12, 7, MAGIC_COMPRESSED);
        data.extend_from_slice(&body);
        assert_eq!(decompress_rtf(&data).unwrap(), b"{\\rtf1}");
    }

    #[test]
    fn test_uncompressed_stream() {
        let rtf = b"{\\rtf1 plain}";
        let mut data = header(rtf.len() + 12, rtf.len(), MAGIC_UNCOMPRESSED);
        data.extend_from_slice(rtf);
        assert_eq!(decompress_rtf(&data).unwrap(), rtf);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(decompress_rtf(&[0u8; 5]).is_err());
        let data = header(12, 0, 0xDEAD_BEEF);
        assert!(decompress_rtf(&data).is_err());
    }

    #[test]
    fn test_truncated_stream_does_not_panic() {
        let mut data = compress_literals(b"{\\rtf1 truncated text}");
        data.truncate(data.len() - 5);
        let out = decompress_rtf(&data).unwrap();
        assert!(out.starts_with(b"{\\rtf1"));
    }

    #[test]
    fn test_oversized_raw_size_is_not_preallocated() {
        let rtf = b"{\\rtf1 small}";
        let mut data = compress_literals(rtf);
        data[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        let out = decompress_rtf(&data).unwrap();
        assert_eq!(out, rtf);
        assert!(out.capacity() <= data.len() * MAX_EXPANSION);
    }
}
