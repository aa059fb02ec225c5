use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::GcsError;

const DEFAULT_MAX_LENGTH: usize = 64 * 1024;

/// Framing for GCS 2.0 messages.
///
/// A response ends at a LF that is not preceded by a space; multi-line
/// answers separate their lines with `" \n"`. The controller speaks
/// Latin-1, so every byte maps straight to the matching code point.
#[derive(Debug, Clone)]
pub struct GcsCodec {
    next_index: usize,
    max_length: usize,
}

impl GcsCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
        }
    }
}

impl Default for GcsCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for GcsCodec {
    type Item = String;
    type Error = GcsError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, GcsError> {
        let mut index = self.next_index;

        while let Some(offset) = buf[index..].iter().position(|b| *b == b'\n') {
            let lf = index + offset;
            if lf > 0 && buf[lf - 1] == b' ' {
                index = lf + 1;
                continue;
            }

            let frame = buf.split_to(lf + 1);
            self.next_index = 0;
            return Ok(Some(frame.iter().map(|&b| b as char).collect()));
        }

        if buf.len() > self.max_length {
            return Err(GcsError::InvalidResponse(format!(
                "response exceeds {} bytes without terminator",
                self.max_length
            )));
        }

        self.next_index = buf.len();
        Ok(None)
    }
}

impl Encoder<String> for GcsCodec {
    type Error = GcsError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), GcsError> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        if !item.ends_with('\n') {
            dst.put_u8(b'\n');
        }
        Ok(())
    }
}
