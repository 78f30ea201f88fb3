//! RFC 6455 frame encoding and decoding.
//!
//! Only unfragmented frames are supported. Payload lengths use the 7-bit or
//! 16-bit forms; the 64-bit form (base length 127) is recognized and rejected.

use crate::network::Read;
use crate::network::error::Error;

/// Largest payload a single frame can carry with a 16-bit length.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

const FIN: u8 = 0x80;
const MASK: u8 = 0x80;

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    /// One of the opcodes RFC 6455 leaves reserved.
    Reserved(u8),
}

impl Opcode {
    pub fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            other => Opcode::Reserved(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Reserved(value) => value & 0x0F,
        }
    }
}

/// One decoded frame, already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub masked: bool,
    pub payload: Vec<u8>,
}

/// Encodes a final frame. With `mask` set the payload is XOR-masked and the
/// mask bit and key are written.
///
/// Fails with [`Error::FrameTooLarge`] above [`MAX_FRAME_PAYLOAD`].
pub fn encode(opcode: Opcode, payload: &[u8], mask: Option<[u8; 4]>) -> Result<Vec<u8>, Error> {
    let mut header: heapless::Vec<u8, 8> = heapless::Vec::new();
    let mask_bit = if mask.is_some() { MASK } else { 0 };
    let len = payload.len();

    // Capacity 8 fits the largest header we emit (2 + 2 + 4).
    let _ = header.push(FIN | opcode.as_u8());
    if len <= 125 {
        let _ = header.push(mask_bit | len as u8);
    } else if len <= MAX_FRAME_PAYLOAD {
        let _ = header.push(mask_bit | 126);
        let _ = header.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        log::warn!("[ws] payload of {len} bytes exceeds {MAX_FRAME_PAYLOAD}, not sent");
        return Err(Error::FrameTooLarge);
    }
    if let Some(key) = mask {
        let _ = header.extend_from_slice(&key);
    }

    let mut out = Vec::with_capacity(header.len() + len);
    out.extend_from_slice(&header);
    match mask {
        Some(key) => out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4])),
        None => out.extend_from_slice(payload),
    }
    Ok(out)
}

struct Header {
    fin: bool,
    opcode: Opcode,
    mask: Option<[u8; 4]>,
    len: usize,
    size: usize,
}

/// Parses a header from the start of `buf`. `Ok(None)` means more bytes are
/// needed.
fn parse_header(buf: &[u8], max_payload: usize) -> Result<Option<Header>, Error> {
    let [b0, b1, ..] = *buf else {
        return Ok(None);
    };
    let fin = b0 & FIN != 0;
    let opcode = Opcode::from_u8(b0);
    let masked = b1 & MASK != 0;

    let (len, mut size) = match b1 & 0x7F {
        126 => match buf.get(2..4) {
            Some(ext) => (usize::from(u16::from_be_bytes([ext[0], ext[1]])), 4),
            None => return Ok(None),
        },
        127 => {
            log::warn!("[ws] 64-bit payload length not supported");
            return Err(Error::ProtocolError);
        }
        short => (usize::from(short), 2),
    };

    if !fin || opcode == Opcode::Continuation {
        log::warn!("[ws] fragmented frames not supported");
        return Err(Error::ProtocolError);
    }
    if len > max_payload {
        log::warn!("[ws] payload of {len} bytes exceeds limit of {max_payload}");
        return Err(Error::FrameTooLarge);
    }

    let mask = if masked {
        match buf.get(size..size + 4) {
            Some(key) => {
                size += 4;
                Some([key[0], key[1], key[2], key[3]])
            }
            None => return Ok(None),
        }
    } else {
        None
    };
    Ok(Some(Header { fin, opcode, mask, len, size }))
}

fn unmask(payload: &mut [u8], mask: Option<[u8; 4]>) {
    if let Some(key) = mask {
        for (i, b) in payload.iter_mut().enumerate() {
            *b ^= key[i % 4];
        }
    }
}

/// Decodes one frame from the start of `buf`.
///
/// Returns the frame and the number of bytes it occupied, or `Ok(None)` if
/// `buf` holds only part of a frame.
pub fn decode(buf: &[u8], max_payload: usize) -> Result<Option<(Frame, usize)>, Error> {
    let Some(header) = parse_header(buf, max_payload)? else {
        return Ok(None);
    };
    let end = header.size + header.len;
    let Some(body) = buf.get(header.size..end) else {
        return Ok(None);
    };
    let mut payload = body.to_vec();
    unmask(&mut payload, header.mask);
    let frame = Frame {
        fin: header.fin,
        opcode: header.opcode,
        masked: header.mask.is_some(),
        payload,
    };
    Ok(Some((frame, end)))
}

/// Reads frames off a byte stream.
///
/// Bytes that arrived before the reader was created (for example right after
/// the upgrade response headers) are passed in as `prefix` and consumed first.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: Read<Error = Error>> FrameReader<R> {
    pub fn new(inner: R, prefix: Vec<u8>) -> Self {
        Self { inner, buffer: prefix }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads the next frame. `Ok(None)` means the stream ended cleanly
    /// between frames.
    pub fn read_frame(&mut self, max_payload: usize) -> Result<Option<Frame>, Error> {
        let mut chunk = [0u8; 512];
        loop {
            if let Some((frame, used)) = decode(&self.buffer, max_payload)? {
                self.buffer.drain(..used);
                return Ok(Some(frame));
            }
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    log::warn!("[ws] stream ended inside a frame");
                    Err(Error::ConnectionClosed)
                };
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        type Error = Error;

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_text_lengths_roundtrip() {
        for len in [0usize, 1, 125, 126, 1000, 65535] {
            let text = "x".repeat(len);
            let bytes = encode(Opcode::Text, text.as_bytes(), None).unwrap();
            let expected_header = match len {
                0..=125 => 2,
                _ => 4,
            };
            assert_eq!(bytes.len(), expected_header + len);
            let (frame, used) = decode(&bytes, MAX_FRAME_PAYLOAD).unwrap().unwrap();
            assert_eq!(used, bytes.len());
            assert_eq!(frame.opcode, Opcode::Text);
            assert!(frame.fin);
            assert!(!frame.masked);
            assert_eq!(frame.payload, text.as_bytes());
        }
    }

    #[test]
    fn test_oversized_send_is_rejected() {
        let payload = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        assert_eq!(encode(Opcode::Binary, &payload, None), Err(Error::FrameTooLarge));
    }

    #[test]
    fn test_header_bytes() {
        assert_eq!(encode(Opcode::Text, b"hi", None).unwrap(), [0x81, 0x02, b'h', b'i']);
        assert_eq!(&encode(Opcode::Binary, &[0; 300], None).unwrap()[..4], [0x82, 126, 0x01, 0x2C]);
        assert_eq!(encode(Opcode::Pong, b"", None).unwrap(), [0x8A, 0x00]);
    }

    #[test]
    fn test_masked_roundtrip() {
        let key = [0x37, 0xfa, 0x21, 0x3d];
        let bytes = encode(Opcode::Text, b"Hello", Some(key)).unwrap();
        // RFC 6455 section 5.7 example.
        assert_eq!(bytes, [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]);
        let (frame, _) = decode(&bytes, 4096).unwrap().unwrap();
        assert!(frame.masked);
        assert_eq!(frame.payload, b"Hello");
    }

    #[test]
    fn test_partial_input() {
        let bytes = encode(Opcode::Binary, &[7; 200], None).unwrap();
        for cut in [0, 1, 3, 100, bytes.len() - 1] {
            assert_eq!(decode(&bytes[..cut], 4096).unwrap(), None);
        }
    }

    #[test]
    fn test_rejections() {
        assert_eq!(decode(&[0x81, 127, 0, 0, 0, 0, 0, 0, 0, 1], 4096), Err(Error::ProtocolError));
        assert_eq!(decode(&[0x01, 0x01, b'a'], 4096), Err(Error::ProtocolError));
        assert_eq!(decode(&[0x80, 0x01, b'a'], 4096), Err(Error::ProtocolError));
        let big = encode(Opcode::Binary, &[0; 5000], None).unwrap();
        assert_eq!(decode(&big, 4096), Err(Error::FrameTooLarge));
    }

    #[test]
    fn test_reader_with_prefix_and_trickle() {
        let mut stream = encode(Opcode::Text, b"first", None).unwrap();
        stream.extend(encode(Opcode::Ping, b"p", None).unwrap());
        stream.extend(encode(Opcode::Binary, &[1, 2, 3], None).unwrap());
        let (prefix, rest) = stream.split_at(3);

        let mut reader = FrameReader::new(
            Trickle { data: rest.to_vec(), pos: 0, step: 2 },
            prefix.to_vec(),
        );
        assert_eq!(reader.read_frame(4096).unwrap().unwrap().payload, b"first");
        assert_eq!(reader.read_frame(4096).unwrap().unwrap().opcode, Opcode::Ping);
        assert_eq!(reader.read_frame(4096).unwrap().unwrap().payload, [1, 2, 3]);
        assert_eq!(reader.read_frame(4096).unwrap(), None);
    }

    #[test]
    fn test_reader_truncated_frame() {
        let bytes = encode(Opcode::Text, b"cut short", None).unwrap();
        let mut reader = FrameReader::new(
            Trickle { data: bytes[..5].to_vec(), pos: 0, step: 64 },
            Vec::new(),
        );
        assert_eq!(reader.read_frame(4096), Err(Error::ConnectionClosed));
    }
}
