use carmeleon_client::network::Read;
use carmeleon_client::network::application::websocket::Opcode;
use carmeleon_client::network::application::websocket::frame::{self, FrameReader, MAX_FRAME_PAYLOAD};
use carmeleon_client::network::error::Error;
use criterion::{BatchSize, Criterion, Throughput};
use std::hint::black_box;

const SIZES: [usize; 3] = [16, 1000, 4096];

/// Replays a byte buffer in fixed-size reads.
struct Replay {
    data: Vec<u8>,
    pos: usize,
}

impl Read for Replay {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let n = buf.len().min(self.data.len() - self.pos).min(1460);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

pub fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ws_encode");
    for size in SIZES {
        let payload = vec![0x5a; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("unmasked_{size}"), |b| {
            b.iter(|| frame::encode(Opcode::Binary, black_box(&payload), None).expect("encode"))
        });
        group.bench_function(format!("masked_{size}"), |b| {
            b.iter(|| {
                frame::encode(Opcode::Binary, black_box(&payload), Some([1, 2, 3, 4])).expect("encode")
            })
        });
    }
    group.finish();
}

pub fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ws_decode");
    for size in SIZES {
        let bytes = frame::encode(Opcode::Text, &vec![b'x'; size], None).expect("encode");
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("text_{size}"), |b| {
            b.iter(|| frame::decode(black_box(&bytes), MAX_FRAME_PAYLOAD).expect("decode"))
        });
    }
    group.finish();
}

pub fn bench_reader_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("ws_reader");
    let mut stream = Vec::new();
    for i in 0..100usize {
        let payload = vec![i as u8; 64 + i * 8];
        stream.extend(frame::encode(Opcode::Binary, &payload, None).expect("encode"));
    }
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("hundred_frames", |b| {
        b.iter_batched(
            || FrameReader::new(Replay { data: stream.clone(), pos: 0 }, Vec::new()),
            |mut reader| {
                while let Some(frame) = reader.read_frame(4096).expect("frame") {
                    black_box(frame);
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}
