use criterion::{criterion_group, criterion_main};

mod cookies;
mod network;

criterion_group!(
    benches,
    network::application::websocket::bench_encode,
    network::application::websocket::bench_decode,
    network::application::websocket::bench_reader_stream,
    cookies::bench_parse_set_cookie,
    cookies::bench_cookie_header
);
criterion_main!(benches);
