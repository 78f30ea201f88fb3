use carmeleon_client::cookies::{CookieJar, parse_set_cookie};
use carmeleon_client::storage::MemoryStore;
use carmeleon_client::system::clock::ManualClock;
use criterion::Criterion;
use std::hint::black_box;
use std::sync::Arc;

const HEADERS: [&str; 3] = [
    "sid=abc",
    "token=eyJhbGciOi; Max-Age=3600; Path=/; Secure; HttpOnly",
    "pref=dark; Expires=Wed, 21 Oct 2037 07:28:00 GMT; Domain=example.com",
];

pub fn bench_parse_set_cookie(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_cookie_parse");
    for (i, header) in HEADERS.iter().enumerate() {
        group.bench_function(format!("header_{i}"), |b| {
            b.iter(|| parse_set_cookie(black_box(header)).map(|cookie| cookie.expire_at(1_700_000_000)))
        });
    }
    group.finish();
}

pub fn bench_cookie_header(c: &mut Criterion) {
    let jar = CookieJar::new(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(1_700_000_000)));
    for i in 0..20 {
        jar.process_set_cookie(&format!("name{i}=value{i}; Max-Age=86400"), "bench.example");
    }
    c.bench_function("cookie_header_20", |b| {
        b.iter(|| jar.valid_cookie_header(black_box("bench.example")))
    });
}
