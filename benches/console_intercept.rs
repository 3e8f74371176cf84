//! Benchmarks for console calls with and without the interceptor installed

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use sessiontap::clock::SessionClock;
use sessiontap::event::{ConsoleLevel, EventLog, EventSink};
use sessiontap::host::{Console, ConsoleMethod, HostEnvironment};
use sessiontap::intercept::{ConsoleInterceptor, Interceptor};

fn quiet_host() -> HostEnvironment {
    HostEnvironment::builder()
        .console(Console::with_methods(|_| {
            Arc::new(|_: &[serde_json::Value]| {}) as Arc<dyn ConsoleMethod>
        }))
        .build()
}

fn bench_console(c: &mut Criterion) {
    let args = [json!("user clicked"), json!({"button": "save", "attempt": 3})];

    let host = quiet_host();
    c.bench_function("console_unwrapped", |b| {
        b.iter(|| host.console().log(black_box(&args)));
    });

    let host = quiet_host();
    let log = Arc::new(EventLog::new());
    let session = log.begin(SessionClock::start());
    let sink = EventSink::new(Arc::clone(&log), session, 500);
    let mut interceptor = ConsoleInterceptor::new(ConsoleLevel::ALL.to_vec());
    interceptor.install(&host, &sink);

    c.bench_function("console_recorded", |b| {
        b.iter(|| host.console().log(black_box(&args)));
    });

    interceptor.uninstall(&host);
    black_box(log.finish().len());
}

criterion_group!(benches, bench_console);
criterion_main!(benches);
