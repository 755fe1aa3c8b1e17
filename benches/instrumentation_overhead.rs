//! Instrumentation and aggregation benchmarks
//!
//! Measures the cost of each pipeline stage separately, plus the slowdown a
//! profiled call pays for its timing points compared to the plain function.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench instrumentation_overhead
//! ```

use codpulse::aggregate::aggregate;
use codpulse::config::ProfilerConfig;
use codpulse::executor::{Trace, TraceEntry};
use codpulse::instrument::instrument;
use codpulse::preprocess::Preprocessor;
use codpulse::profiler::Tracker;
use codpulse::script::{Interpreter, PrintSink, Script, Value};
use codpulse::source::FunctionSource;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::rc::Rc;

/// Function with `blocks` sequential loop/branch blocks
fn synthetic_function(blocks: usize) -> String {
    let mut text = String::from("def work(n):\n    total = 0\n");
    for b in 0..blocks {
        text.push_str(&format!(
            "    for i in range(n):\n        if i % 2 == 0:\n            total = total + i * {b}\n        else:\n            total = total - 1\n"
        ));
    }
    text.push_str("    return total\n");
    text
}

fn synthetic_traces(runs: usize, points: usize) -> Vec<Trace> {
    (0..runs)
        .map(|run| Trace {
            entries: (0..points)
                .filter(|p| (p + run) % 5 != 0)
                .map(|ordinal| TraceEntry {
                    ordinal,
                    text: format!("x{} = {}", ordinal, run),
                    span: 0.000_1 * ((ordinal + run) % 7) as f64,
                })
                .collect(),
        })
        .collect()
}

/// Benchmark: preprocess + instrument for growing function bodies
fn bench_instrument(c: &mut Criterion) {
    let mut group = c.benchmark_group("instrument");
    let preprocessor = Preprocessor::default();

    for blocks in [1, 10, 50] {
        let source = FunctionSource::parse("work", &synthetic_function(blocks)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &source, |b, source| {
            b.iter(|| {
                let cleaned = preprocessor.process(black_box(source));
                black_box(instrument(&cleaned));
            });
        });
    }

    group.finish();
}

/// Benchmark: aggregation over ragged traces
fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for runs in [3, 30, 300] {
        let traces = synthetic_traces(runs, 200);
        group.bench_with_input(BenchmarkId::from_parameter(runs), &traces, |b, traces| {
            b.iter(|| black_box(aggregate(black_box(traces)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark: plain call vs instrumented call of the same function
fn bench_call_overhead(c: &mut Criterion) {
    let script = Script::from_source(synthetic_function(5)).unwrap();
    let mut group = c.benchmark_group("call_overhead");

    let mut plain = Interpreter::new(
        Rc::new(codpulse::clock::MonotonicClock::new()),
        PrintSink::Stderr,
    );
    plain.run(script.program()).unwrap();
    let function = plain.global("work").cloned().unwrap();
    group.bench_function("plain", |b| {
        b.iter(|| {
            black_box(
                plain
                    .call(&function, vec![Value::Int(20)], Vec::new(), 0)
                    .unwrap(),
            )
        });
    });

    let config = ProfilerConfig {
        iterations: 1,
        ..ProfilerConfig::default()
    };
    let mut tracker = Tracker::for_script(&script, "work", &config).unwrap();
    group.bench_function("instrumented", |b| {
        b.iter(|| {
            black_box(tracker.call(&[Value::Int(20)], &[]).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_instrument,
    bench_aggregate,
    bench_call_overhead
);
criterion_main!(benches);
