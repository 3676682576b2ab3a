//! Benchmarks for response parsing
//!
//! This benchmark measures:
//! - JSON call extraction from prose
//! - Call-expression extraction and literal typing
//! - ReAct step splitting

use ai_fn_runtime::{parse_call, parse_react_step, CallEncoding, ResponseParser};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const JSON_REPLY: &str = r#"Let me check that for you.
{"name": "get_weather", "parameters": {"location": "San Francisco, CA", "unit": "celsius", "days": 3}}
I'll report back shortly."#;

const CALL_REPLY: &str =
    r#"[search_flights(origin="SFO", destination="JFK", passengers=2, flexible=True, tags=['nonstop', "red-eye"])]"#;

const REACT_REPLY: &str = r#" The user wants the weather, so I should call the tool.
Action: get_weather
Action Input: {"location": "Paris", "unit": "celsius"}
Observation: this line was written by the model and must be ignored"#;

const PROSE_REPLY: &str = "The capital of France is Paris (population about 2.1 million). \
It sits on the Seine and is known for its museums, cafes and architecture.";

fn bench_call_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("call_extraction");

    group.throughput(Throughput::Bytes(JSON_REPLY.len() as u64));
    group.bench_function("json_in_prose", |b| {
        b.iter(|| parse_call(black_box(JSON_REPLY)))
    });

    group.throughput(Throughput::Bytes(CALL_REPLY.len() as u64));
    let call_only = ResponseParser::only(CallEncoding::CallExpression);
    group.bench_function("call_expression", |b| {
        b.iter(|| call_only.parse(black_box(CALL_REPLY)))
    });

    group.throughput(Throughput::Bytes(PROSE_REPLY.len() as u64));
    group.bench_function("no_call_found", |b| {
        b.iter(|| parse_call(black_box(PROSE_REPLY)))
    });

    group.finish();
}

fn bench_react_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("react_step");
    group.throughput(Throughput::Bytes(REACT_REPLY.len() as u64));
    group.bench_function("action_with_input", |b| {
        b.iter(|| parse_react_step(black_box(REACT_REPLY)))
    });
    group.bench_function("final_answer", |b| {
        b.iter(|| parse_react_step(black_box("I know this.\nFinal Answer: 42")))
    });
    group.finish();
}

criterion_group!(benches, bench_call_extraction, bench_react_step);
criterion_main!(benches);
