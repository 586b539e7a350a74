use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use vibecode::core::attachment::{encode_batch, FileInput, MAX_ATTACHMENTS_PER_BATCH};
use vibecode::core::chat_stream::CumulativeText;
use vibecode::core::compose::{compose, Submission};
use vibecode::core::transport::StreamMessage;

fn make_inputs(n_files: usize, lines_per_file: usize) -> Vec<FileInput> {
    let line = "let value = compute(index, &mut state); // keep the pipeline warm\n";
    (0..n_files)
        .map(|i| {
            FileInput::from_bytes(
                format!("src/module_{i}.rs"),
                "text/x-rust",
                line.repeat(lines_per_file).into_bytes(),
            )
        })
        .collect()
}

fn bench_compose(c: &mut Criterion) {
    for &lines in &[50usize, 2000usize] {
        let inputs = make_inputs(MAX_ATTACHMENTS_PER_BATCH, lines);
        let total_bytes: u64 = inputs.iter().map(|i| i.size).sum();

        let mut group = c.benchmark_group(format!("compose_lines{}", lines));
        group.throughput(Throughput::Bytes(total_bytes));

        group.bench_function(BenchmarkId::new("encode_batch", lines), |b| {
            b.iter(|| encode_batch(black_box(inputs.clone())))
        });

        let attachments = encode_batch(inputs.clone()).attachments;
        let submission = Submission::new("refactor these modules", attachments)
            .expect("non-empty submission");
        group.bench_function(BenchmarkId::new("compose", lines), |b| {
            b.iter(|| compose(black_box(&submission)))
        });

        group.finish();
    }
}

fn bench_stream_folding(c: &mut Criterion) {
    let chunk = "Here is some streamed text with `code` in it. ";
    let mut group = c.benchmark_group("stream_folding");

    for &chunks in &[100usize, 1000usize] {
        let deltas: Vec<StreamMessage> = (0..chunks)
            .map(|_| StreamMessage::Delta(chunk.to_string()))
            .collect();
        group.throughput(Throughput::Elements(chunks as u64));
        group.bench_function(BenchmarkId::new("deltas", chunks), |b| {
            b.iter(|| {
                let mut text = CumulativeText::default();
                for delta in &deltas {
                    text.apply(black_box(delta));
                }
                text.into_string()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compose, bench_stream_folding);
criterion_main!(benches);
