use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use progseq::{SampleConfig, Seq2SeqConfig};
use tch::{Device, Kind, Tensor};

fn model_config() -> Seq2SeqConfig {
    Seq2SeqConfig {
        encoder_vocab_size: 50,
        decoder_vocab_size: 40,
        wordvec_dim: 64,
        hidden_dim: 128,
        ..Seq2SeqConfig::default()
    }
}

/// Random content tokens that never contain the null, start or end token.
fn tokens(batch_size: i64, seq_len: i64, vocab_size: i64) -> Tensor {
    Tensor::randint_low(3, vocab_size, &[batch_size, seq_len], (Kind::Int64, Device::Cpu))
}

fn teacher_forced_loss(c: &mut Criterion) {
    let config = model_config();
    let model = config.build_module(Device::Cpu).unwrap();

    let mut group = c.benchmark_group("seq2seq_loss_batch_size");
    for batch_size in [1_i64, 8, 64] {
        let x = tokens(batch_size, 20, config.encoder_vocab_size as i64);
        let y = tokens(batch_size, 30, config.decoder_vocab_size as i64);
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &(x, y),
            |b, (x, y)| b.iter_with_large_drop(|| model.forward(x, y)),
        );
    }
    group.finish();
}

fn reinforce_sample(c: &mut Criterion) {
    let config = model_config();
    let model = config.build_module(Device::Cpu).unwrap();
    let sample_config = SampleConfig::default();

    let mut group = c.benchmark_group("seq2seq_reinforce_sample_batch_size");
    for batch_size in [1_i64, 8, 64] {
        let x = tokens(batch_size, 20, config.encoder_vocab_size as i64);
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &x, |b, x| {
            b.iter_with_large_drop(|| model.reinforce_sample(x, &sample_config, &mut ()))
        });
    }
    group.finish();
}

fn greedy_sample(c: &mut Criterion) {
    let config = model_config();
    let model = config.build_module(Device::Cpu).unwrap();
    let x = tokens(1, 20, config.encoder_vocab_size as i64);
    c.bench_function("seq2seq_greedy_sample", |b| {
        b.iter(|| model.sample(&x, progseq::Seq2Seq::GREEDY_MAX_LENGTH))
    });
}

criterion_group!(benches, teacher_forced_loss, reinforce_sample, greedy_sample);
criterion_main!(benches);
