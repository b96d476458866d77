use aioracle::Genesis;
use aioracle_engine::{OracleEngine, RequestParams};
use aioracle_storage::MemoryDatabase;
use aioracle_token::{SharedToken, TokenLedger};
use aioracle_types::{Address, Bytes, FormatTag, ModelId, U256};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

const ORACLE: u64 = 0xa10a;

fn requester() -> Address {
    Address::from_low_u64_be(0x0c)
}

fn responder() -> Address {
    Address::from_low_u64_be(0x5e)
}

/// Engine over the testnet genesis with a funded, deposited requester
fn setup_engine(deposit: u64) -> OracleEngine<SharedToken> {
    let genesis = Genesis::testnet();
    let mut token = SharedToken::new(genesis.build_token().unwrap());
    token.approve(requester(), Address::from_low_u64_be(ORACLE), U256::MAX).unwrap();

    let mut engine = genesis.build_engine(Address::from_low_u64_be(ORACLE), token).unwrap();
    engine.deposit(requester(), U256::from(deposit)).unwrap();
    engine
}

fn create_params() -> RequestParams {
    RequestParams {
        data: Bytes::from("Summarize the attached document."),
        model: ModelId::new("gpt-4o").unwrap(),
        input_format: FormatTag::new("ipfs:text").unwrap(),
        output_format: FormatTag::new("ipfs:json").unwrap(),
        callback_address: Address::ZERO,
        callback_gas_limit: 0,
        token_limit: U256::from(10),
    }
}

/// Benchmark request creation with validation and reservation
fn bench_request_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_creation");

    group.bench_function("create_request", |b| {
        let mut engine = setup_engine(u64::MAX / 2);
        b.iter(|| {
            engine.create_request(requester(), black_box(create_params())).unwrap()
        });
    });

    group.bench_function("rejected_unknown_model", |b| {
        let mut engine = setup_engine(1_000);
        let mut params = create_params();
        params.model = ModelId::new("unknown").unwrap();
        b.iter(|| {
            engine.create_request(requester(), black_box(params.clone())).unwrap_err()
        });
    });

    group.finish();
}

/// Benchmark streaming responses of different segment counts
fn bench_segment_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_streaming");

    for segments in &[1usize, 8, 64] {
        group.throughput(Throughput::Elements(*segments as u64));
        group.bench_with_input(BenchmarkId::from_parameter(segments), segments, |b, &segments| {
            b.iter_batched(
                || {
                    let mut engine = setup_engine(1_000);
                    let id = engine.create_request(requester(), create_params()).unwrap();
                    (engine, id)
                },
                |(mut engine, id)| {
                    for i in 0..segments {
                        let is_final = i + 1 == segments;
                        engine
                            .submit_response_segment(
                                responder(),
                                id,
                                Bytes::from_vec(vec![0x42; 32]),
                                is_final,
                                U256::from(5),
                                0,
                            )
                            .unwrap();
                    }
                    engine
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark persisting and restoring state
fn bench_persistence(c: &mut Criterion) {
    let mut group = c.benchmark_group("persistence");

    for requests in &[10usize, 100, 1000] {
        let mut engine = setup_engine(1_000_000);
        for _ in 0..*requests {
            engine.create_request(requester(), create_params()).unwrap();
        }

        group.throughput(Throughput::Elements(*requests as u64));
        group.bench_with_input(BenchmarkId::new("save", requests), &engine, |b, engine| {
            b.iter(|| {
                let db = MemoryDatabase::new();
                engine.save(&db).unwrap();
                db
            });
        });

        let db = MemoryDatabase::new();
        engine.save(&db).unwrap();
        group.bench_with_input(BenchmarkId::new("restore", requests), &db, |b, db| {
            b.iter(|| {
                let token = engine.ledger().clone();
                OracleEngine::restore(Address::from_low_u64_be(ORACLE), token, db)
                    .unwrap()
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_request_creation,
    bench_segment_streaming,
    bench_persistence
);
criterion_main!(benches);
