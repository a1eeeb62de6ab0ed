use amalgam_engine::{lazy, Class, Date, Invocation, Record, Runtime, Value};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn widget(rt: &Runtime, name: &str) -> Class {
    rt.base()
        .builder(name)
        .method("applyTitle", |inv: &Invocation<'_>| Ok(inv.arg(0)))
        .method("ctor", |_: &Invocation<'_>| Ok(Value::Undefined))
        .option(
            "config",
            Record::new()
                .with("width", 100)
                .with("height", 50)
                .with("title", "untitled")
                .with("created", Date::new(0.0))
                .with("tooltip", lazy("")),
        )
        .build()
        .unwrap()
}

fn bench_first_instance(c: &mut Criterion) {
    c.bench_function("construct_first_instance", |b| {
        b.iter_batched(
            || {
                let rt = Runtime::new().unwrap();
                let class = widget(&rt, "Widget");
                (rt, class)
            },
            |(_rt, class)| class.create().unwrap(),
            BatchSize::SmallInput,
        );
    });
}

fn bench_subsequent_instances(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let class = widget(&rt, "Widget");
    class.create().unwrap();

    let mut group = c.benchmark_group("construct_subsequent");
    group.bench_function("defaults", |b| {
        b.iter(|| class.create().unwrap());
    });
    group.bench_function("with_config", |b| {
        b.iter(|| {
            class
                .create_with(black_box(Record::new().with("width", 10).with("title", "t")))
                .unwrap()
        });
    });
    group.finish();
}

fn bench_plain_class(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let class = rt.base().extend("Plain");

    c.bench_function("construct_plain", |b| {
        b.iter(|| class.create().unwrap());
    });
}

criterion_group!(
    benches,
    bench_first_instance,
    bench_subsequent_instances,
    bench_plain_class
);
criterion_main!(benches);
