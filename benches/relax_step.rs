use criterion::{black_box, criterion_group, criterion_main, Criterion};
use relaxa::config::RelaxOptions;
use relaxa::context::run_relaxation;
use relaxa::grid::Block;
use relaxa::parallel::run_threads;
use relaxa::stencil::{FivePoint, Kernel};

fn heated_block(n: usize) -> Block {
    let mut b = Block::zeroed(n, n).unwrap();
    for c in 0..n {
        b.set(0, c, 400.0);
    }
    b
}

fn bench_kernel(c: &mut Criterion) {
    let n = 512;
    let input = heated_block(n);
    let mut output = input.clone();

    c.bench_function("five-point step serial 512", |ben| {
        let kernel = Kernel::new(FivePoint, 0.05);
        ben.iter(|| kernel.relax(black_box(&input), black_box(&mut output), 1..n - 1))
    });

    #[cfg(feature = "rayon")]
    c.bench_function("five-point step parallel 512", |ben| {
        let kernel = Kernel::new(FivePoint, 0.05)
            .with_execution(relaxa::stencil::Execution::parallel(4).unwrap());
        ben.iter(|| kernel.relax(black_box(&input), black_box(&mut output), 1..n - 1))
    });
}

fn bench_full_run(c: &mut Criterion) {
    let options = RelaxOptions { n: 100, ..Default::default() };
    for workers in [1, 4] {
        c.bench_function(&format!("relax n=100 on {workers} workers"), |ben| {
            ben.iter(|| {
                run_threads(workers, |comm| {
                    run_relaxation(&comm, &options).map(|o| o.stats.generations)
                })
            })
        });
    }
}

criterion_group!(benches, bench_kernel, bench_full_run);
criterion_main!(benches);
