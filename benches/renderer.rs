use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use iongraph_rs_renderer::config::LayoutConfig;
use iongraph_rs_renderer::ir::IrKind;
use iongraph_rs_renderer::layout::compute_pass_layout;
use iongraph_rs_renderer::parser::parse_ion;
use iongraph_rs_renderer::render::render_svg;
use iongraph_rs_renderer::theme::Theme;

fn fixture(name: &str) -> &'static str {
    match name {
        "sum_loop" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/benches/fixtures/sum_loop.json"
        )),
        "nested_medium" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/benches/fixtures/nested_medium.json"
        )),
        _ => panic!("unknown fixture"),
    }
}

const FIXTURES: [&str; 2] = ["sum_loop", "nested_medium"];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for name in FIXTURES {
        let input = fixture(name);
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, data| {
            b.iter(|| {
                let document = parse_ion(black_box(data)).expect("parse failed");
                black_box(document.functions.len());
            });
        });
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let theme = Theme::light();
    let config = LayoutConfig::default();
    for name in FIXTURES {
        let document = parse_ion(fixture(name)).expect("parse failed");
        let pass = document.functions[0].passes.last().expect("passes");
        group.bench_with_input(BenchmarkId::from_parameter(name), pass, |b, pass| {
            b.iter(|| {
                let layout = compute_pass_layout(black_box(pass), IrKind::Mir, &theme, &config)
                    .expect("layout failed");
                black_box(layout.nodes.len());
            });
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_svg");
    let theme = Theme::light();
    let config = LayoutConfig::default();
    for name in FIXTURES {
        let document = parse_ion(fixture(name)).expect("parse failed");
        let pass = document.functions[0].passes.last().expect("passes");
        let layout =
            compute_pass_layout(pass, IrKind::Mir, &theme, &config).expect("layout failed");
        group.bench_with_input(BenchmarkId::from_parameter(name), &layout, |b, data| {
            b.iter(|| {
                let svg = render_svg(black_box(data), &theme, &config);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    let theme = Theme::light();
    let config = LayoutConfig::default();
    for name in FIXTURES {
        let input = fixture(name);
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, data| {
            b.iter(|| {
                let document = parse_ion(black_box(data)).expect("parse failed");
                let pass = document.functions[0].passes.last().expect("passes");
                let layout = compute_pass_layout(pass, IrKind::Mir, &theme, &config)
                    .expect("layout failed");
                let svg = render_svg(&layout, &theme, &config);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_parse, bench_layout, bench_render, bench_end_to_end
);
criterion_main!(benches);
