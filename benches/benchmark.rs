use criterion::{black_box, criterion_group, criterion_main, Criterion};
use snapshot_service::{
    is_safe_artifact_name, plan_scroll, CaptureRequest, Config, DeviceProfile, RenderBody,
    ScrollCaptureBody, SnapshotRequest,
};
use std::time::Duration;

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn benchmark_config_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("config");
    configure_fast_group(&mut group);

    group.bench_function("creation", |b| {
        b.iter(|| {
            let config = Config::default();
            black_box(config);
        });
    });

    group.bench_function("validate", |b| {
        let config = Config::default();
        b.iter(|| {
            let _ = black_box(config.validate());
        });
    });

    group.finish();
}

fn benchmark_profile_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("profile_resolution");
    configure_fast_group(&mut group);

    let inputs = [
        (Some("desktop"), None),
        (Some("phone"), Some("landscape")),
        (Some("Phone "), Some("PORTRAIT")),
        (Some("tablet"), Some("sideways")),
        (None, None),
    ];

    group.bench_function("resolve", |b| {
        b.iter(|| {
            for (device, orientation) in &inputs {
                let viewport = DeviceProfile::resolve(*device, *orientation).viewport();
                black_box(viewport);
            }
        });
    });

    group.finish();
}

fn benchmark_request_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_validation");
    configure_fast_group(&mut group);

    let html = "<div style='height:3000px'></div>".repeat(64);

    group.bench_function("scroll_capture", |b| {
        b.iter(|| {
            let body = ScrollCaptureBody {
                html: Some(html.clone()),
                device_type: Some("phone".into()),
                orientation: Some("landscape".into()),
            };
            let _ = black_box(CaptureRequest::try_from(body));
        });
    });

    group.bench_function("render", |b| {
        b.iter(|| {
            for language in ["html", "HTML", "markdown"] {
                let body = RenderBody {
                    code: Some(html.clone()),
                    language: Some(language.into()),
                };
                let _ = black_box(SnapshotRequest::try_from(body));
            }
        });
    });

    group.bench_function("artifact_name", |b| {
        b.iter(|| {
            for name in ["3f2a9c_0.png", "../etc/passwd", ".hidden.png", "a/b_1.png"] {
                black_box(is_safe_artifact_name(name));
            }
        });
    });

    group.finish();
}

fn benchmark_scroll_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("scroll_planning");
    configure_fast_group(&mut group);

    group.bench_function("tall_document", |b| {
        b.iter(|| black_box(plan_scroll(black_box(3000.0), 800.0, 800, 20)));
    });

    group.bench_function("capped_document", |b| {
        b.iter(|| black_box(plan_scroll(black_box(250_000.0), 667.0, 667, 20)));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_config_creation,
    benchmark_profile_resolution,
    benchmark_request_validation,
    benchmark_scroll_planning
);
criterion_main!(benches);
