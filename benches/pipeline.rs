use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use markcheck::{
    AnalysisRequest, Document, MarkcheckConfig, NormalizeConfig, RuleConfig, RuleEngine,
    RuleOptions,
};
use tokio::runtime::Runtime;

fn big_markdown() -> String {
    let mut doc = String::from("# Benchmark\n\n");
    for i in 0..200 {
        doc.push_str(&format!(
            "Paragraph {i} has **bold** text, a [link](https://example.com/{i}) and \
             teh odd typo.  It also has a a repeated word.\n\n"
        ));
        if i % 20 == 0 {
            doc.push_str("```rust\nfn skipped() {}\n```\n\n- item one\n- item two\n\n");
        }
    }
    doc
}

fn normalize_bench(c: &mut Criterion) {
    let doc = Document::new(big_markdown(), "en");
    let cfg = NormalizeConfig::default();
    c.bench_function("normalize_big_markdown", |b| {
        b.iter(|| {
            let out = normalize::normalize(black_box(&doc), &cfg).expect("bench normalize");
            black_box(out);
        });
    });
}

fn rules_bench(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let doc = Document::new(big_markdown(), "en");
    let normalized = normalize::normalize(&doc, &NormalizeConfig::default()).expect("normalize");
    let text: Arc<str> = Arc::from(normalized.as_str());
    let engine = RuleEngine::builtin(RuleOptions::default(), rules::DEFAULT_RULE_TIMEOUT);
    let config = RuleConfig::default();

    c.bench_function("rule_engine_big_markdown", |b| {
        b.to_async(&rt).iter(|| async {
            let report = engine.run(Arc::clone(&text), "en", &config).await;
            black_box(report);
        });
    });
}

fn cached_request_bench(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let coordinator = MarkcheckConfig::default()
        .build_coordinator()
        .expect("coordinator");
    let markdown = big_markdown();
    rt.block_on(coordinator.analyze(AnalysisRequest::new(markdown.clone(), "en")))
        .expect("warm cache");

    c.bench_function("analyze_cache_hit", |b| {
        b.to_async(&rt).iter(|| async {
            let outcome = coordinator
                .analyze(AnalysisRequest::new(markdown.clone(), "en"))
                .await
                .expect("bench analyze");
            black_box(outcome);
        });
    });
}

criterion_group!(benches, normalize_bench, rules_bench, cached_request_bench);
criterion_main!(benches);
