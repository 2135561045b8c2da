/// Benchmarks for discovery, parsing and enrichment of Java sources
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use repograph::embedding::HashingEmbedder;
use repograph::enrichment::{EnrichmentPipeline, TemplateDescriber};
use repograph::parser::{SourceFile, discover_source_files, parse_batch};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

fn java_source(i: usize) -> String {
    format!(
        r#"
package com.bench.module{i};

import java.util.List;

/** Service number {i} */
@Service
public class Service{i} extends BaseService implements Handler{i} {{
    private final Repository{i} repository;
    private int retries = {i};

    public Service{i}(Repository{i} repository) {{
        this.repository = repository;
    }}

    @Override
    public Result handle(Request request) {{
        validate(request);
        return repository.save(transform(request));
    }}

    private void validate(Request request) {{
        if (request == null) {{
            throw new IllegalArgumentException("request");
        }}
    }}

    private Entity{i} transform(Request request) {{
        return new Entity{i}(request.id(), retries);
    }}

    public List<Entity{i}> findAll() {{
        return repository.findAll();
    }}
}}
"#
    )
}

fn create_sources(count: usize) -> Vec<SourceFile> {
    (0..count)
        .map(|i| {
            SourceFile::from_content(
                format!("src/main/java/com/bench/module{i}/Service{i}.java"),
                java_source(i),
            )
        })
        .collect()
}

fn create_source_tree(dir: &TempDir, count: usize) -> anyhow::Result<()> {
    for file in create_sources(count) {
        let path = dir.path().join(&file.relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &file.content)?;
    }
    Ok(())
}

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    for file_count in [10, 100, 500].iter() {
        let files = create_sources(*file_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_files", file_count)),
            &files,
            |b, files| {
                b.iter(|| parse_batch(black_box(files), "bench-repo"));
            },
        );
    }

    group.finish();
}

fn benchmark_discovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery");

    for file_count in [10, 100].iter() {
        let dir = TempDir::new().unwrap();
        create_source_tree(&dir, *file_count).unwrap();
        let excludes = vec!["**/src/test/**".to_string()];

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_files", file_count)),
            &dir,
            |b, dir| {
                b.iter(|| {
                    discover_source_files(black_box(dir.path()), &excludes, 1_048_576).unwrap()
                });
            },
        );
    }

    group.finish();
}

fn benchmark_enrichment(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("enrichment");
    let pipeline = EnrichmentPipeline::new(
        Arc::new(TemplateDescriber),
        Arc::new(HashingEmbedder::new(384)),
        32,
        Duration::from_secs(30),
    );

    for file_count in [10, 100].iter() {
        let parsed = parse_batch(&create_sources(*file_count), "bench-repo").entities;
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_files", file_count)),
            &parsed,
            |b, parsed| {
                b.iter(|| {
                    rt.block_on(async {
                        let mut entities = parsed.clone();
                        pipeline
                            .enrich(black_box(&mut entities), &CancellationToken::new())
                            .await
                            .unwrap()
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parsing,
    benchmark_discovery,
    benchmark_enrichment
);
criterion_main!(benches);
