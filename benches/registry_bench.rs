use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;
use std::rc::Rc;
use std::time::SystemTime;

use crucible::plugins::fingerprint::Fingerprint;
use crucible::plugins::{Command, CommandInfo};
use crucible::registry::CommandRegistry;
use crucible::shell::Shell;

struct Noop(CommandInfo);

impl Command for Noop {
    fn info(&self) -> &CommandInfo {
        &self.0
    }

    fn execute(&self, _shell: &mut Shell, _args: &[String]) -> crucible::Result<()> {
        Ok(())
    }
}

fn registry_with(count: usize) -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    for i in 0..count {
        let name = format!("cmd{i:05}");
        let alias = format!("c{i}");
        let info = CommandInfo::builtin(&name, "bench", &[alias.as_str()], None);
        // Names are never empty here
        let _ = registry.register(Rc::new(Noop(info)));
    }
    registry
}

/// Benchmark prefix suggestion as used by completion and ghost hints
fn bench_suggest_prefix(c: &mut Criterion) {
    let mut group = c.benchmark_group("suggest_prefix");

    for size in &[100, 1000, 10000] {
        let registry = registry_with(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| registry.suggest_prefix(black_box("cmd001")));
        });
    }

    group.finish();
}

/// Benchmark content fingerprinting of plugin sources
fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    let modified = SystemTime::now();

    for size in &[1024, 16384, 262_144] {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let source = vec![b'x'; size];
            b.iter(|| Fingerprint::from_bytes(Path::new("plugin.lua"), black_box(&source), modified));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_suggest_prefix, bench_fingerprint);
criterion_main!(benches);
