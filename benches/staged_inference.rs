use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use iot_streams::{PersistentStore, Stage, StagedInferenceEngine};
use oxigraph::model::*;
use std::sync::Arc;

const ONTOLOGY: &str = r#"
    @prefix ex: <http://example.org/> .
    ex:Observation a <http://www.w3.org/2000/01/rdf-schema#Class> .
"#;

const FLAG_HIGH: &str = r#"
    PREFIX ex: <http://example.org/>
    INSERT { ?obs ex:flag ex:high }
    WHERE { ?obs ex:temperature ?t FILTER(?t > 19.5) }
"#;

const FOLLOW: &str = r#"
    PREFIX ex: <http://example.org/>
    INSERT { ?obs ex:after ?prev }
    WHERE { ?obs ex:temperature ?t . ?prev ex:flag ex:high FILTER(?obs != ?prev) }
"#;

/// Generate a window graph of `size` observations starting at `first`
fn generate_window(first: usize, size: usize) -> Graph {
    let mut graph = Graph::new();
    for i in first..first + size {
        graph.insert(&Triple::new(
            NamedNode::new(format!("http://example.org/obs{}", i)).unwrap(),
            NamedNode::new("http://example.org/temperature").unwrap(),
            Literal::from(15.0 + (i % 10) as f64),
        ));
    }
    graph
}

fn engine() -> StagedInferenceEngine {
    let mut engine = StagedInferenceEngine::new("bench", Arc::new(PersistentStore::new()));
    engine.set_ontology(ONTOLOGY).unwrap();
    engine.add_program(Stage::Coldstart, "flag", FLAG_HIGH).unwrap();
    engine.add_program(Stage::Warm, "flag", FLAG_HIGH).unwrap();
    engine.add_program(Stage::Warm, "follow", FOLLOW).unwrap();
    engine.initialize().unwrap();
    engine
}

/// Benchmark: coldstart on windows of growing size
fn benchmark_coldstart(c: &mut Criterion) {
    let mut group = c.benchmark_group("coldstart");
    group.sample_size(20);

    for size in [10, 100, 500].iter() {
        let window = generate_window(0, *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &window, |b, window| {
            b.iter_with_setup(engine, |engine| black_box(engine.update(window).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark: a run of warm windows after one coldstart
fn benchmark_warm_sequence(c: &mut Criterion) {
    let mut group = c.benchmark_group("warm_sequence");
    group.sample_size(10);

    for windows in [5, 20].iter() {
        let graphs: Vec<Graph> = (0..*windows).map(|w| generate_window(w * 50, 50)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(windows), &graphs, |b, graphs| {
            b.iter_with_setup(engine, |engine| {
                for graph in graphs {
                    black_box(engine.update(graph).unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_coldstart, benchmark_warm_sequence);
criterion_main!(benches);
