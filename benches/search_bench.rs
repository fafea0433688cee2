//! Forest vs brute-force search, and breed lookup over a label map

use breedsearch::{
    BreedLabelMap, BreedSearcher, DistanceMetric, FlatIndex, ForestIndex, Index, Vector,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn create_random_vectors(n: usize, dim: usize) -> Vec<Vector> {
    (0..n)
        .map(|_| {
            let data: Vec<f32> = (0..dim).map(|_| rand::random::<f32>() - 0.5).collect();
            Vector::new(data)
        })
        .collect()
}

fn benchmark_forest_vs_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_vs_flat");
    group.sample_size(20);

    for &size in &[1_000, 10_000] {
        let dim = 512;
        let vectors = create_random_vectors(size, dim);
        let query = create_random_vectors(1, dim).remove(0);

        let mut flat = FlatIndex::new(dim, DistanceMetric::Angular);
        let mut forest = ForestIndex::new(dim, DistanceMetric::Angular);
        for (i, v) in vectors.iter().enumerate() {
            flat.add(i, v.clone()).unwrap();
            forest.add(i, v.clone()).unwrap();
        }
        flat.build(1).unwrap();
        forest.build(10).unwrap();

        group.bench_with_input(BenchmarkId::new("flat", size), &size, |b, _| {
            b.iter(|| flat.search(black_box(&query), black_box(24)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("forest", size), &size, |b, _| {
            b.iter(|| forest.search(black_box(&query), black_box(24)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_breed_lookup(c: &mut Criterion) {
    let breeds = [
        "Labrador retriever",
        "golden retriever",
        "toy poodle",
        "standard poodle",
        "Boston terrier",
        "Yorkshire terrier",
        "beagle",
        "pug",
    ];
    let mut group = c.benchmark_group("breed_lookup");

    for &size in &[1_000, 25_000] {
        let map: BreedLabelMap = (0..size)
            .map(|i| (format!("{}.jpg", i), breeds[i % breeds.len()]))
            .collect();
        let searcher = BreedSearcher::new(&map, "PetImages/Dog", "ImageDumpDogSimilarPredictions");

        group.bench_with_input(BenchmarkId::new("substring", size), &size, |b, _| {
            b.iter(|| searcher.candidates(black_box("terrier")).len());
        });

        group.bench_with_input(BenchmarkId::new("suggestion", size), &size, |b, _| {
            b.iter(|| searcher.closest_breed(black_box("yorkshire terier")));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_forest_vs_flat, benchmark_breed_lookup);
criterion_main!(benches);
