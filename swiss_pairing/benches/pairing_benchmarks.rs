use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use swiss_pairing::tournament::{
    CompetitorId, EntrantSnapshot, FieldSnapshot,
    pairing::{backtrack, pair_field, seed_split},
};

/// Helper to build a field of `n` entrants after `rounds` played rounds
fn field_after_rounds(n: usize, rounds: u32) -> FieldSnapshot {
    let mut entrants: Vec<EntrantSnapshot> = (0..n)
        .map(|i| EntrantSnapshot::new(CompetitorId(i as i64 + 1), 0.0, 1.0 / (i as f64 + 1.0)))
        .collect();

    for round in 1..=rounds {
        let field = FieldSnapshot::new(1, entrants.clone());
        let Ok(pairings) = pair_field(&field, round) else {
            break;
        };

        for pairing in pairings {
            let (a, b) = (pairing.competitor_id, pairing.opponent_id);
            // Alternate winners so scores spread out
            let a_wins = (a.0 + i64::from(round)) % 2 == 0 || b.is_bye();
            for entrant in entrants.iter_mut() {
                if entrant.id == a {
                    entrant.opponents.insert(b);
                    if a_wins && !b.is_bye() {
                        entrant.score += 1.0;
                    }
                } else if entrant.id == b {
                    entrant.opponents.insert(a);
                    if !a_wins {
                        entrant.score += 1.0;
                    }
                }
            }
        }
    }

    FieldSnapshot::new(1, entrants)
}

/// Benchmark the first-round seed split
fn bench_seed_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("seed_split");

    for n in [16, 64, 256] {
        let field = field_after_rounds(n, 0);
        group.bench_with_input(BenchmarkId::from_parameter(n), &field, |b, field| {
            b.iter(|| seed_split(black_box(field)))
        });
    }

    group.finish();
}

/// Benchmark the backtracking search a few rounds in
fn bench_backtracking(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtracking");

    for n in [8, 32, 128] {
        let field = field_after_rounds(n, 3);
        group.bench_with_input(BenchmarkId::from_parameter(n), &field, |b, field| {
            b.iter(|| backtrack(black_box(field)))
        });
    }

    group.finish();
}

/// Benchmark a late round of a small odd field where the bye constrains the search
fn bench_late_round_with_bye(c: &mut Criterion) {
    let field = field_after_rounds(15, 3);
    c.bench_function("late_round_odd_15", |b| {
        b.iter(|| pair_field(black_box(&field), 4))
    });
}

criterion_group!(
    benches,
    bench_seed_split,
    bench_backtracking,
    bench_late_round_with_bye
);
criterion_main!(benches);
