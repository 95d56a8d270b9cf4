use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resort_calendar::availability::{classify_month, effective_pricing, tally_blocks};
use resort_calendar::{Accommodation, DateBlock, RoomIndexPolicy, RoomScope};

fn accommodations(count: i64) -> Vec<Accommodation> {
    (1..=count)
        .map(|id| Accommodation {
            id,
            name: format!("Villa {}", id),
            kind: "villa".to_string(),
            rooms: 8,
            default_adult_price: Some(120.0),
            default_child_price: Some(60.0),
        })
        .collect()
}

// A year of mixed room blocks, closures and price overrides per accommodation
fn blocks(accommodations: &[Accommodation], start: NaiveDate) -> Vec<DateBlock> {
    let mut blocks = Vec::new();
    let mut id = 0;
    for accommodation in accommodations {
        for offset in 0..365 {
            let date = start + Duration::days(offset);
            id += 1;
            let (room_scope, reason, adult_price) = match offset % 5 {
                0 => (RoomScope::WholeProperty, Some("closure".to_string()), None),
                1 | 2 => (
                    RoomScope::Room((offset % 8) as u32 + 1),
                    Some("maintenance".to_string()),
                    None,
                ),
                _ => (RoomScope::WholeProperty, None, Some(150.0)),
            };
            blocks.push(DateBlock {
                id,
                accommodation_id: accommodation.id,
                date,
                room_scope,
                reason,
                adult_price,
                child_price: None,
            });
        }
    }
    blocks
}

pub fn availability_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("calendar_aggregation");
    let start = NaiveDate::from_ymd_opt(2099, 1, 1).unwrap();

    // Benchmark with different property portfolio sizes
    for count in [1i64, 10, 50].iter() {
        let accommodations = accommodations(*count);
        let blocks = blocks(&accommodations, start);

        group.bench_with_input(BenchmarkId::new("tally_blocks", count), count, |b, _| {
            b.iter(|| {
                for accommodation in &accommodations {
                    for offset in 0..31 {
                        black_box(tally_blocks(
                            accommodation,
                            &blocks,
                            start + Duration::days(offset),
                            RoomIndexPolicy::Ignore,
                        ));
                    }
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("classify_month", count), count, |b, _| {
            b.iter(|| {
                for accommodation in &accommodations {
                    black_box(classify_month(&blocks, accommodation.id, 2099, 6));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("effective_pricing", count), count, |b, _| {
            b.iter(|| {
                for accommodation in &accommodations {
                    black_box(effective_pricing(accommodation, &blocks, start));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, availability_benchmark);
criterion_main!(benches);
