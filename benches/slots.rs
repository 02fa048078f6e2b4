use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use ulid::Ulid;

use slotwise::booking::{BookingDesk, SlotPick};
use slotwise::engine::{DaySnapshot, compute_slots};
use slotwise::model::*;
use slotwise::planner::SlotPlanner;
use slotwise::store::Store;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    let max = latencies[latencies.len() - 1];
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        max.as_secs_f64() * 1000.0,
    );
}

fn hm(minutes: u32) -> TimeOfDay {
    TimeOfDay::saturating(minutes)
}

/// Always-open hours for every weekday, plus a 15-minute and a 5-minute service.
async fn setup(store: &Store) -> (BusinessId, ServiceId, ServiceId) {
    let business = Ulid::new();
    store.register_business(business, Some("bench".into())).await.unwrap();
    for weekday in 0..7 {
        store
            .set_hours(
                business,
                BusinessHours {
                    weekday,
                    start_time: TimeOfDay::MIDNIGHT,
                    end_time: TimeOfDay::END_OF_DAY,
                    active: true,
                },
            )
            .await
            .unwrap();
    }
    let mut ids = Vec::new();
    for minutes in [15, 5] {
        let service = ServiceDefinition {
            id: Ulid::new(),
            name: None,
            duration_minutes: minutes,
            price_cents: 0,
        };
        ids.push(service.id);
        store.define_service(service).await.unwrap();
    }
    (business, ids[0], ids[1])
}

fn phase1_engine() {
    // A full day of 5-minute commitments split across both sources.
    let order_service = Ulid::new();
    let legacy: Vec<LegacyAppointment> = (0..144)
        .map(|i| LegacyAppointment {
            id: Ulid::new(),
            start_time: hm(i * 10),
            service_id: order_service,
            status: CommitmentStatus::Confirmed,
        })
        .collect();
    let explicit: Vec<ExplicitBooking> = (0..144)
        .map(|i| ExplicitBooking {
            id: Ulid::new(),
            start_time: hm(i * 10 + 5),
            end_time: hm(i * 10 + 10),
            status: CommitmentStatus::Pending,
            service_id: None,
            label: None,
        })
        .collect();
    let snapshot = DaySnapshot {
        weekday: 1,
        hours: Some(BusinessHours {
            weekday: 1,
            start_time: TimeOfDay::MIDNIGHT,
            end_time: TimeOfDay::END_OF_DAY,
            active: true,
        }),
        service_duration: 1,
        legacy,
        durations: [(order_service, 5)].into_iter().collect(),
        explicit,
    };

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    for _ in 0..n {
        let t = Instant::now();
        let report = compute_slots(&snapshot);
        latencies.push(t.elapsed());
        assert_eq!(report.slots.len(), 1440);
    }
    print_latency("compute_slots, 288 commitments, 1440 slots", &mut latencies);
}

async fn phase2_sequential_bookings(store: Arc<Store>, label: &str) {
    let (business, short, _) = setup(&store).await;
    let desk = BookingDesk::from_store(store);
    let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    let n = 96;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n {
        let pick = SlotPick {
            business_id: business,
            date: day,
            service_id: short,
            start_time: hm(i as u32 * 15),
            status: CommitmentStatus::Confirmed,
            label: None,
        };
        let t = Instant::now();
        desk.pick_slot(pick).await.unwrap();
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.3}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency(label, &mut latencies);
}

async fn phase3_plan_under_load() {
    let store = Arc::new(Store::in_memory());
    let (business, short, fine) = setup(&store).await;
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    // Writers fill distinct days so they never conflict with each other.
    let stop = Arc::new(AtomicBool::new(false));
    let mut writers = Vec::new();
    for w in 0..4u64 {
        let desk = BookingDesk::from_store(store.clone());
        let stop = stop.clone();
        writers.push(tokio::spawn(async move {
            let mut i = 0u32;
            while !stop.load(Ordering::Relaxed) && i < 96 * 25 {
                let pick = SlotPick {
                    business_id: business,
                    date: base + Days::new(1 + w * 25 + u64::from(i / 96)),
                    service_id: short,
                    start_time: hm((i % 96) * 15),
                    status: CommitmentStatus::Confirmed,
                    label: None,
                };
                let _ = desk.pick_slot(pick).await;
                i += 1;
                tokio::task::yield_now().await;
            }
        }));
    }

    let mut readers = Vec::new();
    for r in 0..8u64 {
        let planner = SlotPlanner::from_store(store.clone());
        readers.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(500);
            for i in 0..500u64 {
                let date = base + Days::new(1 + (r * 13 + i) % 100);
                let t = Instant::now();
                planner.plan(business, date, fine).await.unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in readers {
        all.extend(h.await.unwrap());
    }
    stop.store(true, Ordering::Relaxed);
    for h in writers {
        let _ = h.await;
    }
    print_latency("plan (5-minute grid) under write load", &mut all);
}

#[tokio::main]
async fn main() {
    println!("=== slotwise benchmark ===\n");

    println!("[phase 1] pure engine");
    phase1_engine();

    println!("\n[phase 2] sequential bookings, in memory");
    phase2_sequential_bookings(Arc::new(Store::in_memory()), "pick_slot latency").await;

    println!("\n[phase 2b] sequential bookings, WAL-backed");
    let dir = std::env::temp_dir().join(format!("slotwise_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Store::open(&dir.join("slotwise.wal"), u64::MAX).await.unwrap();
    phase2_sequential_bookings(Arc::new(store), "pick_slot latency (fsync)").await;
    let _ = std::fs::remove_dir_all(&dir);

    println!("\n[phase 3] slot planning under write load");
    phase3_plan_under_load().await;

    println!("\n=== done ===");
}
