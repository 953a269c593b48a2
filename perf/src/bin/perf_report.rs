//! End-to-end performance report: clock calibration, hot-path criterion
//! results (if `cargo bench` has already populated `target/criterion`),
//! a short worker tick-loop soak test, and resource usage, written both
//! to stdout and to a JSON file.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use consumer_engine::{Scheduler, Worker, WorkerConfig};
use iprovider_engine::{ProviderWorker, ProviderWorkerConfig};
use niprovider_engine::{NiWorker, NiWorkerConfig};
use perfcore_bench::*;
use perfcore_items::{ItemRecord, ItemRegistry, Template, TemplatePool};
use perfcore_transport::LoopbackChannel;

fn main() {
    let rusage_start = capture_rusage();
    let cache = get_cache_info();

    let mut results: Vec<BenchResult> = Vec::new();

    print_banner(&cache);
    section_clock(&mut results);

    let criterion_dir = criterion_target_dir();
    let estimates = read_criterion_estimates(&criterion_dir);
    section_criterion(&estimates);

    section_soak(&mut results);

    let rusage_end = capture_rusage();
    section_resources(&rusage_start, &rusage_end);

    save_results(&results, &cache, &estimates, &rusage_start, &rusage_end);
}

fn criterion_target_dir() -> PathBuf {
    let manifest = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest).parent().unwrap().join("target").join("criterion")
}

fn run_cmd(cmd: &str, args: &[&str]) -> Option<String> {
    Command::new(cmd)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
}

fn print_banner(cache: &CacheInfo) {
    let bar = "\u{2550}".repeat(90);
    println!("\n{bar}");
    println!("  PERFCORE PERFORMANCE REPORT");
    println!("  clock calibration + criterion hot paths + worker soak test");
    println!("{bar}\n");

    let os = run_cmd("uname", &["-srm"]).unwrap_or_else(|| "unknown".into());
    let date = run_cmd("date", &["+%Y-%m-%d %H:%M:%S"]).unwrap_or_default();
    println!("  host:  {os}");
    println!("  date:  {date}");
    println!("  cpu:   {} ({} cores)", cache.cpu_brand, cache.ncpu);
    println!(
        "  cache: L1d {} / L1i {} / L2 {} / line {} B",
        format_bytes(cache.l1d_bytes),
        format_bytes(cache.l1i_bytes),
        format_bytes(cache.l2_bytes),
        cache.line_size
    );
    println!("  ram:   {}", format_bytes(cache.ram_bytes));
}

fn section_clock(results: &mut Vec<BenchResult>) {
    section_header("Clock Calibration");
    print_table_header();

    let r = measure_batched("now_nanos", 100, 5_000, 3, || {
        std::hint::black_box(perfcore_clock::now_nanos());
    });
    print_result_row(&r);
    results.push(r);

    let r = measure_batched("now_micros", 100, 5_000, 3, || {
        std::hint::black_box(perfcore_clock::now_micros());
    });
    print_result_row(&r);
    results.push(r);

    let ticks = perfcore_clock::ticks_per_second();
    println!("\n  ticks_per_second(): {}", format_count(ticks));
}

fn section_criterion(estimates: &std::collections::BTreeMap<String, CriterionEstimate>) {
    section_header("Criterion Hot Path Results");
    if estimates.is_empty() {
        println!("  (none found under target/criterion — run `cargo bench` first)");
        return;
    }
    println!("  {:<45} {:>12} {:>12} {:>12}", "bench", "median", "mean", "stddev");
    println!("  {}", "─".repeat(85));
    for est in estimates.values() {
        println!(
            "  {:<45} {:>12} {:>12} {:>12}",
            est.name,
            format_ns(est.median_ns),
            format_ns(est.mean_ns),
            format_ns(est.stddev_ns),
        );
    }
}

fn templates() -> Arc<TemplatePool> {
    let mut pool = TemplatePool::new();
    pool.set_refresh("MarketByPrice", Template::new("Refresh", 256));
    pool.add_update("MarketByPrice", Template::new("Update", 128));
    Arc::new(pool)
}

fn item_registry(n: u32) -> ItemRegistry {
    let records = (0..n).map(|i| ItemRecord::new(i, "MarketByPrice", format!("ITEM{i}"))).collect();
    let mut reg = ItemRegistry::new(0, records);
    for i in 0..n {
        let _ = reg.add_to_request_queue(i);
    }
    reg
}

/// Runs `tick` in a tight loop for `duration`, returning per-call latency
/// stats plus the number of ticks completed.
fn soak<F: FnMut()>(mut tick: F, duration: Duration) -> (Stats, usize) {
    let deadline = Instant::now() + duration;
    let mut samples = Vec::new();
    while Instant::now() < deadline {
        let start = Instant::now();
        tick();
        samples.push(start.elapsed().as_nanos() as u64);
    }
    let count = samples.len();
    (compute_stats(&mut samples), count)
}

fn section_soak(results: &mut Vec<BenchResult>) {
    section_header("Worker Tick-Loop Soak Test (1s each)");
    print_table_header();

    let mut consumer = Worker::new(
        Scheduler::new(1000, 10_000, 0, 0, None, None),
        item_registry(1_000),
        templates(),
        Box::new(LoopbackChannel::pair().0),
        Arc::new(AtomicBool::new(false)),
        WorkerConfig {
            uname: "report".to_string(),
            app_name: "perfcore-bench".to_string(),
            service_name: "report".to_string(),
            posting_enabled: false,
            local_dictionary_loaded: true,
            requested_item_count: 1_000,
            delay_steady_state_calc_nanos: 0,
            channel_ping_timeout_nanos: 30_000_000_000,
            nano_time: true,
        },
        0,
    );
    let mut now = 0u64;
    let (stats, ticks) = soak(
        || {
            now += 1_000_000;
            consumer.run_tick(now, Duration::from_micros(100));
        },
        Duration::from_secs(1),
    );
    let r = BenchResult { name: "consumer_soak".into(), unit: "ns/tick".into(), stats };
    print_result_row(&r);
    println!("    ({} ticks/sec)", format_count(ticks as u64));
    results.push(r);

    let mut provider = ProviderWorker::new(
        Box::new(LoopbackChannel::pair().0),
        templates(),
        ProviderWorkerConfig {
            updates_per_tick: 0,
            generics_per_tick: 0,
            ticks_per_sec: 1000,
            max_pack_count: 1,
            domain: "MarketByPrice".to_string(),
            latency_array: None,
        },
        Arc::new(AtomicBool::new(false)),
        false,
    );
    provider.accept_connection();
    provider.on_login_request();
    provider.on_directory_request();
    for i in 0..1_000u32 {
        provider.request_item(i, false);
    }
    let (stats, ticks) = soak(|| provider.run_tick(), Duration::from_secs(1));
    let r = BenchResult { name: "iprovider_soak".into(), unit: "ns/tick".into(), stats };
    print_result_row(&r);
    println!("    ({} ticks/sec)", format_count(ticks as u64));
    results.push(r);

    let mut niprovider = NiWorker::new(
        Box::new(LoopbackChannel::pair().0),
        templates(),
        NiWorkerConfig {
            update_rate: 10_000,
            ticks_per_sec: 1000,
            domain: "MarketByPrice".to_string(),
            stream_ids: (0..1_000u32).collect(),
        },
        None,
        Arc::new(AtomicBool::new(false)),
    );
    let mut now = 0u64;
    let (stats, ticks) = soak(
        || {
            now += 1_000_000;
            niprovider.run_tick(now);
        },
        Duration::from_secs(1),
    );
    let r = BenchResult { name: "niprovider_soak".into(), unit: "ns/tick".into(), stats };
    print_result_row(&r);
    println!("    ({} ticks/sec)", format_count(ticks as u64));
    results.push(r);
}

fn section_resources(start: &ResourceSnapshot, end: &ResourceSnapshot) {
    section_header("Resource Usage");
    println!("  max_rss:            {}", format_bytes(end.max_rss_bytes.max(0) as u64));
    println!("  minor_faults:       {}", end.minor_faults - start.minor_faults);
    println!("  major_faults:       {}", end.major_faults - start.major_faults);
    println!("  vol_ctx_switches:   {}", end.vol_ctx_switches - start.vol_ctx_switches);
    println!("  invol_ctx_switches: {}", end.invol_ctx_switches - start.invol_ctx_switches);
    println!("  user_time:          {} us", end.user_time_us - start.user_time_us);
    println!("  sys_time:           {} us", end.sys_time_us - start.sys_time_us);
}

fn save_results(
    results: &[BenchResult],
    cache: &CacheInfo,
    estimates: &std::collections::BTreeMap<String, CriterionEstimate>,
    rusage_start: &ResourceSnapshot,
    rusage_end: &ResourceSnapshot,
) {
    let payload = serde_json::json!({
        "cache": cache,
        "soak_results": results,
        "criterion": estimates,
        "rusage_start": rusage_start,
        "rusage_end": rusage_end,
    });
    let path = "perf_report.json";
    match serde_json::to_string_pretty(&payload) {
        Ok(text) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("warning: failed to write {path}: {e}");
            } else {
                println!("\n  wrote {path}");
            }
        }
        Err(e) => eprintln!("warning: failed to serialize report: {e}"),
    }
}
