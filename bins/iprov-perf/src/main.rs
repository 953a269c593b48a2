//! Interactive-provider perf tool entry point (§6.1, §6.6): resolves
//! configuration, loads message templates, spawns one connection worker
//! per configured CPU, seeds each with a synthetic refresh-item set, and
//! runs the stats aggregator until `run_time` elapses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use iprovider_config::{Cli, LatencyUpdateRate, ProviderConfig, TomlDefaults};
use iprovider_engine::{ProviderWorker, ProviderWorkerConfig};
use perfcore_aggregator::{StatsAggregator, WorkerInterval};
use perfcore_latency::LatencyRandomArray;
use perfcore_transport::LoopbackChannel;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn load_config() -> ProviderConfig {
    let cli = Cli::parse();
    let toml_defaults = match &cli.config_file {
        Some(path) => match TomlDefaults::load(path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        None => TomlDefaults::default(),
    };
    match ProviderConfig::resolve(cli, &toml_defaults) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// One connection worker's per-tick loop, run against a [`LoopbackChannel`]
/// half-pair in place of the real transport this tool would accept
/// connections over. The worker is seeded with a synthetic set of
/// `refresh_burst_size * 4` items to refresh and rotate updates/generics
/// over, standing in for the items a real client population would request.
fn run_worker_thread(
    index: usize,
    core_id: usize,
    cfg: Arc<ProviderConfig>,
    templates: Arc<perfcore_items::TemplatePool>,
    shutdown: Arc<AtomicBool>,
    report_tx: std::sync::mpsc::Sender<WorkerInterval>,
) {
    perfcore_config::affinity::pin_current_thread(core_id);

    let mut rng = rand::thread_rng();
    let latency_array = match cfg.latency_update_rate {
        LatencyUpdateRate::Always => None,
        LatencyUpdateRate::Rate(rate) if rate > 0 => {
            LatencyRandomArray::new(cfg.update_rate.max(1), rate, cfg.tick_rate, 1, &mut rng).ok()
        }
        LatencyUpdateRate::Rate(_) => None,
    };

    let worker_config = ProviderWorkerConfig {
        updates_per_tick: cfg.update_rate,
        generics_per_tick: cfg.generic_msg_rate,
        ticks_per_sec: cfg.tick_rate,
        max_pack_count: cfg.max_pack_count,
        domain: "MarketPrice".to_string(),
        latency_array,
    };

    let (channel, _peer) = LoopbackChannel::pair();
    let shutdown_for_worker = shutdown.clone();
    let mut worker = ProviderWorker::new(Box::new(channel), templates, worker_config, shutdown_for_worker, true);
    worker.accept_connection();
    worker.on_login_request();
    worker.on_directory_request();

    let base = (index as u32) * 100_000;
    let item_count = cfg.refresh_burst_size.max(1) * 4;
    for offset in 0..item_count {
        worker.request_item(base + offset, false);
    }

    let tick_period = Duration::from_nanos(perfcore_clock::nsec_per_tick(cfg.tick_rate));
    let deadline = std::time::Instant::now() + Duration::from_secs(cfg.run_time as u64);

    let mut prev_counters = std::collections::BTreeMap::new();
    while std::time::Instant::now() < deadline && !shutdown.load(Ordering::Relaxed) {
        worker.run_tick();

        let stats = worker.stats();
        let counters = std::collections::BTreeMap::from([
            ("refreshes_sent".to_string(), stats.refreshes_sent.get_total()),
            ("updates_sent".to_string(), stats.updates_sent.get_total()),
            ("generics_sent".to_string(), stats.generics_sent.get_total()),
            ("generics_received".to_string(), stats.generics_received.get_total()),
            ("posts_reflected".to_string(), stats.posts_reflected.get_total()),
            ("packed_msg_count".to_string(), stats.packed_msg_count.get_total()),
            ("update_msg_count".to_string(), stats.update_msg_count.get_total()),
            ("latency_updates_sent".to_string(), stats.latency_updates_sent.get_total()),
        ]);
        let mut delta = std::collections::BTreeMap::new();
        for (k, v) in &counters {
            let prev = prev_counters.get(k).copied().unwrap_or(0);
            delta.insert(k.clone(), v.saturating_sub(prev));
        }
        prev_counters = counters;

        let drained = worker.stats().latency_queue.swap_and_read();
        let _ = report_tx.send(WorkerInterval {
            name: format!("iprov-{index}"),
            counters: delta,
            startup_records: Vec::new(),
            steady_records: drained,
        });

        std::thread::sleep(tick_period);
    }
}

fn main() {
    init_tracing();
    let cfg = Arc::new(load_config());

    let templates = match perfcore_loader::load_template_file(&cfg.msg_file) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            tracing::error!(%e, "failed to load message template file");
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let (report_tx, report_rx) = std::sync::mpsc::channel::<WorkerInterval>();

    let thread_count = cfg.threads.len().max(1);
    let mut handles = Vec::new();
    for (index, &core_id) in cfg.threads.iter().enumerate().take(thread_count) {
        let cfg = cfg.clone();
        let templates = templates.clone();
        let shutdown = shutdown.clone();
        let report_tx = report_tx.clone();
        handles.push(std::thread::spawn(move || {
            run_worker_thread(index, core_id, cfg, templates, shutdown, report_tx);
        }));
    }
    drop(report_tx);

    let stats_file = std::fs::File::create(format!("{}.csv", cfg.stats_file)).ok();
    let mut aggregator = stats_file.map(|f| StatsAggregator::new(f, perfcore_clock::now_nanos()));

    let interval = Duration::from_secs(cfg.write_stats_interval.max(1) as u64);
    let deadline = std::time::Instant::now() + Duration::from_secs(cfg.run_time as u64);
    while std::time::Instant::now() < deadline && !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(interval);
        let mut batch = Vec::new();
        while let Ok(interval_report) = report_rx.try_recv() {
            batch.push(interval_report);
        }
        if let Some(agg) = &mut aggregator {
            let _ = agg.sample_interval(perfcore_clock::now_nanos(), &batch);
        }
    }
    shutdown.store(true, Ordering::Relaxed);

    for handle in handles {
        let _ = handle.join();
    }
    if let Some(mut agg) = aggregator {
        if let Ok(summary) = agg.finalize(perfcore_clock::now_nanos()) {
            tracing::info!(
                elapsed_secs = summary.elapsed_secs,
                steady_count = summary.steady_latency.count(),
                "run complete"
            );
            write_summary_file(&cfg.summary_file, &summary);
        }
    }
}

fn write_summary_file(path: &str, summary: &perfcore_aggregator::SummaryReport) {
    let text = format!(
        "elapsed_secs={}\nsteady_count={}\nsteady_mean_usec={:.3}\n",
        summary.elapsed_secs,
        summary.steady_latency.count(),
        summary.steady_latency.mean(),
    );
    if let Err(e) = std::fs::write(path, text) {
        tracing::warn!(%e, path, "failed to write summary file");
    }
}
