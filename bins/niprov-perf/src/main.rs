//! Non-interactive provider perf tool entry point (§6.1, §6.6): resolves
//! configuration, loads the item list and message templates, spawns one
//! always-publishing worker per configured CPU, and runs the stats
//! aggregator until `run_time` elapses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use niprovider_config::{Cli, NiProviderConfig, TomlDefaults};
use niprovider_engine::{NiWorker, NiWorkerConfig};
use perfcore_aggregator::{StatsAggregator, WorkerInterval};
use perfcore_latency::LatencyRandomArray;
use perfcore_transport::LoopbackChannel;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn load_config() -> NiProviderConfig {
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
    match NiProviderConfig::resolve(cli, &toml_defaults) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// One worker's per-tick publish loop, run against a [`LoopbackChannel`]
/// half-pair in place of the real transport this tool would dial out on.
fn run_worker_thread(
    index: usize,
    core_id: usize,
    cfg: Arc<NiProviderConfig>,
    templates: Arc<perfcore_items::TemplatePool>,
    stream_ids: Vec<u32>,
    shutdown: Arc<AtomicBool>,
    report_tx: std::sync::mpsc::Sender<WorkerInterval>,
) {
    perfcore_config::affinity::pin_current_thread(core_id);

    let mut rng = rand::thread_rng();
    let latency_array = (cfg.latency_update_rate > 0)
        .then(|| {
            LatencyRandomArray::new(cfg.update_rate.max(1), cfg.latency_update_rate, cfg.tick_rate, 1, &mut rng).ok()
        })
        .flatten();

    let worker_config = NiWorkerConfig {
        update_rate: cfg.update_rate,
        ticks_per_sec: cfg.tick_rate,
        domain: "MarketPrice".to_string(),
        stream_ids,
    };

    let (channel, _peer) = LoopbackChannel::pair();
    let mut worker = NiWorker::new(Box::new(channel), templates, worker_config, latency_array, shutdown.clone());

    let tick_period = Duration::from_nanos(perfcore_clock::nsec_per_tick(cfg.tick_rate));
    let deadline = std::time::Instant::now() + Duration::from_secs(cfg.run_time as u64);

    let mut prev_counters = std::collections::BTreeMap::new();
    while std::time::Instant::now() < deadline && !shutdown.load(Ordering::Relaxed) {
        worker.run_tick(perfcore_clock::now_nanos());

        let stats = worker.stats();
        let counters = std::collections::BTreeMap::from([
            ("updates_sent".to_string(), stats.updates_sent.get_total()),
            ("out_of_buffers".to_string(), stats.out_of_buffers.get_total()),
            ("latency_updates_sent".to_string(), stats.latency_updates_sent.get_total()),
        ]);
        let mut delta = std::collections::BTreeMap::new();
        for (k, v) in &counters {
            let prev = prev_counters.get(k).copied().unwrap_or(0);
            delta.insert(k.clone(), v.saturating_sub(prev));
        }
        prev_counters = counters;

        let _ = report_tx.send(WorkerInterval {
            name: format!("niprov-{index}"),
            counters: delta,
            startup_records: Vec::new(),
            steady_records: Vec::new(),
        });

        std::thread::sleep(tick_period);
    }
}

fn main() {
    init_tracing();
    let cfg = Arc::new(load_config());

    let items = match perfcore_loader::load_item_file(&cfg.item_file, 0) {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(%e, "failed to load item file");
            std::process::exit(1);
        }
    };
    let templates = match perfcore_loader::load_template_file(&cfg.msg_file) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            tracing::error!(%e, "failed to load message template file");
            std::process::exit(1);
        }
    };
    let stream_ids: Vec<u32> = items.iter().take(cfg.item_count as usize).map(|r| r.stream_id).collect();

    let shutdown = Arc::new(AtomicBool::new(false));
    let (report_tx, report_rx) = std::sync::mpsc::channel::<WorkerInterval>();

    let thread_count = cfg.threads.len().max(1);
    let mut handles = Vec::new();
    for (index, &core_id) in cfg.threads.iter().enumerate().take(thread_count) {
        let cfg = cfg.clone();
        let templates = templates.clone();
        let stream_ids = stream_ids.clone();
        let shutdown = shutdown.clone();
        let report_tx = report_tx.clone();
        handles.push(std::thread::spawn(move || {
            run_worker_thread(index, core_id, cfg, templates, stream_ids, shutdown, report_tx);
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
            tracing::info!(elapsed_secs = summary.elapsed_secs, "run complete");
            write_summary_file(&cfg.summary_file, &summary);
        }
    }
}

fn write_summary_file(path: &str, summary: &perfcore_aggregator::SummaryReport) {
    let text = format!("elapsed_secs={}\n", summary.elapsed_secs);
    if let Err(e) = std::fs::write(path, text) {
        tracing::warn!(%e, path, "failed to write summary file");
    }
}
