//! Consumer perf tool entry point (§6.1, §6.6): resolves configuration,
//! loads the item list and message templates, spawns one worker thread per
//! configured CPU, and runs the stats aggregator on the main thread until
//! `run_time` elapses or a shutdown signal arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use consumer_config::{Cli, ConsumerConfig, TomlDefaults};
use consumer_engine::{Scheduler, Worker, WorkerConfig};
use perfcore_aggregator::{StatsAggregator, WorkerInterval};
use perfcore_items::{ItemRecord, ItemRegistry, TemplatePool};
use perfcore_transport::LoopbackChannel;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn load_config() -> ConsumerConfig {
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
    match ConsumerConfig::resolve(cli, &toml_defaults) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// One worker thread's per-tick loop. Runs against a [`LoopbackChannel`]
/// half-pair, since the concrete wire transport this binary would dial in
/// production is out of scope here — this demonstrates the full
/// engine wiring against the in-process stand-in used throughout this
/// workspace's tests.
fn run_worker_thread(
    index: usize,
    core_id: usize,
    cfg: Arc<ConsumerConfig>,
    templates: Arc<TemplatePool>,
    items: Vec<ItemRecord>,
    shutdown: Arc<AtomicBool>,
    report_tx: std::sync::mpsc::Sender<WorkerInterval>,
) {
    perfcore_config::affinity::pin_current_thread(core_id);

    let start = (index as u32) * 100_000;
    let stream_ids: Vec<u32> = items.iter().map(|r| r.stream_id).collect();
    let registry = ItemRegistry::new(start, items);

    let mut rng = rand::thread_rng();
    let post_latency_array = (cfg.posting_latency_rate > 0)
        .then(|| perfcore_latency::LatencyRandomArray::new(cfg.posting_rate.max(1), cfg.posting_latency_rate, cfg.tick_rate, 1, &mut rng).ok())
        .flatten();
    let generic_latency_array = (cfg.generic_msg_latency_rate > 0)
        .then(|| perfcore_latency::LatencyRandomArray::new(cfg.generic_msg_rate.max(1), cfg.generic_msg_latency_rate, cfg.tick_rate, 1, &mut rng).ok())
        .flatten();

    let scheduler = Scheduler::new(
        cfg.tick_rate,
        cfg.request_rate,
        cfg.posting_rate,
        cfg.generic_msg_rate,
        post_latency_array,
        generic_latency_array,
    );

    let (channel, _peer) = LoopbackChannel::pair();
    let now = perfcore_clock::now_nanos();
    let worker_config = WorkerConfig {
        uname: cfg.uname.clone(),
        app_name: "cons-perf".to_string(),
        service_name: cfg.service_name.clone(),
        posting_enabled: cfg.posting_rate > 0,
        local_dictionary_loaded: false,
        requested_item_count: cfg.item_count as usize,
        delay_steady_state_calc_nanos: cfg.delay_steady_state_calc_ms as u64 * 1_000_000,
        channel_ping_timeout_nanos: 60_000_000_000,
        nano_time: cfg.nano_time,
    };

    let mut worker = Worker::new(scheduler, registry, templates, Box::new(channel), shutdown.clone(), worker_config, now);
    worker.request_items(stream_ids);

    let tick_period = Duration::from_nanos(perfcore_clock::nsec_per_tick(cfg.tick_rate));
    let run_deadline = now + cfg.steady_state_time as u64 * 1_000_000_000;

    let mut prev_counters = std::collections::BTreeMap::new();
    while !shutdown.load(Ordering::Relaxed) {
        let tick_now = perfcore_clock::now_nanos();
        if tick_now >= run_deadline {
            break;
        }
        worker.run_tick(tick_now, tick_period / 2);

        let stats = worker.stats();
        let counters = std::collections::BTreeMap::from([
            ("refresh_count".to_string(), stats.refresh_count.get_total()),
            ("request_count".to_string(), stats.request_count.get_total()),
            ("status_count".to_string(), stats.status_count.get_total()),
            ("posts_sent".to_string(), stats.posts_sent.get_total()),
            ("generics_sent".to_string(), stats.generics_sent.get_total()),
        ]);
        let mut delta = std::collections::BTreeMap::new();
        for (k, v) in &counters {
            let prev = prev_counters.get(k).copied().unwrap_or(0);
            delta.insert(k.clone(), v.saturating_sub(prev));
        }
        prev_counters = counters;

        let drained = worker.latency_queue().swap_and_read();
        let boundary = worker.image_retrieval_end();
        let (startup, steady): (Vec<_>, Vec<_>) = drained.into_iter().partition(|r| match boundary {
            Some(end) => r.end < end,
            None => true,
        });

        let _ = report_tx.send(WorkerInterval {
            name: format!("cons-{index}"),
            counters: delta,
            startup_records: startup,
            steady_records: steady,
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

    let shutdown = Arc::new(AtomicBool::new(false));
    let (report_tx, report_rx) = std::sync::mpsc::channel::<WorkerInterval>();

    let thread_count = cfg.threads.len().max(1);
    let mut handles = Vec::new();
    for (index, &core_id) in cfg.threads.iter().enumerate().take(thread_count) {
        let cfg = cfg.clone();
        let templates = templates.clone();
        let items = items.clone();
        let shutdown = shutdown.clone();
        let report_tx = report_tx.clone();
        handles.push(std::thread::spawn(move || {
            run_worker_thread(index, core_id, cfg, templates, items, shutdown, report_tx);
        }));
    }
    drop(report_tx);

    let stats_file = std::fs::File::create(format!("{}.csv", cfg.stats_file)).ok();
    let mut aggregator = stats_file.map(|f| StatsAggregator::new(f, perfcore_clock::now_nanos()));

    let interval = Duration::from_secs(cfg.write_stats_interval.max(1) as u64);
    let deadline = std::time::Instant::now() + Duration::from_secs(cfg.steady_state_time as u64);
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
                startup_count = summary.startup_latency.count(),
                steady_count = summary.steady_latency.count(),
                "run complete"
            );
            write_summary_file(&cfg.summary_file, &summary);
        }
    }
}

fn write_summary_file(path: &str, summary: &perfcore_aggregator::SummaryReport) {
    let text = format!(
        "elapsed_secs={}\nstartup_count={}\nstartup_mean_usec={:.3}\nsteady_count={}\nsteady_mean_usec={:.3}\n",
        summary.elapsed_secs,
        summary.startup_latency.count(),
        summary.startup_latency.mean(),
        summary.steady_latency.count(),
        summary.steady_latency.mean(),
    );
    if let Err(e) = std::fs::write(path, text) {
        tracing::warn!(%e, path, "failed to write summary file");
    }
}
