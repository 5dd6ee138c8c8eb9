use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;

use bgpcorr::config::{self, ModeConfig};
use bgpcorr::correlation::Aggregator;
use bgpcorr::loader;
use bgpcorr::report;
use bgpcorr::spikes::SpikeStore;
use bgpcorr::topology::AnalyzedAses;

/// Correlation analysis of BGP routing-table spikes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the analysis configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for result tables and the run summary
    #[arg(short, long, default_value = "analysis_output")]
    output: PathBuf,

    /// Log filter, e.g. info or bgpcorr=debug
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override the configured number of worker threads
    #[arg(short = 'j', long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    info!("Starting BGP spike correlation analysis");
    info!("Configuration file: {:?}", args.config);
    info!("Output directory: {:?}", args.output);

    let config = config::load_config(&args.config)?;
    let threads = args.threads.unwrap_or(config.threads);

    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .wrap_err("failed to initialize worker thread pool")?;

    let map = loader::load_topology(&config.topology_files)?;
    info!(
        "topology map ready: {} ASes, {} links",
        map.vertex_count(),
        map.edge_count()
    );

    let mut store = loader::load_spike_store(&config.update_files)?;
    info!(
        "loaded {} spikes ({} updates) from {} pairs",
        store.spike_count(),
        store.update_sum(),
        store.pair_count()
    );

    if config.synchronise {
        store.synchronise();
        info!(
            "synchronised feeds: {} spikes across {} pairs remain",
            store.spike_count(),
            store.pair_count()
        );
    }

    let monitored = store.monitored_ases();
    let ases = AnalyzedAses::new(&map, &monitored, config.visibility.mode());
    restrict_store(&mut store, &ases, config.component_only);
    info!(
        "analyzing {} pairs over {} ASes",
        store.pair_count(),
        ases.graph().vertex_count()
    );

    let pairs = store.pair_count();
    let spikes = store.spike_count();
    let updates = store.update_sum();

    let aggregator = Aggregator::new(
        &store,
        &ases,
        config.time_window,
        config.duplication_fraction,
        config.mode.mode(),
    );

    let checkpoint_path = args.output.join("checkpoint.tsv");
    let mut buckets = Vec::new();
    let totals = aggregator.classify_all(
        config.first_bucket,
        config.last_bucket,
        config.bucket_stride,
        threads,
        |bucket| {
            report::append_bucket_row(&checkpoint_path, bucket)?;
            buckets.push(bucket.clone());
            Ok(())
        },
    )?;

    match config.mode {
        ModeConfig::Advanced => {
            report::write_classification_table(&args.output.join("results.tsv"), &buckets)?;
            report::write_time_quartiles(&args.output.join("time_quartiles.tsv"), &totals)?;
            report::write_origins_quartiles(&args.output.join("origins_quartiles.tsv"), &totals)?;
        }
        ModeConfig::Basic { .. } => {
            report::write_basic_table(&args.output.join("basic_results.tsv"), &buckets)?;
        }
    }
    report::write_json_summary(
        &args.output.join("summary.json"),
        pairs,
        spikes,
        updates,
        &totals,
    )?;

    report::print_summary(&totals);
    info!("Analysis complete");
    Ok(())
}

/// Drop spikes from ASes outside the analyzable set, and outside its biggest
/// connected component when `component_only` is set.
fn restrict_store(store: &mut SpikeStore, ases: &AnalyzedAses, component_only: bool) {
    let retained: BTreeSet<_> = if component_only {
        ases.biggest_connected_component().vertices().collect()
    } else {
        ases.as_numbers().into_iter().collect()
    };
    store.retain_ases(&retained);
}
