use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use netindicator::config::{default_path, Config, SinkKind};
use netindicator::logging;
use netindicator::modules::controller::IndicatorController;
use netindicator::modules::links::SysfsLinks;
use netindicator::modules::network::SysfsCounters;
use netindicator::modules::notify::NotificationSink;
use netindicator::modules::power::RunStateWatcher;
use netindicator::modules::render::DisplaySink;
use netindicator::modules::sink::{LineFormat, LineSink};

#[derive(Parser, Debug)]
#[command(name = "netindicator", version, about = "Live upload/download rate indicator")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 采样间隔（秒）
    #[arg(short, long)]
    interval: Option<u64>,

    #[arg(long, value_enum)]
    sink: Option<SinkKind>,

    /// 不跟随屏幕 / 省电状态，始终运行
    #[arg(long)]
    no_run_state: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(interval) = cli.interval {
        config.interval_secs = interval;
    }
    if let Some(sink) = cli.sink {
        config.sink = sink;
    }
    if cli.no_run_state {
        config.watch_run_state = false;
    }
    config.validate()?;
    Ok(config)
}

fn build_sink(config: &Config) -> anyhow::Result<Box<dyn DisplaySink + Send>> {
    let sink: Box<dyn DisplaySink + Send> = match config.sink {
        SinkKind::Stdout => Box::new(LineSink::stdout(LineFormat::Plain, config.timestamp)),
        SinkKind::Waybar => Box::new(LineSink::stdout(LineFormat::Waybar, config.timestamp)),
        SinkKind::Notification => Box::new(
            NotificationSink::connect().context("failed to connect to the notification service")?,
        ),
    };
    Ok(sink)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init(&config.log_level, config.log_format)?;

    info!(
        config = ?cli.config.or_else(default_path),
        interval_secs = config.interval_secs,
        sink = ?config.sink,
        "starting"
    );

    let source = SysfsLinks::new(
        &config.sysfs_root,
        config.link_filter(),
        config.scan_interval(),
    );
    let counters = SysfsCounters::new(&config.sysfs_root);
    let sink = build_sink(&config)?;
    let controller = IndicatorController::new(source, counters, sink, config.interval())?;

    let (tx, mut run_states) = mpsc::unbounded_channel();
    if config.watch_run_state {
        let watcher = RunStateWatcher::connect().await;
        let initial = watcher.query().await;
        controller.apply_run_state(initial);
        tokio::spawn(watcher.watch(initial, config.run_state_poll(), tx));
    } else {
        drop(tx);
        controller.start();
    }

    loop {
        tokio::select! {
            Some(state) = run_states.recv() => controller.apply_run_state(state),
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                break;
            }
        }
    }

    info!("shutting down");
    controller.stop();
    Ok(())
}
