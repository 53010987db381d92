use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tree_watcher::{
	start, EventType, FileSystemEvent, WatcherConfig, WatcherEvent, DEFAULT_CHANGE_DELAY_MS,
	DEFAULT_MOVE_DELAY_MS,
};

#[derive(Parser)]
#[command(name = "tree-watch")]
#[command(about = "Recursively watches directories and reports file system changes")]
struct Cli {
	/// File or directory to watch (repeatable)
	#[arg(short, long, required = true)]
	path: Vec<PathBuf>,

	/// Enable verbose logging
	#[arg(short, long)]
	verbose: bool,

	/// Move correlation window in milliseconds (0 disables move detection
	/// across directories)
	#[arg(short, long, default_value_t = DEFAULT_MOVE_DELAY_MS)]
	move_delay: u64,

	/// Change debounce window in milliseconds (0 reports every change)
	#[arg(short, long, default_value_t = DEFAULT_CHANGE_DELAY_MS)]
	change_delay: u64,

	/// Follow symbolic links instead of reporting the links themselves
	#[arg(long)]
	follow_symlinks: bool,

	/// Print events as JSON
	#[arg(long)]
	json: bool,

	/// Print the watched tree once it is built
	#[arg(long)]
	tree: bool,
}

fn print_event(event: &FileSystemEvent, json: bool) {
	if json {
		match event.to_json() {
			Ok(json) => println!("{json}"),
			Err(e) => error!("Failed to serialize event: {}", e),
		}
		return;
	}

	let kind = if event.is_directory { "(dir)" } else { "(file)" };
	match (event.event_type, event.source_path()) {
		(EventType::Move, Some(source)) => {
			info!("🔄 MOVE: {} -> {} {}", source.display(), event.path.display(), kind)
		}
		(EventType::Create, _) => info!("📁 CREATE: {} {}", event.path.display(), kind),
		(EventType::Delete, _) => info!("🗑️  DELETE: {} {}", event.path.display(), kind),
		(EventType::Change, _) => info!("✏️  CHANGE: {}", event.path.display()),
		(EventType::Move, None) => info!("🔄 MOVE: {} {}", event.path.display(), kind),
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	// Initialize tracing
	let level = if cli.verbose {
		Level::DEBUG
	} else {
		Level::INFO
	};
	tracing_subscriber::fmt().with_max_level(level).init();

	let config = WatcherConfig::with_roots(cli.path)
		.with_move_delay_ms(cli.move_delay)
		.with_change_delay_ms(cli.change_delay)
		.with_follow_symlinks(cli.follow_symlinks);

	let (watcher, mut events) = start(config)?;

	loop {
		tokio::select! {
			event = events.recv() => match event {
				Some(WatcherEvent::Ready) => {
					info!(
						"Ready: {} directories, {} files",
						watcher.directories(),
						watcher.files()
					);
					if cli.tree {
						println!("{}", serde_json::to_string_pretty(&watcher.tree().to_json())?);
					}
				}
				Some(WatcherEvent::FileSystem(event)) => print_event(&event, cli.json),
				Some(WatcherEvent::Error(e)) => {
					watcher.stop().await;
					return Err(e.into());
				}
				None => break,
			},
			_ = tokio::signal::ctrl_c() => {
				info!("Shutting down watcher...");
				break;
			}
		}
	}

	watcher.stop().await;
	Ok(())
}
