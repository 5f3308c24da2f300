use clap::{Parser, Subcommand};
use log::info;
use multiwin::geometry::{FileGeometry, GeometrySource, SharedGeometry};
use multiwin::identity::new_id;
use multiwin::scene;
use multiwin::store::{FileStore, RegistryStore};
use multiwin::{Config, Result, Shape, WindowManager};
use rand::Rng;
use std::path::PathBuf;
use tokio::signal;

#[derive(Parser)]
#[command(name = "multiwin")]
#[command(about = "Keep a shared scene in sync across independently moved windows")]
struct Cli {
    #[arg(short, long, help = "Configuration file path")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Register a window and keep it in sync until Ctrl+C")]
    Join {
        #[arg(long, default_value = "0,0,800,600", help = "Initial shape as x,y,w,h")]
        shape: Shape,
        #[arg(long, help = "JSON file re-read on every poll for the current shape")]
        geometry_file: Option<PathBuf>,
        #[arg(long, help = "Metadata attached to this window, as JSON")]
        meta: Option<String>,
        #[arg(long, help = "Reset the shared registry before joining")]
        clear: bool,
    },
    #[command(about = "Print the shared registry")]
    List,
    #[command(about = "Reset the shared registry")]
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    match cli.command {
        Some(Commands::Join {
            shape,
            geometry_file,
            meta,
            clear,
        }) => join(config, shape, geometry_file, meta, clear).await?,
        None => join(config, Shape::new(0.0, 0.0, 800.0, 600.0), None, None, false).await?,
        Some(Commands::List) => {
            let registry = FileStore::new(&config.store.path).read()?;
            println!("{}", serde_json::to_string_pretty(&registry.windows)?);
        }
        Some(Commands::Clear) => {
            FileStore::new(&config.store.path).clear()?;
            println!("✓ Cleared registry at {}", config.store.path);
        }
    }

    Ok(())
}

async fn join(
    config: Config,
    shape: Shape,
    geometry_file: Option<PathBuf>,
    meta: Option<String>,
    clear: bool,
) -> Result<()> {
    let store = FileStore::new(&config.store.path);
    if clear {
        store.clear()?;
        info!("Cleared registry at {}", config.store.path);
    }

    let geometry: Box<dyn GeometrySource> = match geometry_file {
        Some(path) => Box::new(FileGeometry::new(path, shape)),
        None => Box::new(SharedGeometry::new(shape)),
    };
    let meta_data = match meta {
        Some(raw) => serde_json::from_str::<serde_json::Value>(&raw)?,
        None => default_meta_data(),
    };

    let id = new_id();
    let mut wm = WindowManager::new(&config.registry, Box::new(store), geometry)
        .with_id_generator(Box::new(move || id));

    wm.set_win_shape_change_callback(|shape| info!("This window moved to {:?}", shape));
    wm.set_win_change_callback(move |windows| {
        for (i, node) in scene::layout(windows, Some(id)).iter().enumerate() {
            info!(
                "[{}] {}{} center=({:.0}, {:.0}) mirrors {:?}",
                i,
                node.id,
                if node.is_this_window { " (this)" } else { "" },
                node.center.0,
                node.center.1,
                node.neighbors
            );
        }
    });

    wm.init(meta_data);

    let mut ticker = tokio::time::interval(config.registry.tick_interval());
    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => wm.update(),
            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    wm.teardown();
    Ok(())
}

fn default_meta_data() -> serde_json::Value {
    let mut rng = rand::rng();
    let rotation_x = rng.random_range(1..=5u32) as f64 * 0.1;
    let rotation_y = rng.random_range(1..=3u32) as f64 * 0.1;
    serde_json::json!({
        "rotation": { "x": rotation_x, "y": rotation_y },
        "color": [0.1, 1.0, 0.5]
    })
}
