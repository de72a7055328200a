use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use zapgen::config::BuildConfig;
use zapgen::emit::sanitize_symbol;
use zapgen::project::{self, GameManifest, MANIFEST_FILE};

#[derive(Parser)]
#[command(name = "zapgen")]
#[command(about = "Generate ZAP assembly for the Z-machine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample zapgen.toml in the current directory
    Init {
        /// Game name (defaults to directory name)
        name: Option<String>,
    },
    /// Build the .zap files for a game manifest
    Build {
        /// The manifest to build (defaults to ./zapgen.toml)
        manifest: Option<PathBuf>,

        /// Output directory (defaults to the manifest's directory)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Target Z-machine version, overriding the manifest (1-8)
        #[arg(long, value_name = "N")]
        zversion: Option<i32>,

        /// Emit debug records
        #[arg(long)]
        debug: bool,

        /// Write the frequent-words stub even if the file exists
        #[arg(long)]
        force_freq: bool,

        /// Dump the symbol table as JSON to stderr, or to a file with --dump-symbols=path
        #[arg(long, value_name = "FILE", num_args = 0..=1)]
        dump_symbols: Option<Option<PathBuf>>,
    },
    /// Print the ZAP symbol for each name
    Sanitize {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { name } => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            match project::init_project(&cwd, name.as_deref()) {
                Ok(path) => println!("Created {}", path.display()),
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        Commands::Build {
            manifest,
            out,
            zversion,
            debug,
            force_freq,
            dump_symbols,
        } => {
            let path = manifest.unwrap_or_else(|| PathBuf::from(MANIFEST_FILE));
            let options = BuildOptions {
                out,
                zversion,
                debug,
                force_freq,
                dump_symbols,
            };
            if let Err(e) = run_build(&path, options) {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        Commands::Sanitize { names } => {
            for name in names {
                println!("{}", sanitize_symbol(&name));
            }
        }
    }

    ExitCode::SUCCESS
}

struct BuildOptions {
    out: Option<PathBuf>,
    zversion: Option<i32>,
    debug: bool,
    force_freq: bool,
    dump_symbols: Option<Option<PathBuf>>,
}

fn run_build(path: &Path, options: BuildOptions) -> Result<(), String> {
    let manifest = GameManifest::load(path).map_err(|e| e.to_string())?;

    let manifest_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let base = BuildConfig {
        debug_info: options.debug,
        output_dir: options.out.unwrap_or_else(|| manifest_dir.to_path_buf()),
        force_frequent_words: options.force_freq,
        ..Default::default()
    };
    let mut config = manifest.build_config(&base);
    if let Some(version) = options.zversion {
        config.zversion = version;
    }

    log::info!(
        "building '{}' (version {}) into {}",
        manifest.game.name,
        config.zversion,
        config.output_dir.display()
    );
    let output = project::build_project(&manifest, &config, &path.to_string_lossy())
        .map_err(|e| e.to_string())?;

    match options.dump_symbols {
        Some(Some(dump_path)) => {
            std::fs::write(&dump_path, &output.symbols_json)
                .map_err(|e| format!("failed to write {}: {}", dump_path.display(), e))?;
        }
        Some(None) => eprintln!("{}", output.symbols_json),
        None => {}
    }

    for file in &output.files {
        println!("wrote {}", file.display());
    }
    Ok(())
}
