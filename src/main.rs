use change_detect::client::{self, DetectionClient};
use change_detect::fs::LocalFs;
use change_detect::prepare::{self, PrepareOptions, PrepareReport, Side};
use change_detect::session::UploadSession;
use change_detect::{config, output};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

/// A pair of input folders.
#[derive(clap::Args, Clone)]
struct FolderArgs {
    /// Folder with the "before" images
    #[arg(long)]
    before: PathBuf,
    /// Folder with the "after" images
    #[arg(long)]
    after: PathBuf,
}

#[derive(Parser)]
#[command(name = "change-detect")]
#[command(about = "Client for a remote image change-detection service")]
#[command(long_about = "\
Client for a remote image change-detection service

Give it two folders of images of the same scenes, taken before and after,
and it uploads them to the detection backend and fetches the result archive.

Input folders:

  before/                 after/
  ├── tile_001.jpg        ├── TILE_001.png     # paired by base name,
  ├── tile_002.jpg        ├── tile_002.jpg     # case-insensitive
  └── notes.txt           └── tile_003.jpg     # non-images and unpaired
                                               # files are skipped

'prepare' writes the normalized layout some backends expect:

  out/
  ├── images_A/0001.jpg, 0002.jpg, ...
  ├── images_B/0001.jpg, 0002.jpg, ...
  └── test.txt            # images_A/0001.jpg images_B/0001.jpg

Run 'change-detect gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Directory for the upload session and other intermediate files
    #[arg(long, default_value = ".change-detect", global = true)]
    temp_dir: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pair two folders and copy them into the images_A/images_B layout
    Prepare {
        #[command(flatten)]
        folders: FolderArgs,
        /// Output directory (created if missing, reused if present)
        #[arg(long)]
        output: PathBuf,
        /// Print a JSON success/failure report instead of the listing
        #[arg(long)]
        json: bool,
    },
    /// List image files whose names use more than [A-Za-z0-9_.-]
    CheckNames {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Upload both folders to the detection backend
    Submit(FolderArgs),
    /// Download a result archive (defaults to the last submitted result)
    Download {
        /// Result id; taken from the saved session when omitted
        id: Option<String>,
        /// Where to write the archive
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Check whether the detection backend is reachable
    Status,
    /// Forget the saved upload session
    Reset,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Prepare {
            folders,
            output: out_dir,
            json,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            let options = PrepareOptions {
                require_standard_names: config.prepare.require_standard_names,
            };
            let result = prepare::normalize_with(
                &LocalFs,
                &folders.before,
                &folders.after,
                &out_dir,
                &options,
            );
            if json {
                let report = PrepareReport::from_result(&result);
                println!("{}", serde_json::to_string_pretty(&report)?);
                if !report.success {
                    std::process::exit(1);
                }
            } else {
                output::print_prepare_output(&result?);
            }
        }
        Command::CheckNames { dirs } => {
            for dir in &dirs {
                let offending = prepare::nonstandard_names(&LocalFs, dir)
                    .map_err(|e| format!("cannot list {}: {e}", dir.display()))?;
                output::print_name_check(dir, &offending);
            }
        }
        Command::Submit(folders) => {
            let config = config::load_config(&cli.config_dir)?;
            let before = image_paths(Side::Before, &folders.before)?;
            let after = image_paths(Side::After, &folders.after)?;

            let mut session = UploadSession::begin(&before, &after)?;
            let client = DetectionClient::new(&config.server)?;
            let reply = client.submit(&before, &after)?;
            if let Some(id) = client::result_id(&reply) {
                session.record_result(id);
            }
            let path = session.save(&cli.temp_dir)?;
            info!(path = %path.display(), "session saved");
            output::print_submit_output(&session, &reply);
        }
        Command::Download { id, dest } => {
            let config = config::load_config(&cli.config_dir)?;
            let session = UploadSession::load(&cli.temp_dir)?;
            let id = match (id, session.as_ref().and_then(|s| s.result_id.clone())) {
                (Some(id), _) | (None, Some(id)) => id,
                (None, None) => {
                    return Err("no result id given and no submitted session found; \
                                pass an id or run 'submit' first"
                        .into());
                }
            };
            if let Some(session) = &session {
                output::print_session(session);
            }
            let client = DetectionClient::new(&config.server)?;
            let bytes = client.download(&id)?;
            let dest = dest.unwrap_or_else(|| PathBuf::from(client::archive_filename(&id)));
            client::save_archive(&bytes, &dest)?;
            output::print_download_output(&id, &dest, bytes.len());
        }
        Command::Status => {
            let config = config::load_config(&cli.config_dir)?;
            let client = DetectionClient::new(&config.server)?;
            if client.check_status() {
                println!("{}: online", client.base_url());
            } else {
                println!("{}: offline", client.base_url());
                std::process::exit(1);
            }
        }
        Command::Reset => {
            if UploadSession::clear(&cli.temp_dir)? {
                println!("Session cleared");
            } else {
                println!("No session to clear");
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Image paths of one input folder, in pairing order.
fn image_paths(side: Side, dir: &Path) -> Result<Vec<PathBuf>, prepare::PrepareError> {
    prepare::collect_images(&LocalFs, side, dir)
        .map(|entries| entries.into_iter().map(|e| e.path).collect())
}
