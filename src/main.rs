use clap::{Parser, Subcommand};
use lando_upload::compress::{self, PreparedUpload};
use lando_upload::config::{self, ConfigError, ProfileConfig, UploadConfig};
use lando_upload::form::{self, ImageSlot, UploadForm};
use lando_upload::imaging::{RustBackend, can_decode};
use lando_upload::types::{Notice, SourceFile};
use lando_upload::output::BatchOutcome;
use lando_upload::{output, validate};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Shared flags for commands that compress images.
#[derive(clap::Args, Clone)]
struct ProfileArgs {
    /// Compression profile from the config (banner, banner-edit, product, review, ...)
    #[arg(long, short, default_value = "banner")]
    profile: String,
}

#[derive(Parser)]
#[command(name = "lando-upload")]
#[command(about = "Client-side image compression for Lando Hypermarket uploads")]
#[command(long_about = "\
Client-side image compression for Lando Hypermarket uploads

Every picked image goes through the same pipeline before it is sent:

  validate ─→ bypass? ─→ decode ─→ fit to max width ─→ re-encode ─→ <name>.jpg

Rejected files (wrong type, too large) are never decoded. Files above a
profile's bypass threshold are uploaded as-is for the server to optimize.
If decoding or encoding fails, the original file is uploaded and a warning
is shown.

Profiles (one per upload surface) set the size limit, accepted types, max
width, target size and quality schedule.

Run 'lando-upload gen-config' to generate a documented upload.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every pipeline stage (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress one image and write the result
    Compress {
        file: PathBuf,
        #[command(flatten)]
        profile: ProfileArgs,
        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
    /// Compress every file under a directory in parallel
    Batch {
        dir: PathBuf,
        #[command(flatten)]
        profile: ProfileArgs,
        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
    /// Prepare images and print the multipart form that would be sent
    Form {
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        mobile_image: Option<PathBuf>,
        #[arg(long)]
        thumbnail: Option<PathBuf>,
        /// Gallery image (repeatable)
        #[arg(long)]
        gallery: Vec<PathBuf>,
        /// Remove the stored image for a field (repeatable)
        #[arg(long)]
        remove: Vec<String>,
        /// Text field as key=value (repeatable)
        #[arg(long, value_parser = parse_key_value)]
        field: Vec<(String, String)>,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Validate a file against a profile without compressing it
    Check {
        file: PathBuf,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Print a stock upload.toml with all options documented
    GenConfig,
    /// Print the resolved endpoints and profiles
    ShowConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let load = || -> Result<UploadConfig, ConfigError> {
        let config = config::load_config(cli.config.as_deref())?;
        tracing::debug!(path = ?cli.config, profiles = config.profiles.len(), "config loaded");
        Ok(config)
    };

    match cli.command {
        Command::Compress { file, profile, out } => {
            let upload_config = load()?;
            let profile = upload_config.profile(&profile.profile)?;
            let source = SourceFile::from_path(&file)?;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_compress_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = compress::prepare_upload(&RustBackend::new(), &[source], profile, Some(&tx));
            drop(tx);
            printer.join().ok();

            match result {
                Ok(Some(prepared)) => {
                    output::print_notices(&prepared.notices);
                    let path = out.join(&prepared.file.name);
                    write_output(&path, &prepared.file.bytes)?;
                    println!("==> Wrote {}", path.display());
                }
                Ok(None) => {}
                Err(err) => reject(&err.notice()),
            }
        }
        Command::Batch { dir, profile, out } => {
            let upload_config = load()?;
            let profile = upload_config.profile(&profile.profile)?;
            init_thread_pool(&upload_config.processing);
            let paths = collect_source_paths(&dir)?;
            println!("==> Compressing {} files from {}", paths.len(), dir.display());

            let backend = RustBackend::new();
            let claimed = Mutex::new(HashSet::new());
            let outcomes: Vec<BatchOutcome> = paths
                .par_iter()
                .map(|path| compress_into(&backend, profile, &dir, path, &out, &claimed))
                .collect();
            output::print_batch_summary(&outcomes);
        }
        Command::Form {
            image,
            mobile_image,
            thumbnail,
            gallery,
            remove,
            field,
            profile,
        } => {
            let upload_config = load()?;
            let profile = upload_config.profile(&profile.profile)?;
            let backend = RustBackend::new();
            let mut upload = UploadForm::new(upload_config.form.removal);

            for (name, value) in field {
                upload = upload.field(name, value);
            }
            for (name, path) in [
                (form::FIELD_IMAGE, image),
                (form::FIELD_MOBILE_IMAGE, mobile_image),
                (form::FIELD_THUMBNAIL, thumbnail),
            ] {
                let Some(path) = path else { continue };
                if let Some(prepared) = prepare_for_form(&backend, &path, profile)? {
                    upload = upload.slot(name, ImageSlot::Replace(prepared.file));
                }
            }
            for name in remove {
                upload = upload.slot(name, ImageSlot::Remove);
            }
            for path in gallery {
                if let Some(prepared) = prepare_for_form(&backend, &path, profile)? {
                    upload = upload.gallery(prepared.file);
                }
            }

            println!("==> POST {}", upload_config.endpoints().api_url);
            output::print_form_parts(&upload.parts());
        }
        Command::Check { file, profile } => {
            let upload_config = load()?;
            let profile = upload_config.profile(&profile.profile)?;
            let source = SourceFile::from_path(&file)?;
            match validate::validate(std::slice::from_ref(&source), &profile.constraints()) {
                Ok(_) => {
                    println!("==> {} is acceptable", source.name);
                    if !can_decode(&source.mime) {
                        output::print_notices(&[Notice::warning(format!(
                            "{} cannot be decoded locally; the original will be uploaded.",
                            source.mime
                        ))]);
                    }
                }
                Err(err) => reject(&err.notice()),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::ShowConfig => {
            let upload_config = load()?;
            output::print_config(&upload_config, &upload_config.endpoints());
        }
    }

    Ok(())
}

/// Logs go to stderr so they never mix with command output.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{s}`"))
}

/// Every regular file under `dir`, sorted by path. Nothing is read yet.
fn collect_source_paths(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Where a batch output goes: `root/a/photo.png` lands in `out/a/<output_name>`.
fn output_path(out: &Path, root: &Path, source: &Path, output_name: &str) -> PathBuf {
    let rel_dir = source
        .strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .unwrap_or(Path::new(""));
    out.join(rel_dir).join(output_name)
}

fn write_output(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}

/// Read, prepare and write one batch file.
///
/// Only the outcome outlives the call, so memory is bounded by the files in
/// flight. Each output path is claimed once per run; a second source that
/// maps to the same path is reported and skipped.
fn compress_into(
    backend: &RustBackend,
    profile: &ProfileConfig,
    root: &Path,
    path: &Path,
    out: &Path,
    claimed: &Mutex<HashSet<PathBuf>>,
) -> BatchOutcome {
    let source = match SourceFile::from_path(path) {
        Ok(source) => source,
        Err(err) => {
            output::print_notices(&[Notice::error(format!("{}: {err}", path.display()))]);
            return BatchOutcome::Failed;
        }
    };
    if let Err(err) = validate::validate(std::slice::from_ref(&source), &profile.constraints()) {
        output::print_notices(&[err.notice()]);
        return BatchOutcome::Rejected;
    }
    let prepared = compress::compress_source(backend, &source, profile, None);
    drop(source);

    let dest = output_path(out, root, path, &prepared.file.name);
    let is_new = claimed
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(dest.clone());
    if !is_new {
        tracing::warn!(source = %path.display(), dest = %dest.display(), "output name collision");
        output::print_notices(&[Notice::error(format!(
            "{}: {} was already written by another file in this batch; skipped.",
            path.display(),
            dest.display()
        ))]);
        return BatchOutcome::Failed;
    }
    if let Err(err) = write_output(&dest, &prepared.file.bytes) {
        output::print_notices(&[Notice::error(format!(
            "{}: could not write {}: {err}",
            path.display(),
            dest.display()
        ))]);
        return BatchOutcome::Failed;
    }

    // One write per file keeps parallel reports from interleaving.
    let mut lines = output::format_prepared(&prepared);
    lines.push(format!("    Wrote: {}", dest.display()));
    println!("{}", lines.join("\n"));
    BatchOutcome::written(&prepared)
}

/// Prepare one form image, printing its notices. Rejections leave the slot unchanged.
fn prepare_for_form(
    backend: &RustBackend,
    path: &Path,
    profile: &ProfileConfig,
) -> Result<Option<PreparedUpload>, Box<dyn std::error::Error>> {
    let source = SourceFile::from_path(path)?;
    match compress::prepare_upload(backend, &[source], profile, None) {
        Ok(prepared) => {
            if let Some(p) = &prepared {
                output::print_notices(&p.notices);
            }
            Ok(prepared)
        }
        Err(err) => {
            output::print_notices(&[err.notice()]);
            Ok(None)
        }
    }
}

fn reject(notice: &Notice) -> ! {
    output::print_notices(std::slice::from_ref(notice));
    std::process::exit(1);
}
