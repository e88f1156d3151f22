//! nalenc: key generation and file encryption CLI
//!
//! Commands:
//!   keygen [-o PATH] [--ascii]          - generate a 512-byte key and save it
//!   key inspect PATH                    - show a key file's format and fingerprint
//!   encrypt -k KEY INPUT [-o OUTPUT]    - seal a file into a .nalenc container
//!   decrypt -k KEY INPUT [-o OUTPUT]    - open a .nalenc container
//!   config show                         - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use nalenc_core::config::NalencConfig;
use nalenc_core::types::{ensure_key_extension, suggest_output_path};
use nalenc_core::{paths, Direction, KeyFormat};
use nalenc_crypto::{
    CancelToken, CipherOptions, CipherSummary, NalencError, ProgressFn, StreamControl,
};

/// File name `keygen` uses when no path is given
const DEFAULT_KEY_NAME: &str = "nalenc.key";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "nalenc",
    version,
    about = "NALEnc key and file cipher",
    long_about = "nalenc: generate 512-byte keys and encrypt or decrypt files into authenticated .nalenc containers"
)]
struct Cli {
    /// Path to config.toml (default: <app data dir>/nalenc/config.toml)
    #[arg(long, short = 'c', env = "NALENC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides [log] level)
    #[arg(long, env = "NALENC_LOG", global = true)]
    log: Option<String>,

    /// Log output format (overrides [log] format)
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new random key and save it
    Keygen {
        /// Where to save the key (".key" is appended when missing)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Save as armored Base64 text instead of raw bytes
        #[arg(long)]
        ascii: bool,
        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Key file utilities
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Encrypt a file into a .nalenc container
    Encrypt(CipherArgs),

    /// Decrypt a .nalenc container
    Decrypt(CipherArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct CipherArgs {
    /// Key file (binary or ASCII)
    #[arg(long, short = 'k')]
    key: PathBuf,
    /// File to read
    input: PathBuf,
    /// File to write (default: derived from the input name)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    /// Overwrite an existing output file
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Load a key file and show its format and fingerprint
    Inspect {
        path: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(paths::default_config_path);
    let config = load_config(&config_path).await?;

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = cli
        .log_format
        .unwrap_or_else(|| LogFormat::from_config(&config.log.format));
    init_logging(level, format);

    match cli.command {
        Commands::Keygen {
            output,
            ascii,
            force,
        } => cmd_keygen(&config, output.as_deref(), ascii, force),
        Commands::Key {
            action: KeyAction::Inspect { path, json },
        } => cmd_key_inspect(&path, json),
        Commands::Encrypt(args) => cmd_cipher(&config, Direction::Encrypt, args).await,
        Commands::Decrypt(args) => cmd_cipher(&config, Direction::Decrypt, args).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

/// Format an error for the terminal.
///
/// Engine errors print as `kind: message` with the message untouched; anything
/// else (config, argument checks) prints its context chain.
fn render_error(err: &anyhow::Error) -> String {
    match err.chain().find_map(|e| e.downcast_ref::<NalencError>()) {
        Some(e) => format!("{}: {e}", e.kind()),
        None => format!("error: {err:#}"),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

async fn load_config(path: &Path) -> Result<NalencConfig> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        NalencConfig::load(&path).with_context(|| format!("loading config: {}", path.display()))
    })
    .await
    .context("config loader task failed")?
}

// ── Progress display ──────────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn summary_line(summary: &CipherSummary) -> String {
    format!(
        "  {} read, {} written, {} chunks",
        HumanBytes(summary.bytes_in),
        HumanBytes(summary.bytes_out),
        summary.chunks
    )
}

// ── `nalenc keygen` ───────────────────────────────────────────────────────────

/// Where `keygen` writes: the given path, or `nalenc.key` in the configured
/// key directory (or the current directory), always ending in `.key`.
fn resolve_key_path(config: &NalencConfig, output: Option<&Path>) -> PathBuf {
    let path = match output {
        Some(p) => p.to_path_buf(),
        None => match &config.keys.default_dir {
            Some(dir) => paths::expand_tilde(dir).join(DEFAULT_KEY_NAME),
            None => PathBuf::from(DEFAULT_KEY_NAME),
        },
    };
    ensure_key_extension(&paths::expand_tilde(&path))
}

fn cmd_keygen(config: &NalencConfig, output: Option<&Path>, ascii: bool, force: bool) -> Result<()> {
    let path = resolve_key_path(config, output);
    refuse_overwrite(&path, force)?;

    let format = if ascii {
        KeyFormat::Ascii
    } else {
        config.keys.default_format
    };

    let key = nalenc_crypto::generate_key()?;
    nalenc_crypto::save_key(&key, &path, format)?;

    println!("Saved {format} key: {}", path.display());
    println!("  fingerprint: {}", key.fingerprint());
    Ok(())
}

// ── `nalenc key inspect` ──────────────────────────────────────────────────────

fn cmd_key_inspect(path: &Path, json: bool) -> Result<()> {
    let (key, format) = nalenc_crypto::probe_key(path)?;

    if json {
        let report = serde_json::json!({
            "path": path.display().to_string(),
            "format": format.to_string(),
            "length": key.as_bytes().len(),
            "fingerprint": key.fingerprint(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", path.display());
        println!("  format:      {format}");
        println!("  length:      {} bytes", key.as_bytes().len());
        println!("  fingerprint: {}", key.fingerprint());
    }
    Ok(())
}

// ── `nalenc encrypt` / `nalenc decrypt` ───────────────────────────────────────

fn refuse_overwrite(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

fn resolve_output(args: &CipherArgs, direction: Direction) -> Result<PathBuf> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| suggest_output_path(&args.input, direction));
    if output == args.input {
        anyhow::bail!("output would overwrite the input file: {}", output.display());
    }
    refuse_overwrite(&output, args.force)?;
    Ok(output)
}

async fn cmd_cipher(config: &NalencConfig, direction: Direction, args: CipherArgs) -> Result<()> {
    let output = resolve_output(&args, direction)?;
    let key = nalenc_crypto::load_key(&args.key)?;

    let total = tokio::fs::metadata(&args.input)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    let label = match direction {
        Direction::Encrypt => "encrypting",
        Direction::Decrypt => "decrypting",
    };
    let pb = make_progress_bar(total, label);

    let cancel = CancelToken::new();
    let options = CipherOptions {
        chunk_size: config.cipher.chunk_size,
    };
    let input = args.input.clone();
    let worker_output = output.clone();
    let worker_cancel = cancel.clone();
    let worker_pb = pb.clone();

    let mut task = tokio::task::spawn_blocking(move || {
        let progress: ProgressFn = Box::new(move |done, total| {
            if total > 0 {
                worker_pb.set_length(total);
            }
            worker_pb.set_position(done);
        });
        let ctl = StreamControl {
            cancel: Some(&worker_cancel),
            progress: Some(&progress),
            ..StreamControl::default()
        };
        match direction {
            Direction::Encrypt => {
                nalenc_crypto::encrypt_file(&input, &worker_output, &key, options, &ctl)
            }
            Direction::Decrypt => nalenc_crypto::decrypt_file(&input, &worker_output, &key, &ctl),
        }
    });

    let joined = tokio::select! {
        res = &mut task => res,
        Ok(()) = tokio::signal::ctrl_c() => {
            pb.set_message("cancelling...");
            tracing::info!("interrupt received, cancelling {direction}");
            cancel.cancel();
            task.await
        }
    };
    let result = joined.context("cipher worker failed")?;

    let summary = match result {
        Ok(summary) => {
            pb.finish_with_message("done");
            summary
        }
        Err(e) => {
            pb.abandon();
            return Err(e.into());
        }
    };

    let verb = match direction {
        Direction::Encrypt => "Encrypted",
        Direction::Decrypt => "Decrypted",
    };
    println!("{verb}: {} → {}", args.input.display(), output.display());
    println!("{}", summary_line(&summary));
    Ok(())
}

// ── `nalenc config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &NalencConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use nalenc_crypto::{CipherError, KeyError};

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_encrypt_args() {
        let cli = Cli::try_parse_from([
            "nalenc", "encrypt", "-k", "my.key", "report.pdf", "-o", "out.nalenc",
        ])
        .unwrap();
        match cli.command {
            Commands::Encrypt(args) => {
                assert_eq!(args.key, PathBuf::from("my.key"));
                assert_eq!(args.input, PathBuf::from("report.pdf"));
                assert_eq!(args.output, Some(PathBuf::from("out.nalenc")));
                assert!(!args.force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nalenc", "config", "show", "--log", "debug", "--log-format", "json",
        ])
        .unwrap();
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn test_log_format_from_config() {
        assert_eq!(LogFormat::from_config("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_config("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_config("text"), LogFormat::Text);
        assert_eq!(LogFormat::from_config("pretty"), LogFormat::Text);
    }

    #[test]
    fn test_key_path_default_and_extension() {
        let config = NalencConfig::default();
        assert_eq!(resolve_key_path(&config, None), PathBuf::from("nalenc.key"));
        assert_eq!(
            resolve_key_path(&config, Some(Path::new("backup"))),
            PathBuf::from("backup.key")
        );
        assert_eq!(
            resolve_key_path(&config, Some(Path::new("backup.KEY"))),
            PathBuf::from("backup.KEY")
        );
    }

    #[test]
    fn test_key_path_uses_configured_dir() {
        let mut config = NalencConfig::default();
        config.keys.default_dir = Some(PathBuf::from("/srv/keys"));
        assert_eq!(
            resolve_key_path(&config, None),
            PathBuf::from("/srv/keys/nalenc.key")
        );
        // An explicit path is taken as given
        assert_eq!(
            resolve_key_path(&config, Some(Path::new("here.key"))),
            PathBuf::from("here.key")
        );
    }

    #[test]
    fn test_resolve_output_suggests_name() {
        let tmp = tempfile::tempdir().unwrap();
        let args = CipherArgs {
            key: PathBuf::from("k.key"),
            input: tmp.path().join("report.pdf"),
            output: None,
            force: false,
        };
        assert_eq!(
            resolve_output(&args, Direction::Encrypt).unwrap(),
            tmp.path().join("report.pdf.nalenc")
        );
    }

    #[test]
    fn test_resolve_output_refuses_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = tmp.path().join("report.pdf");
        std::fs::write(&existing, b"x").unwrap();
        let mut args = CipherArgs {
            key: PathBuf::from("k.key"),
            input: tmp.path().join("report.pdf.nalenc"),
            output: None,
            force: false,
        };
        assert!(resolve_output(&args, Direction::Decrypt).is_err());

        args.force = true;
        assert_eq!(resolve_output(&args, Direction::Decrypt).unwrap(), existing);
    }

    #[test]
    fn test_resolve_output_refuses_input() {
        let args = CipherArgs {
            key: PathBuf::from("k.key"),
            input: PathBuf::from("same.bin"),
            output: Some(PathBuf::from("same.bin")),
            force: true,
        };
        assert!(resolve_output(&args, Direction::Encrypt).is_err());
    }

    #[test]
    fn test_render_engine_error_as_kind_and_message() {
        let err = anyhow::Error::from(NalencError::from(KeyError::InvalidKeyLength {
            observed: 256,
            expected: 512,
        }));
        assert_eq!(
            render_error(&err),
            "InvalidKeyLength: invalid key length: 256 bytes, expected 512"
        );

        let err = anyhow::Error::from(NalencError::from(CipherError::AuthenticationError))
            .context("decrypting");
        assert!(render_error(&err).starts_with("AuthenticationError: "));
    }

    #[test]
    fn test_render_other_error() {
        let err = anyhow::anyhow!("bad thing");
        assert_eq!(render_error(&err), "error: bad thing");
    }

    #[test]
    fn test_summary_line_uses_human_sizes() {
        let summary = CipherSummary {
            bytes_in: 3 * 1024 * 1024,
            bytes_out: 512,
            chunks: 48,
        };
        assert_eq!(
            summary_line(&summary),
            format!(
                "  {} read, {} written, 48 chunks",
                HumanBytes(3 * 1024 * 1024),
                HumanBytes(512)
            )
        );
        assert!(summary_line(&summary).contains("MiB"));
    }
}
