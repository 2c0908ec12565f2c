//! CLI binary for edgequake-pdfsign.
//!
//! A thin shim over the library crate that maps CLI flags and stored
//! profiles to a `SignatureConfig`, runs the requested action and prints
//! the results.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use edgequake_pdfsign::config::{HEIGHT_RANGE, WIDTH_RANGE, X_RANGE, Y_RANGE};
use edgequake_pdfsign::pipeline::select;
use edgequake_pdfsign::{
    bind_pdfium, inspect, load_document, load_signature_image, BatchOutput, BatchProgressCallback,
    PageSelectionMode, ProfileStore, ProgressCallback, SignatureConfig, SignatureOverlay,
    SigningSession, SourceDocument,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per
/// document.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Signing");

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Signing {total_documents} document(s)…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut t) = self.started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, name: &str, pages_stamped: usize) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            index + 1,
            total,
            name,
            dim(&format!("{pages_stamped} page(s)")),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, name: &str, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&msg),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} document(s) signed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) signed  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Sign the first page of a contract
  pdfsign sign contract.pdf --signature sig.png --name "Ada Lovelace"

  # Sign pages 1 and 3-5 of several documents (delivered as a ZIP)
  pdfsign sign a.pdf b.pdf --signature sig.png --name "Ada" --pages 1,3-5 -o out/

  # Check the placement before signing (needs pdfium)
  pdfsign preview contract.pdf --signature sig.png --x 380 --y 80 -o preview.png

  # Save the current setup, then reuse it
  pdfsign profile save office --signature sig.png --name "Ada" --pages last
  pdfsign sign contract.pdf --profile office

  # Which pages would be signed?
  pdfsign inspect a.pdf b.pdf --pages 2-4

PAGE SELECTION (--pages):
  first          first page only (default)
  last           last page only
  all            every page
  1,3,5 / 2-4    custom pages and inclusive ranges; invalid entries are ignored

PLACEMENT (PDF points, origin bottom-left):
  --x 0–500   --y 0–700   --width 50–200   --height 30–150
  --text-offset -50–50   --text-size 6–14

ENVIRONMENT VARIABLES:
  PDFSIGN_PROFILE_DIR   Profile directory (default ~/.pdfsign)
  PDFSIGN_SIGNATURE     Signature image (PNG or JPEG)
  PDFSIGN_NAME          Signer name
  PDFSIGN_PAGES         Page selection
  PDFIUM_LIB_PATH       Path to libpdfium, used for previews
"#;

/// Stamp a signature image, signer name and date onto PDF pages.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsign",
    version,
    about = "Stamp a signature image, signer name and date onto PDF pages",
    long_about = "Place a signature image with the signer's name and the date on selected pages \
of one or more PDF documents. Preview the placement, save it as a named profile, and apply it \
to a batch. This is a visual stamp, not a cryptographic signature.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding signature_profiles.json and profile images.
    #[arg(long, global = true, env = "PDFSIGN_PROFILE_DIR")]
    profile_dir: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDFSIGN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFSIGN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFSIGN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign one or more PDF documents.
    Sign {
        /// PDF files to sign.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        params: SignatureArgs,

        /// Directory for the signed PDF (one input) or ZIP archive (several).
        #[arg(short, long, env = "PDFSIGN_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,

        /// After signing, save the parameters as this profile.
        #[arg(long)]
        save_profile: Option<String>,

        /// Print the run summary as JSON on stdout.
        #[arg(long, env = "PDFSIGN_JSON")]
        json: bool,
    },

    /// Render a page with the signature placement drawn on it (needs pdfium).
    Preview {
        /// PDF file to preview.
        input: PathBuf,

        #[command(flatten)]
        params: SignatureArgs,

        /// PNG file to write.
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,
    },

    /// Show page counts and which pages would be signed.
    Inspect {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Page selection: first, last, all, or e.g. 1,3-5.
        #[arg(long, env = "PDFSIGN_PAGES")]
        pages: Option<PageSelectionMode>,

        /// Take the page selection from this profile.
        #[arg(long, env = "PDFSIGN_PROFILE")]
        profile: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Export the overlay alone as a one-page transparent PDF.
    Overlay {
        #[command(flatten)]
        params: SignatureArgs,

        #[arg(short, long, default_value = "signature_overlay.pdf")]
        output: PathBuf,
    },

    /// Manage saved profiles.
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// List saved profiles.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print one profile as JSON.
    Show { name: String },
    /// Save (or overwrite) a profile from the given parameters.
    Save {
        #[arg(value_name = "NAME")]
        profile_name: String,

        #[command(flatten)]
        params: SignatureArgs,
    },
    /// Delete a profile and its stored image.
    Delete { name: String },
    /// Delete every profile.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

/// Signature source and placement. Unset flags come from `--profile`, then
/// from the built-in defaults.
#[derive(Args, Debug, Clone)]
struct SignatureArgs {
    /// Start from this saved profile.
    #[arg(long, env = "PDFSIGN_PROFILE")]
    profile: Option<String>,

    /// Signature image (PNG or JPEG). Takes priority over the profile's image.
    #[arg(short, long, env = "PDFSIGN_SIGNATURE")]
    signature: Option<PathBuf>,

    /// Signer name printed under the signature.
    #[arg(short, long, env = "PDFSIGN_NAME")]
    name: Option<String>,

    /// Page selection: first, last, all, or e.g. 1,3-5.
    #[arg(long, env = "PDFSIGN_PAGES")]
    pages: Option<PageSelectionMode>,

    /// Left edge of the signature, in points (0–500).
    #[arg(long, env = "PDFSIGN_X", value_parser = parse_x)]
    x: Option<f64>,

    /// Bottom edge of the signature, in points (0–700).
    #[arg(long, env = "PDFSIGN_Y", value_parser = parse_y)]
    y: Option<f64>,

    /// Signature width, in points (50–200).
    #[arg(long, env = "PDFSIGN_WIDTH", value_parser = parse_width)]
    width: Option<f64>,

    /// Signature height, in points (30–150).
    #[arg(long, env = "PDFSIGN_HEIGHT", value_parser = parse_height)]
    height: Option<f64>,

    /// Name baseline relative to the bottom of the signature (-50–50).
    #[arg(long, env = "PDFSIGN_TEXT_OFFSET", allow_hyphen_values = true,
          value_parser = clap::value_parser!(i32).range(-50..=50))]
    text_offset: Option<i32>,

    /// Font size of the name line (6–14).
    #[arg(long, env = "PDFSIGN_TEXT_SIZE",
          value_parser = clap::value_parser!(u32).range(6..=14))]
    text_size: Option<u32>,

    /// Do not print the date line.
    #[arg(long, env = "PDFSIGN_NO_DATE")]
    no_date: bool,

    /// Signing date (YYYY-MM-DD). Default: today.
    #[arg(long, env = "PDFSIGN_DATE")]
    date: Option<NaiveDate>,

    /// Prefix of the name line.
    #[arg(long, env = "PDFSIGN_SIGNED_BY_LABEL")]
    signed_by_label: Option<String>,

    /// Prefix of the date line.
    #[arg(long, env = "PDFSIGN_DATE_LABEL")]
    date_label: Option<String>,

    /// strftime format of the date.
    #[arg(long, env = "PDFSIGN_DATE_FORMAT")]
    date_format: Option<String>,
}

fn parse_points(s: &str, range: &RangeInclusive<f64>) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if range.contains(&v) {
        Ok(v)
    } else {
        Err(format!("{v} is not in {}..={}", range.start(), range.end()))
    }
}
fn parse_x(s: &str) -> Result<f64, String> {
    parse_points(s, &X_RANGE)
}
fn parse_y(s: &str) -> Result<f64, String> {
    parse_points(s, &Y_RANGE)
}
fn parse_width(s: &str) -> Result<f64, String> {
    parse_points(s, &WIDTH_RANGE)
}
fn parse_height(s: &str) -> Result<f64, String> {
    parse_points(s, &HEIGHT_RANGE)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && matches!(cli.command, Command::Sign { json: false, .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store = match &cli.profile_dir {
        Some(dir) => ProfileStore::new(dir),
        None => ProfileStore::open_default(),
    };
    let mut session = SigningSession::new(store);

    match &cli.command {
        Command::Sign {
            inputs,
            params,
            output_dir,
            save_profile,
            json,
        } => {
            let config = prepare(&mut session, params)?;
            let documents = load_all(inputs)?;

            if !cli.quiet && !json {
                print_recap(&session, &config, &documents);
            }

            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
            } else {
                None
            };

            let output = session
                .process(&documents, &config, progress.as_ref())
                .context("Signing failed")?
                .clone();

            if let Some(name) = save_profile {
                session
                    .save_profile(name, &config)
                    .with_context(|| format!("Failed to save profile '{name}'"))?;
                if !cli.quiet {
                    eprintln!("{} Profile '{}' saved", green("✔"), name);
                }
            }

            let artifact = session.artifact().context("Packaging failed")?;
            let path = artifact
                .write_to_dir(output_dir)
                .context("Failed to write output")?;

            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                );
            } else if !cli.quiet {
                print_summary(&output, &path, show_progress);
            }
            session.reset();
        }

        Command::Preview {
            input,
            params,
            output,
        } => {
            let config = prepare(&mut session, params)?;
            let document = load_document(input).context("Failed to load PDF")?;
            let pdfium = bind_pdfium()?;
            let preview = session
                .preview(&pdfium, &document, &config)
                .context("Preview failed")?;
            let png = preview.to_png_bytes()?;
            std::fs::write(output, png)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            if !cli.quiet {
                println!("Preview:      {}", preview.info);
                println!(
                    "Signing:      {}",
                    select::describe_selection(Some(&config.pages), preview.total_pages)
                );
                match preview.placement {
                    Some(p) => println!(
                        "Placement:    x={} y={} {}x{} px (zoom 1.5)",
                        p.rect.x, p.rect.y, p.rect.width, p.rect.height
                    ),
                    None => println!("Placement:    {}", red("page has no usable size")),
                }
                if session.active_signature().is_none() {
                    println!("Signature:    {}", dim("none (rectangle only)"));
                }
                println!("Written:      {}", bold(&output.display().to_string()));
            }
        }

        Command::Inspect {
            inputs,
            pages,
            profile,
            json,
        } => {
            let mode = match (pages, profile) {
                (Some(mode), _) => mode.clone(),
                (None, Some(name)) => session
                    .load_profile(name)
                    .with_context(|| format!("Failed to load profile '{name}'"))?
                    .page_mode(),
                (None, None) => PageSelectionMode::default(),
            };
            let mut infos = Vec::with_capacity(inputs.len());
            for input in inputs {
                let doc = load_document(input)
                    .with_context(|| format!("Failed to load {}", input.display()))?;
                infos.push(inspect(&doc, &mode).context("Failed to inspect PDF")?);
            }

            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&infos).context("Failed to serialize metadata")?
                );
            } else {
                for info in &infos {
                    println!("File:         {}", bold(&info.name));
                    println!("Pages:        {}", info.total_pages);
                    println!("PDF Version:  {}", info.pdf_version);
                    println!("Size:         {} bytes", info.file_size);
                    println!("Signing:      {}", info.selection);
                    println!("Preview:      {}", info.preview);
                    println!();
                }
            }
        }

        Command::Overlay { params, output } => {
            let config = prepare(&mut session, params)?;
            let image = session
                .active_signature()
                .context("No signature image: pass --signature or a profile with an image")?
                .bytes;
            let pdf = SignatureOverlay::build(&config, image)?.to_pdf_bytes()?;
            std::fs::write(output, pdf)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            if !cli.quiet {
                eprintln!("{} Overlay written to {}", green("✔"), bold(&output.display().to_string()));
            }
        }

        Command::Profile(cmd) => run_profile(&mut session, cmd, cli.quiet)?,
    }

    Ok(())
}

/// Load the profile and signature, then apply CLI overrides.
fn prepare(session: &mut SigningSession, args: &SignatureArgs) -> Result<SignatureConfig> {
    if let Some(name) = &args.profile {
        session
            .load_profile(name)
            .with_context(|| format!("Failed to load profile '{name}'"))?;
    }
    if let Some(path) = &args.signature {
        let bytes = load_signature_image(path)
            .with_context(|| format!("Failed to read signature image {}", path.display()))?;
        session.set_uploaded_signature(bytes)?;
    }

    let mut builder = session.config_builder();
    if let Some(v) = &args.name {
        builder = builder.signer_name(v.clone());
    }
    if let Some(v) = &args.pages {
        builder = builder.pages(v.clone());
    }
    if let Some(v) = args.x {
        builder = builder.x(v);
    }
    if let Some(v) = args.y {
        builder = builder.y(v);
    }
    if let Some(v) = args.width {
        builder = builder.width(v);
    }
    if let Some(v) = args.height {
        builder = builder.height(v);
    }
    if let Some(v) = args.text_offset {
        builder = builder.text_offset_y(v);
    }
    if let Some(v) = args.text_size {
        builder = builder.text_size(v);
    }
    if args.no_date {
        builder = builder.include_date(false);
    }
    if let Some(v) = args.date {
        builder = builder.signing_date(v);
    }
    if let Some(v) = &args.signed_by_label {
        builder = builder.signed_by_label(v.clone());
    }
    if let Some(v) = &args.date_label {
        builder = builder.date_label(v.clone());
    }
    if let Some(v) = &args.date_format {
        builder = builder.date_format(v.clone());
    }

    builder.build().context("Invalid configuration")
}

fn load_all(inputs: &[PathBuf]) -> Result<Vec<SourceDocument>> {
    inputs
        .iter()
        .map(|p| load_document(p).with_context(|| format!("Failed to load {}", p.display())))
        .collect()
}

/// Parameter recap printed before processing.
fn print_recap(session: &SigningSession, config: &SignatureConfig, documents: &[SourceDocument]) {
    let p = &config.placement;
    let t = &config.text;
    eprintln!("{}", bold("Signing parameters"));
    if let Some(name) = session.current_profile_name() {
        eprintln!("  Profile:     {name}");
    }
    eprintln!("  Documents:   {}", documents.len());
    eprintln!("  Signer:      {}", t.signer_name);
    eprintln!("  Position:    x={} y={} pt", p.x, p.y);
    eprintln!("  Size:        {}x{} pt", p.width, p.height);
    eprintln!("  Text:        offset {} pt, size {}", t.text_offset_y, t.text_size);
    eprintln!(
        "  Date:        {}",
        t.date_line().unwrap_or_else(|| "not included".to_string())
    );
    eprintln!("  Pages:       {}", config.pages);
    if let Some(sig) = session.active_signature() {
        eprintln!("  Signature:   {:?} ({} bytes)", sig.origin, sig.bytes.len());
    }
}

fn print_summary(output: &BatchOutput, path: &std::path::Path, progress_shown: bool) {
    let stats = &output.stats;
    if !progress_shown {
        eprintln!(
            "Signed {}/{} document(s), {} page(s) in {}ms",
            stats.signed_documents, stats.total_documents, stats.pages_stamped, stats.total_duration_ms
        );
        for failure in &output.failures {
            eprintln!("  {} {}", red("✗"), failure);
        }
    }
    for doc in &output.documents {
        eprintln!(
            "   {}  {}",
            doc.name,
            dim(&format!("pages {:?} of {}", doc.pages_stamped, doc.total_pages))
        );
    }
    eprintln!(
        "{}  →  {}",
        if stats.failed_documents == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        bold(&path.display().to_string())
    );
}

fn run_profile(session: &mut SigningSession, cmd: &ProfileCommand, quiet: bool) -> Result<()> {
    match cmd {
        ProfileCommand::List { json } => {
            let profiles = session.store().load_all()?;
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&profiles).context("Failed to serialise profiles")?
                );
                return Ok(());
            }
            if profiles.is_empty() {
                println!("No saved profiles in {}", session.store().dir().display());
                return Ok(());
            }
            println!("{}", bold(&format!("Saved profiles ({})", profiles.len())));
            for (name, p) in &profiles {
                println!("{}", bold(name));
                println!("  Position:  {},{}", p.x_position, p.y_position);
                println!("  Size:      {}x{}", p.signature_width, p.signature_height);
                println!("  Pages:     {}", p.page_mode());
                if !p.signer_name.is_empty() {
                    println!("  Signer:    {}", p.signer_name);
                }
                println!(
                    "  Image:     {}",
                    if p.has_image() { green("✓") } else { red("✗") }
                );
                println!("  Created:   {}", p.created_at.format("%d/%m/%Y %H:%M"));
                println!("  Updated:   {}", p.updated_at.format("%d/%m/%Y %H:%M"));
            }
        }
        ProfileCommand::Show { name } => {
            let profile = session.store().get(name)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&profile).context("Failed to serialise profile")?
            );
        }
        ProfileCommand::Save {
            profile_name: name,
            params,
        } => {
            let config = prepare(session, params)?;
            let saved = session.save_profile(name, &config)?;
            if !quiet {
                eprintln!(
                    "{} Profile '{}' saved{}",
                    green("✔"),
                    name.trim(),
                    if saved.has_image() { " with signature image" } else { "" }
                );
            }
        }
        ProfileCommand::Delete { name } => {
            session.store().delete(name)?;
            if !quiet {
                eprintln!("{} Profile '{}' deleted", green("✔"), name);
            }
        }
        ProfileCommand::Clear { yes } => {
            if !yes {
                bail!("Refusing to delete every profile without --yes");
            }
            let n = session.store().clear_all()?;
            if !quiet {
                eprintln!("{} {} profile(s) deleted", green("✔"), n);
            }
        }
    }
    Ok(())
}
