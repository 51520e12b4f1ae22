//! CLI binary for arxiv-eli5.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExplainConfig` and prints the explanation.

use anyhow::{Context, Result};
use arxiv_eli5::{
    ArxivId, ExplainConfig, ExplainProgressCallback, ExplainResponse, Explainer, ExplanationStyle,
    ProgressCallback, Stage, SummaryEncoding,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

/// Terminal spinner that prints one line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExplainProgressCallback for CliProgressCallback {
    fn on_start(&self, arxiv_id: &str) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Explaining arXiv:{arxiv_id}…"))
        ));
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.label());
        self.bar.set_message("");
    }

    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        self.bar
            .println(format!("  {} {:<20} {}", green("✓"), stage.label(), dim(detail)));
    }

    fn on_explanation_retry(&self, attempt: u32, reason: &str) {
        let msg = if reason.len() > 80 {
            let cut = reason
                .char_indices()
                .nth(79)
                .map(|(i, _)| i)
                .unwrap_or(reason.len());
            format!("{}\u{2026}", &reason[..cut])
        } else {
            reason.to_string()
        };
        self.bar
            .println(format!("  {} retrying (attempt {attempt}): {}", cyan("⚠"), dim(&msg)));
    }

    fn on_error(&self, stage: Stage, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("  {} {:<20} {}", red("✗"), stage.label(), red(error));
    }

    fn on_complete(&self, figure_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Explanation ready with {} figures",
            green("✔"),
            bold(&figure_count.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Explain a paper like you're five (default style)
  eli5 https://arxiv.org/abs/1706.03762

  # Bare identifiers and old-style ids work too
  eli5 --style harry-potter 1706.03762v5
  eli5 --style shakespearean hep-th/9901001

  # Explain a local PDF
  eli5 --file paper.pdf --style food

  # JSON output (summary as an object, or as a JSON string)
  eli5 --json 2301.00001 > out.json
  eli5 --json --summary-as-string 2301.00001

  # List the available styles
  eli5 --list-styles

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

/// Explain arXiv papers in plain language.
#[derive(Parser, Debug)]
#[command(
    name = "eli5",
    version,
    about = "Explain arXiv papers in plain language, in a style of your choice",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// arXiv URL or identifier. With --file, only used to label the output.
    #[arg(required_unless_present_any = ["file", "list_styles"])]
    input: Option<String>,

    /// Explain a local PDF instead of downloading one.
    #[arg(short, long, env = "ELI5_FILE")]
    file: Option<PathBuf>,

    /// Explanation style (see --list-styles).
    #[arg(short, long, env = "ELI5_STYLE")]
    style: Option<String>,

    /// Print the style catalog and exit.
    #[arg(long)]
    list_styles: bool,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "ELI5_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "ELI5_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Max PDF pages to read.
    #[arg(long, env = "ELI5_MAX_PAGES", default_value_t = 100)]
    max_pages: usize,

    /// Max figures to keep after filtering (0 keeps none).
    #[arg(long, env = "ELI5_MAX_FIGURES", default_value_t = 10)]
    max_figures: usize,

    /// Skip the arXiv metadata lookup (title and authors).
    #[arg(long, env = "ELI5_NO_METADATA")]
    no_metadata: bool,

    /// Output the full response as JSON.
    #[arg(long, env = "ELI5_JSON")]
    json: bool,

    /// With --json, emit `summary` as a JSON-encoded string.
    #[arg(long, requires = "json")]
    summary_as_string: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "ELI5_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ELI5_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ELI5_QUIET")]
    quiet: bool,

    /// Download timeout in seconds.
    #[arg(long, env = "ELI5_FETCH_TIMEOUT", default_value_t = 15)]
    fetch_timeout: u64,

    /// LLM call timeout in seconds, per attempt.
    #[arg(long, env = "ELI5_AI_TIMEOUT", default_value_t = 60)]
    ai_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_styles {
        for style in ExplanationStyle::ALL {
            println!("{style}");
        }
        return Ok(());
    }

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExplainProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let explainer = Explainer::new(config).context("Failed to initialise the AI provider")?;

    let response = match cli.file {
        Some(ref path) => {
            let style = ExplanationStyle::parse_or_default(cli.style.as_deref())?;
            let id = cli
                .input
                .as_deref()
                .map(|s| ArxivId::parse(s, explainer.config().max_url_len))
                .transpose()?;
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            explainer
                .explain_pdf_bytes(bytes, style, id.as_ref())
                .await
                .context("Explanation failed")?
        }
        None => {
            let input = cli.input.as_deref().unwrap_or_default();
            explainer
                .explain(input, cli.style.as_deref())
                .await
                .context("Explanation failed")?
        }
    };

    if cli.json {
        let json =
            serde_json::to_string_pretty(&response).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_explanation(&response)?;
        if !cli.quiet {
            eprintln!(
                "   {} tokens in  /  {} tokens out  —  {}ms total",
                dim(&response.stats.input_tokens.to_string()),
                dim(&response.stats.output_tokens.to_string()),
                response.stats.total_ms,
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ExplainConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExplainConfig> {
    let mut filter = arxiv_eli5::FigureFilterConfig::default();
    filter.max_figures = Some(cli.max_figures);

    let mut builder = ExplainConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_pages(cli.max_pages)
        .figure_filter(filter)
        .fetch_metadata(!cli.no_metadata)
        .fetch_timeout_secs(cli.fetch_timeout)
        .ai_timeout_secs(cli.ai_timeout)
        .summary_encoding(if cli.summary_as_string {
            SummaryEncoding::JsonString
        } else {
            SummaryEncoding::Object
        });
    if let Some(ref m) = cli.model {
        builder = builder.model(m);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human-readable rendering on stdout.
fn print_explanation(r: &ExplainResponse) -> Result<()> {
    let e = r.summary.decode()?;

    println!("{}", bold(&r.title));
    if !r.paper_info.authors.is_empty() {
        println!("{}", dim(&r.paper_info.authors.join(", ")));
    }
    if !r.paper_info.url.is_empty() {
        println!("{}", dim(&r.paper_info.url));
    }
    println!("{}\n", dim(&format!("style: {}", r.explanation_style)));

    println!("{}\n{}\n", bold("The gist"), e.gist);
    println!("{}\n{}\n", bold("Think of it like this"), e.analogy);
    if let Some(ref details) = e.experimental_details {
        println!("{}\n{}\n", bold("What they did"), details);
    }
    println!("{}", bold("Key findings"));
    for finding in &e.key_findings {
        println!("  • {finding}");
    }
    println!("\n{}\n{}\n", bold("Why it matters"), e.why_it_matters);

    if !e.key_terms.is_empty() {
        println!("{}", bold("Key terms"));
        for t in &e.key_terms {
            println!("  {}: {}", cyan(&t.term), t.definition);
        }
        println!();
    }

    if !r.figures.is_empty() {
        println!("{}", bold("Figures"));
        for f in &r.figures {
            println!(
                "  [{}] page {} ({}×{}): {}",
                f.index, f.page, f.width, f.height, f.caption
            );
            println!("      {}", dim(&f.importance));
        }
    }
    Ok(())
}
