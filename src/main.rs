use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
    process,
};

use clap::{Args, Parser, Subcommand};

use snipdeck::highlight::{Highlighter, DEFAULT_THEME};
use snipdeck::normalize::{self, Whitespace};
use snipdeck::{check, deck, page, serve};

/// Whitespace handling shared by every command that trims code blocks.
#[derive(Args)]
struct WhitespaceArgs {
    /// Treat every Unicode whitespace character as blank (default: space,
    /// tab, CR, LF only)
    #[arg(long)]
    unicode_whitespace: bool,
}

impl WhitespaceArgs {
    fn whitespace(&self) -> Whitespace {
        if self.unicode_whitespace {
            Whitespace::Unicode
        } else {
            Whitespace::Ascii
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Trim leading and trailing blank lines from one code snippet
    Normalize {
        /// Snippet file; reads stdin when omitted or `-`
        file: Option<String>,
        #[command(flatten)]
        ws: WhitespaceArgs,
    },
    /// Normalize every <pre><code> block of an HTML page
    Page {
        /// Path to the HTML page
        file: String,
        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
        #[command(flatten)]
        ws: WhitespaceArgs,
    },
    /// Report code blocks that carry boundary blank lines
    Check {
        /// Markdown deck or HTML page
        file: String,
        /// Exit with status 1 when any block would change
        #[arg(long)]
        strict: bool,
        #[command(flatten)]
        ws: WhitespaceArgs,
    },
    /// Render a markdown deck into a standalone reveal.js page
    Build {
        /// Path to the markdown deck
        file: String,
        /// Write the page here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
        /// Highlight theme (see `snipdeck themes`)
        #[arg(long, default_value = DEFAULT_THEME)]
        theme: String,
        #[command(flatten)]
        ws: WhitespaceArgs,
    },
    /// Serve decks and pages over HTTP
    Serve {
        /// Deck or page served at `/`; its directory becomes the serve root
        file: String,
        /// Interface address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port for the HTTP server
        #[arg(long, default_value = "3333")]
        port: u16,
        /// Default highlight theme (decks may override it in front matter)
        #[arg(long, default_value = DEFAULT_THEME)]
        theme: String,
        #[command(flatten)]
        ws: WhitespaceArgs,
    },
    /// List the bundled highlight themes
    Themes,
}

#[derive(Parser)]
#[command(
    name = "snipdeck",
    version,
    about = "Trim, highlight and present code snippets in slide decks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize { file, ws } => run_normalize(file.as_deref(), ws.whitespace()),
        Commands::Page { file, output, ws } => {
            run_page(&file, output.as_deref(), ws.whitespace())
        }
        Commands::Check { file, strict, ws } => run_check(&file, strict, ws.whitespace()),
        Commands::Build {
            file,
            output,
            theme,
            ws,
        } => run_build(&file, output.as_deref(), &theme, ws.whitespace()),
        Commands::Serve {
            file,
            bind,
            port,
            theme,
            ws,
        } => {
            let highlighter = load_highlighter(&theme);
            let config = serve::AppConfig {
                whitespace: ws.whitespace(),
            };
            eprintln!("[serve] dispatched for: {file}");
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(io::Error::other)?;
            rt.block_on(serve::run_serve(file, bind, port, highlighter, config))
                .unwrap_or_else(|e| fail(e));
            Ok(())
        }
        Commands::Themes => {
            let highlighter = load_highlighter(DEFAULT_THEME);
            let mut stdout = io::stdout().lock();
            for name in highlighter.theme_names() {
                writeln!(stdout, "{name}")?;
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Command helpers
// ---------------------------------------------------------------------------

/// Print `Error: <message>` and exit with status 1.
fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

/// Read a file, exiting with a friendly message when it cannot be read.
fn read_source(file_arg: &str) -> String {
    fs::read_to_string(file_arg).unwrap_or_else(|e| match e.kind() {
        io::ErrorKind::NotFound => fail(format!("file not found: {file_arg}")),
        io::ErrorKind::PermissionDenied => fail(format!("permission denied: {file_arg}")),
        _ => fail(format!("reading '{file_arg}': {e}")),
    })
}

/// Write `content` to `output`, or to stdout when `None`.
fn write_output(output: Option<&str>, content: &str) -> io::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content).unwrap_or_else(|e| fail(format!("writing '{path}': {e}")));
            eprintln!("[write] file={path} bytes={}", content.len());
            Ok(())
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()
        }
    }
}

fn load_highlighter(theme: &str) -> Highlighter {
    Highlighter::new(theme).unwrap_or_else(|e| fail(e))
}

fn extension_of(file_arg: &str) -> String {
    Path::new(file_arg)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn is_markdown_ext(ext: &str) -> bool {
    matches!(ext, "md" | "markdown" | "mdx" | "mdown" | "mkd" | "mkdn")
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_normalize(file: Option<&str>, ws: Whitespace) -> io::Result<()> {
    let source = match file {
        None | Some("-") => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .unwrap_or_else(|e| fail(format!("reading stdin: {e}")));
            buf
        }
        Some(path) => read_source(path),
    };

    let mut normalized = normalize::normalize_with(&source, ws);
    eprintln!(
        "[normalize] bytes_in={} bytes_out={}",
        source.len(),
        normalized.len()
    );
    if !normalized.is_empty() {
        normalized.push('\n');
    }
    write_output(None, &normalized)
}

fn run_page(file_arg: &str, output: Option<&str>, ws: Whitespace) -> io::Result<()> {
    let source = read_source(file_arg);
    let rewrite = page::rewrite_page(&source, ws);
    eprintln!(
        "[page] file={file_arg} blocks={} changed={}",
        rewrite.blocks, rewrite.changed
    );
    write_output(output, &rewrite.html)
}

fn run_check(file_arg: &str, strict: bool, ws: Whitespace) -> io::Result<()> {
    let ext = extension_of(file_arg);
    let dirty = if is_markdown_ext(&ext) {
        let source = read_source(file_arg);
        let findings = check::check_markdown(&source, ws);
        let mut stdout = io::stdout().lock();
        for finding in &findings {
            writeln!(stdout, "{}", finding.describe(file_arg))?;
        }
        eprintln!("[check] file={file_arg} findings={}", findings.len());
        !findings.is_empty()
    } else if ext == "html" || ext == "htm" {
        let source = read_source(file_arg);
        let rewrite = page::rewrite_page(&source, ws);
        println!(
            "{file_arg}: {} of {} block(s) have boundary blank lines",
            rewrite.changed, rewrite.blocks
        );
        rewrite.changed > 0
    } else {
        fail(format!(
            "'{file_arg}' is not a markdown deck or HTML page (.md, .markdown, .html, .htm)"
        ))
    };

    if strict && dirty {
        process::exit(1);
    }
    Ok(())
}

fn run_build(file_arg: &str, output: Option<&str>, theme: &str, ws: Whitespace) -> io::Result<()> {
    let source = read_source(file_arg);
    let highlighter = load_highlighter(theme);
    let deck = deck::render_deck(&source, Path::new(file_arg), &highlighter, ws)
        .unwrap_or_else(|e| fail(e));
    let page = deck::build_page_shell(&deck, true);
    write_output(output, &page)
}
