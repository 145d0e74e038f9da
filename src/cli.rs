use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use atty::Stream;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;
use wikilens_rs::{
    Catalog, DisabledStore, JsonFileStore, LookupConfig, MatchResult, PreferenceStore,
    PromptContext, PromptStyle, SlugMatcher, SynonymTable, WordMatches, apply_highlight,
    build_highlight_url, build_prompt, heading_hierarchy, load_style, parse_markup, save_style,
};

#[derive(Parser, Debug)]
#[command(
    name = "wikilens-rs",
    about = "Match selections to wiki topics and build study prompts",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Topic catalog (one id per line) replacing the built-in one.
    #[arg(long, global = true, value_name = "FILE")]
    topics: Option<PathBuf>,

    /// Synonym table (word<TAB>topic,...) replacing the built-in one.
    #[arg(long, global = true, value_name = "FILE")]
    synonyms: Option<PathBuf>,

    /// JSON lookup config.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Preference file. Defaults to the platform config directory.
    #[arg(long, global = true, value_name = "FILE")]
    prefs: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ranked topic matches for each word.
    Match {
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Per-word matches for a selection plus the whole-selection set.
    Inline { text: String },
    /// Print a learning prompt for a selection.
    Prompt {
        text: String,
        /// Template to use. Defaults to the saved preference.
        #[arg(long)]
        style: Option<PromptStyle>,
        /// Page the selection came from.
        #[arg(long)]
        url: Option<String>,
        /// Heading path, outermost first. Repeatable.
        #[arg(long = "section")]
        sections: Vec<String>,
    },
    /// Shareable text-fragment link for a selection.
    Link { page_url: String, text: String },
    /// Show or change the saved prompt style.
    #[command(subcommand)]
    Style(StyleCommand),
    /// Highlight a selection inside a markup file and show the result.
    Annotate {
        file: PathBuf,
        /// Text to select (first occurrence).
        text: String,
        #[arg(long, default_value = "")]
        url: String,
    },
}

#[derive(Subcommand, Debug)]
enum StyleCommand {
    Get,
    Set { style: PromptStyle },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let custom_catalog;
    let catalog = match &cli.topics {
        Some(path) => {
            custom_catalog = Catalog::parse(&fs::read_to_string(path)?)?;
            &custom_catalog
        }
        None => Catalog::builtin(),
    };
    let custom_synonyms;
    let synonyms = match &cli.synonyms {
        Some(path) => {
            custom_synonyms = SynonymTable::parse(&fs::read_to_string(path)?)?;
            &custom_synonyms
        }
        None => SynonymTable::builtin(),
    };
    let matcher = SlugMatcher::new(catalog, synonyms);
    let config = match &cli.config {
        Some(path) => LookupConfig::from_path(path)?,
        None => LookupConfig::default(),
    };

    match cli.command {
        Command::Match { words } => handle_match(&matcher, words, cli.json),
        Command::Inline { text } => handle_inline(&matcher, &text, cli.json),
        Command::Prompt {
            text,
            style,
            url,
            sections,
        } => {
            let store = preference_store(cli.prefs.as_deref());
            let style = style.unwrap_or_else(|| load_style(store.as_ref()));
            let ctx = PromptContext {
                page_url: url.unwrap_or_default(),
                heading_path: sections,
            };
            handle_prompt(&text, style, &ctx, cli.json)
        }
        Command::Link { page_url, text } => {
            let link = build_highlight_url(&page_url, &text);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&json!({ "url": link }))?);
            } else {
                println!("{link}");
            }
            Ok(())
        }
        Command::Style(command) => {
            let store = preference_store(cli.prefs.as_deref());
            handle_style(store.as_ref(), command, cli.json)
        }
        Command::Annotate { file, text, url } => {
            handle_annotate(&matcher, &config, &file, &text, &url, cli.json)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn preference_store(explicit: Option<&Path>) -> Box<dyn PreferenceStore> {
    if let Some(path) = explicit {
        return Box::new(JsonFileStore::new(path));
    }
    match ProjectDirs::from("dev", "wikilens", "wikilens-rs") {
        Some(dirs) => Box::new(JsonFileStore::new(dirs.config_dir().join("prefs.json"))),
        None => Box::new(DisabledStore),
    }
}

fn handle_match(
    matcher: &SlugMatcher<'_>,
    words: Vec<String>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let results: Vec<(String, Vec<MatchResult>)> = words
        .into_iter()
        .map(|word| {
            let matches = matcher.match_word(&word);
            (word, matches)
        })
        .collect();

    if as_json {
        let payload: Vec<_> = results
            .iter()
            .map(|(word, matches)| json!({ "word": word, "matches": matches }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_match_table(&results);
    }
    Ok(())
}

fn handle_inline(matcher: &SlugMatcher<'_>, text: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    if text.trim().is_empty() {
        return Err("Selection text cannot be empty".into());
    }
    let per_word = matcher.find_inline_matches(text);
    let whole = matcher.whole_selection_matches(text, &per_word);

    if as_json {
        let payload = json!({
            "text": text,
            "per_word": per_word,
            "whole_selection": whole,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_inline(&per_word, &whole);
    }
    Ok(())
}

fn handle_prompt(
    text: &str,
    style: PromptStyle,
    ctx: &PromptContext,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let prompt = build_prompt(text, style, ctx);
    if as_json {
        let payload = json!({ "style": style, "prompt": prompt });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        render_markdown_block(&format!("Prompt ({style})"), &prompt);
    }
    Ok(())
}

fn handle_style(
    store: &dyn PreferenceStore,
    command: StyleCommand,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let style = match command {
        StyleCommand::Get => load_style(store),
        StyleCommand::Set { style } => {
            save_style(store, style);
            style
        }
    };
    if as_json {
        println!("{}", serde_json::to_string_pretty(&json!({ "style": style }))?);
    } else {
        println!("{style}");
    }
    Ok(())
}

fn handle_annotate(
    matcher: &SlugMatcher<'_>,
    config: &LookupConfig,
    file: &Path,
    text: &str,
    url: &str,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut doc = parse_markup(&fs::read_to_string(file)?)?;
    let original = doc.to_markup(doc.root());
    let range = doc
        .find_text(doc.root(), text)
        .ok_or_else(|| format!("Text {text:?} not found in {}", file.display()))?;
    doc.set_selection(Some(range))?;

    let headings = heading_hierarchy(&doc, range.start.node);
    let per_word = matcher.find_inline_matches(text);
    let whole = matcher.whole_selection_matches(text, &per_word);
    let link = build_highlight_url(url, text);

    let handle = apply_highlight(&mut doc, matcher, config)
        .ok_or_else(|| format!("Nothing to highlight for {text:?}"))?;
    let annotated = doc.to_markup(doc.root());
    let annotations = handle.annotations().len();
    handle.release(&mut doc);
    let restored = doc.to_markup(doc.root()) == original;

    if as_json {
        let payload = json!({
            "annotated": annotated,
            "annotations": annotations,
            "heading_path": headings,
            "per_word": per_word,
            "whole_selection": whole,
            "highlight_url": link,
            "restored": restored,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Annotated ({annotations} annotations):");
        println!("{annotated}");
        if !headings.is_empty() {
            println!("\nSection: {}", headings.join(" > "));
        }
        println!();
        print_inline(&per_word, &whole);
        println!("\nHighlight link: {link}");
        println!("Restored after release: {restored}");
    }
    Ok(())
}

fn print_match_table(rows: &[(String, Vec<MatchResult>)]) {
    if rows.is_empty() {
        println!("No words provided.");
        return;
    }
    let width = rows
        .iter()
        .map(|(word, _)| word.len())
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("{:<width$}  {}", "WORD", "TOPICS", width = width);
    println!("{:-<width$}  {}", "", "------", width = width);
    for (word, matches) in rows {
        println!("{:<width$}  {}", word, format_topics(matches), width = width);
    }
}

fn print_inline(per_word: &[WordMatches], whole: &[MatchResult]) {
    if per_word.is_empty() && whole.is_empty() {
        println!("No topics matched.");
        return;
    }
    if !per_word.is_empty() {
        let rows: Vec<_> = per_word
            .iter()
            .map(|entry| (entry.word.clone(), entry.matches.clone()))
            .collect();
        print_match_table(&rows);
    }
    println!("\nWhole selection: {}", format_topics(whole));
}

fn format_topics(matches: &[MatchResult]) -> String {
    if matches.is_empty() {
        return "<none>".to_string();
    }
    matches
        .iter()
        .map(|m| format!("{} ({})", m.label, m.topic))
        .collect::<Vec<_>>()
        .join(", ")
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    if stdout_is_tty() {
        println!("{title}:\n");
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
