use anyhow::{Context, Result};
use clap::Parser;
use shared::{
    get_default_data_dir, list_datasets, ArticleRecord, Config, CurationSession, Label,
    PipelineError, PipelinePhase, Platform, Services, DEFAULT_EXTRACTION_INSTRUCTION,
    DEFAULT_POST_PROMPT,
};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "press-room")]
#[command(about = "Curate news articles, train a relevance classifier and draft social posts")]
struct Args {
    /// Dataset to load at startup instead of searching
    #[arg(short, long)]
    import: Option<PathBuf>,

    /// Directory for extraction snapshots (defaults to the local data directory)
    #[arg(short, long)]
    snapshots: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Search,
    LoadDataset,
    ShowArticles,
    ArticleDetails,
    ToggleLabel,
    RemoveArticle,
    Train,
    SmartFilter,
    StartGeneration,
    ExportDataset,
    ExtractExcerpts,
    ShowExcerpts,
    RemoveExcerpt,
    MoveExcerpt,
    GenerateDrafts,
    ShowDrafts,
    ChooseDraft,
    EditDraft,
    ExportDraft,
    Reset,
    Quit,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::Search => "Search for articles",
            Action::LoadDataset => "Load a saved dataset",
            Action::ShowArticles => "Show articles",
            Action::ArticleDetails => "Read an article's description and content",
            Action::ToggleLabel => "Toggle an article's label",
            Action::RemoveArticle => "Remove an article",
            Action::Train => "Train the classifier",
            Action::SmartFilter => "Smart filter (re-score at a lower threshold)",
            Action::StartGeneration => "Generate posts from relevant articles",
            Action::ExportDataset => "Export articles as a dataset",
            Action::ExtractExcerpts => "Extract excerpts",
            Action::ShowExcerpts => "Show excerpts",
            Action::RemoveExcerpt => "Remove an excerpt",
            Action::MoveExcerpt => "Move an excerpt",
            Action::GenerateDrafts => "Generate drafts",
            Action::ShowDrafts => "Show drafts",
            Action::ChooseDraft => "Choose a draft",
            Action::EditDraft => "Edit the chosen draft",
            Action::ExportDraft => "Save the chosen draft",
            Action::Reset => "Start over",
            Action::Quit => "Quit",
        }
    }

    fn available(phase: PipelinePhase) -> Vec<Action> {
        use Action::*;
        let mut actions = match phase {
            PipelinePhase::KeywordEntry => vec![
                Search,
                LoadDataset,
                ShowArticles,
                ArticleDetails,
                ExportDataset,
            ],
            PipelinePhase::Labeling => vec![
                ShowArticles,
                ArticleDetails,
                ToggleLabel,
                RemoveArticle,
                Train,
                ExportDataset,
            ],
            PipelinePhase::ClassifierAssisted => vec![
                Search,
                ShowArticles,
                ArticleDetails,
                SmartFilter,
                ToggleLabel,
                RemoveArticle,
                StartGeneration,
                ExportDataset,
            ],
            PipelinePhase::Extracting => vec![ShowArticles, ArticleDetails, ExtractExcerpts],
            PipelinePhase::Drafting => {
                vec![ShowExcerpts, RemoveExcerpt, MoveExcerpt, GenerateDrafts]
            }
            PipelinePhase::Finalizing => vec![ShowDrafts, ChooseDraft, EditDraft, ExportDraft],
        };
        actions.extend([Reset, Quit]);
        actions
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,shared=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let services = Services::from_config(&config)?;
    let data_dir = get_default_data_dir()?;

    let snapshot_dir = args.snapshots.unwrap_or_else(|| data_dir.clone());
    let mut session =
        CurationSession::new(config.settings.clone(), services).with_snapshot_dir(snapshot_dir);

    if let Some(path) = args.import {
        let count = session
            .import_dataset(&path)
            .with_context(|| format!("Failed to import {}", path.display()))?;
        println!("✓ Loaded {} articles from {}", count, path.display());
    }

    loop {
        print_status(&session);

        let actions = Action::available(session.phase());
        println!();
        for (i, action) in actions.iter().enumerate() {
            println!("  {}) {}", i + 1, action.label());
        }

        let input = prompt_line(&format!("\nEnter your choice (1-{})", actions.len()))?;
        let choice = match parse_index(&input, actions.len()) {
            Ok(choice) => choice,
            Err(e) => {
                println!("✗ {}", e);
                continue;
            }
        };

        let action = actions[choice];
        if matches!(action, Action::Quit) {
            break;
        }

        if let Err(e) = run(action, &mut session, &data_dir).await {
            report(&e);
        }
    }

    Ok(())
}

fn print_status(session: &CurationSession) {
    println!("\n══ Phase: {} ══", session.phase());
    match session.phase() {
        PipelinePhase::KeywordEntry | PipelinePhase::Labeling => {
            let have = session.articles().len();
            let need = session.settings().volume_threshold;
            if have > 0 {
                println!("{} articles ({} needed to train)", have, need);
            }
        }
        PipelinePhase::ClassifierAssisted | PipelinePhase::Extracting => {
            println!(
                "{} articles, {} marked relevant",
                session.articles().len(),
                session.relevant_count()
            );
        }
        PipelinePhase::Drafting => println!("{} excerpts", session.excerpts().len()),
        PipelinePhase::Finalizing => {
            if let Some(draft) = session.selected_draft() {
                println!("Chosen {} draft ready to save", draft.platform);
            } else if let Some(drafts) = session.drafts() {
                println!("{} drafts to choose from", drafts.len());
            }
        }
    }
}

fn report(error: &anyhow::Error) {
    println!("\n✗ {}", error);
    match error.downcast_ref::<PipelineError>() {
        Some(e) if e.is_recoverable() => println!("  The service may be busy. Try again shortly."),
        Some(PipelineError::InsufficientData { .. }) => {
            println!("  Start over and search with more keywords to collect more articles.")
        }
        _ => {}
    }
}

async fn run(action: Action, session: &mut CurationSession, data_dir: &Path) -> Result<()> {
    match action {
        Action::Search => {
            let query = prompt_line("Keywords (comma-separated)")?;
            println!("\n📰 Searching...");
            let count = session.search(&query).await?;
            println!("✓ Found {} unique articles", count);
            if session.phase() == PipelinePhase::KeywordEntry {
                println!(
                    "⚠ At least {} articles are needed to start labeling. Try more keywords.",
                    session.settings().volume_threshold
                );
            }
        }
        Action::LoadDataset => {
            let path = select_dataset(data_dir)?;
            let count = session.import_dataset(&path)?;
            println!("✓ Loaded {} articles", count);
        }
        Action::ShowArticles => {
            if session.articles().is_empty() {
                println!("No articles yet.");
            }
            for (i, article) in session.articles().iter().enumerate() {
                let mark = if article.label == Label::Relevant { "✓" } else { " " };
                println!("  [{}] {:>3}) {}", mark, i + 1, article.title);
                println!("          {} | {}", article.source_name(), article.url);
            }
        }
        Action::ArticleDetails => {
            let i = prompt_index("Article number", session.articles().len())?;
            println!("\n{}", article_details(i, &session.articles()[i]));
        }
        Action::ToggleLabel => {
            let i = prompt_index("Article number", session.articles().len())?;
            session.toggle_label(i)?;
        }
        Action::RemoveArticle => {
            let i = prompt_index("Article number", session.articles().len())?;
            let removed = session.remove_article(i)?;
            println!("✓ Removed \"{}\"", removed.title);
        }
        Action::Train => {
            println!("\n🧠 Training the classifier...");
            let outcome = session.train().await?;
            println!("✓ {}", outcome.message);
        }
        Action::SmartFilter => {
            let default = session.settings().smart_threshold;
            let input = prompt_line(&format!("Threshold [{}]", default))?;
            let threshold = if input.is_empty() {
                None
            } else {
                Some(input.parse::<f32>().context("Threshold must be a number")?)
            };
            let relevant = session.smart_filter(threshold).await?;
            println!("✓ {} articles marked relevant", relevant);
        }
        Action::StartGeneration => {
            let count = session.enter_generation()?;
            println!("✓ {} articles selected for generation", count);
        }
        Action::ExportDataset => {
            let path = session.export_dataset(data_dir)?;
            println!("✓ Dataset saved to: {}", path.display());
        }
        Action::ExtractExcerpts => {
            println!("Extraction instruction (blank for the default):");
            let input = prompt_line("Instruction")?;
            let instruction = if input.is_empty() {
                DEFAULT_EXTRACTION_INSTRUCTION
            } else {
                input.as_str()
            };
            println!("\n🌐 Reading articles and extracting excerpts...");
            println!("  (This may take a minute...)");
            let count = session.extract_excerpts(instruction).await?;
            println!("✓ Extracted {} excerpts", count);
        }
        Action::ShowExcerpts => {
            for (i, excerpt) in session.excerpts().items().iter().enumerate() {
                println!("  {:>3}) {}", i + 1, excerpt);
            }
        }
        Action::RemoveExcerpt => {
            let i = prompt_index("Excerpt number", session.excerpts().len())?;
            session.remove_excerpt(i)?;
        }
        Action::MoveExcerpt => {
            let len = session.excerpts().len();
            let from = prompt_index("Move excerpt number", len)?;
            let to = prompt_index("To position", len)?;
            session.move_excerpt_to(from, to)?;
        }
        Action::GenerateDrafts => {
            println!("Platforms:");
            for (i, platform) in Platform::ALL.iter().enumerate() {
                println!("  {}) {}", i + 1, platform);
            }
            let input = prompt_line(&format!("Platform [{}]", Platform::ALL[0]))?;
            let platform = parse_platform(&input)?;

            println!("Post prompt (blank for the default):");
            let input = prompt_line("Prompt")?;
            let prompt = if input.is_empty() {
                DEFAULT_POST_PROMPT
            } else {
                input.as_str()
            };

            let settings = session.settings();
            let default_versions = settings.default_versions;
            let max_versions = settings.max_versions;
            let input = prompt_line(&format!(
                "Versions (1-{}) [{}]",
                max_versions, default_versions
            ))?;
            let versions = if input.is_empty() {
                default_versions
            } else {
                input.parse().context("Versions must be a number")?
            };

            println!("\n🤖 Writing {} {} drafts...", versions, platform);
            let drafts = session.generate_drafts(prompt, platform, versions).await?;
            println!("✓ {} drafts ready", drafts.len());
            print_drafts(session);
        }
        Action::ShowDrafts => print_drafts(session),
        Action::ChooseDraft => {
            let len = session.drafts().map(|d| d.len()).unwrap_or(0);
            let i = prompt_index("Draft number", len)?;
            session.choose_draft(i)?;
            println!("✓ Draft {} chosen", i + 1);
        }
        Action::EditDraft => {
            println!("Enter the new text. Finish with a line containing only \".\"");
            let text = read_block()?;
            session.edit_draft(text)?;
            println!("✓ Draft updated");
        }
        Action::ExportDraft => {
            let path = session.export_draft(data_dir)?;
            println!("\n✅ Post saved to: {}", path.display());
        }
        Action::Reset => {
            session.reset();
            println!("✓ Started over");
        }
        Action::Quit => {}
    }

    Ok(())
}

fn article_details(index: usize, article: &ArticleRecord) -> String {
    let mut lines = vec![format!("── {}) {} ──", index + 1, article.title)];

    let mut source = format!("Source: {}", article.source_name());
    if let Some(author) = article.author.as_deref().filter(|a| !a.is_empty()) {
        source.push_str(&format!(" (by {})", author));
    }
    lines.push(source);
    if !article.published_at.is_empty() {
        lines.push(format!("Published: {}", article.published_at));
    }
    lines.push(format!("URL: {}", article.url));
    lines.push(format!(
        "Label: {}",
        if article.label == Label::Relevant { "relevant" } else { "not relevant" }
    ));

    lines.push(String::new());
    lines.push(
        article
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "(no description)".to_string()),
    );
    lines.push(String::new());
    lines.push(
        article
            .content
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "(no content preview)".to_string()),
    );

    lines.join("\n")
}

/// Accepts a menu number, a platform name, or blank for the first platform.
fn parse_platform(input: &str) -> Result<Platform> {
    if input.is_empty() {
        return Ok(Platform::ALL[0]);
    }
    if input.chars().all(|c| c.is_ascii_digit()) {
        let i = parse_index(input, Platform::ALL.len())?;
        return Ok(Platform::ALL[i]);
    }
    input.parse().map_err(anyhow::Error::msg)
}

fn print_drafts(session: &CurationSession) {
    let Some(drafts) = session.drafts() else {
        println!("No drafts yet.");
        return;
    };
    for (i, draft) in drafts.drafts().iter().enumerate() {
        println!("\n── Draft {} ({}) ──", i + 1, draft.platform);
        println!("{}", draft.text);
    }
}

fn select_dataset(dir: &Path) -> Result<PathBuf> {
    let datasets = list_datasets(dir)?;
    if datasets.is_empty() {
        anyhow::bail!("No datasets found in {}", dir.display());
    }

    println!("Available datasets:\n");
    for (i, (path, data)) in datasets.iter().enumerate() {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!(
            "  {}) {} ({} articles, query: {})",
            i + 1,
            filename,
            data.articles.len(),
            data.query.as_deref().unwrap_or("none")
        );
    }

    let selection = prompt_index("\nSelect dataset", datasets.len())?;
    Ok(datasets[selection].0.clone())
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        anyhow::bail!("Input closed");
    }
    Ok(input.trim().to_string())
}

/// Reads a 1-based choice and returns it 0-based.
fn prompt_index(label: &str, len: usize) -> Result<usize> {
    if len == 0 {
        anyhow::bail!("Nothing to choose from");
    }

    let input = prompt_line(&format!("{} (1-{})", label, len))?;
    parse_index(&input, len)
}

fn parse_index(input: &str, len: usize) -> Result<usize> {
    let selection: usize = input
        .parse()
        .context("Invalid selection. Please enter a number.")?;

    if selection < 1 || selection > len {
        anyhow::bail!("Selection out of range. Please choose 1-{}", len);
    }

    Ok(selection - 1)
}

fn read_block() -> Result<String> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line == "." {
            break;
        }
        lines.push(line.to_string());
    }
    Ok(lines.join("\n"))
}
