use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use rusty_cover::batch::BatchBuilder;
use rusty_cover::config::RowErrorPolicy;
use rusty_cover::document::TemplateDocument;
use rusty_cover::logging::init_logging;
use rusty_cover::session::Conversation;
use rusty_cover::session::Incoming;
use rusty_cover::session::MemorySessionStore;
use rusty_cover::session::Reply;
use rusty_cover::Pipeline;
use rusty_cover::Settings;
use rusty_cover::Stage;
use std::io::BufRead;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rusty_cover", version, about = "Title page generator for project documentation")]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true, value_name = "PATH", env = "RUSTY_COVER_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug details (overridden by RUSTY_COVER_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fill the template once per register row and pack the results
    Generate(GenerateArgs),
    /// Print the groups found in a register
    Inspect(InspectArgs),
    /// Run the chat dialogue over stdin; `file <path>` lines upload files
    Chat(ChatArgs),
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Documentation stage: ПД (pd) or РД (rd)
    #[arg(long)]
    stage: Stage,

    /// Register of documents (.xlsx)
    #[arg(long, value_name = "PATH")]
    table: PathBuf,

    /// Title page template (.docx)
    #[arg(long, value_name = "PATH")]
    template: PathBuf,

    /// Directory receiving the archive
    #[arg(long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Archive base name, `.zip` is appended
    #[arg(long)]
    archive_name: Option<String>,

    /// What to do when one row fails
    #[arg(long, value_enum)]
    on_row_error: Option<RowErrorPolicy>,

    /// Wall-clock limit in seconds, 0 disables it
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Documentation stage: ПД (pd) or РД (rd)
    #[arg(long)]
    stage: Stage,

    /// Register of documents (.xlsx)
    #[arg(long, value_name = "PATH")]
    table: PathBuf,
}

#[derive(Parser, Debug)]
struct ChatArgs {
    /// Directory receiving delivered archives
    #[arg(long, value_name = "DIR", default_value = ".")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { "debug" } else { "info" })?;
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate(args) => cmd_generate(settings, args),
        Commands::Inspect(args) => cmd_inspect(settings, args),
        Commands::Chat(args) => cmd_chat(settings, args),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path).with_context(|| format!("failed to load settings {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn cmd_generate(settings: Settings, args: GenerateArgs) -> Result<()> {
    let mut builder = BatchBuilder::new(&settings);
    if let Some(name) = &args.archive_name {
        builder = builder.with_archive_name(name);
    }
    if let Some(policy) = args.on_row_error {
        builder = builder.with_policy(policy);
    }
    if let Some(seconds) = args.timeout {
        builder = builder.with_timeout(Some(seconds).filter(|seconds| *seconds > 0).map(Duration::from_secs));
    }
    let pipeline = Pipeline::new(settings)?.with_builder(builder);

    let table = pipeline
        .open_table(&args.table)
        .with_context(|| format!("failed to read register {}", args.table.display()))?;
    let template = TemplateDocument::open(&args.template)?;
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let report = pipeline.generate_into(args.stage, &table, &template, &args.output)?;

    for failure in &report.skipped {
        eprintln!("skipped row {} ({}): {}", failure.row, failure.group, failure.message);
    }
    println!("{} documents -> {}", report.documents.len(), report.archive.display());
    Ok(())
}

fn cmd_inspect(settings: Settings, args: InspectArgs) -> Result<()> {
    let pipeline = Pipeline::new(settings)?;
    let table = pipeline
        .open_table(&args.table)
        .with_context(|| format!("failed to read register {}", args.table.display()))?;
    let groups = pipeline.segment(&table, args.stage)?;
    for group in &groups {
        println!("{} ({} rows)", group.label(), group.table.len());
        for row in group.table.rows() {
            let cells: Vec<&str> = (0..group.table.columns().len()).map(|index| row.text(index)).collect();
            println!("  {:>5}  {}", row.number(), cells.join(" | "));
        }
    }
    Ok(())
}

fn cmd_chat(settings: Settings, args: ChatArgs) -> Result<()> {
    const SESSION: i64 = 0;
    let conversation = Conversation::new(Pipeline::new(settings)?, MemorySessionStore::new());
    std::fs::create_dir_all(&args.output)?;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let incoming = match line.trim().strip_prefix("file ") {
            Some(path) => {
                let path = Path::new(path.trim());
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or_else(|| anyhow!("not a file path: {}", path.display()))?;
                let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
                Incoming::Document { file_name, bytes }
            }
            None => Incoming::from_text(line.trim()),
        };
        for reply in conversation.handle(SESSION, incoming) {
            match reply {
                Reply::Text(text) => println!("{text}"),
                Reply::StageKeyboard(text) => println!("{text} [{}]", Reply::stage_buttons().join(" | ")),
                Reply::Archive(artifact) => {
                    let destination = args.output.join(artifact.file_name());
                    std::fs::copy(artifact.path(), &destination)
                        .with_context(|| format!("failed to deliver {}", destination.display()))?;
                    println!("-> {}", destination.display());
                }
            }
        }
    }
    Ok(())
}
