use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use migratool_core::assets::AssetLookup;
use migratool_core::batch::{BatchOptions, PageResult, migrate_news_page, migrate_page, run_batch};
use migratool_core::cms::CmsClient;
use migratool_core::config::{MigrationConfig, ResolvedPaths, load_config};
use migratool_core::db::PageIndex;
use migratool_core::fragment::CleanOptions;
use migratool_core::log::summarize_stream;
use migratool_core::mappers::MapContext;
use migratool_core::origin::{OriginDocument, RegionName};
use migratool_core::regions::{active_items, detect_active_regions};
use migratool_core::scan::scan_exports;

#[derive(Debug, Parser)]
#[command(
    name = "migratool",
    version,
    about = "Migrates legacy XML page exports into the structured-content CMS"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Scan the export tree into the page index")]
    Scan,
    #[command(about = "Analyze one origin file without touching the CMS")]
    Inspect(InspectArgs),
    #[command(about = "Migrate one page by source path")]
    Migrate(MigrateArgs),
    #[command(about = "Migrate one news article by source path")]
    News(MigrateArgs),
    #[command(about = "Migrate every indexed page")]
    Batch(BatchArgs),
    #[command(about = "Manage source-path to page-ID mappings")]
    Pages(PagesArgs),
    #[command(about = "Summarize the global migration log stream")]
    Report,
}

#[derive(Debug, Args)]
struct InspectArgs {
    source_path: String,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    source_path: String,
    #[arg(long, help = "Transform and merge without writing back")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct BatchArgs {
    #[arg(short = 's', long, value_name = "PREFIX", help = "Filter by source path prefix")]
    section: Option<String>,
    #[arg(long, value_name = "PATH", help = "File listing source paths to process")]
    pages_from: Option<PathBuf>,
    #[arg(long, value_name = "SOURCE_PATH", help = "Skip pages up to and including this path")]
    resume_after: Option<String>,
    #[arg(long, help = "Transform and merge without writing back")]
    dry_run: bool,
    #[arg(long, value_name = "MS", help = "Delay between pages (overrides config)")]
    rate_limit_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct PagesArgs {
    #[command(subcommand)]
    command: PagesSubcommand,
}

#[derive(Debug, Subcommand)]
enum PagesSubcommand {
    #[command(about = "Import source_path,page_id mappings from a CSV file")]
    Import { path: PathBuf },
    #[command(about = "Map one source path to a destination page ID")]
    Set {
        source_path: String,
        page_id: String,
    },
    List {
        #[arg(short = 's', long, value_name = "PREFIX")]
        section: Option<String>,
    },
    Stats,
}

struct Runtime {
    project_root: PathBuf,
    config: MigrationConfig,
    paths: ResolvedPaths,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = resolve_runtime(&cli)?;

    match cli.command {
        Some(Commands::Scan) => run_scan(&runtime),
        Some(Commands::Inspect(args)) => run_inspect(&runtime, &args),
        Some(Commands::Migrate(args)) => run_migrate(&runtime, &args, false),
        Some(Commands::News(args)) => run_migrate(&runtime, &args, true),
        Some(Commands::Batch(args)) => run_batch_command(&runtime, &args),
        Some(Commands::Pages(PagesArgs { command })) => run_pages(&runtime, command),
        Some(Commands::Report) => run_report(&runtime),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn resolve_runtime(cli: &Cli) -> Result<Runtime> {
    dotenvy::dotenv().ok();

    let project_root = match &cli.project_root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let project_env = project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| project_root.join("migratool.toml"));
    let config = load_config(&config_path)?;
    let paths = config.resolve_paths(&project_root);
    Ok(Runtime {
        project_root,
        config,
        paths,
    })
}

fn run_scan(runtime: &Runtime) -> Result<()> {
    if !runtime.paths.export_dir.exists() {
        bail!(
            "export directory not found: {}",
            normalize_path(&runtime.paths.export_dir)
        );
    }
    let index = PageIndex::open(&runtime.paths.db_path)?;
    let report = scan_exports(&runtime.paths.export_dir, &index)?;
    let stats = index.stats()?;

    println!("export scan");
    println!("project_root: {}", normalize_path(&runtime.project_root));
    println!("export_dir: {}", normalize_path(&runtime.paths.export_dir));
    println!("db_path: {}", normalize_path(&runtime.paths.db_path));
    println!("scanned: {}", report.scanned);
    println!("recorded: {}", report.recorded);
    println!("index.total: {}", stats.total);
    println!("index.mapped: {}", stats.mapped);
    Ok(())
}

fn run_inspect(runtime: &Runtime, args: &InspectArgs) -> Result<()> {
    let file = runtime.paths.export_dir.join(&args.source_path);
    let xml =
        fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let document = OriginDocument::parse(&xml)?;
    let metadata = document.metadata();
    let regions = detect_active_regions(&document);

    println!("origin inspect");
    println!("source_path: {}", args.source_path);
    println!("title: {}", metadata.title.as_deref().unwrap_or("<none>"));
    println!("path: {}", metadata.path.as_deref().unwrap_or("<none>"));
    for (region, active) in &regions {
        println!("region.{}: {}", region.as_str(), format_flag(*active));
    }
    for region in [RegionName::Nav, RegionName::Primary, RegionName::Secondary] {
        if !regions[&region] {
            continue;
        }
        let items = active_items(&document, region);
        println!("{}.active_items: {}", region.as_str(), items.len());
        for item in &items {
            println!("{}.item.{}: {}", region.as_str(), item.index, item.kind.label());
        }
    }
    Ok(())
}

fn run_migrate(runtime: &Runtime, args: &MigrateArgs, news: bool) -> Result<()> {
    let index = PageIndex::open(&runtime.paths.db_path)?;
    let Some(page_id) = index.page_id(&args.source_path)? else {
        bail!(
            "no destination page mapped for {} (run `migratool pages set` or `pages import`)",
            args.source_path
        );
    };

    let cms = cms_client(&runtime.config)?;
    let assets = load_assets(runtime)?;
    let clean = clean_options(&runtime.config);
    let context = MapContext {
        assets: &assets,
        clean: &clean,
    };

    let result = if news {
        migrate_news_page(
            &runtime.paths.export_dir,
            &args.source_path,
            &page_id,
            &cms,
            &context,
            Some(&runtime.paths.log_stream),
            args.dry_run,
        )?
    } else {
        migrate_page(
            &runtime.paths.export_dir,
            &args.source_path,
            &page_id,
            &cms,
            &context,
            Some(&runtime.paths.log_stream),
            args.dry_run,
        )?
    };

    println!("{}", if news { "news migrate" } else { "page migrate" });
    println!("source_path: {}", args.source_path);
    println!("page_id: {page_id}");
    println!("mode: {}", if args.dry_run { "dry-run" } else { "live" });
    print_page_result(&result);
    println!("log_stream: {}", normalize_path(&runtime.paths.log_stream));
    Ok(())
}

fn run_batch_command(runtime: &Runtime, args: &BatchArgs) -> Result<()> {
    let index = PageIndex::open(&runtime.paths.db_path)?;
    let cms = cms_client(&runtime.config)?;
    let assets = load_assets(runtime)?;
    let clean = clean_options(&runtime.config);
    let context = MapContext {
        assets: &assets,
        clean: &clean,
    };
    let options = BatchOptions {
        section: args.section.clone(),
        pages_from: args.pages_from.clone(),
        resume_after: args.resume_after.clone(),
        dry_run: args.dry_run,
        rate_limit_ms: args
            .rate_limit_ms
            .unwrap_or_else(|| runtime.config.rate_limit_ms()),
    };

    let report = run_batch(
        &runtime.paths.export_dir,
        &index,
        &cms,
        &context,
        &runtime.paths.log_stream,
        &options,
    )?;

    println!("batch migrate");
    println!("mode: {}", if args.dry_run { "dry-run" } else { "live" });
    println!("section: {}", args.section.as_deref().unwrap_or("<all>"));
    println!("total: {}", report.total);
    println!("processed: {}", report.processed);
    println!("succeeded: {}", report.succeeded);
    println!("skipped: {}", report.skipped);
    println!("failed: {}", report.failed);
    for outcome in &report.outcomes {
        if outcome.status != migratool_core::batch::PageStatus::Success {
            println!(
                "{}: {} ({})",
                outcome.status.as_str(),
                outcome.source_path,
                outcome.message.as_deref().unwrap_or("")
            );
        }
    }
    if let Some(last) = &report.last_success {
        println!("last_success: {last}");
    }
    println!("log_stream: {}", normalize_path(&runtime.paths.log_stream));
    Ok(())
}

fn run_pages(runtime: &Runtime, command: PagesSubcommand) -> Result<()> {
    let index = PageIndex::open(&runtime.paths.db_path)?;
    match command {
        PagesSubcommand::Import { path } => {
            let imported = index.import_mappings(&path)?;
            println!("pages import");
            println!("imported: {imported}");
        }
        PagesSubcommand::Set {
            source_path,
            page_id,
        } => {
            index.set_page_id(&source_path, &page_id)?;
            println!("pages set");
            println!("{source_path} -> {page_id}");
        }
        PagesSubcommand::List { section } => {
            let pages = index.pages(section.as_deref())?;
            println!("pages list");
            println!("count: {}", pages.len());
            for page in pages {
                println!(
                    "{}: {}",
                    page.source_path,
                    page.page_id.as_deref().unwrap_or("<unmapped>")
                );
            }
        }
        PagesSubcommand::Stats => {
            let stats = index.stats()?;
            println!("pages stats");
            println!("total: {}", stats.total);
            println!("mapped: {}", stats.mapped);
        }
    }
    Ok(())
}

fn run_report(runtime: &Runtime) -> Result<()> {
    if !runtime.paths.log_stream.exists() {
        bail!(
            "no log stream at {} (run a migration first)",
            normalize_path(&runtime.paths.log_stream)
        );
    }
    let summary = summarize_stream(&runtime.paths.log_stream)?;

    println!("migration log report");
    println!("log_stream: {}", normalize_path(&runtime.paths.log_stream));
    println!("entries: {}", summary.total_entries);
    println!("pages: {}", summary.pages);
    println!("errors: {}", summary.by_level.errors);
    println!("warnings: {}", summary.by_level.warnings);
    println!("info: {}", summary.by_level.info);
    if !summary.errors_by_file.is_empty() {
        println!("files_with_errors: {}", summary.errors_by_file.len());
        for (file, messages) in &summary.errors_by_file {
            println!("  {file}:");
            for message in messages.iter().take(5) {
                println!("    - {message}");
            }
            if messages.len() > 5 {
                println!("    ... and {} more", messages.len() - 5);
            }
        }
    }
    if !summary.warnings_by_file.is_empty() {
        println!("files_with_warnings: {}", summary.warnings_by_file.len());
    }
    Ok(())
}

fn cms_client(config: &MigrationConfig) -> Result<CmsClient> {
    let base_url = config.cms_base_url()?;
    let auth = config.cms_auth()?;
    CmsClient::new(&base_url, auth)
}

fn load_assets(runtime: &Runtime) -> Result<AssetLookup> {
    match &runtime.paths.asset_table {
        Some(table) if table.exists() => {
            let lookup = AssetLookup::load(table)?;
            println!("asset_table: {} ({} entries)", normalize_path(table), lookup.len());
            Ok(lookup)
        }
        Some(table) => {
            println!(
                "asset_table: {} (missing, lookups will be logged as gaps)",
                normalize_path(table)
            );
            Ok(AssetLookup::empty())
        }
        None => {
            println!("asset_table: <none configured>");
            Ok(AssetLookup::empty())
        }
    }
}

fn clean_options(config: &MigrationConfig) -> CleanOptions {
    CleanOptions {
        origin_host: config.origin_host(),
    }
}

fn print_page_result(result: &PageResult) {
    println!("page_path: {}", result.page_path);
    println!("sections: {}", result.sections);
    println!("content_items: {}", result.content_items);
    println!("log.errors: {}", result.log_stats.errors);
    println!("log.warnings: {}", result.log_stats.warnings);
    println!("log.info: {}", result.log_stats.info);
    if let Some(diff) = &result.diff {
        if diff.trim().is_empty() {
            println!("diff: <no changes>");
        } else {
            println!("diff:\n{diff}");
        }
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
