use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use similar::TextDiff;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wikibot_core::config::{BotConfig, DEFAULT_CONFIG_PATH, load_config};
use wikibot_core::page::{
    EditOutcome, EditRequest, FetchedPage, LocalPages, PageSink, PageSource, edit_templates,
};
use wikibot_core::template::{ParsedTemplate, Template, TemplateArgument};
use wikibot_core::template_scan::ScanOptions;
use wikibot_core::title::{NS_MAIN, NamespaceTable, Title};
use wikibot_core::wikitext::Wikitext;

#[derive(Debug, Parser)]
#[command(
    name = "wikibot",
    version,
    about = "Inspect and edit wikitext templates, sections, tags and titles"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved configuration diagnostics")]
    diagnostics: bool,
    #[arg(long, global = true, help = "Print read commands as JSON")]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: Option<PathBuf>,
    diagnostics: bool,
    json: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
            json: cli.json,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Normalize a page title")]
    Title(TitleArgs),
    #[command(about = "List HTML-like tags and comments")]
    Tags(TagsArgs),
    #[command(about = "List heading-delimited sections")]
    Sections(InputArgs),
    #[command(about = "List {{{parameter}}} placeholders")]
    Params(ParamsArgs),
    #[command(about = "List template invocations")]
    Templates(TemplatesArgs),
    #[command(name = "set-arg", about = "Edit template arguments on a local page")]
    SetArg(SetArgArgs),
}

#[derive(Debug, Args)]
struct TitleArgs {
    raw: String,
    #[arg(long, default_value_t = NS_MAIN, help = "Namespace id used when the title has no prefix")]
    namespace: i32,
    #[arg(long, help = "Sanitize free-form input instead of parsing strictly")]
    user_input: bool,
}

#[derive(Debug, Args)]
struct InputArgs {
    #[arg(value_name = "FILE|-")]
    input: String,
}

#[derive(Debug, Args)]
struct TagsArgs {
    #[arg(value_name = "FILE|-")]
    input: String,
    #[arg(long, value_name = "NAME", help = "Only tags with this name")]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct ParamsArgs {
    #[arg(value_name = "FILE|-")]
    input: String,
    #[arg(long, help = "Include placeholders nested in other placeholders")]
    recursive: bool,
}

#[derive(Debug, Args)]
struct TemplatesArgs {
    #[arg(value_name = "FILE|-")]
    input: String,
    #[arg(long = "name", value_name = "NAME", help = "Only templates with this name")]
    names: Vec<String>,
    #[arg(long, help = "Do not look inside templates")]
    no_recursive: bool,
    #[arg(long, value_name = "NAME", help = "Only templates with a non-empty argument NAME")]
    with_arg: Option<String>,
}

#[derive(Debug, Args)]
struct SetArgArgs {
    title: String,
    #[arg(long, value_name = "NAME")]
    template: String,
    #[arg(long = "set", value_name = "K=V", value_parser = parse_assignment)]
    set: Vec<(String, String)>,
    #[arg(long = "remove", value_name = "K")]
    remove: Vec<String>,
    #[arg(long, help = "Mark matching templates for substitution")]
    subst: bool,
    #[arg(long, value_name = "DIR")]
    pages_dir: Option<PathBuf>,
    #[arg(long, help = "Show the diff without saving")]
    dry_run: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Title(args)) => run_title(&runtime, args),
        Some(Commands::Tags(args)) => run_tags(&runtime, args),
        Some(Commands::Sections(args)) => run_sections(&runtime, args),
        Some(Commands::Params(args)) => run_params(&runtime, args),
        Some(Commands::Templates(args)) => run_templates(&runtime, args),
        Some(Commands::SetArg(args)) => run_set_arg(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

struct LoadedConfig {
    path: PathBuf,
    config: BotConfig,
    namespaces: NamespaceTable,
}

fn load_runtime_config(runtime: &RuntimeOptions) -> Result<LoadedConfig> {
    dotenvy::dotenv().ok();

    let path = runtime
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&path)?;
    let namespaces = config.namespace_table()?;
    Ok(LoadedConfig {
        path,
        config,
        namespaces,
    })
}

fn print_diagnostics(runtime: &RuntimeOptions, loaded: &LoadedConfig) {
    if !runtime.diagnostics {
        return;
    }
    println!("\n[diagnostics]");
    println!("config_path: {}", normalize_path(&loaded.path));
    println!("config_exists: {}", format_flag(loaded.path.exists()));
    println!(
        "custom_namespaces: {}",
        loaded.config.wiki.custom_namespaces.len()
    );
    println!(
        "template_hierarchies: {}",
        loaded.config.templates.hierarchies.len()
    );
    println!("pages_dir: {}", normalize_path(&loaded.config.pages_dir()));
    println!("edit_summary: {}", loaded.config.edit_summary());
}

fn run_title(runtime: &RuntimeOptions, args: TitleArgs) -> Result<()> {
    let loaded = load_runtime_config(runtime)?;
    let title = if args.user_input {
        match Title::new_from_user_input_in(&args.raw, args.namespace, &loaded.namespaces) {
            Some(title) => title,
            None => bail!("input cannot be turned into a title: {}", args.raw),
        }
    } else {
        Title::parse_in(&args.raw, args.namespace, &loaded.namespaces)
            .with_context(|| format!("invalid title: {}", args.raw))?
    };

    if runtime.json {
        println!("{}", serde_json::to_string_pretty(&title)?);
    } else {
        println!("namespace: {}", title.namespace());
        println!("prefixed_db: {}", title.prefixed_db());
        println!("prefixed_text: {}", title.prefixed_text());
        println!("fragment: {}", title.fragment().unwrap_or("<none>"));
        println!("full_text: {}", title.full_text());
        if let Some(extension) = title.extension() {
            println!("extension: {extension}");
        }
        println!("byte_length: {}", title.main().len());
    }
    print_diagnostics(runtime, &loaded);
    Ok(())
}

fn run_tags(runtime: &RuntimeOptions, args: TagsArgs) -> Result<()> {
    let wikitext = Wikitext::new(read_input(&args.input)?);
    let wanted = args.name.map(|name| name.to_ascii_lowercase());
    let tags = wikitext.tags_where(|tag| wanted.as_deref().is_none_or(|name| tag.name == name));

    if runtime.json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }
    println!("tags.count: {}", tags.len());
    for tag in &tags {
        println!(
            "tag: {} {}..{} level={}{}{}",
            tag.name,
            tag.start,
            tag.end,
            tag.nest_level,
            if tag.self_closed { " self_closed" } else { "" },
            if tag.unclosed { " unclosed" } else { "" }
        );
    }
    Ok(())
}

fn run_sections(runtime: &RuntimeOptions, args: InputArgs) -> Result<()> {
    let wikitext = Wikitext::new(read_input(&args.input)?);
    let sections = wikitext.sections();

    if runtime.json {
        println!("{}", serde_json::to_string_pretty(&sections)?);
        return Ok(());
    }
    println!("sections.count: {}", sections.len());
    for section in &sections {
        let indent = "  ".repeat(usize::from(section.level.saturating_sub(1)));
        let title = if section.index == 0 {
            "<lead>"
        } else {
            section.title.as_str()
        };
        println!(
            "section.{}: {indent}{title} (level {}, {}..{})",
            section.index, section.level, section.start, section.end
        );
    }
    Ok(())
}

fn run_params(runtime: &RuntimeOptions, args: ParamsArgs) -> Result<()> {
    let wikitext = Wikitext::new(read_input(&args.input)?);
    let parameters = wikitext.parameters(args.recursive);

    if runtime.json {
        println!("{}", serde_json::to_string_pretty(&parameters)?);
        return Ok(());
    }
    println!("params.count: {}", parameters.len());
    for parameter in &parameters {
        println!(
            "param: {} default={} {}..{} level={}",
            parameter.name(),
            parameter.default_value().unwrap_or("<none>"),
            parameter.start,
            parameter.end,
            parameter.nest_level
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct TemplateReport<'a> {
    name: &'a str,
    text: &'a str,
    start: usize,
    end: usize,
    nest_level: usize,
    subst: bool,
    arguments: &'a [TemplateArgument],
    overridden: &'a [TemplateArgument],
}

impl<'a> TemplateReport<'a> {
    fn from_parsed(parsed: &'a ParsedTemplate) -> Self {
        let template = parsed.template();
        Self {
            name: template.clean_name(),
            text: parsed.text(),
            start: parsed.start(),
            end: parsed.end(),
            nest_level: parsed.nest_level(),
            subst: template.is_subst(),
            arguments: template.arguments(),
            overridden: template.overridden_arguments(),
        }
    }
}

fn run_templates(runtime: &RuntimeOptions, args: TemplatesArgs) -> Result<()> {
    let loaded = load_runtime_config(runtime)?;
    let hierarchies = loaded.config.hierarchies(&loaded.namespaces);
    let wikitext = Wikitext::new(read_input(&args.input)?);

    let mut options = ScanOptions::default()
        .with_namespaces(&loaded.namespaces)
        .with_hierarchies(&hierarchies);
    if !args.names.is_empty() {
        options = options.with_names(&args.names);
    }
    if let Some(required) = args.with_arg.as_deref() {
        options = options.with_template_filter(move |template| {
            template.has_argument_where(required, |argument| !argument.is_empty())
        });
    }
    if args.no_recursive {
        options = options.non_recursive();
    }

    let templates = wikitext.templates(&options);
    let reports: Vec<TemplateReport<'_>> =
        templates.iter().map(TemplateReport::from_parsed).collect();

    if runtime.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }
    println!("templates.count: {}", reports.len());
    for report in &reports {
        println!(
            "template: {} {}..{} level={}{}",
            report.name,
            report.start,
            report.end,
            report.nest_level,
            if report.subst { " subst" } else { "" }
        );
        for argument in report.arguments {
            println!("  {} = {}", argument.name, argument.value);
        }
        for argument in report.overridden {
            println!("  (overridden) {} = {}", argument.name, argument.value);
        }
    }
    print_diagnostics(runtime, &loaded);
    Ok(())
}

/// Reads through to local pages and drops every save.
struct DryRun<'a> {
    pages: &'a LocalPages,
}

impl PageSource for DryRun<'_> {
    fn fetch(&self, title: &Title) -> Result<Option<FetchedPage>> {
        self.pages.fetch(title)
    }
}

impl PageSink for DryRun<'_> {
    fn save(&mut self, request: &EditRequest) -> Result<String> {
        info!(
            title = %request.title,
            bytes = request.text.len(),
            "dry run, page not written"
        );
        Ok(format!("dry-run:{}", request.base_revision))
    }
}

fn run_set_arg(runtime: &RuntimeOptions, args: SetArgArgs) -> Result<()> {
    if args.set.is_empty() && args.remove.is_empty() && !args.subst {
        bail!("nothing to do: pass --set, --remove or --subst");
    }
    let loaded = load_runtime_config(runtime)?;
    let hierarchies = loaded.config.hierarchies(&loaded.namespaces);
    let settings = loaded.config.edit_settings();
    let title = Title::parse_in(&args.title, NS_MAIN, &loaded.namespaces)
        .with_context(|| format!("invalid title: {}", args.title))?;
    let pages_dir = args
        .pages_dir
        .clone()
        .unwrap_or_else(|| loaded.config.pages_dir());
    let mut pages = LocalPages::with_namespaces(&pages_dir, loaded.namespaces.clone());
    let before = pages
        .fetch(&title)?
        .map(|page| page.content)
        .unwrap_or_default();

    let options = ScanOptions::default()
        .with_namespaces(&loaded.namespaces)
        .with_hierarchies(&hierarchies)
        .with_names(&[args.template.as_str()]);
    let subst = args.subst;
    let edit = |template: &mut Template| {
        for (name, value) in &args.set {
            template.set_argument(name, value);
        }
        for name in &args.remove {
            template.delete_argument(name);
        }
        if subst && !template.is_subst() {
            template.mark_subst();
        }
    };

    let outcome = if args.dry_run {
        let mut dry_run = DryRun { pages: &pages };
        edit_templates(&mut dry_run, &title, &options, &settings, edit)?
    } else {
        edit_templates(&mut pages, &title, &options, &settings, edit)?
    };

    println!("set-arg");
    println!("title: {}", title.prefixed_text());
    println!("pages_dir: {}", normalize_path(&pages_dir));
    println!("dry_run: {}", format_flag(args.dry_run));
    match &outcome {
        EditOutcome::Missing => println!("status: missing"),
        EditOutcome::Unchanged => println!("status: unchanged"),
        EditOutcome::Saved {
            revision,
            changed_templates,
            text,
        } => {
            println!("status: {}", if args.dry_run { "would_save" } else { "saved" });
            println!("revision: {revision}");
            println!("changed_templates: {changed_templates}");
            println!("summary: {}", settings.summary);
            let diff = TextDiff::from_lines(before.as_str(), text.as_str());
            print!(
                "{}",
                diff.unified_diff()
                    .context_radius(2)
                    .header("before", "after")
            );
        }
    }
    print_diagnostics(runtime, &loaded);
    Ok(())
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got `{raw}`")),
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("failed to read stdin")?;
        return Ok(content);
    }
    let path = Path::new(input);
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
