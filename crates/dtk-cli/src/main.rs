//! CLI interface for dtk - DingTalk work notifications from the terminal.

use std::env;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use dtk_core::dingtalk::OaContent;
use dtk_core::paths::write_default_config;
use dtk_core::{
    AppConfig, AppPaths, DingTalkClient, Message, Recipients, SearchQuery, SearchResult,
    SendRequest, generate_schema, write_generated_files,
};
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug};
use serde::Serialize;

const APP_NAME: &str = "dtk";
const REPO_URL: &str = env!("CARGO_PKG_REPOSITORY");

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone(), &cli.command)?;
    ctx.init_logging()?;
    debug!("resolved paths: {}", ctx.paths);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Command::Token => rt.block_on(handle_token(&ctx)),
        Command::Users(cmd) => rt.block_on(handle_users(&ctx, cmd)),
        Command::Depts(cmd) => rt.block_on(handle_depts(&ctx, cmd)),
        Command::Send(cmd) => rt.block_on(handle_send(&ctx, cmd)),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "dtk",
    author,
    version,
    about = "DingTalk work notifications from the terminal",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

/// Common CLI options shared across all subcommands.
#[derive(Debug, Clone, Args)]
pub struct CommonOpts {
    /// Override the config file path (`.toml`, `.yaml` or a directory).
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
    /// Reduce output to only errors.
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    pub quiet: bool,
    /// Increase logging verbosity (stackable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,
    /// Enable trace logging.
    #[arg(long, global = true)]
    pub trace: bool,
    /// Output machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Disable ANSI colors in output.
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    pub no_color: bool,
    /// Control color output.
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    pub color: ColorOption,
    /// Do not change anything on disk; `send` and `token` only print the request.
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
    /// Assume "yes" for interactive prompts.
    #[arg(short = 'y', long = "yes", global = true)]
    pub assume_yes: bool,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
    /// Detect terminal capabilities automatically.
    Auto,
    /// Always emit ANSI color codes.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a valid access token.
    Token,
    /// Search users by keyword.
    Users(UsersCommand),
    /// Search departments by keyword.
    Depts(PageArgs),
    /// Send a work notification.
    Send(SendCommand),
    /// Create the default configuration file.
    Init(InitCommand),
    /// Inspect and manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct PageArgs {
    /// Name, phone number, or other search keyword.
    keyword: String,
    /// Pagination offset.
    #[arg(long, default_value_t = 0)]
    offset: u32,
    /// Page size.
    #[arg(long, default_value_t = SearchQuery::DEFAULT_SIZE)]
    size: u32,
}

#[derive(Debug, Clone, Args)]
struct UsersCommand {
    #[command(flatten)]
    page: PageArgs,
    /// Match the keyword exactly instead of fuzzily.
    #[arg(short, long)]
    exact: bool,
}

#[derive(Debug, Clone, Args)]
struct SendCommand {
    #[command(flatten)]
    to: RecipientArgs,
    #[command(subcommand)]
    kind: SendKind,
}

#[derive(Debug, Clone, Args)]
struct RecipientArgs {
    /// Recipient user ID (repeatable).
    #[arg(short = 'u', long = "user", value_name = "USERID", global = true)]
    users: Vec<String>,
    /// Recipient department ID (repeatable).
    #[arg(short = 'd', long = "dept", value_name = "DEPTID", global = true)]
    depts: Vec<i64>,
    /// Send to everyone in the organization.
    #[arg(long = "all", global = true)]
    all: bool,
    /// Look up recipients by keyword (first page of user search).
    #[arg(short = 'f', long = "find", value_name = "KEYWORD", global = true)]
    find: Option<String>,
    /// Require an exact match for --find.
    #[arg(long, requires = "find", global = true)]
    exact: bool,
    /// Let DingTalk render user and department IDs as names.
    #[arg(long = "id-trans", global = true)]
    id_trans: bool,
}

#[derive(Debug, Clone, Subcommand)]
enum SendKind {
    /// Plain text (timestamped).
    Text {
        /// Message text.
        content: String,
    },
    /// Image by media ID.
    Image {
        /// Media ID from the upload API.
        media_id: String,
    },
    /// Voice clip by media ID.
    Voice {
        /// Media ID from the upload API.
        media_id: String,
        /// Duration in seconds.
        #[arg(long)]
        duration: u32,
    },
    /// File by media ID.
    File {
        /// Media ID from the upload API.
        media_id: String,
    },
    /// Link card (title and text are timestamped).
    Link {
        /// Card title.
        title: String,
        /// Card text.
        text: String,
        /// URL opened on click.
        #[arg(long)]
        url: String,
        /// Thumbnail image URL.
        #[arg(long = "pic-url", default_value = "")]
        pic_url: String,
    },
    /// Markdown (title and text are timestamped).
    Markdown {
        /// Title shown in the conversation list.
        title: String,
        /// Markdown body.
        text: String,
    },
    /// Single-button action card (title and body are timestamped).
    ActionCard {
        /// Card title.
        title: String,
        /// Markdown body.
        markdown: String,
        /// Button label.
        #[arg(long)]
        button: String,
        /// Button target URL.
        #[arg(long)]
        url: String,
    },
    /// OA card loaded from a JSON file.
    Oa {
        /// JSON file with the `oa` payload.
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },
}

impl SendKind {
    fn into_message(self) -> Result<Message> {
        Ok(match self {
            Self::Text { content } => Message::text(&content),
            Self::Image { media_id } => Message::image(&media_id),
            Self::Voice { media_id, duration } => Message::voice(&media_id, duration),
            Self::File { media_id } => Message::file(&media_id),
            Self::Link {
                title,
                text,
                url,
                pic_url,
            } => Message::link(&title, &text, &url, &pic_url),
            Self::Markdown { title, text } => Message::markdown(&title, &text),
            Self::ActionCard {
                title,
                markdown,
                button,
                url,
            } => Message::action_card(&title, &markdown, &button, &url),
            Self::Oa { file } => {
                let raw = fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?;
                let oa: OaContent = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing OA payload from {}", file.display()))?;
                Message::oa(oa)
            }
        })
    }
}

#[derive(Debug, Clone, Copy, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists.
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration (secret redacted).
    Show,
    /// Print the resolved config file path.
    Path,
    /// Print the JSON schema.
    Schema,
    /// Write config.schema.json and an example config.toml to a directory.
    Generate {
        /// Output directory.
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    /// Regenerate the default configuration file.
    Reset,
}

// ─── Runtime ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts, command: &Command) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        // init writes the file itself
        let config = if matches!(command, Command::Init(_)) {
            AppConfig::load_from_path(&paths.config_file)?
        } else {
            AppConfig::load(&paths, common.dry_run)?
        };
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        builder.filter_level(self.effective_log_level());

        if let Some(ref file) = self.config.logging.file {
            let target = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .with_context(|| format!("opening log file {file}"))?;
            builder.target(env_logger::Target::Pipe(Box::new(target)));
            builder.write_style(WriteStyle::Never);
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            if disable_color {
                builder.write_style(WriteStyle::Never);
            } else if force_color {
                builder.write_style(WriteStyle::Always);
            } else {
                builder.write_style(WriteStyle::Auto);
            }
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self.config.logging.level.into(),
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn client(&self) -> Result<DingTalkClient> {
        DingTalkClient::from_config(&self.config).with_context(|| {
            format!(
                "creating DingTalk client (check {})",
                self.paths.config_file.display()
            )
        })
    }

    /// Merge explicit recipients with users found by keyword.
    async fn resolve_recipients(
        &self,
        client: &DingTalkClient,
        args: &RecipientArgs,
    ) -> Result<Recipients> {
        let found = match args.find {
            Some(ref keyword) => {
                let found = client.resolve_user_ids(keyword, args.exact).await?;
                debug!("{keyword:?} resolved to {} user(s)", found.len());
                found
            }
            None => Vec::new(),
        };
        merge_recipients(args, found)
    }
}

fn merge_recipients(args: &RecipientArgs, found: Vec<String>) -> Result<Recipients> {
    let mut recipients = Recipients {
        user_ids: args.users.clone(),
        dept_ids: args.depts.clone(),
        to_all: args.all,
    };
    for id in found {
        if !recipients.user_ids.contains(&id) {
            recipients.user_ids.push(id);
        }
    }

    if recipients.is_empty() {
        return Err(anyhow!("no recipients: pass --user, --dept, --find or --all"));
    }
    Ok(recipients)
}

// ─── Handlers ────────────────────────────────────────────────────────

async fn handle_token(ctx: &RuntimeContext) -> Result<()> {
    let client = ctx.client()?;
    if ctx.common.dry_run {
        log::info!("dry-run: not requesting a token");
        if ctx.common.json {
            println!(
                "{}",
                serde_json::json!({ "url": client.token_url(), "app_key": client.app_key() })
            );
        } else {
            println!("POST {} (app_key: {})", client.token_url(), client.app_key());
        }
        return Ok(());
    }
    let token = client.access_token().await?;
    if ctx.common.json {
        println!("{}", serde_json::json!({ "access_token": token }));
    } else {
        println!("{token}");
    }
    Ok(())
}

async fn handle_users(ctx: &RuntimeContext, cmd: UsersCommand) -> Result<()> {
    let client = ctx.client()?;
    let token = client.access_token().await?;
    let query = SearchQuery::new(cmd.page.keyword)
        .exact(cmd.exact)
        .page(cmd.page.offset, cmd.page.size);
    let result = client.search_users(&token, &query).await?;
    print_search_result(ctx, &query, &result)
}

async fn handle_depts(ctx: &RuntimeContext, cmd: PageArgs) -> Result<()> {
    let client = ctx.client()?;
    let token = client.access_token().await?;
    let query = SearchQuery::new(cmd.keyword).page(cmd.offset, cmd.size);
    let result = client.search_departments(&token, &query).await?;
    print_search_result(ctx, &query, &result)
}

async fn handle_send(ctx: &RuntimeContext, cmd: SendCommand) -> Result<()> {
    let client = ctx.client()?;
    let recipients = ctx.resolve_recipients(&client, &cmd.to).await?;
    let message = cmd.kind.into_message()?;
    let request = SendRequest::new(client.agent_id(), message, &recipients)
        .with_id_translation(cmd.to.id_trans);

    if ctx.common.dry_run {
        log::info!("dry-run: not sending");
        println!(
            "{}",
            serde_json::to_string_pretty(&request).context("serializing send request")?
        );
        return Ok(());
    }

    let receipt = client.send_request(&request).await?;
    if ctx.common.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&receipt).context("serializing receipt")?
        );
    } else {
        println!("Sent. task_id: {}", receipt.task_id);
    }
    Ok(())
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }
    if ctx.common.dry_run {
        log::info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }
    write_default_config(&ctx.paths.config_file)?;
    println!("Wrote {}", ctx.paths.config_file.display());
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                let mut shown = ctx.config.clone();
                if !shown.dingtalk.app_secret.is_empty() {
                    shown.dingtalk.app_secret = "<redacted>".to_string();
                }
                println!(
                    "{}",
                    serde_json::to_string_pretty(&shown).context("serializing config to JSON")?
                );
            } else {
                println!("{:#?}", ctx.config);
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Schema => {
            println!("{}", generate_schema(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Generate { dir } => {
            if ctx.common.dry_run {
                log::info!("dry-run: would write generated files to {}", dir.display());
                return Ok(());
            }
            write_generated_files(&dir, APP_NAME, REPO_URL)?;
            println!("Wrote {}", dir.display());
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)?;
            println!("Reset {}", ctx.paths.config_file.display());
            Ok(())
        }
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

// ─── Formatting helpers ──────────────────────────────────────────────

fn print_search_result<T>(
    ctx: &RuntimeContext,
    query: &SearchQuery,
    result: &SearchResult<T>,
) -> Result<()>
where
    T: Serialize + std::fmt::Display,
{
    if ctx.common.json {
        println!(
            "{}",
            serde_json::to_string_pretty(result).context("serializing search result")?
        );
        return Ok(());
    }

    if result.list.is_empty() {
        eprintln!("No matches for {:?}.", query.keyword);
        return Ok(());
    }

    for id in &result.list {
        println!("{id}");
    }
    if result.has_more {
        let next = query.offset.saturating_add(query.size);
        eprintln!(
            "{} of {} shown; more with --offset {next}",
            result.list.len(),
            result.total_count
        );
    }
    Ok(())
}
