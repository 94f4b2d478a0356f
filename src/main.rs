mod ai;
mod cli;
mod compose;
mod config;
mod constants;
mod credentials;
mod mail;
mod retry;
mod search;

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::ai::{GenerationOptions, OpenRouterClient};
use crate::cli::{Cli, Command, DraftArgs};
use crate::compose::{
    Bucket, ComposeError, PromptContext, WritingStyleMatrix, build_prompt, generate_email_body,
};
use crate::config::Config;
use crate::credentials::{CredentialStore, Secret};
use crate::mail::{
    Folder, GmailDriver, MailDriver, OutgoingMessage, SearchOptions, ThreadFlags, ThreadSummary,
    search_threads,
};
use crate::search::{QueryNormalizer, QuerySource, QuerySynthesizer, ResolvedQuery};

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,zero_assist=info"));

    // Try to create a log file in the config directory
    let log_file = Config::config_dir()
        .ok()
        .and_then(|dir| std::fs::create_dir_all(&dir).ok().map(|_| dir))
        .map(|dir| dir.join("zero.log"))
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .ok()
        });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        // Fallback to stderr so stdout stays clean for command output
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

// === Setup ===

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_secret(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let value = {
        // Disable echo
        let _guard = DisableEcho::new()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        input.trim().to_string()
    };
    println!();
    Ok(value)
}

struct DisableEcho {
    #[cfg(unix)]
    original: libc::termios,
}

impl DisableEcho {
    #[cfg(unix)]
    fn new() -> Result<Self> {
        use std::mem::MaybeUninit;
        use std::os::unix::io::AsRawFd;

        let fd = std::io::stdin().as_raw_fd();
        let mut termios = MaybeUninit::<libc::termios>::uninit();

        unsafe {
            if libc::tcgetattr(fd, termios.as_mut_ptr()) != 0 {
                anyhow::bail!("Failed to get terminal attributes");
            }
            let original = termios.assume_init();
            let mut new = original;
            new.c_lflag &= !libc::ECHO;
            if libc::tcsetattr(fd, libc::TCSANOW, &new) != 0 {
                anyhow::bail!("Failed to set terminal attributes");
            }
            Ok(Self { original })
        }
    }

    #[cfg(not(unix))]
    fn new() -> Result<Self> {
        Ok(Self {})
    }
}

#[cfg(unix)]
impl Drop for DisableEcho {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        let fd = std::io::stdin().as_raw_fd();
        unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, &self.original);
        }
    }
}

fn run_setup() -> Result<()> {
    println!("Zero Setup");
    println!("==========\n");

    let mut config = Config::load()?;
    let creds = CredentialStore::new();

    let name = prompt_line("Your name, used to sign drafts (optional): ")?;
    if !name.is_empty() {
        config.compose.username = Some(name);
    }

    let address = loop {
        let address = prompt_line("Your email address (optional): ")?;
        if address.is_empty() || address.split('@').filter(|p| !p.is_empty()).count() == 2 {
            break address;
        }
        println!("Invalid email format. Please enter a valid email address (e.g., user@example.com)");
    };
    if !address.is_empty() {
        config.compose.address = Some(address);
    }

    for secret in Secret::ALL {
        let keep = if creds.has(secret) {
            " (leave blank to keep the stored one)"
        } else {
            " (leave blank to skip)"
        };
        let value = prompt_secret(&format!("{}{}: ", secret, keep))?;
        if !value.is_empty() {
            creds.set(secret, &value)?;
            println!("{} stored.", secret);
        }
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_path()?.display());
    println!("\n{}", creds.debug_info());
    Ok(())
}

// === Collaborators ===

fn ai_client(config: &Config, creds: &CredentialStore) -> Result<OpenRouterClient> {
    let api_key = creds
        .get(Secret::ApiKey)
        .or_else(|e| config.ai.api_key.clone().ok_or(e))?;
    let client = OpenRouterClient::new(api_key, &config.ai)?;
    tracing::info!("Using model {}", client.model());
    Ok(client)
}

fn gmail_driver(config: &Config, creds: &CredentialStore) -> Result<GmailDriver> {
    let token = creds.get(Secret::GmailToken)?;
    Ok(GmailDriver::new(token, &config.gmail)?)
}

fn compose_options(config: &Config) -> GenerationOptions {
    GenerationOptions::new(config.ai.compose_max_tokens, config.ai.compose_temperature)
        .with_penalties(config.ai.frequency_penalty, config.ai.presence_penalty)
}

/// The style profile from `path`, else from config; none if neither is set.
fn load_style(path: Option<&Path>, config: &Config) -> Result<Option<WritingStyleMatrix>> {
    let Some(path) = path.or(config.compose.style_profile.as_deref()) else {
        return Ok(None);
    };
    let style = WritingStyleMatrix::load(path)?;
    if style.is_empty() {
        tracing::warn!(
            "Style profile {} has no numeric metrics; every metric counts as medium",
            path.display()
        );
    }
    Ok(Some(style))
}

fn sender(config: &Config) -> String {
    match (&config.compose.username, &config.compose.address) {
        (Some(name), Some(address)) => format!("{} <{}>", name, address),
        (None, Some(address)) => address.clone(),
        // The provider fills in the account address
        _ => String::new(),
    }
}

async fn draft_body(client: &OpenRouterClient, ctx: &PromptContext, config: &Config) -> Result<String> {
    match generate_email_body(client, ctx, &compose_options(config)).await {
        Ok(body) => Ok(body),
        Err(ComposeError::Refused(_)) => {
            anyhow::bail!("The instruction was not about writing an email; nothing drafted")
        }
        Err(e) => Err(e).context("Failed to draft email"),
    }
}

// === Commands ===

async fn run_normalize(config: &Config, synthesize: bool, json: bool, phrase: &str) -> Result<()> {
    let resolved = if synthesize {
        let creds = CredentialStore::new();
        let client = ai_client(config, &creds)?;
        let synthesizer = QuerySynthesizer::new(&client, config.ai.search_max_tokens);
        search::resolve_query(&QueryNormalizer::for_today(), Some(&synthesizer), phrase).await
    } else {
        let normalized = search::normalize(phrase);
        if !normalized.is_resolved() && !json {
            eprintln!("(no rule matched; --synthesize asks the language model)");
        }
        ResolvedQuery {
            source: normalized
                .rule
                .map_or(QuerySource::Passthrough, QuerySource::Rule),
            text: normalized.to_string(),
        }
    };

    if json {
        println!("{}", serde_json::to_string(&resolved)?);
    } else {
        println!("{}", resolved.text);
    }
    Ok(())
}

fn flag_marks(flags: ThreadFlags) -> String {
    [
        (ThreadFlags::UNREAD, 'N'),
        (ThreadFlags::STARRED, '*'),
        (ThreadFlags::IMPORTANT, '!'),
    ]
    .iter()
    .map(|(flag, mark)| if flags.contains(*flag) { *mark } else { ' ' })
    .collect()
}

fn summary_line(summary: &ThreadSummary) -> String {
    let date = summary
        .date
        .map(|d| d.with_timezone(&chrono::Local).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "          ".to_string());
    let count = if summary.message_count > 1 {
        format!(" ({})", summary.message_count)
    } else {
        String::new()
    };
    let mut line = format!(
        "{} {} {:<28} {}{}  [{}]",
        flag_marks(summary.flags),
        date,
        mail::address_of(&summary.from),
        summary.subject,
        count,
        summary.id
    );
    if !summary.snippet.is_empty() {
        line.push_str(&format!("\n{:15}{}", "", summary.snippet));
    }
    line
}

async fn run_search(
    config: &Config,
    folder: Option<String>,
    max: Option<u32>,
    phrase: &str,
) -> Result<()> {
    let creds = CredentialStore::new();
    let driver = gmail_driver(config, &creds)?;

    let mut options = SearchOptions::from_config(&config.search).map_err(anyhow::Error::msg)?;
    if let Some(folder) = folder {
        options.folder = folder.parse::<Folder>().map_err(anyhow::Error::msg)?;
    }
    if let Some(max) = max {
        options.max_results = max;
    }

    // The model fallback is optional; search still works without a key
    let client = if config.ai.search_fallback {
        ai_client(config, &creds)
            .inspect_err(|e| tracing::warn!("Query synthesis disabled: {:#}", e))
            .ok()
    } else {
        None
    };
    let synthesizer = client
        .as_ref()
        .map(|c| QuerySynthesizer::new(c, config.ai.search_max_tokens));

    let results = search_threads(
        &driver,
        &QueryNormalizer::for_today(),
        synthesizer.as_ref(),
        phrase,
        &options,
    )
    .await?;

    eprintln!("{} query: {}", options.folder, results.query.text);
    if results.threads.is_empty() {
        println!("No threads found.");
    }
    for summary in &results.threads {
        println!("{}", summary_line(summary));
    }
    if results.next_page_token.is_some() {
        eprintln!("(more results available; raise --max to see them)");
    }
    Ok(())
}

/// Request context for a draft, pulling the thread from Gmail when asked.
async fn draft_context(config: &Config, draft: &DraftArgs) -> Result<PromptContext> {
    let mut ctx = PromptContext {
        current_subject: draft.subject.clone(),
        recipients: draft.to.clone(),
        instruction: draft.instruction.clone(),
        username: config.compose.username.clone().unwrap_or_default(),
        style: load_style(draft.style.as_deref(), config)?,
        ..Default::default()
    };

    if let Some(thread_id) = &draft.thread {
        let creds = CredentialStore::new();
        let driver = gmail_driver(config, &creds)?;
        let thread = driver
            .get(thread_id)
            .await
            .with_context(|| format!("Failed to fetch thread {}", thread_id))?;
        ctx.thread_messages = thread.prompt_messages();
        if ctx.current_subject.is_none() {
            ctx.current_subject = Some(thread.reply_subject());
        }
    }
    Ok(ctx)
}

async fn run_prompt(config: &Config, draft: &DraftArgs) -> Result<()> {
    let ctx = draft_context(config, draft).await?;
    let prompt = build_prompt(&ctx);
    println!("=== System prompt ===\n{}\n", prompt.system_prompt);
    println!("=== User prompt ===\n{}", prompt.user_prompt);
    Ok(())
}

async fn run_compose(config: &Config, draft: &DraftArgs, send: bool) -> Result<()> {
    if send && draft.to.is_empty() {
        anyhow::bail!("--send needs at least one --to recipient");
    }

    let ctx = draft_context(config, draft).await?;
    let creds = CredentialStore::new();
    let client = ai_client(config, &creds)?;
    let body = draft_body(&client, &ctx, config).await?;
    println!("{}", body);

    if send {
        let driver = gmail_driver(config, &creds)?;
        let message = OutgoingMessage {
            from: sender(config),
            to: draft.to.clone(),
            subject: ctx.current_subject.clone().unwrap_or_default(),
            body,
            thread_id: draft.thread.clone(),
            ..Default::default()
        };
        let id = driver.send(&message).await?;
        eprintln!("Sent ({})", id);
    }
    Ok(())
}

async fn run_reply(
    config: &Config,
    thread_id: &str,
    instruction: &str,
    style: Option<&Path>,
    send: bool,
) -> Result<()> {
    let creds = CredentialStore::new();
    let driver = gmail_driver(config, &creds)?;
    let thread = driver
        .get(thread_id)
        .await
        .with_context(|| format!("Failed to fetch thread {}", thread_id))?;

    let own_address = config.compose.address.as_deref().unwrap_or_else(|| {
        tracing::warn!("No compose.address configured; own address is not filtered from recipients");
        ""
    });
    let recipients = thread.reply_recipients(own_address);
    if recipients.is_empty() {
        anyhow::bail!("Thread {} has no one to reply to", thread_id);
    }

    let ctx = PromptContext {
        thread_messages: thread.prompt_messages(),
        current_subject: Some(thread.reply_subject()),
        recipients: recipients.clone(),
        instruction: instruction.to_string(),
        username: config.compose.username.clone().unwrap_or_default(),
        style: load_style(style, config)?,
    };

    let client = ai_client(config, &creds)?;
    let body = draft_body(&client, &ctx, config).await?;
    eprintln!("To: {}", recipients.join(", "));
    println!("{}", body);

    if send {
        let (in_reply_to, references) = thread.reply_headers();
        let message = OutgoingMessage {
            from: sender(config),
            to: recipients,
            cc: Vec::new(),
            subject: thread.reply_subject(),
            body,
            thread_id: Some(thread.id.clone()),
            in_reply_to,
            references,
        };
        let id = driver.send(&message).await?;
        eprintln!("Sent ({})", id);
    }
    Ok(())
}

fn run_style(file: &Path) -> Result<()> {
    let style = WritingStyleMatrix::load(file)?;
    if style.is_empty() {
        eprintln!("{} has no numeric metrics.", file.display());
    }

    for (spec, value, bucket) in style.report() {
        let value = match value {
            Some(v) => format!("{:.3}", v),
            None => format!("- (neutral {:.3})", spec.neutral()),
        };
        let marker = match bucket {
            Bucket::Low => "v",
            Bucket::Medium => " ",
            Bucket::High => "^",
        };
        println!(
            "{} {:<28} {:<18} {:<6} {}",
            marker,
            spec.key,
            value,
            bucket,
            spec.behavior(bucket)
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if !matches!(cli.command, Command::Setup) {
        setup_logging();
    }
    let config = Config::load()?;

    match cli.command {
        Command::Normalize {
            synthesize,
            json,
            phrase,
        } => run_normalize(&config, synthesize, json, &phrase.join(" ")).await,
        Command::Search {
            folder,
            max,
            phrase,
        } => run_search(&config, folder, max, &phrase.join(" ")).await,
        Command::Prompt(draft) => run_prompt(&config, &draft).await,
        Command::Compose { draft, send } => run_compose(&config, &draft, send).await,
        Command::Reply {
            thread_id,
            instruction,
            style,
            send,
        } => {
            run_reply(
                &config,
                &thread_id,
                &instruction.join(" "),
                style.as_deref(),
                send,
            )
            .await
        }
        Command::Style { file } => run_style(&file),
        Command::Setup => run_setup(),
    }
}
