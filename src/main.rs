use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use coursepull::orchestrator::Orchestrator;
use coursepull::processors::DefaultProcessorFactory;
use coursepull::{
    AddOutcome, ChromiumEngine, ConfigStore, CourseQueue, CredentialStore, FormAuthenticator,
    KeyringBackend, NoopReporter, ProgressLedger, RunEvent, RunReporter, SharedLedger,
    SharedRunReporter,
};

// Emoji with fallback for terminals without Unicode support
static BOOKS: Emoji<'_, '_> = Emoji("📚 ", "");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[>] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");

const CONFIG_FILE: &str = "config.json";
const KEY_FILE: &str = ".key";
const LEDGER_FILE: &str = "progress.json";
const QUEUE_FILE: &str = "course-urls.json";

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

/// Bulk-download course materials from the Estratégia platform
#[derive(Parser, Debug)]
#[command(name = "coursepull")]
#[command(about = "Bulk-download course materials from the Estratégia platform")]
#[command(version)]
struct Args {
    /// Directory holding config, progress, and queue files
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every queued course
    Run,

    /// Manage the course queue
    Courses {
        #[command(subcommand)]
        command: CoursesCommand,
    },

    /// Store the platform password for the configured email
    Login {
        /// Email to store the password for (defaults to the configured one)
        #[arg(long)]
        email: Option<String>,
    },

    /// Remove the stored platform password
    Logout,

    /// Inspect or reset download progress
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },

    /// Read or write configuration values
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CoursesCommand {
    /// Queue a course URL
    Add { url: String },
    /// Remove a course URL from the queue
    Remove { url: String },
    /// List the queued courses
    List,
    /// Empty the queue
    Clear,
}

#[derive(Subcommand, Debug)]
enum ProgressCommand {
    /// Show how many items are tracked and completed
    Stats,
    /// Forget all download progress
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the value at a dotted key path, e.g. pdfConfig.pdfVariant
    Get { key: String },
    /// Set the value at a dotted key path (parsed as JSON, else as a string)
    Set { key: String, value: String },
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn get_or_create_bar(&self, name: &str) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap();

        if let Some(bar) = bars.get(name) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(name.to_string(), bar.clone());
        bar
    }

    fn finish_bar(&self, name: &str) {
        let mut bars = self.bars.lock().unwrap();
        if let Some(bar) = bars.remove(name) {
            bar.finish_and_clear();
        }
    }
}

impl RunReporter for IndicatifReporter {
    fn report(&self, event: RunEvent) {
        match event {
            RunEvent::RunStarted { total_courses } => {
                self.main_bar.set_message(format!(
                    "{BOOKS}{} course(s) queued",
                    total_courses.to_string().cyan()
                ));
            }

            RunEvent::CourseStarting {
                index,
                total,
                title,
                ..
            } => {
                self.main_bar.set_message(format!(
                    "[{}/{}] {}",
                    (index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    title.bold()
                ));
            }

            RunEvent::CourseCompleted { title, .. } => {
                self.main_bar
                    .println(format!("{SUCCESS}{}", title.green()));
            }

            RunEvent::CourseFailed { title, error, .. } => {
                self.main_bar.println(format!(
                    "{FAILURE}{} - {}",
                    title.red(),
                    error.dimmed()
                ));
            }

            RunEvent::CoursesSkipped { count } => {
                self.main_bar.println(format!(
                    "{SKIP}{} course(s) skipped after cancellation",
                    count.to_string().yellow()
                ));
            }

            RunEvent::ExtrasStarting { title } => {
                self.main_bar
                    .set_message(format!("Supplementary materials for {}", title.bold()));
            }

            RunEvent::QueueProgress { .. } => {}

            RunEvent::FileStarting {
                name,
                content_length,
            } => {
                let bar = self.get_or_create_bar(&name);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(truncate_title(&name, 40));
            }

            RunEvent::FileProgress {
                name,
                bytes_downloaded,
                total_bytes,
            } => {
                let bar = self.get_or_create_bar(&name);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            RunEvent::FileCompleted {
                name,
                bytes_downloaded,
            } => {
                let bar = self.get_or_create_bar(&name);
                bar.set_position(bytes_downloaded);
                self.finish_bar(&name);
            }

            RunEvent::FileSkipped { name } => {
                self.main_bar
                    .println(format!("{SKIP}{}", truncate_title(&name, 50).dimmed()));
            }

            RunEvent::CleanupStepFailed { step, error } => {
                self.main_bar
                    .println(format!("{FAILURE}cleanup '{step}': {}", error.dimmed()));
            }

            RunEvent::RunCompleted {
                succeeded,
                failed,
                skipped,
                files_downloaded,
                files_skipped,
                bytes_downloaded,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} succeeded, {} failed, {} skipped",
                    "Run complete:".bold().green(),
                    succeeded.to_string().green().bold(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    },
                    skipped.to_string().yellow()
                );
                println!(
                    "   {} file(s) downloaded ({}), {} already present",
                    files_downloaded.to_string().cyan(),
                    indicatif::HumanBytes(bytes_downloaded).to_string().cyan(),
                    files_skipped.to_string().yellow()
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.len() <= max_len {
        title.to_string()
    } else {
        format!("{}...", &title[..max_len.saturating_sub(3)])
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = ConfigStore::load(&args.data_dir.join(CONFIG_FILE));
    let credentials = CredentialStore::new(&args.data_dir.join(KEY_FILE), Box::new(KeyringBackend))
        .context("Failed to open the credential store")?;

    match args.command {
        Command::Run => run(args.data_dir, args.quiet, config, credentials).await,
        Command::Courses { command } => courses(&args.data_dir, command),
        Command::Login { email } => login(config, credentials, email),
        Command::Logout => logout(config, credentials),
        Command::Progress { command } => progress(&args.data_dir, command),
        Command::Config { command } => config_command(config, command),
    }
}

async fn run(
    data_dir: PathBuf,
    quiet: bool,
    config: ConfigStore,
    credentials: CredentialStore,
) -> Result<()> {
    let queue = CourseQueue::load(&data_dir.join(QUEUE_FILE));
    let ledger = SharedLedger::new(ProgressLedger::load(&data_dir.join(LEDGER_FILE)));

    let mut orchestrator = Orchestrator::new(
        config,
        credentials,
        queue,
        ledger,
        Box::new(ChromiumEngine),
        Arc::new(FormAuthenticator::default()),
        Arc::new(DefaultProcessorFactory),
    );

    // Ctrl-C requests cooperative cancellation; the run stops at the next
    // file or course boundary.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let token = orchestrator.cancel_token();
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupt received, finishing the current file...");
                interrupted.store(true, Ordering::SeqCst);
                token.cancel();
            }
        });
    }

    let reporter: SharedRunReporter = if quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let report = match orchestrator.run(reporter).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {e:#}", "Run failed:".red().bold());
            std::process::exit(EXIT_FAILURE);
        }
    };

    if interrupted.load(Ordering::SeqCst) {
        std::process::exit(EXIT_INTERRUPTED);
    }
    if !report.success() {
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}

fn courses(data_dir: &std::path::Path, command: CoursesCommand) -> Result<()> {
    let mut queue = CourseQueue::load(&data_dir.join(QUEUE_FILE));

    match command {
        CoursesCommand::Add { url } => match queue.add(&url)? {
            AddOutcome::Added => println!("{SUCCESS}course queued"),
            AddOutcome::Duplicate => println!("course is already queued"),
        },
        CoursesCommand::Remove { url } => {
            if queue.remove(&url)? {
                println!("course removed");
            } else {
                bail!("course is not in the queue: {url}");
            }
        }
        CoursesCommand::List => {
            if queue.is_empty() {
                println!("no courses queued");
            } else {
                for course in queue.get_all() {
                    println!("{} {}", course.title.bold(), course.url.dimmed());
                }
            }
        }
        CoursesCommand::Clear => {
            queue.clear()?;
            println!("queue cleared");
        }
    }
    Ok(())
}

fn login(
    mut config: ConfigStore,
    credentials: CredentialStore,
    email: Option<String>,
) -> Result<()> {
    let email = match email {
        Some(email) => {
            if config.config().email != email {
                config.config_mut().email = email.clone();
                config.save()?;
            }
            email
        }
        None => {
            let configured = config.config().email.clone();
            if configured.is_empty() {
                bail!("No email configured; pass --email or set it with 'config set email ...'");
            }
            configured
        }
    };

    let password = dialoguer::Password::new()
        .with_prompt(format!("Password for {email}"))
        .interact()
        .context("Failed to read password")?;

    credentials.set(&email, &password)?;
    println!("{SUCCESS}password stored for {}", email.bold());
    Ok(())
}

fn logout(config: ConfigStore, credentials: CredentialStore) -> Result<()> {
    let email = config.config().email.clone();
    if email.is_empty() {
        bail!("No email configured");
    }
    credentials.delete(&email)?;
    println!("stored password removed for {}", email.bold());
    Ok(())
}

fn progress(data_dir: &std::path::Path, command: ProgressCommand) -> Result<()> {
    let ledger = ProgressLedger::load(&data_dir.join(LEDGER_FILE));

    match command {
        ProgressCommand::Stats => {
            let stats = ledger.stats();
            println!(
                "{} item(s) tracked, {} completed",
                stats.total.to_string().cyan(),
                stats.completed.to_string().green()
            );
        }
        ProgressCommand::Clear => {
            let mut ledger = ledger;
            ledger.clear()?;
            println!("download progress cleared");
        }
    }
    Ok(())
}

fn config_command(mut config: ConfigStore, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Get { key } => {
            let keys: Vec<&str> = key.split('.').collect();
            match config.get_path(&keys) {
                Some(value) => println!("{value}"),
                None => bail!("no value at '{key}'"),
            }
        }
        ConfigCommand::Set { key, value } => {
            let keys: Vec<&str> = key.split('.').collect();
            // Values that parse as JSON keep their type; anything else is a
            // plain string, so quoting numbers is never required.
            let value = serde_json::from_str(&value)
                .unwrap_or_else(|_| serde_json::Value::String(value));
            config.set_path(&keys, value)?;
            config.save()?;
            println!("{SUCCESS}configuration updated");
        }
    }
    Ok(())
}
