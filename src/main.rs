use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobgenie::{
    services::{
        filter_jobs, until_cancelled, AccountClient, FlowState, HttpWorker, JobPreferences,
        ListingsClient, ResumeUploader, SearchClient, Session,
    },
    store::{create_task_store, CredentialStore},
    AppError, Config,
};

/// Shown while a task is pending, one per attempt in rotation
const PROGRESS_MESSAGES: [&str; 4] = [
    "Analyzing your resume...",
    "Searching for top job matches...",
    "Creating personalized recommendations...",
    "Curating the best opportunities for you...",
];

#[derive(Parser)]
#[command(name = "jobgenie", about = "Job recommendations from the JobGenie worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the access token
    Login {
        #[arg(long, required_unless_present = "demo")]
        email: Option<String>,
        #[arg(long, env = "JOBGENIE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Use the demo account from JOBGENIE_DEMO_EMAIL and JOBGENIE_DEMO_PASSWORD
        #[arg(long, conflicts_with = "email")]
        demo: bool,
    },
    /// Create an account and store its access token
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "JOBGENIE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored access token
    Logout,
    /// Show who the stored token belongs to
    Whoami,
    /// Upload a resume and start computing recommendations
    Upload { file: PathBuf },
    /// Fetch recommendations, resuming any task still in progress
    Recommend,
    /// List public jobs, optionally filtered
    Jobs { query: Option<String> },
    /// Search jobs by preference; each flag may be repeated
    Search {
        #[arg(long = "title")]
        job_title: Vec<String>,
        #[arg(long = "type")]
        job_type: Vec<String>,
        #[arg(long = "level")]
        experience_level: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobgenie=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let credentials = CredentialStore::new(config.token_path());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Interrupted, stopping");
        on_interrupt.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted again, exiting.");
            std::process::exit(130);
        }
    });

    let result = run(cli.command, &config, &credentials, &cancel).await;

    match result {
        Ok(()) => Ok(()),
        Err(AppError::Unauthenticated) => {
            eprintln!("Not logged in. Run `jobgenie login --email <email>` first.");
            std::process::exit(2);
        }
        Err(AppError::Cancelled) => {
            eprintln!("Cancelled. Run the same command again to resume.");
            std::process::exit(130);
        }
        Err(e) => Err(e.into()),
    }
}

async fn run(
    command: Command,
    config: &Config,
    credentials: &CredentialStore,
    cancel: &CancellationToken,
) -> jobgenie::AppResult<()> {
    match command {
        Command::Login {
            email,
            password,
            demo,
        } => {
            let (email, password) = if demo {
                let (email, password) = config.demo_credentials().ok_or_else(|| {
                    AppError::InvalidInput(
                        "demo login needs JOBGENIE_DEMO_EMAIL and JOBGENIE_DEMO_PASSWORD".to_string(),
                    )
                })?;
                (email.to_string(), password.to_string())
            } else {
                email.zip(password).ok_or_else(|| {
                    AppError::InvalidInput("--email and --password are required".to_string())
                })?
            };

            let client = AccountClient::new(&config.api_url);
            let token = until_cancelled(cancel, client.login(&email, &password)).await?;
            credentials.set_token(&token).await?;
            println!("Logged in as {}", email);
        }
        Command::Signup {
            name,
            email,
            password,
        } => {
            let client = AccountClient::new(&config.api_url);
            let token = until_cancelled(cancel, client.signup(&name, &email, &password)).await?;
            credentials.set_token(&token).await?;
            println!("Account created for {}", email);
        }
        Command::Logout => {
            credentials.remove_token().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = credentials
                .current_user()
                .await?
                .ok_or(AppError::Unauthenticated)?;
            match user.name {
                Some(name) => println!("{} <{}>", name, user.email),
                None => println!("{}", user.email),
            }
        }
        Command::Upload { file } => {
            let session = open_session(config, credentials).await?;
            let uploader = ResumeUploader::new(&config.api_url);
            println!("Uploading {}...", file.display());

            match until_cancelled(cancel, uploader.upload(session.user(), &file)).await? {
                Some(task_id) => {
                    println!("Resume uploaded. Preparing your profile...");
                    session
                        .embedding_chain()
                        .run(&task_id, cancel, |attempt| print_progress(attempt))
                        .await?;
                    println!("Recommendations started. Run `jobgenie recommend` to see them.");
                }
                None => println!("Resume uploaded and analyzed."),
            }
        }
        Command::Recommend => {
            let session = open_session(config, credentials).await?;

            let chain = session.embedding_chain();
            if let Some(task_id) = chain.pending().await? {
                println!("Finishing resume analysis first...");
                chain
                    .run(&task_id, cancel, |attempt| print_progress(attempt))
                    .await?;
            }

            let mut flow = session.recommendation_flow();
            let reporter = tokio::spawn(report_states(flow.subscribe()));
            let jobs = flow.run(cancel).await;
            drop(flow);
            let _ = reporter.await;

            let jobs = jobs?;
            if jobs.is_empty() {
                println!("No recommendations yet.");
            }
            for (index, job) in jobs.iter().enumerate() {
                println!("{:>3}. {}", index + 1, job);
            }
        }
        Command::Jobs { query } => {
            let client = ListingsClient::new(&config.backend_url);
            let jobs = until_cancelled(cancel, client.fetch_jobs()).await?;
            let query = query.unwrap_or_default();
            let found = filter_jobs(&jobs, &query);
            if found.is_empty() {
                println!("No jobs found.");
            }
            for job in found {
                println!(
                    "{} @ {} [{}] {}",
                    job.title,
                    job.company.as_deref().unwrap_or("-"),
                    job.source,
                    job.url
                );
            }
        }
        Command::Search {
            job_title,
            job_type,
            experience_level,
        } => {
            let preferences = JobPreferences {
                job_title,
                job_type,
                experience_level,
            };
            let client = SearchClient::new(&config.api_url);
            let jobs = until_cancelled(cancel, client.search(&preferences)).await?;
            if jobs.is_empty() {
                println!("No jobs match those preferences.");
            }
            for (index, job) in jobs.iter().enumerate() {
                println!("{:>3}. {}", index + 1, job);
            }
        }
    }

    Ok(())
}

async fn open_session(
    config: &Config,
    credentials: &CredentialStore,
) -> jobgenie::AppResult<Session> {
    let store = create_task_store(config).map_err(|e| AppError::Storage(e.to_string()))?;
    let worker = Arc::new(HttpWorker::new(&config.worker_url));
    Session::from_credentials(credentials, worker, store, config.poll_policy()).await
}

fn print_progress(attempt: u32) {
    let message = PROGRESS_MESSAGES[(attempt.saturating_sub(1) as usize) % PROGRESS_MESSAGES.len()];
    eprintln!("  {}", message);
}

/// Prints flow transitions until the flow ends or is dropped
async fn report_states(mut rx: watch::Receiver<FlowState>) {
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        match &state {
            FlowState::Idle => {}
            FlowState::Submitting => eprintln!("Requesting recommendations..."),
            FlowState::Polling { attempt, .. } => print_progress(*attempt),
            FlowState::Completed { jobs } => eprintln!("Found {} recommendations.", jobs),
            FlowState::Failed { message } => eprintln!("Could not load recommendations: {}", message),
            FlowState::TimedOut { attempts } => eprintln!(
                "Recommendations are taking too long ({} checks). Try again later.",
                attempts
            ),
        }
        if state.is_terminal() {
            break;
        }
    }
}
