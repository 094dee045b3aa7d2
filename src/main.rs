use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use adforge::adapters::http::HttpBackendClient;
use adforge::adapters::memory::InMemoryBackend;
use adforge::application::{
    ArtifactReconciler, ControllerOptions, ConversationController, ConversationHandle,
    GenerationOrchestrator, JobOutcome, JobPoller, PollPolicy,
};
use adforge::config::{AppConfig, TelemetryConfig};
use adforge::domain::conversation::{GenerationSettings, Message, Platform, Provider, Role};
use adforge::domain::foundation::{ConversationId, OwnerScope, SubjectId, TenantId};
use adforge::domain::generation::{Artifact, ArtifactScope, GenerationJob};
use adforge::ports::{ConversationApi, GenerationApi};
use adforge::telemetry::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "adforge", version, about = "Conversational ad-variant generation")]
struct Cli {
    /// Use the built-in simulated backend instead of the configured one
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refine a brief interactively, then finalize it into a generation job
    Chat(ChatArgs),
    /// List reconciled artifacts for a conversation or a product
    Artifacts(ArtifactsArgs),
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long, default_value = "local")]
    tenant: String,
    #[arg(long)]
    subject: Option<String>,
    /// Reference image of the product
    #[arg(long, default_value = "")]
    image: String,
    /// Reattach to an existing conversation
    #[arg(long)]
    resume: Option<String>,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    platform: Option<String>,
    #[arg(long)]
    duration: Option<u32>,
}

#[derive(Debug, Args)]
struct ArtifactsArgs {
    #[arg(long, default_value = "local")]
    tenant: String,
    #[arg(long, conflicts_with = "conversation")]
    subject: Option<String>,
    #[arg(long)]
    conversation: Option<String>,
}

struct Services {
    conversations: Arc<dyn ConversationApi>,
    generations: Arc<dyn GenerationApi>,
    options: ControllerOptions,
    policy: PollPolicy,
}

impl Services {
    fn connect(offline: bool) -> Result<Self> {
        if offline {
            init_tracing(&TelemetryConfig::default())?;
            let backend = Arc::new(InMemoryBackend::simulated());
            return Ok(Self {
                conversations: backend.clone(),
                generations: backend,
                options: ControllerOptions::default(),
                policy: PollPolicy::default().with_interval(Duration::from_millis(250)),
            });
        }

        let config = AppConfig::load().context("loading configuration")?;
        config.validate().context("validating configuration")?;
        init_tracing(&config.telemetry)?;
        let client = Arc::new(HttpBackendClient::new(config.http_backend())?);
        Ok(Self {
            conversations: client.clone(),
            generations: client,
            options: config.controller_options(),
            policy: config.poll_policy(),
        })
    }

    fn controller(&self) -> ConversationController {
        ConversationController::new(self.conversations.clone(), self.options.clone())
    }

    fn orchestrator(&self) -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            self.generations.clone(),
            JobPoller::new(self.policy.clone()),
            Arc::new(ArtifactReconciler::new(self.generations.clone())),
        )
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("adforge error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let services = Services::connect(cli.offline)?;
    match cli.command {
        Command::Chat(args) => run_chat(&services, args).await,
        Command::Artifacts(args) => run_artifacts(&services, args).await,
    }
}

fn owner_scope(tenant: &str, subject: Option<&str>) -> Result<OwnerScope> {
    let tenant = TenantId::new(tenant)?;
    Ok(match subject {
        Some(subject) => OwnerScope::new(tenant, SubjectId::new(subject)?),
        None => OwnerScope::without_subject(tenant),
    })
}

fn settings_from(args: &ChatArgs) -> Result<GenerationSettings> {
    let mut settings = GenerationSettings::default();
    if let Some(provider) = &args.provider {
        settings.provider = provider.parse::<Provider>()?;
    }
    if let Some(platform) = &args.platform {
        settings.platform = platform.parse::<Platform>()?;
    }
    if let Some(duration) = args.duration {
        settings.duration_seconds = duration;
    }
    Ok(settings)
}

async fn run_chat(services: &Services, args: ChatArgs) -> Result<()> {
    let controller = services.controller();
    let orchestrator = services.orchestrator();
    let scope = owner_scope(&args.tenant, args.subject.as_deref())?;
    let settings = settings_from(&args)?;

    let handle = match &args.resume {
        Some(id) => {
            controller
                .resume(scope, ConversationId::new(id.as_str())?, &settings)
                .await?
        }
        None => controller.create(scope, &args.image, settings).await?,
    };
    println!("conversation {}", handle.id());
    for message in handle.messages() {
        print_message(&message);
    }
    println!("type a message, /finalize to generate, /refresh to resync, /quit to leave");

    let result = chat_loop(&controller, &orchestrator, &handle).await;

    orchestrator.close_conversation(&controller, &handle);
    result
}

async fn chat_loop(
    controller: &ConversationController,
    orchestrator: &GenerationOrchestrator,
    handle: &ConversationHandle,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => return Ok(()),
            "/refresh" => match controller.refresh(handle).await {
                Ok(()) => handle.messages().iter().for_each(print_message),
                Err(err) => eprintln!("refresh failed: {err}"),
            },
            "/finalize" => match orchestrator.finalize_and_submit(controller, handle).await {
                Ok(job) => watch_job(orchestrator, job).await,
                Err(err) => eprintln!("finalize failed: {err}"),
            },
            text => match controller.send(handle, text).await {
                Ok(reply) => print_message(&reply),
                Err(err) => eprintln!("send failed: {err}"),
            },
        }
    }
}

async fn watch_job(orchestrator: &GenerationOrchestrator, job: GenerationJob) {
    println!("job {} submitted ({})", job.id(), job.provider());
    let watch = orchestrator.watch(job, print_progress, print_outcome);
    watch.finished().await;
}

async fn run_artifacts(services: &Services, args: ArtifactsArgs) -> Result<()> {
    let scope = match (&args.conversation, &args.subject) {
        (Some(id), _) => ArtifactScope::Conversation(ConversationId::new(id.as_str())?),
        (None, Some(subject)) => ArtifactScope::Subject {
            tenant_id: TenantId::new(args.tenant.as_str())?,
            subject_id: SubjectId::new(subject.as_str())?,
        },
        (None, None) => bail!("either --conversation or --subject is required"),
    };
    let reconciler = ArtifactReconciler::new(services.generations.clone());
    let artifacts = reconciler.pull(&scope).await?;
    if artifacts.is_empty() {
        println!("no artifacts for {scope}");
    }
    artifacts.iter().for_each(print_artifact);
    Ok(())
}

fn print_message(message: &Message) {
    let who = match message.role() {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    println!("{who}> {}", message.content());
    if let Some(url) = message.image_url() {
        println!("      [image] {url}");
    }
}

fn print_progress(job: &GenerationJob) {
    match job.progress() {
        Some(progress) if !progress.current_step.is_empty() => println!(
            "  {} {} {}",
            job.state(),
            progress.percentage,
            progress.current_step
        ),
        Some(progress) => println!("  {} {}", job.state(), progress.percentage),
        None => println!("  {}", job.state()),
    }
}

fn print_outcome(outcome: JobOutcome) {
    let code = outcome.error_code();
    match outcome {
        JobOutcome::Completed {
            artifacts,
            reconcile_error,
            ..
        } => {
            println!("generation completed");
            if let Some(err) = reconcile_error {
                eprintln!("  artifact refresh failed, showing cached results: {err}");
            }
            artifacts.iter().for_each(print_artifact);
        }
        JobOutcome::Failed { reason, .. } => println!("generation failed: {reason}"),
        JobOutcome::Expired { job } => println!(
            "job {} is no longer known to the backend ({})",
            job.id(),
            code.map(|c| c.to_string()).unwrap_or_default()
        ),
    }
}

fn print_artifact(artifact: &Artifact) {
    let marker = if artifact.is_latest { "*" } else { " " };
    println!(
        "{marker} {} {:?} {} ({})",
        artifact.id, artifact.kind, artifact.url, artifact.created_at
    );
}
