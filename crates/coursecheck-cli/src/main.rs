//! `coursecheck`: run the validation gateway or exercise the pipeline from
//! the command line.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use coursecheck_core::{
    build_prompt, normalize_model_output, Plan, ValidationResult, GRAMMAR_CORRECTION_QUESTION,
    GRAMMAR_CORRECTION_RULE, SYSTEM_INSTRUCTION,
};
use coursecheck_runtime::{
    ApiCredential, CompletionConfig, CredentialSource, Gateway, GatewayConfig, SiteVerifyVerifier,
    ValidationClient, VerificationPolicy, DEFAULT_GATEWAY_URL, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_SITE_VERIFY_URL, GATEWAY_URL_ENV, MAX_TEMPERATURE, OPENAI_API_KEY_ENV,
    RECAPTCHA_SECRET_ENV,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coursecheck")]
#[command(version)]
#[command(about = "AI review of course-plan answers against pedagogical rules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the validation gateway
    Serve(ServeArgs),

    /// Print the prompt that would be sent upstream
    Prompt(PromptArgs),

    /// Normalize raw model output read from a file or stdin
    Normalize(NormalizeArgs),

    /// Validate answers through a running gateway
    Analyze(AnalyzeArgs),
}

#[derive(Parser)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind_addr: String,

    /// Upstream API key (falls back to $OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    #[arg(long, default_value = "gpt-3.5-turbo")]
    model: String,

    /// Sampling temperature; values above 0.3 are clamped
    #[arg(long, default_value_t = MAX_TEMPERATURE)]
    temperature: f32,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(long, default_value = DEFAULT_OPENAI_BASE_URL)]
    base_url: String,

    /// Reject requests that fail bot verification instead of logging them
    #[arg(long)]
    enforce_verification: bool,

    /// Site-verify secret (falls back to $RECAPTCHA_SECRET). Without one,
    /// verification is skipped.
    #[arg(long)]
    recaptcha_secret: Option<String>,

    #[arg(long, default_value = DEFAULT_SITE_VERIFY_URL)]
    verify_url: String,
}

#[derive(Parser)]
struct PromptArgs {
    #[arg(long)]
    question: Option<String>,

    #[arg(long)]
    answer: String,

    #[arg(long, required_unless_present = "grammar")]
    rule: Option<String>,

    /// Use the spelling/grammar correction preset as the rule
    #[arg(long, conflicts_with = "rule")]
    grammar: bool,

    /// Also print the system instruction
    #[arg(long)]
    with_system: bool,
}

#[derive(Parser)]
struct NormalizeArgs {
    /// File holding the raw model text; stdin when omitted or "-"
    input: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Parser)]
struct AnalyzeArgs {
    #[arg(long, env = GATEWAY_URL_ENV, default_value = DEFAULT_GATEWAY_URL)]
    gateway_url: String,

    /// Per-call timeout, e.g. "30s" or "1m"
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    timeout: Duration,

    /// Plan file (YAML, or JSON with a .json extension)
    #[arg(long, conflicts_with_all = ["answer", "rule", "question"])]
    plan: Option<PathBuf>,

    #[arg(long)]
    question: Option<String>,

    #[arg(long, required_unless_present = "plan")]
    answer: Option<String>,

    #[arg(long, required_unless_present = "plan")]
    rule: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Prompt(args) => prompt(args),
        Commands::Normalize(args) => normalize(args),
        Commands::Analyze(args) => analyze(args).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Flag value first, then the environment. Blank values count as absent.
fn load_credential(
    flag: Option<String>,
    env_var: &str,
    name: &'static str,
) -> Option<ApiCredential> {
    match flag.filter(|v| !v.trim().is_empty()) {
        Some(value) => Some(ApiCredential::new(value, CredentialSource::CommandLine, name)),
        None => ApiCredential::from_env(env_var, name).ok(),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let credential = load_credential(args.api_key, OPENAI_API_KEY_ENV, "OpenAI API key");
    let verification = if args.enforce_verification {
        VerificationPolicy::enforced()
    } else {
        VerificationPolicy::soft()
    };

    let config = GatewayConfig {
        bind_addr: args.bind_addr,
        completion: CompletionConfig {
            model: args.model,
            temperature: args.temperature,
            max_tokens: args.max_tokens,
        },
        upstream_base_url: args.base_url,
        credential,
        verification,
    };

    let mut builder = Gateway::builder(config);

    match load_credential(args.recaptcha_secret, RECAPTCHA_SECRET_ENV, "reCAPTCHA secret") {
        Some(secret) => {
            tracing::info!(url = %args.verify_url, "Bot verification enabled");
            builder = builder.verifier(Arc::new(
                SiteVerifyVerifier::new(secret).with_url(args.verify_url),
            ));
        }
        None if args.enforce_verification => {
            tracing::warn!("--enforce-verification set but no verifier secret; nothing to enforce");
        }
        None => {}
    }

    builder
        .build()
        .serve()
        .await
        .context("validation gateway stopped")
}

fn prompt(args: PromptArgs) -> Result<()> {
    let (question, rule) = if args.grammar {
        (
            args.question
                .or_else(|| Some(GRAMMAR_CORRECTION_QUESTION.to_string())),
            GRAMMAR_CORRECTION_RULE.to_string(),
        )
    } else {
        let rule = args.rule.context("--rule is required without --grammar")?;
        (args.question, rule)
    };

    if args.answer.trim().is_empty() || rule.trim().is_empty() {
        bail!("answer and rule must not be blank");
    }

    if args.with_system {
        println!("{}\n", SYSTEM_INSTRUCTION);
    }
    println!("{}", build_prompt(question.as_deref(), &args.answer, &rule));
    Ok(())
}

fn normalize(args: NormalizeArgs) -> Result<()> {
    let raw = match args.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let result = normalize_model_output(&raw).context("model output is not valid JSON")?;
    print_result(&result, args.format)
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let client = ValidationClient::new(args.gateway_url).with_timeout(args.timeout);

    let Some(path) = args.plan else {
        let answer = args.answer.context("--answer is required")?;
        let rule = args.rule.context("--rule is required")?;
        let result = client.analyze(args.question.as_deref(), &answer, &rule).await;
        return print_result(&result, args.format);
    };

    let plan = Plan::from_file(&path)
        .with_context(|| format!("failed to load plan {}", path.display()))?;
    tracing::info!(
        answers = plan.answers.len(),
        unanswered = plan.unanswered(),
        "Validating plan"
    );

    let results = client.analyze_plan(&plan.answers).await;

    match args.format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Entry<'a> {
                question: Option<&'a str>,
                result: &'a ValidationResult,
            }

            let entries: Vec<Entry> = plan
                .answers
                .iter()
                .zip(&results)
                .map(|(answer, result)| Entry {
                    question: answer.question.as_deref(),
                    result,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            if let Some(title) = &plan.title {
                println!("# {}\n", title);
            }
            for (index, (answer, result)) in plan.answers.iter().zip(&results).enumerate() {
                let heading = answer.question.as_deref().unwrap_or(&answer.rule);
                println!("## {}. {}", index + 1, heading);
                println!("{}\n", result.to_pretty_text());
            }
        }
    }

    Ok(())
}

fn print_result(result: &ValidationResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => println!("{}", result.to_pretty_text()),
    }
    Ok(())
}
