//! Postline - send transactional mail from the command line.
//!
//! Settings come from the environment (`SMTP_HOST`, `SMTP_USER`, ...) or
//! from a JSON file given with `--config`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use postline_core::{
    DeliveryMode, DeliveryOutcome, EX_TEMPFAIL, Language, MailService, MailSettings,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Postline
#[derive(Parser, Debug)]
#[command(name = "postline")]
#[command(about = "Send transactional mail over SMTP or the local sendmail")]
#[command(version)]
struct Args {
    /// JSON settings file (defaults to the environment)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Failure log file (overrides MAIL_LOG_PATH)
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message
    Send {
        /// Recipient address
        #[arg(long)]
        to: String,

        /// Subject line
        #[arg(long)]
        subject: String,

        /// Message body
        #[arg(long, required_unless_present = "body_file", conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the message body from a file
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// Send the body as HTML
        #[arg(long)]
        html: bool,
    },

    /// Send a one-time code
    Otp {
        /// Recipient address
        #[arg(long)]
        to: String,

        /// The code
        #[arg(long)]
        code: String,

        /// Message language (en or es)
        #[arg(long, default_value = "en")]
        lang: Language,
    },

    /// Show how mail would be delivered, without sending anything
    Check,
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "postline=debug,postline_core=debug,postline_smtp=debug"
    } else {
        "postline=info,postline_core=info,postline_smtp=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_settings(args: &Args) -> Result<MailSettings> {
    let mut settings = match &args.config {
        Some(path) => MailSettings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => MailSettings::from_env(),
    };
    if let Some(log) = &args.log {
        settings.log_path.clone_from(log);
    }
    Ok(settings)
}

fn describe(mode: &DeliveryMode) -> String {
    match mode {
        DeliveryMode::Ready(config) => format!(
            "smtp {}:{} ({}, EHLO {})",
            config.host, config.port, config.security, config.client_hostname
        ),
        DeliveryMode::Misconfigured { missing } => {
            format!("misconfigured, missing {}", missing.join(", "))
        }
        DeliveryMode::Fallback => "local sendmail".to_string(),
    }
}

fn exit_code(status: i32) -> ExitCode {
    u8::try_from(status).map_or(ExitCode::FAILURE, ExitCode::from)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.debug);

    let settings = load_settings(&args)?;
    let service = MailService::from_settings(settings);

    let outcome = match args.command {
        Command::Send {
            to,
            subject,
            body,
            body_file,
            html,
        } => {
            let body = match (body, body_file) {
                (Some(body), _) => body,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => String::new(),
            };
            if html {
                service.send_campaign_message(&to, &subject, &body).await
            } else {
                service.send_transactional_message(&to, &subject, &body).await
            }
        }
        Command::Otp { to, code, lang } => service.send_otp(&to, &code, lang).await,
        Command::Check => {
            let mode = DeliveryMode::resolve(service.settings());
            println!("{}", describe(&mode));
            return Ok(if matches!(mode, DeliveryMode::Misconfigured { .. }) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            });
        }
    };

    Ok(match outcome {
        DeliveryOutcome::Sent => {
            info!("Sent");
            ExitCode::SUCCESS
        }
        DeliveryOutcome::Failed(error) if error.is_transient() => exit_code(EX_TEMPFAIL),
        DeliveryOutcome::Failed(_) => ExitCode::FAILURE,
    })
}
