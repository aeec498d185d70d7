mod output;

use std::{process::ExitCode, sync::Arc};

use {
    chatwatch_browser::{BrowserConfig, ChromeDriver},
    chatwatch_capture::{
        ChatCaptureEngine, JoinFlowController, JoinPlan, MeetingRef, SchemaRegistry,
        join::DEFAULT_JOIN_BASE,
    },
    clap::{ArgAction, Parser, error::ErrorKind},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::output::{LineSink, OutputFormat};

#[derive(Parser, Debug)]
#[command(
    name = "chatwatch",
    version,
    about = "Join a web meeting as a guest and stream its chat to stdout"
)]
struct Cli {
    /// Meeting join link, e.g. https://zoom.us/j/123456789?pwd=abc123
    link: String,

    /// Name shown to other participants.
    #[arg(long, env = "DISPLAY_NAME", default_value = "ChatBot")]
    display_name: String,

    /// Run without a browser window. Anything but "false" keeps it hidden.
    #[arg(
        long,
        env = "HEADLESS",
        default_value = "true",
        value_parser = parse_boolish,
        action = ArgAction::Set
    )]
    headless: bool,

    /// Chrome/Chromium executable (auto-detected if not set).
    #[arg(long, env = "CHROME")]
    chrome_path: Option<String>,

    /// Browser viewport width in pixels.
    #[arg(long, env = "CHATWATCH_VIEWPORT_WIDTH", default_value_t = 1280)]
    viewport_width: u32,

    /// Browser viewport height in pixels.
    #[arg(long, env = "CHATWATCH_VIEWPORT_HEIGHT", default_value_t = 800)]
    viewport_height: u32,

    /// Timeout for a single DevTools request, in milliseconds.
    #[arg(long, env = "CHATWATCH_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    request_timeout_ms: u64,

    /// User agent override (browser default if not set).
    #[arg(long, env = "CHATWATCH_USER_AGENT")]
    user_agent: Option<String>,

    /// Extra Chrome argument; repeat for several.
    #[arg(long = "chrome-arg", value_name = "ARG", allow_hyphen_values = true)]
    chrome_args: Vec<String>,

    /// Origin that serves the web client.
    #[arg(long, env = "CHATWATCH_JOIN_BASE", default_value = DEFAULT_JOIN_BASE)]
    join_base: String,

    /// Chat line format on stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn parse_boolish(value: &str) -> Result<bool, String> {
    Ok(!value.trim().eq_ignore_ascii_case("false"))
}

/// Initialise tracing on stderr; stdout carries chat lines only.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
}

fn browser_config(cli: &Cli) -> BrowserConfig {
    BrowserConfig {
        chrome_path: cli.chrome_path.clone(),
        headless: cli.headless,
        viewport_width: cli.viewport_width,
        viewport_height: cli.viewport_height,
        request_timeout_ms: cli.request_timeout_ms,
        user_agent: cli.user_agent.clone(),
        chrome_args: cli.chrome_args.clone(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let meeting: MeetingRef = cli.link.parse()?;
    info!(
        meeting_id = meeting.id(),
        has_password = meeting.password().is_some(),
        "parsed join link"
    );

    let browser = browser_config(&cli);
    let plan = JoinPlan {
        join_base: cli.join_base,
        ..JoinPlan::new(meeting, cli.display_name)
    };
    let registry = SchemaRegistry::builtin();
    let controller = JoinFlowController::new(&plan, &registry)?;

    let driver = ChromeDriver::launch(&browser).await?;

    let sink = Arc::new(LineSink::stdout(cli.output));
    let mut engine = ChatCaptureEngine::new(registry, sink);

    let session = async {
        let outcome = controller.run(&driver).await?;
        info!(
            skipped = outcome.skipped().len(),
            "listening for chat messages"
        );
        engine.start(&driver).await
    };

    let result = tokio::select! {
        result = session => {
            if result.is_ok() {
                info!("change stream closed");
            }
            result.map_err(anyhow::Error::from)
        },
        () = shutdown_signal() => Ok(()),
    };

    info!(captured = engine.seen().len(), "session ended");
    driver.shutdown().await;
    result
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Usage errors exit with 1 rather than clap's default of 2.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        },
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        },
    };

    init_telemetry(&cli);
    info!(version = env!("CARGO_PKG_VERSION"), "chatwatch starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "chatwatch failed");
            ExitCode::FAILURE
        },
    }
}
