use clap::Parser;
use page_autofill::cli::commands::{FillSource, cmd_apply, cmd_extract, cmd_fill, print_report};
use page_autofill::cli::config::{Cli, Commands, load_config, resolve};
use page_autofill::error::AutofillError;
use page_autofill::trace::logger::TraceLogger;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        if let Some(autofill) = e.downcast_ref::<AutofillError>() {
            if !autofill.is_fatal() {
                info!("{}", autofill);
                eprintln!("{}", autofill);
                return;
            }
        }
        error!("{}", e);
        eprintln!("Autofill failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_deref());

    // Trace file: CLI > config > off
    let tracer = cli
        .trace
        .as_deref()
        .or(config.trace.path.as_deref())
        .and_then(TraceLogger::open);
    let options = config.apply.options();

    match cli.command {
        Commands::Extract { html, format } => {
            println!("{}", cmd_extract(&html, &format)?);
        }
        Commands::Apply {
            html,
            assignments,
            attach,
        } => {
            let report = cmd_apply(&html, &assignments, attach.as_deref(), options, tracer).await?;
            print_report(&report);
        }
        Commands::Fill {
            assignments,
            resume,
            mapping_endpoint,
            host_script,
            attach,
        } => {
            let endpoint = resolve(mapping_endpoint.as_deref(), &config.mapping.endpoint);
            let script = resolve(host_script.as_deref(), &config.host.script);

            let source = match (&assignments, &resume) {
                (Some(path), _) => FillSource::Assignments(path),
                (None, Some(path)) => FillSource::Resume { path, endpoint },
                (None, None) => return Err("either --assignments or --resume is required".into()),
            };

            let report = cmd_fill(source, script, attach.as_deref(), options, tracer).await?;
            print_report(&report);
        }
    }

    Ok(())
}
