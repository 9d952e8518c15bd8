use clap::Parser;
use log::{error, info};
use retine::configuration::config::Config;
use retine::controller::lifecycle::{Filters, LifecycleController, Mode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "retine")]
#[command(version = "0.1.0")]
#[command(about = "Visual baseline lifecycle manager for component story screenshots")]
struct Args {
    /// Capture first-time baselines straight into the approved bucket
    #[arg(long)]
    generate: bool,

    /// Capture into pending and auto-approve unchanged stories
    #[arg(long)]
    update: bool,

    /// Move every pending capture into the approved bucket
    #[arg(long)]
    approve: bool,

    /// Move every pending capture into the rejected bucket
    #[arg(long)]
    reject: bool,

    /// Archive rejected captures older than the configured age
    #[arg(long)]
    cleanup: bool,

    /// Report baseline coverage per story and write the analysis JSON
    #[arg(long)]
    analyze: bool,

    /// Raise log verbosity to debug
    #[arg(long)]
    verbose: bool,

    /// Only report failure totals, not each failed combination
    #[arg(long)]
    skip_failures: bool,

    /// Only capture stories whose id contains this substring
    #[arg(long)]
    component: Option<String>,

    /// Only capture at this configured viewport
    #[arg(long)]
    viewport: Option<String>,

    /// Only capture with this configured browser
    #[arg(long)]
    browser: Option<String>,

    /// Only capture under this configured theme
    #[arg(long)]
    theme: Option<String>,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preview server base URL
    #[arg(long, env = "STORYBOOK_URL")]
    storybook_url: Option<String>,

    /// Baseline directory root
    #[arg(long)]
    baseline_dir: Option<PathBuf>,
}

impl Args {
    /// Exactly one primary mode flag is expected; none means Status.
    fn resolve_mode(&self) -> Result<Mode, String> {
        let selected: Vec<Mode> = [
            (self.generate, Mode::Generate),
            (self.update, Mode::Update),
            (self.approve, Mode::Approve),
            (self.reject, Mode::Reject),
            (self.cleanup, Mode::Cleanup),
            (self.analyze, Mode::Analyze),
        ]
        .into_iter()
        .filter(|(flag, _)| *flag)
        .map(|(_, mode)| mode)
        .collect();
        match selected.as_slice() {
            [] => Ok(Mode::Status),
            [mode] => Ok(*mode),
            _ => Err("more than one primary mode flag given".to_string()),
        }
    }

    fn filters(&self) -> Filters {
        Filters {
            component: self.component.clone(),
            viewport: self.viewport.clone(),
            browser: self.browser.clone(),
            theme: self.theme.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .format_target(false)
        .init();

    println!(
        "
==============================================================================
      retine v0.1.0 | visual baseline lifecycle manager
==============================================================================
"
    );

    let mode = match args.resolve_mode() {
        Ok(mode) => mode,
        Err(e) => {
            error!("Invalid invocation: {}", e);
            std::process::exit(1);
        }
    };

    let mut config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Unable to import configuration from file: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(url) = &args.storybook_url {
        config.storybook_url = url.clone();
    }
    if let Some(dir) = &args.baseline_dir {
        config.baseline_dir = dir.clone();
    }

    let mut controller = match LifecycleController::new(config, args.skip_failures) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    info!("Running {:?} operation", mode);
    if let Err(e) = controller.run(mode, &args.filters()).await {
        error!("Error occurred in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
