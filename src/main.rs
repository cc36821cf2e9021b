use anyhow::Context;
use carvecraft::{
    build_controller, init_logging, Axis, Config, JobOutcome, JogDirection, MachineController,
    Program,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Control host for Arduino-driven CNC machines
#[derive(Parser)]
#[command(name = "carvecraft", version = carvecraft::VERSION)]
struct Cli {
    /// Serial port (defaults to the configured port)
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate (defaults to the configured rate)
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Talk to the simulated device instead of real hardware
    #[arg(long, global = true)]
    simulate: bool,

    /// Configuration file (defaults to the platform config path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available ports
    Ports,
    /// Send a single command and print the reply
    Send {
        /// Command line, e.g. "G0 X10"
        command: String,
    },
    /// Run a G-code program; Ctrl-C stops it
    Run {
        /// Program file; the built-in sample when omitted
        file: Option<PathBuf>,
    },
    /// Jog one axis by a signed distance
    Jog {
        /// Axis letter (X, Y or Z)
        #[arg(value_parser = parse_axis)]
        axis: Axis,
        /// Signed distance in mm; the configured step when omitted
        #[arg(allow_hyphen_values = true)]
        distance: Option<f64>,
        /// Feed rate in mm/min
        #[arg(long)]
        feed: Option<f64>,
    },
    /// Run the homing cycle
    Home,
}

fn parse_axis(value: &str) -> Result<Axis, String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) => {
            Axis::from_letter(letter).ok_or_else(|| format!("unknown axis '{}'", value))
        }
        _ => Err(format!("unknown axis '{}'", value)),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<(Config, Option<PathBuf>)> {
    let path = match path {
        Some(path) => Some(path.clone()),
        None => Config::default_path().ok(),
    };

    let config = match &path {
        Some(path) => Config::load_or_default(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    Ok((config, path))
}

async fn connect(controller: &MachineController, cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let mut connection = config.connection.clone();
    if let Some(baud) = cli.baud {
        connection.baud_rate = baud;
    }
    let settings = connection.connection_settings(cli.port.as_deref());
    controller
        .connect(settings.clone())
        .await
        .with_context(|| format!("connecting to {}", settings))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::debug!("CarveCraft {} (built {})", carvecraft::VERSION, carvecraft::BUILD_DATE);

    let cli = Cli::parse();
    let (mut config, config_path) = load_config(cli.config.as_ref())?;
    let mut config_changed = false;
    let controller = Arc::new(build_controller(&config, cli.simulate));

    if let Command::Ports = cli.command {
        for port in controller.list_ports().await? {
            println!("{}", port);
        }
        return Ok(());
    }

    let program = match &cli.command {
        Command::Run { file: Some(path) } => Some(Program::load(path)?),
        Command::Run { file: None } => Some(Program::sample()),
        _ => None,
    };

    controller.subscribe(|status| println!("{}", status));
    connect(&controller, &cli, &config).await?;

    let result: anyhow::Result<()> = match &cli.command {
        Command::Ports => Ok(()),
        Command::Send { command } => controller
            .send_command(command)
            .await
            .map(|reply| println!("{}", reply))
            .map_err(Into::into),
        Command::Run { file } => {
            let program = program.unwrap_or_default();
            for warning in program.warnings() {
                eprintln!("warning: {}", warning);
            }
            if let Some(path) = file {
                config.add_recent_file(path.clone());
                config_changed = true;
            }
            run(&controller, program.commands()).await
        }
        Command::Jog {
            axis,
            distance,
            feed,
        } => {
            let distance = distance.unwrap_or(config.jog.step);
            let direction = if distance < 0.0 {
                JogDirection::Negative
            } else {
                JogDirection::Positive
            };
            controller
                .jog(
                    *axis,
                    direction,
                    distance.abs(),
                    feed.unwrap_or(config.jog.feed_rate),
                )
                .await
                .map_err(Into::into)
        }
        Command::Home => controller.home().await.map_err(Into::into),
    };

    controller.disconnect().await?;

    if let (true, Ok(()), Some(path)) = (config_changed, &result, &config_path) {
        if let Err(e) = config.save_to_file(path) {
            tracing::warn!("Could not save config to {}: {}", path.display(), e);
        }
    }
    result
}

async fn run(controller: &Arc<MachineController>, lines: Vec<String>) -> anyhow::Result<()> {
    let mut job = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run_program(lines).await })
    };

    let outcome = tokio::select! {
        outcome = &mut job => outcome??,
        _ = tokio::signal::ctrl_c() => {
            controller.stop();
            job.await??
        }
    };

    match outcome {
        JobOutcome::Completed { dispatched } => println!("Completed ({} lines)", dispatched),
        JobOutcome::Stopped { next } => println!("Stopped before line index {}", next),
        JobOutcome::Paused { next } => println!("Paused before line index {}", next),
    }
    Ok(())
}
