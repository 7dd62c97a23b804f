mod alarm;
mod app;
mod conf;
mod countdown;
mod delta;
mod instant;
mod prefs;
mod protocol;
mod render;
mod server;
mod theme;
mod ticker;
mod transport;

use crate::alarm::Alarm;
use crate::conf::{AlarmKind, Settings};
use crate::countdown::CountdownState;
use crate::instant::Instant;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::theme::Theme;
use crate::transport::{AsyncTransport, expand_socket_path};
use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use jiff::tz::TimeZone;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "countdown")]
#[command(about = "Live countdown to a target date, in months, days, hours, minutes and seconds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the live countdown (default)
    Run(RunArgs),

    /// Print the time remaining once and exit
    Remaining {
        /// Target date-time, e.g. 2026-04-27T06:00
        #[arg(long)]
        target: Option<String>,

        /// Evaluate as if it were this instant instead of now
        #[arg(long)]
        now: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change the target of a running countdown
    SetTarget {
        /// Target date-time, e.g. 2026-04-27T06:00
        target: String,

        #[command(flatten)]
        socket: SocketArgs,
    },

    /// Show the status of a running countdown
    Status {
        #[command(flatten)]
        socket: SocketArgs,
    },

    /// Switch a running countdown between light and dark theme
    ToggleTheme {
        #[command(flatten)]
        socket: SocketArgs,
    },

    /// Follow a running countdown, one line per tick
    Watch {
        #[command(flatten)]
        socket: SocketArgs,
    },

    /// Show or toggle the saved theme
    Theme {
        /// Switch to the other theme and save it
        #[arg(long)]
        toggle: bool,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Target date-time, e.g. 2026-04-27T06:00
    #[arg(long)]
    target: Option<String>,

    /// Line shown above the countdown
    #[arg(long)]
    headline: Option<String>,

    /// How to announce the end of the countdown
    #[arg(long, value_enum)]
    alarm: Option<AlarmKind>,

    /// WAV file to play when the countdown ends
    #[arg(long)]
    sound: Option<PathBuf>,

    /// Print one plain line per change instead of redrawing in place
    #[arg(long)]
    plain: bool,

    /// Exit once the countdown has ended
    #[arg(long)]
    once: bool,

    /// Control socket path
    #[arg(long)]
    socket_path: Option<String>,

    /// Do not listen on a control socket
    #[arg(long)]
    no_socket: bool,
}

#[derive(Args)]
struct SocketArgs {
    /// Control socket path
    #[arg(long)]
    socket_path: Option<String>,
}

impl SocketArgs {
    fn transport(self, settings: &Settings) -> AsyncTransport {
        let path = self.socket_path.as_deref().unwrap_or(&settings.socket_path);
        AsyncTransport::new(expand_socket_path(path))
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

async fn run(args: RunArgs, settings: Settings) -> Result<()> {
    let alarm_kind = args.alarm.unwrap_or(settings.alarm);
    let sound = args.sound.or(settings.sound);
    let alarm = Alarm::from_settings(alarm_kind, sound.as_deref());
    log::debug!("Alarm: {}", alarm_kind.as_str());

    let socket_path = if args.no_socket {
        None
    } else {
        let path = args.socket_path.unwrap_or(settings.socket_path);
        Some(expand_socket_path(&path))
    };

    let config = app::RunConfig {
        target: args.target.unwrap_or(settings.target),
        headline: args.headline.unwrap_or(settings.headline),
        plain: args.plain,
        once: args.once,
        socket_path,
    };

    app::run(config, alarm).await
}

fn remaining(
    target: Option<String>,
    now: Option<String>,
    format: OutputFormat,
    settings: Settings,
) -> Result<()> {
    let tz = TimeZone::system();
    let target_text = target.unwrap_or(settings.target);
    let target = Instant::parse(&target_text, &tz);
    if !target.is_valid() {
        return Err(anyhow!("'{}' is not a valid date", target_text));
    }

    let now = match now {
        Some(text) => {
            let now = Instant::parse(&text, &tz);
            if !now.is_valid() {
                return Err(anyhow!("'{}' is not a valid date", text));
            }
            now
        }
        None => Instant::now(),
    };

    let state = if now >= target {
        CountdownState::Ended
    } else {
        CountdownState::Running(delta::compute(&target, &now)?)
    };

    match format {
        OutputFormat::Text => match &state {
            CountdownState::Running(remaining) => println!("{}", render::fields_line(remaining)),
            CountdownState::Ended => println!("{}", render::ENDED_BANNER),
        },
        OutputFormat::Json => {
            let json = serde_json::json!({
                "target": target.to_string(),
                "now": now.to_string(),
                "countdown": state,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}

async fn request(transport: AsyncTransport, message: ClientMessage) -> Result<()> {
    match transport.send_request(&message).await? {
        ServerMessage::Status { snapshot, .. } => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        ServerMessage::Error { error, .. } => Err(anyhow!("Error from countdown: {}", error)),
        other => Err(anyhow!("Unexpected response: {:?}", other)),
    }
}

async fn watch(transport: AsyncTransport, headline: &str) -> Result<()> {
    let mut conn = transport.subscribe().await?;

    loop {
        tokio::select! {
            message = conn.read_server_message() => match message? {
                Some(ServerMessage::Tick { countdown, .. }) => {
                    println!("{}", render::frame(&countdown, headline));
                }
                Some(other) => log::debug!("Ignoring message: {:?}", other),
                None => {
                    eprintln!("Countdown closed the connection");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn theme(toggle: bool) -> Result<()> {
    let mut prefs = prefs::open_default();
    let hour = Instant::now().hour().unwrap_or(12);
    let mut theme = Theme::initial(prefs.as_ref(), hour);

    if toggle {
        theme = theme.toggle(prefs.as_mut());
    }

    let name = match theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    };
    println!("{} (--toggle switches to {})", name, theme.toggle_label());

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = Settings::load();

    let result = match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(args, settings).await,
        Commands::Remaining {
            target,
            now,
            format,
        } => remaining(target, now, format, settings),
        Commands::SetTarget { target, socket } => {
            let transport = socket.transport(&settings);
            request(transport, ClientMessage::new_set_target(target)).await
        }
        Commands::Status { socket } => {
            let transport = socket.transport(&settings);
            request(transport, ClientMessage::new_status()).await
        }
        Commands::ToggleTheme { socket } => {
            let transport = socket.transport(&settings);
            request(transport, ClientMessage::new_toggle_theme()).await
        }
        Commands::Watch { socket } => {
            let transport = socket.transport(&settings);
            watch(transport, &settings.headline).await
        }
        Commands::Theme { toggle } => theme(toggle),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["countdown"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_set_target_takes_positional_text() {
        let cli = Cli::try_parse_from(["countdown", "set-target", "2030-01-01T00:00"]).unwrap();
        match cli.command {
            Some(Commands::SetTarget { target, socket }) => {
                assert_eq!(target, "2030-01-01T00:00");
                assert!(socket.socket_path.is_none());
            }
            _ => panic!("Wrong subcommand"),
        }
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "countdown", "run", "--alarm", "bell", "--once", "--plain", "--no-socket",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.alarm, Some(AlarmKind::Bell));
                assert!(args.once && args.plain && args.no_socket);
            }
            _ => panic!("Wrong subcommand"),
        }
    }

    #[test]
    fn test_remaining_rejects_invalid_target() {
        let result = remaining(
            Some("whenever".to_string()),
            None,
            OutputFormat::Text,
            Settings::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_remaining_with_fixed_now() {
        let result = remaining(
            Some("2025-03-20T08:00".to_string()),
            Some("2025-01-15T10:00".to_string()),
            OutputFormat::Json,
            Settings::default(),
        );
        assert!(result.is_ok());
    }
}
