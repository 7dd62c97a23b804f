//! The countdown loop
//!
//! One task owns the controller, theme, preferences and terminal surface and
//! serializes everything that touches them: timer ticks, typed input and
//! control socket commands. Nothing here needs a lock.

use crate::countdown::{CompletionNotifier, CountdownController};
use crate::instant::{Instant, TargetSpec};
use crate::prefs::{self, PreferenceStore};
use crate::protocol::{ServerMessage, Snapshot};
use crate::render::TerminalSurface;
use crate::server::{Command, ControlServer};
use crate::theme::Theme;
use crate::ticker::{TICK_PERIOD, Ticker};
use anyhow::Result;
use jiff::tz::TimeZone;
use std::io::{BufRead, Write};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub struct RunConfig {
    pub target: String,
    pub headline: String,
    pub plain: bool,
    pub once: bool,
    /// Control socket path, already expanded; `None` disables the socket
    pub socket_path: Option<String>,
}

/// What the loop should do after handling an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// A line typed on stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    ToggleTheme,
    Quit,
    Target(String),
    Empty,
}

impl Input {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Input::Empty,
            "t" | "theme" => Input::ToggleTheme,
            "q" | "quit" | "exit" => Input::Quit,
            text => Input::Target(text.to_string()),
        }
    }
}

pub struct CountdownLoop<N, W: Write> {
    controller: CountdownController<N>,
    theme: Theme,
    prefs: Box<dyn PreferenceStore>,
    surface: TerminalSurface<W>,
    subscribers: Vec<mpsc::Sender<ServerMessage>>,
    tz: TimeZone,
}

impl<N: CompletionNotifier, W: Write> CountdownLoop<N, W> {
    pub fn new(
        controller: CountdownController<N>,
        prefs: Box<dyn PreferenceStore>,
        surface: TerminalSurface<W>,
        tz: TimeZone,
    ) -> Self {
        Self {
            controller,
            theme: surface.theme(),
            prefs,
            surface,
            subscribers: Vec::new(),
            tz,
        }
    }

    /// Evaluate the countdown, redraw and notify subscribers
    pub fn on_tick(&mut self, now: &Instant) {
        let state = *self.controller.tick(now);

        if let Err(e) = self.surface.draw(&state) {
            log::warn!("Failed to draw countdown: {}", e);
        }

        if !self.subscribers.is_empty() {
            let event = ServerMessage::new_tick(state, now.epoch_ms().unwrap_or_default());
            self.subscribers
                .retain(|subscriber| match subscriber.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        log::debug!("Subscriber is not keeping up, dropping tick");
                        true
                    }
                    Err(TrySendError::Closed(_)) => false,
                });
        }
    }

    /// Arm a new target and evaluate it right away
    pub fn apply_target(&mut self, text: &str, now: &Instant) {
        self.controller.set_target(TargetSpec::parse(text, &self.tz));
        self.on_tick(now);
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggle(self.prefs.as_mut());
        self.surface.set_theme(self.theme);
        if let Err(e) = self.surface.draw(self.controller.state()) {
            log::warn!("Failed to draw countdown: {}", e);
        }
    }

    pub fn handle_input(&mut self, input: Input, now: &Instant) -> Flow {
        match input {
            Input::Empty => {}
            Input::Quit => return Flow::Quit,
            Input::ToggleTheme => self.toggle_theme(),
            Input::Target(text) => self.apply_target(&text, now),
        }
        Flow::Continue
    }

    pub fn handle_command(&mut self, command: Command, now: &Instant) {
        let reply = match command {
            Command::SetTarget { target, reply } => {
                self.apply_target(&target, now);
                reply
            }
            Command::Status { reply } => reply,
            Command::ToggleTheme { reply } => {
                self.toggle_theme();
                reply
            }
            Command::Subscribe { events, reply } => {
                self.subscribers.push(events);
                reply
            }
        };

        // The requester may have hung up already
        let _ = reply.send(self.snapshot());
    }

    pub fn snapshot(&self) -> Snapshot {
        let target = self.controller.target();
        Snapshot {
            target: target.text().to_string(),
            valid: target.is_valid(),
            countdown: *self.controller.state(),
            dark_mode: self.theme.is_dark(),
        }
    }

    pub fn has_ended(&self) -> bool {
        self.controller.has_ended()
    }

    /// Close the output and let a playing alarm run to its end
    pub fn finish(&mut self) {
        if let Err(e) = self.surface.finish() {
            log::warn!("Failed to finish output: {}", e);
        }
        self.controller.notifier().wait();
    }
}

/// Read stdin lines on a dedicated thread
///
/// A blocking read cannot be cancelled, so it lives outside the runtime and
/// is simply abandoned at exit.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
        });

    if let Err(e) = spawned {
        log::warn!("Failed to start input reader: {}", e);
    }

    rx
}

/// Run the live countdown until quit, Ctrl-C, or (with `once`) the end
pub async fn run<N: CompletionNotifier>(config: RunConfig, notifier: N) -> Result<()> {
    let tz = TimeZone::system();
    let prefs = prefs::open_default();
    let theme = Theme::initial(prefs.as_ref(), Instant::now().hour().unwrap_or(12));

    let controller = CountdownController::new(TargetSpec::parse(&config.target, &tz), notifier);
    let surface = TerminalSurface::stdout(config.plain, theme, config.headline);
    let mut countdown = CountdownLoop::new(controller, prefs, surface, tz);

    let (command_tx, mut commands) = mpsc::channel(16);
    let _server = match config.socket_path {
        Some(path) => match ControlServer::bind(&path) {
            Ok(server) => Some(server.spawn(command_tx)),
            Err(e) => {
                log::warn!("Control socket disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let mut input = spawn_input_reader();
    let mut input_open = true;
    let mut ticker = Ticker::start(TICK_PERIOD);

    loop {
        tokio::select! {
            tick = ticker.tick() => {
                if tick.is_none() {
                    break;
                }
                countdown.on_tick(&Instant::now());
                if config.once && countdown.has_ended() {
                    break;
                }
            }

            line = input.recv(), if input_open => match line {
                Some(line) => {
                    if countdown.handle_input(Input::parse(&line), &Instant::now()) == Flow::Quit {
                        break;
                    }
                }
                None => input_open = false,
            },

            Some(command) = commands.recv() => {
                countdown.handle_command(command, &Instant::now());
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ticker.stop();
    countdown.finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::CountdownState;
    use crate::countdown::testing::CountingNotifier;
    use crate::instant::utc;
    use crate::prefs::MemoryPreferenceStore;
    use crate::server::SUBSCRIBER_QUEUE;
    use crate::theme::DARK_MODE_KEY;
    use tokio::sync::oneshot;

    fn countdown_loop(
        target: &str,
        notifier: CountingNotifier,
    ) -> CountdownLoop<CountingNotifier, Vec<u8>> {
        let controller = CountdownController::new(TargetSpec::parse(target, &TimeZone::UTC), notifier);
        let surface = TerminalSurface::new(Vec::new(), true, Theme::Light, "Time until target");
        CountdownLoop::new(
            controller,
            Box::new(MemoryPreferenceStore::default()),
            surface,
            TimeZone::UTC,
        )
    }

    #[test]
    fn test_input_parsing() {
        assert_eq!(Input::parse("  "), Input::Empty);
        assert_eq!(Input::parse("t"), Input::ToggleTheme);
        assert_eq!(Input::parse("quit"), Input::Quit);
        assert_eq!(
            Input::parse(" 2030-01-01T00:00 "),
            Input::Target("2030-01-01T00:00".to_string())
        );
    }

    #[test]
    fn test_typed_target_rearms_immediately() {
        let notifier = CountingNotifier::default();
        let mut countdown = countdown_loop("2025-03-20T08:00", notifier.clone());

        countdown.on_tick(&utc(2025, 3, 20, 8, 0, 0));
        assert!(countdown.has_ended());

        let flow = countdown.handle_input(
            Input::parse("2025-03-21T08:00"),
            &utc(2025, 3, 20, 8, 0, 1),
        );
        assert_eq!(flow, Flow::Continue);
        assert!(!countdown.has_ended());
        assert_eq!(countdown.snapshot().target, "2025-03-21T08:00");
        assert!(matches!(
            countdown.snapshot().countdown,
            CountdownState::Running(remaining) if remaining.hours == 23 && remaining.minutes == 59
        ));
        assert_eq!(notifier.count(), 1);
    }

    #[test]
    fn test_theme_toggle_persists() {
        let mut countdown = countdown_loop("2025-03-20T08:00", CountingNotifier::default());
        assert!(!countdown.snapshot().dark_mode);

        countdown.handle_input(Input::ToggleTheme, &utc(2025, 1, 1, 0, 0, 0));
        assert!(countdown.snapshot().dark_mode);
        assert_eq!(countdown.prefs.get(DARK_MODE_KEY).as_deref(), Some("true"));
    }

    #[test]
    fn test_quit_input() {
        let mut countdown = countdown_loop("2025-03-20T08:00", CountingNotifier::default());
        assert_eq!(
            countdown.handle_input(Input::Quit, &utc(2025, 1, 1, 0, 0, 0)),
            Flow::Quit
        );
    }

    #[test]
    fn test_commands_reply_with_snapshot() {
        let mut countdown = countdown_loop("2025-03-20T08:00", CountingNotifier::default());
        let now = utc(2025, 3, 19, 8, 0, 0);

        let (reply, rx) = oneshot::channel();
        countdown.handle_command(
            Command::SetTarget {
                target: "garbage".to_string(),
                reply,
            },
            &now,
        );
        let snapshot = rx.blocking_recv().unwrap();
        assert_eq!(snapshot.target, "garbage");
        assert!(!snapshot.valid);
        assert!(!snapshot.countdown.is_ended());

        let (reply, rx) = oneshot::channel();
        countdown.handle_command(Command::ToggleTheme { reply }, &now);
        assert!(rx.blocking_recv().unwrap().dark_mode);
    }

    #[test]
    fn test_subscribers_get_ticks_until_they_hang_up() {
        let mut countdown = countdown_loop("2025-03-20T08:00", CountingNotifier::default());
        let now = utc(2025, 3, 20, 7, 59, 58);

        let (events, mut rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let (reply, _snapshot) = oneshot::channel();
        countdown.handle_command(Command::Subscribe { events, reply }, &now);

        countdown.on_tick(&now);
        match rx.try_recv().unwrap() {
            ServerMessage::Tick { countdown: state, ts } => {
                assert_eq!(ts, now.epoch_ms().unwrap());
                assert!(matches!(state, CountdownState::Running(r) if r.seconds == 2));
            }
            other => panic!("Unexpected event: {:?}", other),
        }

        drop(rx);
        countdown.on_tick(&utc(2025, 3, 20, 8, 0, 0));
        assert!(countdown.subscribers.is_empty());
    }

    #[test]
    fn test_stalled_subscriber_queue_stays_bounded() {
        let mut countdown = countdown_loop("2025-03-20T08:00", CountingNotifier::default());
        let now = utc(2025, 3, 20, 7, 0, 0);

        let (events, mut rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let (reply, _snapshot) = oneshot::channel();
        countdown.handle_command(Command::Subscribe { events, reply }, &now);

        for second in 0..(SUBSCRIBER_QUEUE as i8 * 4) {
            countdown.on_tick(&utc(2025, 3, 20, 7, 0, second));
        }
        assert_eq!(countdown.subscribers.len(), 1);

        let mut queued = 0;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, SUBSCRIBER_QUEUE);

        // A subscriber that catches up gets fresh ticks again
        countdown.on_tick(&utc(2025, 3, 20, 7, 1, 0));
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Tick { .. })));
    }
}
