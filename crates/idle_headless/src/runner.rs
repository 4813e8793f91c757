//! Headless session runner.
//!
//! Reads JSON-line commands, applies them to one [`Session`], and writes one
//! JSON-line response per command. Input and output are generic so tests can
//! drive the runner with in-memory buffers.

use std::io::{self, BufRead, Write};

use idle_core::data::UpgradeId;
use idle_core::engine::{Engine, OfflineReport, PurchaseQuantity};
use idle_core::persistence::SnapshotStore;
use idle_core::session::Session;
use idle_core::state::Timestamp;

use crate::clock::{Clock, ManualClock, SystemClock};
use crate::protocol::{Command, Response};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Drive time from `advance` commands instead of the wall clock.
    pub simulated: bool,
    /// Simulated clock start, in milliseconds.
    pub start_millis: u64,
}

/// Clock the runner reads: the wall clock, or a manual one in simulated mode.
#[derive(Debug, Clone, Copy)]
enum RunnerClock {
    System(SystemClock),
    Simulated(ManualClock),
}

impl Clock for RunnerClock {
    fn now(&self) -> Timestamp {
        match self {
            Self::System(clock) => clock.now(),
            Self::Simulated(clock) => clock.now(),
        }
    }
}

/// Headless runner for scripted or AI-controlled play.
pub struct HeadlessRunner<S: SnapshotStore> {
    session: Session<S>,
    clock: RunnerClock,
    offline: Option<OfflineReport>,
}

impl<S: SnapshotStore> HeadlessRunner<S> {
    /// Load the session from `store` and credit any time away.
    pub fn start(engine: Engine, store: S, config: &HeadlessConfig) -> Self {
        let clock = if config.simulated {
            RunnerClock::Simulated(ManualClock::starting_at(Timestamp::from_millis(
                config.start_millis,
            )))
        } else {
            RunnerClock::System(SystemClock)
        };

        let (session, offline) = Session::start(engine, store, clock.now());
        Self {
            session,
            clock,
            offline,
        }
    }

    /// Whether time only moves on `advance`.
    pub fn is_simulated(&self) -> bool {
        matches!(self.clock, RunnerClock::Simulated(_))
    }

    /// The live session.
    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    /// Run until `quit` or end of input.
    ///
    /// Writes `ready` first, and `offline` if time away was credited at
    /// start. The session is saved on the way out.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        let last_update = self.session.state().last_update().as_millis();
        emit(&mut output, &Response::ready(last_update, self.is_simulated()))?;
        if let Some(report) = self.offline.take() {
            emit(&mut output, &Response::from(report))?;
        }

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let command = match Command::from_json(line) {
                Ok(command) => command,
                Err(e) => {
                    tracing::debug!(error = %e, "Unparseable command");
                    emit(&mut output, &Response::error(format!("Parse error: {e}"), None))?;
                    continue;
                }
            };

            if command == Command::Quit {
                break;
            }
            let response = self.handle(&command);
            emit(&mut output, &response)?;
        }

        if let Err(e) = self.session.save() {
            tracing::warn!(error = %e, "Final save failed");
        }
        emit(&mut output, &Response::Goodbye)?;
        tracing::info!(
            currency = self.session.state().currency(),
            "Headless session ended"
        );
        Ok(())
    }

    /// Apply one command and build its response.
    pub fn handle(&mut self, command: &Command) -> Response {
        if let RunnerClock::System(clock) = self.clock {
            self.session.tick(clock.now());
        }
        tracing::debug!(cmd = command.name(), "Handling command");

        match command {
            Command::Advance { seconds } => match self.simulated_step(*seconds, command) {
                Ok(()) => {
                    self.session.tick(self.clock.now());
                    self.state_response()
                }
                Err(response) => response,
            },
            Command::Reconcile { seconds } => match self.simulated_step(*seconds, command) {
                Ok(()) => match self.session.reconcile(*seconds) {
                    Some(report) => Response::from(report),
                    None => self.state_response(),
                },
                Err(response) => response,
            },
            Command::Purchase {
                upgrade_id,
                quantity,
            } => {
                let quantity = PurchaseQuantity::from(*quantity);
                match self.session.purchase(UpgradeId(*upgrade_id), quantity) {
                    Ok(()) => self.state_response(),
                    Err(rejection) => Response::rejected(&rejection),
                }
            }
            Command::Click => {
                self.session.manual_action();
                self.state_response()
            }
            Command::Prestige => match self.session.prestige() {
                Ok(()) => self.state_response(),
                Err(rejection) => Response::rejected(&rejection),
            },
            Command::Reset => match self.session.reset_all() {
                Ok(()) => self.state_response(),
                Err(e) => Response::error(e.to_string(), Some(command.name())),
            },
            Command::Query => self.state_response(),
            Command::Save => match self.session.save() {
                Ok(()) => Response::Saved {
                    last_update: self.session.state().last_update().as_millis(),
                },
                Err(e) => Response::error(e.to_string(), Some(command.name())),
            },
            Command::Hash => Response::Hash {
                last_update: self.session.state().last_update().as_millis(),
                hash: self.session.state().state_hash(),
            },
            Command::Quit => Response::Goodbye,
        }
    }

    /// Move the simulated clock, or explain why time commands are refused.
    fn simulated_step(&mut self, seconds: f64, command: &Command) -> Result<(), Response> {
        let RunnerClock::Simulated(clock) = &mut self.clock else {
            return Err(Response::error(
                "Time commands require --simulated",
                Some(command.name()),
            ));
        };
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Response::error(
                format!("seconds must be finite and non-negative, got {seconds}"),
                Some(command.name()),
            ));
        }
        clock.advance_secs(seconds);
        Ok(())
    }

    fn state_response(&self) -> Response {
        Response::state(self.session.report(self.clock.now()))
    }
}

fn emit<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    output.write_all(response.to_json_line().as_bytes())?;
    output.flush()
}
