//! Operator input: parsed once into a [`Directive`], then executed against a session by the
//! [`Dispatcher`], which also owns the drain timeout.

use crate::command::CommandOutcome;
use crate::drain::Response;
use crate::error::IrecvError;
use crate::session::DeviceSession;
use crate::transfer::stage_file;
use crate::transport::Transport;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `/exit`
    Exit,
    /// `/reset`
    Reset,
    /// `/send <path>`
    Send(PathBuf),
    /// `/timeout <ms>`
    SetTimeout(Duration),
    /// Anything else, sent to the device as a command.
    Raw(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),

    #[error("Invalid timeout {0:?}: expected milliseconds")]
    InvalidTimeout(String),

    #[error("/{0} takes no argument")]
    UnexpectedArgument(&'static str),
}

impl Directive {
    /// Parses one line. Surrounding whitespace is ignored; a blank line yields `None`.
    pub fn parse(line: &str) -> Result<Option<Directive>, DirectiveError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let directive = match word {
            "/exit" => no_argument("exit", rest, Directive::Exit)?,
            "/reset" => no_argument("reset", rest, Directive::Reset)?,
            "/send" if rest.is_empty() => return Err(DirectiveError::MissingArgument("send")),
            "/send" => Directive::Send(PathBuf::from(rest)),
            "/timeout" if rest.is_empty() => return Err(DirectiveError::MissingArgument("timeout")),
            "/timeout" => {
                let ms: u64 = rest
                    .parse()
                    .map_err(|_| DirectiveError::InvalidTimeout(rest.to_owned()))?;
                Directive::SetTimeout(Duration::from_millis(ms))
            }
            _ => Directive::Raw(line.to_owned()),
        };
        Ok(Some(directive))
    }
}

fn no_argument(name: &'static str, rest: &str, directive: Directive) -> Result<Directive, DirectiveError> {
    if rest.is_empty() {
        Ok(directive)
    } else {
        Err(DirectiveError::UnexpectedArgument(name))
    }
}

/// Whether the dispatcher can take more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The session has ended (exit, reset or reboot).
    Finished,
}

/// Routes directives to a session.
pub struct Dispatcher<T: Transport> {
    session: Option<DeviceSession<T>>,
    timeout: Duration,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(session: DeviceSession<T>) -> Self {
        let timeout = session.config().drain_timeout;
        Self {
            session: Some(session),
            timeout,
        }
    }

    /// Current drain timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn session(&self) -> Option<&DeviceSession<T>> {
        self.session.as_ref()
    }

    fn session_mut(&mut self) -> Result<&mut DeviceSession<T>, IrecvError> {
        self.session.as_mut().ok_or(IrecvError::SessionClosed)
    }

    /// Drains the response pipe once with the current timeout.
    pub fn drain(&mut self) -> Result<Response, IrecvError> {
        let timeout = self.timeout;
        self.session_mut()?.drain_response(timeout)
    }

    pub fn execute(&mut self, directive: Directive) -> Result<Flow, IrecvError> {
        match directive {
            Directive::Exit => {
                if let Some(mut session) = self.session.take() {
                    session.close();
                }
                Ok(Flow::Finished)
            }
            Directive::Reset => {
                let session = self.session.take().ok_or(IrecvError::SessionClosed)?;
                session.reset()?;
                Ok(Flow::Finished)
            }
            Directive::SetTimeout(timeout) => {
                info!("Drain timeout set to {:?}", timeout);
                self.timeout = timeout;
                Ok(Flow::Continue)
            }
            Directive::Send(path) => {
                let session = self.session_mut()?;
                let payload = stage_file(&path)?;
                session.send_payload(payload)?;
                Ok(Flow::Continue)
            }
            Directive::Raw(text) => match self.session_mut()?.send_command(&text)? {
                CommandOutcome::Sent => Ok(Flow::Continue),
                CommandOutcome::Rebooting => {
                    self.session = None;
                    Ok(Flow::Finished)
                }
            },
        }
    }
}
