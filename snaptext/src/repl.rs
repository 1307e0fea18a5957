//! Line-oriented front end.
//!
//! Each line is one user gesture: submitting the login form, pressing a
//! button on the home screen, or answering the picker/camera that a previous
//! gesture opened. Capture actions run as background tasks so the prompt
//! stays live while recognition is in flight.

use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::alert::AlertPresenter;
use crate::app::App;
use crate::capture::PickerHandle;
use crate::error::{Result, SnapError};
use crate::models::{Action, AlertPayload, Screen, TEXT_PLACEHOLDER};
use crate::services::{ControllerSnapshot, LoginOutcome, Outcome, SessionGate};

pub const HELP: &str = "\
Commands:
  login <username> <password>  submit the login form
  pick <path>                  choose an image from the gallery
  pick                         open the gallery and back out
  camera                       open the camera
  shutter <path>               take the photo (camera must be open)
  cancel                       close the camera without a photo
  dismiss                      close the visible alert
  logout                       return to the login screen
  status                       show the current screen and result
  wait                         wait for running captures to finish
  help                         show this message
  quit                         exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Pick(Option<PathBuf>),
    Camera,
    Shutter(PathBuf),
    Cancel,
    Dismiss,
    Logout,
    Status,
    Wait,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        let no_arg = |cmd: Command| {
            if arg.is_empty() {
                Ok(cmd)
            } else {
                Err(format!("`{name}` takes no arguments"))
            }
        };

        match name.to_lowercase().as_str() {
            "login" => {
                let parts: Vec<&str> = arg.split_whitespace().collect();
                match parts.as_slice() {
                    [username, password] => Ok(Command::Login {
                        username: username.to_string(),
                        password: password.to_string(),
                    }),
                    _ => Err("usage: login <username> <password>".to_string()),
                }
            }
            "pick" if arg.is_empty() => Ok(Command::Pick(None)),
            "pick" => Ok(Command::Pick(Some(PathBuf::from(arg)))),
            "shutter" if arg.is_empty() => Err("usage: shutter <path>".to_string()),
            "shutter" => Ok(Command::Shutter(PathBuf::from(arg))),
            "camera" => no_arg(Command::Camera),
            "cancel" => no_arg(Command::Cancel),
            "dismiss" => no_arg(Command::Dismiss),
            "logout" => no_arg(Command::Logout),
            "status" => no_arg(Command::Status),
            "wait" => no_arg(Command::Wait),
            "help" | "?" => no_arg(Command::Help),
            "quit" | "exit" => no_arg(Command::Quit),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command `{other}`, type `help`")),
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    screen: Screen,
    alert: Option<AlertPayload>,
    #[serde(flatten)]
    controller: ControllerSnapshot,
}

pub struct Repl {
    app: App,
    picker: PickerHandle,
    json: bool,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl Repl {
    pub fn new(app: App, picker: PickerHandle, json: bool) -> Self {
        Self {
            app,
            picker,
            json,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token ends [`run`](Self::run) after the current line.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Read commands until EOF, `quit`, or shutdown.
    pub async fn run<R>(&self, input: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.parse::<Command>() {
                Ok(cmd) => {
                    if !self.execute(cmd).await? {
                        break;
                    }
                }
                Err(e) => println!("{e}"),
            }
        }

        self.close_camera();
        self.wait().await;
        Ok(())
    }

    /// Run one command. Returns `false` when the loop should stop.
    pub async fn execute(&self, cmd: Command) -> anyhow::Result<bool> {
        let controller = &self.app.controller;

        match cmd {
            Command::Login { username, password } => {
                if !SessionGate::can_submit(&username, &password) {
                    println!("Enter both a username and a password.");
                } else if self.app.screen() == Screen::Home {
                    println!("Already logged in.");
                } else {
                    match self.app.login(&username, &password).await {
                        Ok(LoginOutcome::Accepted) => println!("Welcome, {}.", username.trim()),
                        Ok(LoginOutcome::Rejected) | Err(_) => self.print_alert(),
                    }
                }
            }
            Command::Pick(path) => {
                if !self.accepts(Action::PickImage).await {
                    self.print_unavailable("pick").await;
                    return Ok(true);
                }
                let mut handle = {
                    let controller = controller.clone();
                    self.spawn_action("Pick", async move { controller.pick_image().await })
                };

                // Answer only the request this command opened.
                tokio::select! {
                    _ = self.picker.gallery_requested() => {
                        let answered = match path {
                            Some(path) => self.picker.pick(path),
                            None => self.picker.cancel_gallery(),
                        };
                        if let Err(e) = answered {
                            debug!(error = %e, "Gallery answer refused");
                        }
                    }
                    _ = &mut handle => {}
                }
            }
            Command::Camera => {
                if !self.accepts(Action::OpenCamera).await {
                    self.print_unavailable("camera").await;
                    return Ok(true);
                }
                let mut handle = {
                    let controller = controller.clone();
                    self.spawn_action("Camera", async move { controller.open_camera().await })
                };

                tokio::select! {
                    _ = self.picker.camera_requested() => {
                        println!("Camera open. Use `shutter <path>` or `cancel`.");
                    }
                    _ = &mut handle => {}
                }
            }
            Command::Shutter(path) => {
                if self.picker.shutter(path).is_err() {
                    println!("The camera is not open.");
                }
            }
            Command::Cancel => {
                if self.picker.cancel_camera().is_err() {
                    println!("Nothing to cancel.");
                }
            }
            Command::Dismiss => {
                if !self.app.dismiss_alert().await {
                    println!("No alert to dismiss.");
                }
            }
            Command::Logout => match controller.logout().await {
                Ok(()) => println!("Logged out."),
                Err(SnapError::InvalidTransition { .. }) => {
                    self.print_unavailable("logout").await;
                }
                Err(_) => self.print_alert(),
            },
            Command::Status => self.print_status().await?,
            Command::Wait => self.wait().await,
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(false),
        }

        Ok(true)
    }

    /// Block until every spawned capture action has finished.
    pub async fn wait(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    fn close_camera(&self) {
        if self.picker.cancel_camera().is_ok() {
            debug!("Closed camera before exit");
        }
    }

    async fn accepts(&self, action: Action) -> bool {
        let snapshot = self.app.controller.snapshot().await;
        snapshot.session_active && snapshot.state.accepts(action)
    }

    fn spawn_action<F>(&self, label: &'static str, action: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<Outcome>> + Send + 'static,
    {
        let alerts = self.app.alerts.clone();

        self.tasks.spawn(async move {
            match action.await {
                Ok(Outcome::Recognized(result)) => {
                    if result.is_empty() {
                        println!("{TEXT_PLACEHOLDER}");
                    } else {
                        println!("{}", result.text);
                    }
                }
                Ok(Outcome::Cancelled) => println!("{label} cancelled."),
                Ok(Outcome::Discarded) => debug!(label, "Result superseded"),
                Err(SnapError::InvalidTransition { action, state }) => {
                    println!("{label}: {action:?} is not available while {state}.");
                }
                Err(e) => {
                    debug!(label, error = %e, "Capture action failed");
                    if let Some(alert) = alerts.current() {
                        println!("{}", render_alert(&alert));
                    }
                }
            }
        })
    }

    async fn print_unavailable(&self, what: &str) {
        let snapshot = self.app.controller.snapshot().await;
        if snapshot.session_active {
            println!("Cannot {what} while {}.", snapshot.state);
        } else {
            println!("Log in first.");
        }
    }

    fn print_alert(&self) {
        if let Some(alert) = self.app.alert() {
            println!("{}", render_alert(&alert));
        }
    }

    async fn print_status(&self) -> anyhow::Result<()> {
        let report = StatusReport {
            screen: self.app.screen(),
            alert: self.app.alert(),
            controller: self.app.controller.snapshot().await,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("screen: {}", report.screen);
        println!("state:  {}", report.controller.state);
        if let Some(image) = &report.controller.image {
            println!("image:  {image}");
        }
        if let Some(image) = &report.controller.processing {
            println!("reading: {image}");
        }
        println!("text:   {}", report.controller.displayed_text);
        if let Some(alert) = &report.alert {
            println!("{}", render_alert(alert));
        }
        Ok(())
    }
}

fn render_alert(alert: &AlertPayload) -> String {
    format!("[{}] {} (type `dismiss` to close)", alert.title, alert.message)
}
