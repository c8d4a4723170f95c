//! Shell Events
//!
//! Menu clicks, window readiness and page messages all land on one queue.
//! A single [`EventLoop`] consumes it and answers the page through a
//! [`MessageSink`].

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

/// Body of the `about` message
pub const ABOUT_HTML: &str = "Welcome on <b>lit-af</b>!<br>\nA desktop shell for your lit node.";

/// Text of the `check.out.menu` reminder
pub const CHECK_OUT_MENU: &str = "Don't forget to check out the menu!";

/// Delay between the window showing and the menu reminder
pub const REMINDER_DELAY: Duration = Duration::from_secs(5);

/// Inbound shell event
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    /// The window finished loading
    WindowReady,
    /// `File → About` was clicked
    MenuAbout,
    /// The page sent a message
    PageMessage { name: String, payload: Value },
    /// The post-ready reminder timer fired
    ReminderDue,
    /// The application is exiting
    Shutdown,
}

/// Message sent to the page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShellMessage {
    pub name: String,
    pub payload: Value,
}

impl ShellMessage {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Delivers messages to the page
pub trait MessageSink: Send + Sync {
    fn send(&self, message: ShellMessage) -> Result<(), String>;
}

pub type EventSender = mpsc::UnboundedSender<ShellEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ShellEvent>;

/// Create the shell's inbound queue
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Single consumer of the shell queue
pub struct EventLoop<S> {
    sink: S,
    events: EventReceiver,
    /// Used to schedule the reminder without keeping the queue open
    scheduler: mpsc::WeakUnboundedSender<ShellEvent>,
    proxy_port: u16,
    reminder_delay: Duration,
}

impl<S: MessageSink> EventLoop<S> {
    pub fn new(sink: S, sender: &EventSender, events: EventReceiver, proxy_port: u16) -> Self {
        Self {
            sink,
            events,
            scheduler: sender.downgrade(),
            proxy_port,
            reminder_delay: REMINDER_DELAY,
        }
    }

    pub fn with_reminder_delay(mut self, delay: Duration) -> Self {
        self.reminder_delay = delay;
        self
    }

    /// Process events until `Shutdown` or until every sender is gone
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            if !self.handle(event) {
                break;
            }
        }
        debug!("Shell event loop stopped");
    }

    /// Returns false when the loop should stop
    fn handle(&self, event: ShellEvent) -> bool {
        match event {
            ShellEvent::WindowReady => self.schedule_reminder(),
            ShellEvent::MenuAbout => self.emit("about", json!(ABOUT_HTML)),
            ShellEvent::ReminderDue => self.emit("check.out.menu", json!(CHECK_OUT_MENU)),
            ShellEvent::PageMessage { name, payload } => self.handle_page_message(&name, payload),
            ShellEvent::Shutdown => return false,
        }
        true
    }

    fn handle_page_message(&self, name: &str, payload: Value) {
        match name {
            "about.displayed" => match payload.as_str() {
                Some(s) => info!("About modal has been displayed and payload is {}!", s),
                None => error!("unmarshaling payload failed: expected a string, got {}", payload),
            },
            "proxy.port" => self.emit("proxy.port", json!({ "port": self.proxy_port })),
            other => warn!("Unhandled page message: {}", other),
        }
    }

    fn schedule_reminder(&self) {
        let Some(sender) = self.scheduler.upgrade() else {
            return;
        };
        let delay = self.reminder_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(ShellEvent::ReminderDue);
        });
    }

    fn emit(&self, name: &str, payload: Value) {
        if let Err(e) = self.sink.send(ShellMessage::new(name, payload)) {
            error!("sending {} event failed: {}", name, e);
        }
    }
}
