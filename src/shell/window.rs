//! Desktop Window
//!
//! Tauri glue: builds the window and its menu, forwards menu clicks and page
//! messages into the shell queue, and emits replies back to the page.

use anyhow::Context;
use log::info;
use serde_json::Value;
use tauri::menu::{MenuBuilder, MenuItemBuilder, PredefinedMenuItem, SubmenuBuilder};
use tauri::window::Color;
use tauri::{AppHandle, Emitter, Manager, RunEvent, WebviewUrl, WebviewWindowBuilder};

use super::events::{event_channel, EventLoop, EventSender, MessageSink, ShellEvent, ShellMessage};
use super::MAIN_WINDOW;
use crate::config::AppConfig;
use crate::proxy::ProxyHandle;

const APP_NAME: &str = "lit-af";
const MENU_ABOUT: &str = "about";
const WINDOW_SIZE: f64 = 700.0;
const WINDOW_BACKGROUND: Color = Color(0x33, 0x33, 0x33, 0xff);

/// Emits shell messages to the main window
struct WindowSink {
    app: AppHandle,
}

impl MessageSink for WindowSink {
    fn send(&self, message: ShellMessage) -> Result<(), String> {
        self.app
            .emit_to(MAIN_WINDOW, &message.name, message.payload)
            .map_err(|e| e.to_string())
    }
}

/// Queue handle shared with Tauri commands
struct ShellState {
    events: EventSender,
}

/// Message from the page to the shell
#[tauri::command]
fn shell_message(
    name: String,
    payload: Option<Value>,
    state: tauri::State<'_, ShellState>,
) -> Result<(), String> {
    state
        .events
        .send(ShellEvent::PageMessage {
            name,
            payload: payload.unwrap_or(Value::Null),
        })
        .map_err(|e| e.to_string())
}

/// Run the window until the application exits. Blocks the calling thread.
pub fn run_window(
    config: &AppConfig,
    proxy_port: u16,
    mut proxy: Option<ProxyHandle>,
) -> anyhow::Result<()> {
    let homepage: tauri::Url = config
        .homepage_url()
        .parse()
        .context("invalid homepage URL")?;
    let (events, events_rx) = event_channel();
    let exit_events = events.clone();

    let app = tauri::Builder::default()
        .invoke_handler(tauri::generate_handler![shell_message])
        .setup(move |app| {
            let sink = WindowSink {
                app: app.handle().clone(),
            };
            let event_loop = EventLoop::new(sink, &events, events_rx, proxy_port);
            app.manage(ShellState {
                events: events.clone(),
            });

            let about = MenuItemBuilder::with_id(MENU_ABOUT, "About").build(app)?;
            let close = PredefinedMenuItem::close_window(app, None)?;
            let file = SubmenuBuilder::new(app, "File")
                .item(&about)
                .item(&close)
                .build()?;
            let menu = MenuBuilder::new(app).item(&file).build()?;
            app.set_menu(menu)?;

            let menu_events = events.clone();
            app.on_menu_event(move |_app, event| {
                if event.id().as_ref() == MENU_ABOUT {
                    let _ = menu_events.send(ShellEvent::MenuAbout);
                }
            });

            WebviewWindowBuilder::new(app, MAIN_WINDOW, WebviewUrl::External(homepage))
                .title(APP_NAME)
                .inner_size(WINDOW_SIZE, WINDOW_SIZE)
                .background_color(WINDOW_BACKGROUND)
                .center()
                .build()?;
            info!("Window opened");

            tauri::async_runtime::spawn(event_loop.run());
            events.send(ShellEvent::WindowReady)?;
            Ok(())
        })
        .build(tauri::generate_context!())
        .context("error while building tauri application")?;

    app.run(move |_app, event| {
        if let RunEvent::Exit = event {
            let _ = exit_events.send(ShellEvent::Shutdown);
            if let Some(proxy) = proxy.take() {
                tauri::async_runtime::block_on(proxy.shutdown());
            }
            info!("Application exiting");
        }
    });

    Ok(())
}
