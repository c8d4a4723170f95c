// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

/// Desktop entry point for lit-af
///
/// Thin wrapper over the library crate, where startup and the window live.
fn main() {
    lit_af_lib::run();
}
