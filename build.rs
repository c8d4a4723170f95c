fn main() {
    // Only the desktop shell needs the Tauri context generated.
    if std::env::var_os("CARGO_FEATURE_DESKTOP").is_none() {
        return;
    }

    // Declaring the command generates its `allow-shell-message` permission.
    let attributes = tauri_build::Attributes::new()
        .app_manifest(tauri_build::AppManifest::new().commands(&["shell_message"]));
    if let Err(e) = tauri_build::try_build(attributes) {
        panic!("tauri build failed: {:#}", e);
    }
}
