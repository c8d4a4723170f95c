//! Application Configuration
//!
//! Command line flags and the fixed endpoints the shell uses. Flags follow
//! the single-dash long style (`-con`, `-dir`, `-d`); double-dash forms are
//! accepted too.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Proxy port handed to the page as `?port=`
pub const PROXY_PORT: u16 = 49586;

/// Host the proxy binds to
pub const PROXY_HOST: &str = "localhost";

/// Port of the web server hosting the GUI page
pub const WEB_SERVER_PORT: u16 = 3000;

/// Default connection string: local node, default port
pub const DEFAULT_CONNECTION: &str = "@:2448";

/// Data directory name under `$HOME`
const DATA_DIR_NAME: &str = ".lit";

/// Long flags that may be written with a single dash
const LONG_FLAGS: [&str; 2] = ["con", "dir"];

#[derive(Debug, Parser)]
#[command(name = "lit-af", version, about = "Desktop shell for lit nodes")]
struct Cli {
    /// Enables the debug mode
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Host to connect to in the form of [<lnadr>@][<host>][:<port>]
    #[arg(long = "con", default_value = DEFAULT_CONNECTION)]
    con: String,

    /// Directory to save settings
    #[arg(long = "dir")]
    dir: Option<PathBuf>,
}

/// Local address the websocket proxy listens on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub bind_host: String,
    pub bind_port: u16,
}

impl Default for ProxyEndpoint {
    fn default() -> Self {
        Self {
            bind_host: PROXY_HOST.to_string(),
            bind_port: PROXY_PORT,
        }
    }
}

impl ProxyEndpoint {
    /// Page URL that points the GUI at this proxy
    pub fn homepage_url(&self, web_server_port: u16) -> String {
        format!("http://localhost:{}/?port={}", web_server_port, self.bind_port)
    }
}

/// Everything the shell needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub debug: bool,
    pub connection: String,
    pub data_dir: PathBuf,
    pub proxy: ProxyEndpoint,
    pub web_server_port: u16,
}

impl AppConfig {
    /// Parse flags from an argument list (program name first)
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let cli = Cli::try_parse_from(normalize_args(args))?;
        Ok(Self {
            debug: cli.debug,
            connection: cli.con,
            data_dir: cli.dir.unwrap_or_else(default_data_dir),
            proxy: ProxyEndpoint::default(),
            web_server_port: WEB_SERVER_PORT,
        })
    }

    pub fn homepage_url(&self) -> String {
        self.proxy.homepage_url(self.web_server_port)
    }
}

/// `$HOME/.lit`
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

/// Rewrite Go-style flags into the forms clap accepts: `-con`/`-dir` (and
/// `-con=x`) gain a second dash, `-d=true` becomes `-d` and `-d=false` is
/// dropped. Arguments consumed as flag values are left alone.
fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut value_next = false;
    for arg in args.into_iter().map(Into::into) {
        if value_next {
            value_next = false;
            out.push(arg);
            continue;
        }
        let arg = match arg.to_str().map(rewrite_flag) {
            Some(Rewrite::Drop) => continue,
            Some(Rewrite::Replace(text)) => OsString::from(text),
            Some(Rewrite::Keep) | None => arg,
        };
        if let Some(name) = arg.to_str().and_then(|text| text.strip_prefix("--")) {
            value_next = LONG_FLAGS.contains(&name);
        }
        out.push(arg);
    }
    out
}

enum Rewrite {
    Keep,
    Replace(String),
    Drop,
}

fn rewrite_flag(text: &str) -> Rewrite {
    let Some(flag) = text.strip_prefix("--").or_else(|| text.strip_prefix('-')) else {
        return Rewrite::Keep;
    };
    let (name, value) = match flag.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (flag, None),
    };

    if name == "d" {
        return match value.map(parse_go_bool) {
            None | Some(Some(true)) => Rewrite::Replace("-d".to_string()),
            Some(Some(false)) => Rewrite::Drop,
            Some(None) => Rewrite::Keep,
        };
    }
    if LONG_FLAGS.contains(&name) && !text.starts_with("--") {
        return Rewrite::Replace(format!("-{}", text));
    }
    Rewrite::Keep
}

/// Boolean spellings accepted by Go's `flag` package
fn parse_go_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
