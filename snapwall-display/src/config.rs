//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;
use snapwall_core::{SlideshowConfig, Viewport};
use snapwall_live::api::{DEFAULT_API_BASE, DEFAULT_WS_BASE};
use snapwall_live::{ConnectionConfig, DisplayConfig};

#[derive(Parser, Debug)]
#[command(name = "snapwall-display", version, about = "Headless Snapwall display client")]
pub struct Cli {
    /// Activity to display.
    #[arg(long, env = "SNAPWALL_ACTIVITY")]
    pub activity_id: String,
    #[arg(long, env = "SNAPWALL_API_URL", default_value = DEFAULT_API_BASE)]
    pub api_base: String,
    #[arg(long, env = "SNAPWALL_WS_URL", default_value = DEFAULT_WS_BASE)]
    pub ws_base: String,
    #[arg(long, default_value_t = 1920.0)]
    pub width: f32,
    #[arg(long, default_value_t = 1080.0)]
    pub height: f32,
    /// Time each photo stays on screen.
    #[arg(long, default_value_t = 5000)]
    pub slide_interval_ms: u64,
    #[arg(long, default_value_t = 3)]
    pub prefetch_ahead: usize,
    #[arg(long, default_value_t = 5)]
    pub max_reconnect_attempts: u32,
    #[arg(long)]
    pub no_reconnect: bool,
    /// Send each line read from stdin as a danmaku.
    #[arg(long)]
    pub echo_stdin: bool,
    /// Seconds between status lines. 0 disables them.
    #[arg(long, default_value_t = 10)]
    pub status_every: u64,
}

impl Cli {
    pub fn display_config(&self) -> DisplayConfig {
        DisplayConfig {
            api_base: self.api_base.clone(),
            ws_base: self.ws_base.clone(),
            activity_id: self.activity_id.clone(),
            connection: ConnectionConfig {
                auto_reconnect: !self.no_reconnect,
                max_reconnect_attempts: self.max_reconnect_attempts,
                ..ConnectionConfig::default()
            },
            slideshow: SlideshowConfig {
                interval: Duration::from_millis(self.slide_interval_ms.max(1)),
                prefetch_ahead: self.prefetch_ahead,
            },
            viewport: Viewport::new(self.width.max(1.0), self.height.max(1.0)),
            ..DisplayConfig::default()
        }
    }
}
