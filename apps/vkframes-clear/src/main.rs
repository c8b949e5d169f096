//! vkframes animated clear sample
//!
//! Clears an offscreen colour target with dynamic rendering and blits it to
//! the swapchain every frame. The window is resizable (including minimizing),
//! and the present mode can be switched at runtime.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vkframes-clear -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--frames-in-flight <N>`: Frame slots (default: 2)
//! - `--timeline`: Track frame completion with a timeline semaphore instead of fences
//! - `--present-mode <MODE>`: `fifo`, `mailbox`, `immediate` or `fifo-relaxed` (default: mailbox)
//! - `--frames <N>`: Exit after presenting N frames
//! - `-h, --help`: Print help message
//!
//! ## Controls
//!
//! - `Space`: Cycle the present mode
//! - `Escape`: Exit
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use anyhow::{bail, Context as _};
use ash::vk;
use vkframes_app::{run_app, AppConfig, SyncStrategy};

use crate::app::ClearApp;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    frames_in_flight: usize,
    sync_strategy: SyncStrategy,
    present_mode: vk::PresentModeKHR,
    frame_limit: Option<u64>,
    help: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            sync_strategy: SyncStrategy::Fences,
            present_mode: vk::PresentModeKHR::MAILBOX,
            frame_limit: None,
            help: false,
        }
    }
}

impl Options {
    /// Parse arguments, excluding the program name.
    fn parse<I>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => options.help = true,
                "--timeline" => options.sync_strategy = SyncStrategy::Timeline,
                "--frames-in-flight" => {
                    let value = args.next().context("--frames-in-flight needs a value")?;
                    options.frames_in_flight = value
                        .parse()
                        .with_context(|| format!("invalid frame count '{value}'"))?;
                    if options.frames_in_flight == 0 {
                        bail!("--frames-in-flight must be at least 1");
                    }
                }
                "--present-mode" => {
                    let value = args.next().context("--present-mode needs a value")?;
                    options.present_mode = parse_present_mode(&value)
                        .with_context(|| format!("unknown present mode '{value}'"))?;
                }
                "--frames" => {
                    let value = args.next().context("--frames needs a value")?;
                    options.frame_limit = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid frame limit '{value}'"))?,
                    );
                }
                other => bail!("unknown argument '{other}' (see --help)"),
            }
        }

        Ok(options)
    }

    fn app_config(&self) -> AppConfig {
        let mut config = AppConfig::new("vkframes - animated clear")
            .with_size(WIDTH, HEIGHT)
            .with_frames_in_flight(self.frames_in_flight)
            .with_sync_strategy(self.sync_strategy)
            .with_present_mode(self.present_mode);
        if let Some(frames) = self.frame_limit {
            config = config.with_frame_limit(frames);
        }
        config
    }
}

fn parse_present_mode(name: &str) -> Option<vk::PresentModeKHR> {
    match name.to_ascii_lowercase().as_str() {
        "fifo" => Some(vk::PresentModeKHR::FIFO),
        "mailbox" => Some(vk::PresentModeKHR::MAILBOX),
        "immediate" => Some(vk::PresentModeKHR::IMMEDIATE),
        "fifo-relaxed" | "fifo_relaxed" => Some(vk::PresentModeKHR::FIFO_RELAXED),
        _ => None,
    }
}

fn main() -> anyhow::Result<()> {
    let options = Options::parse(std::env::args().skip(1))?;
    if options.help {
        print_help();
        return Ok(());
    }

    run_app::<ClearApp>(options.app_config())
}

fn print_help() {
    eprintln!(
        "vkframes animated clear sample

USAGE:
    cargo run -p vkframes-clear -- [OPTIONS]

OPTIONS:
    --frames-in-flight <N>  Frame slots (default: 2)
    --timeline              Use a timeline semaphore instead of per-slot fences
    --present-mode <MODE>   fifo | mailbox | immediate | fifo-relaxed (default: mailbox)
                            Falls back to fifo when the surface lacks the mode
    --frames <N>            Exit after presenting N frames
    -h, --help              Print this help message

CONTROLS:
    Space                   Cycle the present mode
    Escape                  Exit

EXAMPLES:
    # Three frames in flight on a timeline semaphore
    cargo run -p vkframes-clear -- --frames-in-flight 3 --timeline

    # Uncapped presentation for 500 frames
    cargo run -p vkframes-clear -- --present-mode immediate --frames 500

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Options> {
        Options::parse(args.iter().map(ToString::to_string))
    }

    #[test]
    fn no_arguments_gives_defaults() {
        assert_eq!(parse(&[]).unwrap(), Options::default());
    }

    #[test]
    fn parses_every_flag() {
        let options = parse(&[
            "--frames-in-flight",
            "3",
            "--timeline",
            "--present-mode",
            "fifo-relaxed",
            "--frames",
            "120",
        ])
        .unwrap();

        assert_eq!(options.frames_in_flight, 3);
        assert_eq!(options.sync_strategy, SyncStrategy::Timeline);
        assert_eq!(options.present_mode, vk::PresentModeKHR::FIFO_RELAXED);
        assert_eq!(options.frame_limit, Some(120));
        assert!(!options.help);
    }

    #[test]
    fn help_flag() {
        assert!(parse(&["-h"]).unwrap().help);
        assert!(parse(&["--help"]).unwrap().help);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--frames-in-flight", "0"]).is_err());
        assert!(parse(&["--frames-in-flight"]).is_err());
        assert!(parse(&["--present-mode", "vsync"]).is_err());
        assert!(parse(&["--frames", "-1"]).is_err());
        assert!(parse(&["--fullscreen"]).is_err());
    }

    #[test]
    fn present_mode_names_are_case_insensitive() {
        assert_eq!(parse_present_mode("MAILBOX"), Some(vk::PresentModeKHR::MAILBOX));
        assert_eq!(parse_present_mode("Immediate"), Some(vk::PresentModeKHR::IMMEDIATE));
    }

    #[test]
    fn app_config_carries_options() {
        let options = parse(&["--timeline", "--frames", "10"]).unwrap();
        let config = options.app_config();
        assert_eq!(config.sync_strategy, SyncStrategy::Timeline);
        assert_eq!(config.frame_limit, Some(10));
        assert_eq!((config.width, config.height), (WIDTH, HEIGHT));
    }
}
