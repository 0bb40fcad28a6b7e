//! Pinpoint - capture an element, area, window or screen to PNG

use anyhow::{anyhow, bail};
use capture::CaptureMode;
use std::path::PathBuf;

const USAGE: &str = "usage: pinpoint <element|area|window|fullscreen> [out.png]";

fn parse_mode(arg: &str) -> anyhow::Result<CaptureMode> {
    match arg {
        "element" => Ok(CaptureMode::Element),
        "area" => Ok(CaptureMode::Area),
        "window" => Ok(CaptureMode::Window),
        "fullscreen" => Ok(CaptureMode::Fullscreen),
        other => bail!("unknown mode {other:?}\n{USAGE}"),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let mode = parse_mode(&args.next().ok_or_else(|| anyhow!(USAGE))?)?;
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pinpoint.png"));

    run(mode, output)
}

#[cfg(windows)]
fn run(mode: CaptureMode, output: PathBuf) -> anyhow::Result<()> {
    use anyhow::Context;
    use capture::platform::windows::{GdiCapturer, Win32Displays};
    use capture::{CaptureResult, CapturedImage};
    use crossbeam_channel::{bounded, Sender};
    use overlay::platform::windows::{LowLevelHooks, OutlineRenderer, Win32Cursor, Win32WindowList};
    use overlay::NoAccessibility;
    use session::{
        AlwaysGranted, CaptureConsumer, CaptureCoordinator, NoObserver, Platform, SessionConfig,
    };
    use std::sync::Arc;
    use windows::Win32::UI::HiDpi::{
        SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    };

    /// Writes the capture as PNG and reports the outcome
    struct PngWriter {
        path: PathBuf,
        done: Sender<anyhow::Result<(u32, u32)>>,
    }

    impl CaptureConsumer for PngWriter {
        fn deliver(&mut self, result: CaptureResult<CapturedImage>) {
            let outcome = result
                .context("capture failed")
                .and_then(|image| {
                    let rgba = image.to_rgba_image()?;
                    rgba.save(&self.path)
                        .with_context(|| format!("cannot write {}", self.path.display()))?;
                    Ok((image.width, image.height))
                });
            let _ = self.done.send(outcome);
        }
    }

    // Physical pixels everywhere, so points and pixels coincide
    unsafe {
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
    }

    let (done_tx, done_rx) = bounded(1);
    let platform = Platform {
        displays: Box::new(Win32Displays),
        cursor: Box::new(Win32Cursor),
        accessibility: Box::new(NoAccessibility),
        windows: Box::new(Win32WindowList),
        capturer: Arc::new(GdiCapturer),
        interceptor: Box::new(LowLevelHooks::new()),
        renderer: Box::new(OutlineRenderer::new()?),
        permissions: Box::new(AlwaysGranted),
        consumer: Box::new(PngWriter {
            path: output.clone(),
            done: done_tx,
        }),
        observer: Box::new(NoObserver),
    };

    let mut coordinator = CaptureCoordinator::new(platform, SessionConfig::default());
    coordinator.start(mode)?;
    if matches!(mode, CaptureMode::Element | CaptureMode::Area) {
        log::info!("{}  (Esc to cancel)", coordinator.state().display_text());
    }
    coordinator.run();

    match done_rx.try_recv() {
        Ok(Ok((width, height))) => {
            log::info!("Saved {width}x{height} to {}", output.display());
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => bail!("cancelled"),
    }
}

#[cfg(not(windows))]
fn run(_mode: CaptureMode, _output: PathBuf) -> anyhow::Result<()> {
    bail!("pinpoint has a Windows backend only; this platform is unsupported")
}
