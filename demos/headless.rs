//! Drives a surface bridge without a window.
//!
//! A fake engine runs on its own thread and answers navigation with a load: it paints a
//! new page, opens a popup and finishes loading a little later. The host loop pumps events,
//! composites every frame in software and writes a few frames as PNG files.
//!
//! ```text
//! RUST_LOG=debug cargo run --example headless -- /tmp/frames
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use surface_bridge::bridge::PaintUpdate;
use surface_bridge::render::backends::cpu::CpuBackend;
use surface_bridge::render::compositor::cpu::CpuCompositor;
use surface_bridge::render::{PixelRect, RgbaImage};
use surface_bridge::{BridgeEvent, ChannelLink, EngineCommand, EventSender, PaintTarget, SurfaceBridge, WidgetId};
use tokio::sync::mpsc::UnboundedReceiver;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const FRAME: Duration = Duration::from_millis(16);

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let out_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)?;

    let (link, events, commands) = ChannelLink::new();
    let engine = thread::spawn(move || fake_engine(events, commands));

    let mut bridge = SurfaceBridge::builder().build(CpuBackend::new(), link)?;
    bridge.resize(WIDTH, HEIGHT)?;
    // Let the engine paint the initial page before navigating away from it.
    thread::sleep(Duration::from_millis(50));
    bridge.pump_events()?;
    bridge.navigate("https://example.org/next")?;

    let mut sink = CpuCompositor::new(WIDTH, HEIGHT, [40, 40, 40, 255], bridge.config().max_blur_radius);
    for frame in 0..60 {
        bridge.pump_events()?;
        bridge.drain_retired();

        bridge.composite().present(&mut sink)?;
        if frame % 15 == 0 || frame == 59 {
            let (direction, progress) = bridge.transition();
            let path = out_dir.join(format!("frame-{frame:02}.png"));
            log::info!("frame {frame}: {direction:?} at {progress:.2}, writing {}", path.display());
            write_png(&path, sink.image())?;
        }

        thread::sleep(FRAME);
    }

    bridge.shutdown();
    if engine.join().is_err() {
        anyhow::bail!("engine thread panicked");
    }
    Ok(())
}

/// Answers commands until the bridge goes away.
fn fake_engine(events: EventSender, mut commands: UnboundedReceiver<EngineCommand>) {
    let popup = WidgetId::new(1);

    while let Some(cmd) = commands.blocking_recv() {
        let sent = match cmd {
            EngineCommand::Resized { width, height } => events.send(gradient(width, height, [200, 120, 40])),
            EngineCommand::Navigate { url } => {
                log::info!("engine: loading {url}");
                let popup_rect = PixelRect::new(200, 20, 100, 60);
                let result = events
                    .send(BridgeEvent::LoadingStateChanged { is_loading: true })
                    .and_then(|_| events.send(gradient(WIDTH, HEIGHT, [40, 160, 220])))
                    .and_then(|_| {
                        events.send(BridgeEvent::WidgetCreated {
                            widget: popup,
                            rect: popup_rect,
                            z_index: 1,
                        })
                    })
                    .and_then(|_| {
                        events.send(BridgeEvent::Paint(PaintUpdate::solid(
                            PaintTarget::Widget(popup),
                            PixelRect::from_size(popup_rect.width, popup_rect.height),
                            [250, 250, 250, 255],
                        )))
                    });
                thread::sleep(Duration::from_millis(300));
                result.and_then(|_| events.send(BridgeEvent::LoadingStateChanged { is_loading: false }))
            }
        };
        if sent.is_err() {
            break;
        }
    }
}

/// A full page paint: vertical gradient from black to `rgb`.
fn gradient(width: u32, height: u32, rgb: [u8; 3]) -> BridgeEvent {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let t = y as f32 / height.max(1) as f32;
        let [r, g, b] = rgb.map(|c| (c as f32 * t) as u8);
        for _ in 0..width {
            // Premultiplied BGRA.
            pixels.extend_from_slice(&[b, g, r, 255]);
        }
    }
    BridgeEvent::Paint(PaintUpdate::new(PaintTarget::Primary, PixelRect::from_size(width, height), pixels))
}

fn write_png(path: &Path, image: &RgbaImage) -> anyhow::Result<()> {
    let mut rgba = Vec::with_capacity((image.width * image.height * 4) as usize);
    for y in 0..image.height {
        for px in image.row(y).unwrap_or_default().chunks_exact(4) {
            let [b, g, r, a] = [px[0], px[1], px[2], px[3]];
            let unpremul = |c: u8| if a == 0 { 0 } else { ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8 };
            rgba.extend_from_slice(&[unpremul(r), unpremul(g), unpremul(b), a]);
        }
    }

    let file = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(file, image.width, image.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgba)?;
    Ok(())
}
