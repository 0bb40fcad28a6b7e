//! Win32 display enumeration and GDI capture
//!
//! The process is per-monitor DPI aware, so Win32 coordinates are physical
//! pixels and this backend reports a 1:1 point-to-pixel space. Win32 virtual
//! desktop coordinates already match the global basis (origin at the primary
//! monitor's top-left, y down); local frames are derived by flipping around
//! the primary monitor's bottom edge.

use crate::frame::RawCapture;
use crate::geometry::Rect;
use crate::resolver::{CaptureRegion, DisplayCaptureRequest, DisplayCapturer, PlatformCaptureError};
use crate::screen::{DisplayProvider, ScreenDescriptor, ScreenId};
use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject,
    EnumDisplayMonitors, GetDC, GetDIBits, GetMonitorInfoW, ReleaseDC, SelectObject,
    SetStretchBltMode, StretchBlt, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
    HALFTONE, HDC, HMONITOR, MONITORINFO, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CYSCREEN};

const MONITORINFOF_PRIMARY: u32 = 1;

#[derive(Debug, Clone, Copy)]
struct MonitorEntry {
    id: ScreenId,
    rect: RECT,
    primary: bool,
}

fn enumerate_monitors() -> Vec<MonitorEntry> {
    let mut monitors: Vec<MonitorEntry> = Vec::new();

    unsafe {
        let _ = EnumDisplayMonitors(
            None,
            None,
            Some(enum_monitor_callback),
            LPARAM(&mut monitors as *mut Vec<MonitorEntry> as isize),
        );
    }

    monitors
}

unsafe extern "system" fn enum_monitor_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _clip: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let monitors = &mut *(lparam.0 as *mut Vec<MonitorEntry>);

    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    if GetMonitorInfoW(hmonitor, &mut info).as_bool() {
        monitors.push(MonitorEntry {
            id: ScreenId(hmonitor.0 as isize as u64),
            rect: info.rcMonitor,
            primary: info.dwFlags & MONITORINFOF_PRIMARY != 0,
        });
    }

    BOOL(1) // Continue enumeration
}

/// Height of the primary monitor, the pivot between local and global bases
pub fn primary_height() -> f64 {
    unsafe { GetSystemMetrics(SM_CYSCREEN) as f64 }
}

/// Monitors reported by `EnumDisplayMonitors`
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Displays;

impl DisplayProvider for Win32Displays {
    fn screens(&self) -> Vec<ScreenDescriptor> {
        let monitors = enumerate_monitors();
        let pivot = monitors
            .iter()
            .find(|m| m.primary)
            .map(|m| m.rect.bottom as f64)
            .unwrap_or_else(primary_height);

        monitors
            .iter()
            .map(|m| {
                let width = (m.rect.right - m.rect.left) as f64;
                let height = (m.rect.bottom - m.rect.top) as f64;
                let frame = Rect::new(
                    m.rect.left as f64,
                    pivot - m.rect.bottom as f64,
                    width,
                    height,
                );
                let screen = ScreenDescriptor::new(m.id, frame);
                if m.primary {
                    screen.primary()
                } else {
                    screen
                }
            })
            .collect()
    }

    fn main_display_id(&self) -> Option<ScreenId> {
        enumerate_monitors().into_iter().find(|m| m.primary).map(|m| m.id)
    }
}

/// Screen capture through GDI blits from the desktop DC.
///
/// GDI cannot filter windows per call; helper windows keep themselves out of
/// captures with display affinity when they are created.
#[derive(Debug, Default, Clone, Copy)]
pub struct GdiCapturer;

impl DisplayCapturer for GdiCapturer {
    fn capture_display(
        &self,
        request: &DisplayCaptureRequest,
    ) -> Result<RawCapture, PlatformCaptureError> {
        let monitor = enumerate_monitors()
            .into_iter()
            .find(|m| m.id == request.display)
            .ok_or_else(|| {
                PlatformCaptureError::Failed(format!("display {} is gone", request.display))
            })?;

        let (src_x, src_y, src_w, src_h) = match request.region {
            CaptureRegion::FullDisplay => (
                monitor.rect.left,
                monitor.rect.top,
                monitor.rect.right - monitor.rect.left,
                monitor.rect.bottom - monitor.rect.top,
            ),
            CaptureRegion::Region(r) => (
                monitor.rect.left + r.x,
                monitor.rect.top + r.y,
                r.width as i32,
                r.height as i32,
            ),
        };
        let out_w = request.output_width as i32;
        let out_h = request.output_height as i32;

        if out_w <= 0 || out_h <= 0 {
            return Err(PlatformCaptureError::Failed("empty output size".into()));
        }
        if !request.excluded_windows.is_empty() {
            log::debug!(
                "GDI capture relies on display affinity for {} excluded window(s)",
                request.excluded_windows.len()
            );
        }

        unsafe {
            let screen_dc = GetDC(None);
            if screen_dc.is_invalid() {
                return Err(PlatformCaptureError::Failed("Failed to get screen DC".into()));
            }

            let mem_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, out_w, out_h);
            let old_bitmap = SelectObject(mem_dc, bitmap);

            let copied = if out_w == src_w && out_h == src_h {
                BitBlt(mem_dc, 0, 0, out_w, out_h, screen_dc, src_x, src_y, SRCCOPY)
                    .map_err(|e| e.to_string())
            } else {
                let _ = SetStretchBltMode(mem_dc, HALFTONE);
                let stretched = StretchBlt(
                    mem_dc, 0, 0, out_w, out_h, screen_dc, src_x, src_y, src_w, src_h, SRCCOPY,
                );
                if stretched.as_bool() {
                    Ok(())
                } else {
                    Err("StretchBlt failed".to_string())
                }
            };

            let mut bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: out_w,
                    biHeight: -out_h, // Top-down DIB
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    biSizeImage: 0,
                    biXPelsPerMeter: 0,
                    biYPelsPerMeter: 0,
                    biClrUsed: 0,
                    biClrImportant: 0,
                },
                bmiColors: [Default::default()],
            };

            let mut data = vec![0u8; (out_w as usize) * (out_h as usize) * 4];
            let lines = if copied.is_ok() {
                GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    out_h as u32,
                    Some(data.as_mut_ptr() as *mut _),
                    &mut bmi,
                    DIB_RGB_COLORS,
                )
            } else {
                0
            };

            // Cleanup
            let _ = SelectObject(mem_dc, old_bitmap);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            let _ = ReleaseDC(None, screen_dc);

            copied.map_err(PlatformCaptureError::Failed)?;
            if lines != out_h {
                return Err(PlatformCaptureError::Failed(format!(
                    "GetDIBits returned {lines} of {out_h} rows"
                )));
            }

            Ok(RawCapture::packed(data, out_w as u32, out_h as u32))
        }
    }
}
