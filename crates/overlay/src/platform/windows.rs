//! Win32 window enumeration, cursor, outline highlight and input hooks

use crate::intercept::{
    Disposition, InputEvent, InputInterceptor, Key, MonitorCallback, MonitorScope, MouseButton,
    SubscriptionId, TapCallback,
};
use crate::locator::{WindowInfo, WindowListProvider};
use crate::tracking::CursorSource;
use crate::{HighlightGeometry, OverlayError, OverlayRenderer, OverlayResult};
use capture::platform::windows::primary_height;
use capture::{HelperWindows, Point, Rect, WindowId};
use crossbeam_channel::bounded;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use std::sync::{Arc, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{
    BOOL, COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM,
};
use windows::Win32::Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_CLOAKED};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreatePen, DeleteObject, EndPaint, GetStockObject, InvalidateRect, Rectangle,
    SelectObject, UpdateWindow, HOLLOW_BRUSH, PAINTSTRUCT, PS_SOLID,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    EnumWindows, GetAncestor, GetClassNameW, GetClientRect, GetCursorPos, GetMessageW, GetWindow,
    GetWindowLongW, GetWindowRect, GetWindowTextW, GetWindowThreadProcessId, IsWindowVisible,
    PeekMessageW, PostThreadMessageW, RegisterClassExW, SetWindowDisplayAffinity, SetWindowPos,
    SetWindowsHookExW, ShowWindow, TranslateMessage, UnhookWindowsHookEx, GA_ROOT, GWL_EXSTYLE,
    GWL_STYLE, GW_OWNER, HTTRANSPARENT, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT, PM_NOREMOVE,
    PM_REMOVE, SWP_NOACTIVATE, SWP_NOZORDER, SWP_SHOWWINDOW, SW_HIDE, SW_SHOWNOACTIVATE,
    WDA_EXCLUDEFROMCAPTURE, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_NCHITTEST, WM_PAINT, WM_QUIT, WM_RBUTTONDOWN, WM_SYSKEYDOWN, WM_USER, WNDCLASSEXW,
    WS_DISABLED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};

fn to_local(x: i32, y: i32) -> Point {
    Point::new(x as f64, primary_height() - y as f64)
}

// ---------------------------------------------------------------------------
// Window list
// ---------------------------------------------------------------------------

/// Top-level windows from `EnumWindows`, already in Z-order
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32WindowList;

impl WindowListProvider for Win32WindowList {
    fn on_screen_windows(&self) -> Vec<WindowInfo> {
        let mut windows = Vec::new();

        unsafe {
            let _ = EnumWindows(
                Some(enum_window_callback),
                LPARAM(&mut windows as *mut Vec<WindowInfo> as isize),
            );
        }

        windows
    }
}

unsafe extern "system" fn enum_window_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<WindowInfo>);

    if should_include_window(hwnd) {
        if let Some(info) = get_window_info(hwnd) {
            windows.push(info);
        }
    }

    BOOL(1) // Continue enumeration
}

unsafe fn should_include_window(hwnd: HWND) -> bool {
    if !IsWindowVisible(hwnd).as_bool() {
        return false;
    }

    let style = GetWindowLongW(hwnd, GWL_STYLE) as u32;
    if style & WS_DISABLED.0 != 0 {
        return false;
    }

    let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32;
    if ex_style & WS_EX_TOOLWINDOW.0 != 0 {
        return false;
    }

    // Cloaked windows live on another virtual desktop
    let mut cloaked: u32 = 0;
    if DwmGetWindowAttribute(
        hwnd,
        DWMWA_CLOAKED,
        &mut cloaked as *mut _ as *mut _,
        std::mem::size_of::<u32>() as u32,
    ).is_ok() && cloaked != 0 {
        return false;
    }

    if let Ok(owner) = GetWindow(hwnd, GW_OWNER) {
        if !owner.is_invalid() {
            return false;
        }
    }

    GetAncestor(hwnd, GA_ROOT) == hwnd
}

unsafe fn get_window_info(hwnd: HWND) -> Option<WindowInfo> {
    let mut rect = RECT::default();
    if GetWindowRect(hwnd, &mut rect).is_err() {
        return None;
    }

    let mut pid: u32 = 0;
    GetWindowThreadProcessId(hwnd, Some(&mut pid));

    let mut title_buf = [0u16; 256];
    let mut len = GetWindowTextW(hwnd, &mut title_buf);
    if len <= 0 {
        len = GetClassNameW(hwnd, &mut title_buf);
    }
    let title = if len > 0 {
        OsString::from_wide(&title_buf[..len as usize])
            .to_string_lossy()
            .into_owned()
    } else {
        String::new()
    };

    Some(WindowInfo {
        id: WindowId(hwnd.0 as isize as u64),
        bounds: Rect::new(
            rect.left as f64,
            rect.top as f64,
            (rect.right - rect.left) as f64,
            (rect.bottom - rect.top) as f64,
        ),
        owner_pid: pid,
        title,
    })
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Cursor;

impl CursorSource for Win32Cursor {
    fn location(&self) -> Point {
        let mut pt = POINT::default();
        unsafe {
            if GetCursorPos(&mut pt).is_err() {
                return Point::new(f64::NAN, f64::NAN);
            }
        }
        to_local(pt.x, pt.y)
    }
}

/// Dispatch pending messages for windows owned by this thread
pub fn pump_messages() {
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

// ---------------------------------------------------------------------------
// Outline highlight
// ---------------------------------------------------------------------------

const OUTLINE_CLASS: PCWSTR = w!("PinpointHighlight");
const OUTLINE_THICKNESS: i32 = 3;
const HIGHLIGHT_COLOR: COLORREF = COLORREF(0x00FF8800);
const SELECTION_COLOR: COLORREF = COLORREF(0x0000FF00);
const FLASH_COLOR: COLORREF = COLORREF(0x00FFFFFF);
const FLASH_DURATION: Duration = Duration::from_millis(120);

static REGISTER: Once = Once::new();
static OUTLINE_COLOR: Lazy<Mutex<COLORREF>> = Lazy::new(|| Mutex::new(HIGHLIGHT_COLOR));

fn register_class() -> OverlayResult<HINSTANCE> {
    let hmodule = unsafe { GetModuleHandleW(None)? };
    let hinstance = HINSTANCE(hmodule.0);

    REGISTER.call_once(|| unsafe {
        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(outline_wnd_proc),
            hInstance: hinstance,
            lpszClassName: OUTLINE_CLASS,
            ..Default::default()
        };

        let _ = RegisterClassExW(&wc);
    });

    Ok(hinstance)
}

/// Topmost, click-through outline window.
///
/// Excluded from captures with display affinity, so GDI blits never see it.
#[derive(Debug, Default)]
pub struct OutlineRenderer {
    hwnd: Option<isize>,
    crosshair: bool,
}

impl OutlineRenderer {
    /// Create the (hidden) outline window up front so its id can be excluded
    pub fn new() -> OverlayResult<Self> {
        let mut renderer = Self::default();
        renderer.ensure_window()?;
        Ok(renderer)
    }

    fn ensure_window(&mut self) -> OverlayResult<HWND> {
        if let Some(raw) = self.hwnd {
            return Ok(HWND(raw as *mut std::ffi::c_void));
        }

        let hinstance = register_class()?;
        let hwnd = unsafe {
            let hwnd = CreateWindowExW(
                WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_TRANSPARENT | WS_EX_NOACTIVATE,
                OUTLINE_CLASS,
                w!("Pinpoint Highlight"),
                WS_POPUP,
                0,
                0,
                1,
                1,
                None,
                None,
                hinstance,
                None,
            )?;
            if let Err(e) = SetWindowDisplayAffinity(hwnd, WDA_EXCLUDEFROMCAPTURE) {
                log::warn!("Highlight window may appear in captures: {e}");
            }
            hwnd
        };

        self.hwnd = Some(hwnd.0 as isize);
        Ok(hwnd)
    }

    fn place(&mut self, geometry: &HighlightGeometry, color: COLORREF) {
        *OUTLINE_COLOR.lock() = color;

        let hwnd = match self.ensure_window() {
            Ok(hwnd) => hwnd,
            Err(e) => {
                log::warn!("Cannot create highlight window: {e}");
                return;
            }
        };

        let r = geometry.global;
        unsafe {
            let _ = SetWindowPos(
                hwnd,
                None,
                r.x.floor() as i32,
                r.y.floor() as i32,
                r.width.ceil() as i32,
                r.height.ceil() as i32,
                SWP_NOZORDER | SWP_NOACTIVATE | SWP_SHOWWINDOW,
            );
            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
            let _ = InvalidateRect(hwnd, None, true);
            let _ = UpdateWindow(hwnd);
        }
        pump_messages();
    }
}

impl OverlayRenderer for OutlineRenderer {
    fn show_highlight(&mut self, geometry: &HighlightGeometry) {
        self.place(geometry, HIGHLIGHT_COLOR);
    }

    fn show_selection(&mut self, geometry: &HighlightGeometry) {
        self.place(geometry, SELECTION_COLOR);
    }

    fn hide(&mut self) {
        if let Some(raw) = self.hwnd {
            unsafe {
                let _ = ShowWindow(HWND(raw as *mut std::ffi::c_void), SW_HIDE);
            }
            pump_messages();
        }
    }

    /// Blocks for `FLASH_DURATION`; teardown hides the window right after
    fn flash(&mut self, geometry: &HighlightGeometry) {
        self.place(geometry, FLASH_COLOR);
        thread::sleep(FLASH_DURATION);
    }

    /// Win32 only lets a process set the cursor over its own windows, and the
    /// outline is click-through; the request is recorded, not applied.
    fn set_crosshair_cursor(&mut self, enabled: bool) {
        if self.crosshair != enabled {
            log::debug!("Crosshair cursor {}", if enabled { "requested" } else { "released" });
            self.crosshair = enabled;
        }
    }

    fn helper_windows(&self) -> HelperWindows {
        HelperWindows {
            highlight: self.hwnd.map(|raw| WindowId(raw as u64)),
            ..Default::default()
        }
    }
}

impl Drop for OutlineRenderer {
    fn drop(&mut self) {
        if let Some(raw) = self.hwnd.take() {
            unsafe {
                let _ = DestroyWindow(HWND(raw as *mut std::ffi::c_void));
            }
        }
    }
}

unsafe extern "system" fn outline_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_NCHITTEST => LRESULT(HTTRANSPARENT as isize),
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);

            let mut rect = RECT::default();
            let _ = GetClientRect(hwnd, &mut rect);

            let pen = CreatePen(PS_SOLID, OUTLINE_THICKNESS, *OUTLINE_COLOR.lock());
            let old_pen = SelectObject(hdc, pen);
            let old_brush = SelectObject(hdc, GetStockObject(HOLLOW_BRUSH));

            let _ = Rectangle(hdc, rect.left, rect.top, rect.right, rect.bottom);

            let _ = SelectObject(hdc, old_pen);
            let _ = SelectObject(hdc, old_brush);
            let _ = DeleteObject(pen);

            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

// ---------------------------------------------------------------------------
// Low-level input hooks
// ---------------------------------------------------------------------------

const HC_ACTION: i32 = 0;
const VK_ESCAPE: u32 = 0x1B;
const VK_RETURN: u32 = 0x0D;

#[derive(Default)]
struct HookRegistry {
    taps: Vec<(SubscriptionId, Arc<TapCallback>)>,
    monitors: Vec<(SubscriptionId, Arc<MonitorCallback>)>,
}

impl HookRegistry {
    fn is_empty(&self) -> bool {
        self.taps.is_empty() && self.monitors.is_empty()
    }
}

static HOOKS: Lazy<Mutex<HookRegistry>> = Lazy::new(|| Mutex::new(HookRegistry::default()));

/// Run callbacks outside the registry lock
fn dispatch(event: &InputEvent) -> Disposition {
    let (taps, monitors) = {
        let registry = HOOKS.lock();
        (
            registry.taps.iter().map(|(_, cb)| Arc::clone(cb)).collect::<Vec<_>>(),
            registry.monitors.iter().map(|(_, cb)| Arc::clone(cb)).collect::<Vec<_>>(),
        )
    };

    let mut disposition = Disposition::PassThrough;
    for tap in &taps {
        if tap(event) == Disposition::Swallow {
            disposition = Disposition::Swallow;
        }
    }
    for monitor in &monitors {
        monitor(event);
    }
    disposition
}

unsafe extern "system" fn mouse_hook(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION {
        let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
        let location = to_local(info.pt.x, info.pt.y);
        let event = match wparam.0 as u32 {
            WM_LBUTTONDOWN => Some(InputEvent::MouseDown { button: MouseButton::Left, location }),
            WM_RBUTTONDOWN => Some(InputEvent::MouseDown { button: MouseButton::Right, location }),
            WM_LBUTTONUP => Some(InputEvent::MouseUp { button: MouseButton::Left, location }),
            _ => None,
        };
        if let Some(event) = event {
            if dispatch(&event) == Disposition::Swallow {
                return LRESULT(1);
            }
        }
    }
    CallNextHookEx(None, code, wparam, lparam)
}

unsafe extern "system" fn keyboard_hook(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION && matches!(wparam.0 as u32, WM_KEYDOWN | WM_SYSKEYDOWN) {
        let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let key = match info.vkCode {
            VK_ESCAPE => Key::Escape,
            VK_RETURN => Key::Return,
            other => Key::Other(other),
        };
        if dispatch(&InputEvent::KeyDown(key)) == Disposition::Swallow {
            return LRESULT(1);
        }
    }
    CallNextHookEx(None, code, wparam, lparam)
}

struct HookThread {
    thread_id: u32,
    handle: JoinHandle<()>,
}

impl HookThread {
    /// Install both hooks on a dedicated thread that pumps their messages
    fn spawn() -> OverlayResult<Self> {
        let (tx, rx) = bounded::<Result<u32, String>>(1);

        let handle = thread::Builder::new()
            .name("input-hooks".into())
            .spawn(move || unsafe {
                let mut msg = MSG::default();
                // Create the message queue before anyone posts to it
                let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);

                let hinstance = match GetModuleHandleW(None) {
                    Ok(h) => HINSTANCE(h.0),
                    Err(e) => {
                        let _ = tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let mouse = SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook), hinstance, 0);
                let keyboard = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook), hinstance, 0);
                let (mouse, keyboard) = match (mouse, keyboard) {
                    (Ok(m), Ok(k)) => (m, k),
                    (m, k) => {
                        let mut reason = String::from("SetWindowsHookExW failed");
                        for hook in [m, k] {
                            match hook {
                                Ok(h) => {
                                    let _ = UnhookWindowsHookEx(h);
                                }
                                Err(e) => reason = e.to_string(),
                            }
                        }
                        let _ = tx.send(Err(reason));
                        return;
                    }
                };

                let _ = tx.send(Ok(GetCurrentThreadId()));

                loop {
                    let ret = GetMessageW(&mut msg, None, 0, 0);
                    if ret.0 <= 0 {
                        break;
                    }
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }

                let _ = UnhookWindowsHookEx(mouse);
                let _ = UnhookWindowsHookEx(keyboard);
            })
            .map_err(|e| OverlayError::InterceptionUnavailable(e.to_string()))?;

        match rx.recv() {
            Ok(Ok(thread_id)) => Ok(Self { thread_id, handle }),
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(OverlayError::InterceptionUnavailable(reason))
            }
            Err(_) => Err(OverlayError::InterceptionUnavailable("hook thread exited".into())),
        }
    }

    fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }

    fn stop(self) {
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        let _ = self.handle.join();
    }
}

/// `WH_MOUSE_LL` / `WH_KEYBOARD_LL` interception.
///
/// Both monitor scopes are served by the same keyboard hook. Windows drops a
/// hook that misses its timeout without telling anyone, so liveness is the
/// hook thread's.
#[derive(Default)]
pub struct LowLevelHooks {
    thread: Option<HookThread>,
    next_id: u64,
}

impl LowLevelHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    fn ensure_thread(&mut self) -> OverlayResult<()> {
        if self.thread.as_ref().map_or(false, HookThread::is_alive) {
            return Ok(());
        }
        if let Some(dead) = self.thread.take() {
            dead.stop();
        }
        self.thread = Some(HookThread::spawn()?);
        Ok(())
    }
}

impl InputInterceptor for LowLevelHooks {
    fn install_tap(&mut self, callback: TapCallback) -> OverlayResult<SubscriptionId> {
        self.ensure_thread()?;
        let id = self.next();
        HOOKS.lock().taps.push((id, Arc::new(callback)));
        Ok(id)
    }

    fn install_monitor(
        &mut self,
        scope: MonitorScope,
        callback: MonitorCallback,
    ) -> OverlayResult<SubscriptionId> {
        self.ensure_thread()?;
        let id = self.next();
        log::debug!("{scope:?} monitor {id:?} shares the low-level keyboard hook");
        HOOKS.lock().monitors.push((id, Arc::new(callback)));
        Ok(id)
    }

    fn is_tap_enabled(&self, id: SubscriptionId) -> bool {
        let registered = HOOKS.lock().taps.iter().any(|(t, _)| *t == id);
        registered && self.thread.as_ref().map_or(false, HookThread::is_alive)
    }

    fn enable_tap(&mut self, id: SubscriptionId) -> OverlayResult<()> {
        if !HOOKS.lock().taps.iter().any(|(t, _)| *t == id) {
            return Err(OverlayError::UnknownSubscription(id));
        }
        self.ensure_thread()
    }

    fn remove(&mut self, id: SubscriptionId) {
        let empty = {
            let mut registry = HOOKS.lock();
            registry.taps.retain(|(t, _)| *t != id);
            registry.monitors.retain(|(m, _)| *m != id);
            registry.is_empty()
        };
        if empty {
            if let Some(thread) = self.thread.take() {
                thread.stop();
            }
        }
    }
}

impl Drop for LowLevelHooks {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            thread.stop();
        }
    }
}
