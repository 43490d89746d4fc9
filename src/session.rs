use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use calloop::RegistrationToken;
use chrono::Local;

use crate::host::{
    AppId, DASH_PLACEHOLDER_MARKER, DASH_PLACEHOLDER_SIZE, IconSize, IconWidget, SignalId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Detached,
    Disposed,
}

/// One live dynamic-icon occurrence, bound to one host widget. Owns its
/// timer registration and (for weather) its data subscription outright;
/// everything else is borrowed through the runtime.
pub struct IconSession {
    pub id: SessionId,
    pub app: AppId,
    pub requested: IconSize,
    /// Scale-adjusted pixel size; `None` follows the widget allocation.
    pub pixel_size: Option<u32>,
    pub widget: Rc<dyn IconWidget>,
    state: Cell<SessionState>,
    pub(crate) timer: Cell<Option<RegistrationToken>>,
    pub(crate) subscription: Cell<Option<SignalId>>,
    persistent: bool,
}

impl IconSession {
    pub(crate) fn new(id: SessionId, app: AppId, requested: IconSize, widget: Rc<dyn IconWidget>) -> Rc<Self> {
        let pixel_size = match requested {
            IconSize::Natural => None,
            IconSize::Logical(s) => Some((s as f32 * widget.scale_factor()).round() as u32),
        };
        let persistent = requested == IconSize::Logical(DASH_PLACEHOLDER_SIZE)
            && widget.style_marker() == Some(DASH_PLACEHOLDER_MARKER);
        Rc::new(Self {
            id,
            app,
            requested,
            pixel_size,
            widget,
            state: Cell::new(SessionState::Created),
            timer: Cell::new(None),
            subscription: Cell::new(None),
            persistent,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Repaints are only allowed while this holds.
    pub fn is_live(&self) -> bool {
        matches!(self.state.get(), SessionState::Created | SessionState::Active)
    }

    pub(crate) fn activate(&self) {
        if self.state.get() == SessionState::Created {
            self.state.set(SessionState::Active);
        }
    }

    /// The widget left the display tree. Returns whether the session
    /// should be disposed; the persistent dash placeholder stays.
    pub(crate) fn mark_detached(&self) -> bool {
        if self.persistent || !self.is_live() {
            return false;
        }
        self.state.set(SessionState::Detached);
        true
    }

    /// Flip into `Disposed`; true only for the caller that got there
    /// first, so releases happen exactly once.
    pub(crate) fn begin_dispose(&self) -> bool {
        if self.state.get() == SessionState::Disposed {
            return false;
        }
        self.state.set(SessionState::Disposed);
        true
    }

    /// Pixel size to paint at: the scale-adjusted request, or the
    /// widget's own allocation when the request was natural.
    pub fn resolved_size(&self) -> u32 {
        self.pixel_size.unwrap_or_else(|| {
            let (w, h) = self.widget.surface_size();
            w.min(h)
        })
    }
}

/// Duration until the next wall-clock second, so repaints land on the
/// tick.
pub fn next_tick() -> Duration {
    let ms_in_current_sec = Local::now().timestamp_subsec_millis();
    Duration::from_millis((1000 - ms_in_current_sec) as u64)
}

#[derive(Default)]
pub struct Sessions {
    items: Vec<Rc<IconSession>>,
    next: u64,
}

impl Sessions {
    pub fn create(&mut self, app: AppId, requested: IconSize, widget: Rc<dyn IconWidget>) -> Rc<IconSession> {
        self.next += 1;
        let session = IconSession::new(SessionId(self.next), app, requested, widget);
        self.items.push(session.clone());
        session
    }

    pub fn get(&self, id: SessionId) -> Option<Rc<IconSession>> {
        self.items.iter().find(|s| s.id == id).cloned()
    }

    pub fn remove(&mut self, id: SessionId) {
        self.items.retain(|s| s.id != id);
    }

    pub fn drain(&mut self) -> Vec<Rc<IconSession>> {
        std::mem::take(&mut self.items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
