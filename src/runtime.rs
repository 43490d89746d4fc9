use std::path::PathBuf;
use std::rc::{Rc, Weak};

use calloop::channel::{self, Sender};
use calloop::timer::{TimeoutAction, Timer};
use calloop::LoopHandle;
use chrono::{Local, Locale};

use crate::calendar::{self, time_locale};
use crate::canvas::Canvas;
use crate::clock;
use crate::host::{AppId, IconContent, IconSize, IconWidget, ShellHooks, SignalId};
use crate::session::{IconSession, SessionId, Sessions, next_tick};
use crate::settings::{FeatureFlags, KeyEffect, SettingsBackend};
use crate::theme::ThemeStore;
use crate::weather::{self, ForecastSnapshot, POLL_INTERVAL, WeatherClient};

/// Notifications delivered through the runtime's calloop channel.
#[derive(Debug)]
pub enum Event {
    SettingChanged(String),
    WeatherChanged(SessionId),
    IconThemeChanged,
}

/// Process-wide state: flags, theme, sessions and the collaborator
/// handles. The embedding host owns an `EventLoop<Runtime>` and
/// dispatches it; timers and change notifications land here.
pub struct Runtime {
    pub flags: FeatureFlags,
    pub theme: ThemeStore,
    pub sessions: Sessions,
    canvas: Canvas,
    locale: Locale,
    settings: Rc<dyn SettingsBackend>,
    weather: Rc<dyn WeatherClient>,
    hooks: Rc<dyn ShellHooks>,
    handle: LoopHandle<'static, Runtime>,
    events: Sender<Event>,
    settings_sub: Option<SignalId>,
    enabled: bool,
}

impl Runtime {
    pub fn new(
        handle: LoopHandle<'static, Runtime>,
        settings: Rc<dyn SettingsBackend>,
        weather: Rc<dyn WeatherClient>,
        hooks: Rc<dyn ShellHooks>,
        themes_root: PathBuf,
    ) -> anyhow::Result<Self> {
        let (events, source) = channel::channel();
        handle
            .insert_source(source, |event, _, rt: &mut Runtime| {
                if let channel::Event::Msg(event) = event {
                    rt.handle_event(event);
                }
            })
            .map_err(|err| anyhow::anyhow!("failed to insert event channel: {err}"))?;

        let flags = FeatureFlags::load(&*settings);
        Ok(Self {
            flags,
            theme: ThemeStore::new(themes_root),
            sessions: Sessions::default(),
            canvas: Canvas::new(),
            locale: time_locale(),
            settings,
            weather,
            hooks,
            handle,
            events,
            settings_sub: None,
            enabled: false,
        })
    }

    /// Sender for host glue that forwards external signals (e.g. the
    /// icon-theme-changed notification) into the loop.
    pub fn sender(&self) -> Sender<Event> {
        self.events.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Install the engine: read settings, load the theme, subscribe to
    /// setting changes and force the host to rebuild the target icons.
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.flags = FeatureFlags::load(&*self.settings);
        self.theme
            .reload(&self.flags.theme, self.hooks.system_icon_theme().as_deref(), &*self.hooks);
        let events = self.events.clone();
        self.settings_sub = Some(self.settings.connect_changed(Box::new(move |key| {
            let _ = events.send(Event::SettingChanged(key.to_owned()));
        })));
        self.enabled = true;
        log::info!("dynamic icons enabled");
        self.hooks.redisplay(&AppId::ALL);
    }

    /// Tear the engine down: sweep every session, release the settings
    /// subscription and the stylesheet, and let static icons return.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        for session in self.sessions.drain() {
            self.dispose(&session);
        }
        if let Some(sub) = self.settings_sub.take() {
            self.settings.disconnect(sub);
        }
        self.theme.unload(&*self.hooks);
        log::info!("dynamic icons disabled");
        self.hooks.redisplay(&AppId::ALL);
    }

    /// Icon-texture extension point. Hands back a live session when the
    /// app is one of ours and its feature flag is on; `None` lets the
    /// host fall through to its default icon.
    pub fn icon_for_app(
        &mut self,
        desktop_id: &str,
        size: IconSize,
        widget: Rc<dyn IconWidget>,
    ) -> Option<SessionId> {
        let app = AppId::from_desktop_id(desktop_id)?;
        if !self.enabled || !self.flags.enabled_for(app) {
            return None;
        }
        if self.theme.active().is_none() {
            log::debug!("no theme loaded, leaving {desktop_id} to the host");
            return None;
        }
        let session = self.sessions.create(app, size, widget);
        self.start(&session);
        Some(session.id)
    }

    /// Search-provider extension point; same contract at the host's
    /// provider icon size.
    pub fn search_provider_icon(
        &mut self,
        desktop_id: &str,
        widget: Rc<dyn IconWidget>,
    ) -> Option<SessionId> {
        let size = IconSize::Logical(self.hooks.provider_icon_size());
        self.icon_for_app(desktop_id, size, widget)
    }

    /// The widget behind `id` left the display tree.
    pub fn widget_detached(&mut self, id: SessionId) {
        if let Some(session) = self.sessions.get(id)
            && session.mark_detached()
        {
            self.dispose(&session);
        }
    }

    /// The host's icon theme changed; re-resolve ours against it.
    pub fn icon_theme_changed(&mut self) {
        self.reload_theme();
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::SettingChanged(key) => self.setting_changed(&key),
            Event::WeatherChanged(id) => {
                if let Some(session) = self.sessions.get(id) {
                    self.paint(&session);
                }
            }
            Event::IconThemeChanged => self.reload_theme(),
        }
    }

    fn setting_changed(&mut self, key: &str) {
        if !self.enabled {
            return;
        }
        match self.flags.apply(&*self.settings, key) {
            KeyEffect::Redisplay => self.hooks.redisplay(&AppId::ALL),
            KeyEffect::ReloadTheme => self.reload_theme(),
            KeyEffect::None => {}
        }
    }

    fn reload_theme(&mut self) {
        if !self.enabled {
            return;
        }
        self.theme
            .reload(&self.flags.theme, self.hooks.system_icon_theme().as_deref(), &*self.hooks);
        self.hooks.redisplay(&AppId::ALL);
    }

    fn start(&mut self, session: &Rc<IconSession>) {
        // First paint at zero delay, once the loop turns and the widget
        // has attached; never synchronously from the factory call.
        let weak = Rc::downgrade(session);
        match self
            .handle
            .insert_source(Timer::immediate(), move |_, _, rt: &mut Runtime| tick(rt, &weak))
        {
            Ok(token) => session.timer.set(Some(token)),
            Err(err) => log::error!("failed to schedule repaint timer: {err}"),
        }
        if session.app == AppId::Weather {
            let events = self.events.clone();
            let id = session.id;
            let sub = self.weather.connect_changed(Box::new(move || {
                let _ = events.send(Event::WeatherChanged(id));
            }));
            session.subscription.set(Some(sub));
        }
        session.activate();
    }

    /// Release everything a session owns. Safe to reach from both the
    /// detach path and the disable sweep; each resource is released at
    /// most once.
    fn dispose(&mut self, session: &Rc<IconSession>) {
        if !session.begin_dispose() {
            return;
        }
        if let Some(token) = session.timer.take() {
            self.handle.remove(token);
        }
        if let Some(sub) = session.subscription.take() {
            self.weather.disconnect(sub);
        }
        session.widget.release();
        self.sessions.remove(session.id);
        log::debug!("disposed {:?} session {:?}", session.app, session.id);
    }

    fn paint(&mut self, session: &IconSession) {
        // A timer may still fire while disposal is underway
        if !self.enabled || !session.is_live() {
            return;
        }
        let Some(theme) = self.theme.active().cloned() else {
            return;
        };
        let size = session.resolved_size();
        if size == 0 {
            return;
        }
        let (w, h) = session.widget.surface_size();
        let surface = if w == 0 || h == 0 { (size, size) } else { (w, h) };
        let style = session.widget.icon_style();
        let now = Local::now();

        match session.app {
            AppId::Calendar => {
                let img = calendar::render(
                    &mut self.canvas,
                    now.naive_local(),
                    surface,
                    size,
                    style,
                    &self.flags,
                    &theme,
                    self.locale,
                );
                session.widget.present(IconContent::Raster(&img));
            }
            AppId::Clocks => {
                let img = clock::render(now.naive_local(), surface, size, style, &self.flags, &theme);
                session.widget.present(IconContent::Raster(&img));
            }
            AppId::Weather => {
                let snapshot = ForecastSnapshot::capture(&*self.weather, now);
                let art = weather::render(snapshot.as_ref(), size as f32, style, &self.flags, &theme);
                session.widget.present(IconContent::Weather(&art));
            }
        }
    }
}

fn tick(rt: &mut Runtime, weak: &Weak<IconSession>) -> TimeoutAction {
    let Some(session) = weak.upgrade() else {
        return TimeoutAction::Drop;
    };
    if !session.is_live() {
        // disposal won the race with an already-scheduled fire
        return TimeoutAction::Drop;
    }
    rt.paint(&session);
    match session.app {
        AppId::Weather => TimeoutAction::ToDuration(POLL_INTERVAL),
        _ => TimeoutAction::ToDuration(next_tick()),
    }
}
