//! End-to-end lifecycle: sessions created through the factory entry
//! points, painted from calloop timers, and torn down from both the
//! detach path and the disable sweep.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use calloop::EventLoop;
use chrono::{Local, TimeDelta};
use livery::weather::{ForecastEntry, WeatherClient};
use livery::{
    AppId, CALENDAR_APP, CLOCKS_APP, IconContent, IconSize, IconStyle, IconWidget, Runtime,
    SettingsBackend, ShellHooks, SignalId, WEATHER_APP, WeatherIcon,
};

#[derive(Default)]
struct MemorySettings {
    booleans: RefCell<HashMap<String, bool>>,
    strings: RefCell<HashMap<String, String>>,
    callbacks: RefCell<Vec<(SignalId, Box<dyn Fn(&str)>)>>,
    next: Cell<u64>,
    disconnects: Cell<usize>,
}

impl MemorySettings {
    fn set_boolean(&self, key: &str, value: bool) {
        self.booleans.borrow_mut().insert(key.into(), value);
    }

    fn set_string(&self, key: &str, value: &str) {
        self.strings.borrow_mut().insert(key.into(), value.into());
    }

    fn fire(&self, key: &str) {
        for (_, callback) in self.callbacks.borrow().iter() {
            callback(key);
        }
    }
}

impl SettingsBackend for MemorySettings {
    fn boolean(&self, key: &str) -> bool {
        self.booleans.borrow().get(key).copied().unwrap_or(false)
    }
    fn string(&self, key: &str) -> String {
        self.strings.borrow().get(key).cloned().unwrap_or_default()
    }
    fn connect_changed(&self, callback: Box<dyn Fn(&str)>) -> SignalId {
        self.next.set(self.next.get() + 1);
        let id = SignalId(self.next.get());
        self.callbacks.borrow_mut().push((id, callback));
        id
    }
    fn disconnect(&self, id: SignalId) {
        self.callbacks.borrow_mut().retain(|(sid, _)| *sid != id);
        self.disconnects.set(self.disconnects.get() + 1);
    }
}

#[derive(Default)]
struct MockWeather {
    forecasts: RefCell<Vec<ForecastEntry>>,
    callbacks: RefCell<Vec<(SignalId, Box<dyn Fn()>)>>,
    next: Cell<u64>,
    disconnects: Cell<usize>,
}

impl MockWeather {
    fn set_forecast(&self, temperature: f64) {
        *self.forecasts.borrow_mut() = vec![ForecastEntry {
            updated: Local::now() - TimeDelta::seconds(60),
            temperature,
            icon: "weather-clear".into(),
            symbolic_icon: "weather-clear-symbolic".into(),
        }];
    }

    fn fire_changed(&self) {
        for (_, callback) in self.callbacks.borrow().iter() {
            callback();
        }
    }

    fn connected(&self) -> usize {
        self.callbacks.borrow().len()
    }
}

impl WeatherClient for MockWeather {
    fn available(&self) -> bool {
        true
    }
    fn has_location(&self) -> bool {
        true
    }
    fn info_valid(&self) -> bool {
        true
    }
    fn forecasts(&self) -> Vec<ForecastEntry> {
        self.forecasts.borrow().clone()
    }
    fn connect_changed(&self, callback: Box<dyn Fn()>) -> SignalId {
        self.next.set(self.next.get() + 1);
        let id = SignalId(self.next.get());
        self.callbacks.borrow_mut().push((id, callback));
        id
    }
    fn disconnect(&self, id: SignalId) {
        self.callbacks.borrow_mut().retain(|(sid, _)| *sid != id);
        self.disconnects.set(self.disconnects.get() + 1);
    }
}

#[derive(Default)]
struct RecordingHooks {
    redisplays: Cell<usize>,
}

impl ShellHooks for RecordingHooks {
    fn system_icon_theme(&self) -> Option<String> {
        None
    }
    fn load_stylesheet(&self, _path: &Path) {}
    fn unload_stylesheet(&self, _path: &Path) {}
    fn redisplay(&self, apps: &[AppId]) {
        assert_eq!(apps, AppId::ALL.as_slice());
        self.redisplays.set(self.redisplays.get() + 1);
    }
}

struct TestWidget {
    surface: (u32, u32),
    style: IconStyle,
    marker: Option<&'static str>,
    presents: Cell<usize>,
    releases: Cell<usize>,
    raster_size: Cell<Option<(u32, u32)>>,
    weather_art: RefCell<Option<WeatherIcon>>,
}

impl TestWidget {
    fn new(surface: (u32, u32)) -> Rc<Self> {
        Rc::new(Self {
            surface,
            style: IconStyle::FullColor,
            marker: None,
            presents: Cell::new(0),
            releases: Cell::new(0),
            raster_size: Cell::new(None),
            weather_art: RefCell::new(None),
        })
    }

    fn placeholder() -> Rc<Self> {
        Rc::new(Self {
            surface: (32, 32),
            style: IconStyle::FullColor,
            marker: Some("dash-placeholder"),
            presents: Cell::new(0),
            releases: Cell::new(0),
            raster_size: Cell::new(None),
            weather_art: RefCell::new(None),
        })
    }
}

impl IconWidget for TestWidget {
    fn surface_size(&self) -> (u32, u32) {
        self.surface
    }
    fn icon_style(&self) -> IconStyle {
        self.style
    }
    fn present(&self, content: IconContent<'_>) {
        self.presents.set(self.presents.get() + 1);
        match content {
            IconContent::Raster(img) => self.raster_size.set(Some((img.width(), img.height()))),
            IconContent::Weather(art) => *self.weather_art.borrow_mut() = Some(art.clone()),
        }
    }
    fn style_marker(&self) -> Option<&str> {
        self.marker
    }
    fn release(&self) {
        self.releases.set(self.releases.get() + 1);
    }
}

fn write_theme(root: &Path, id: &str, json: &str) {
    let dir = root.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("theme.json"), json).unwrap();
    let png = image::RgbaImage::from_pixel(8, 8, image::Rgba([40, 40, 40, 255]));
    for name in [
        "calendar",
        "calendar-symbolic",
        "clocks",
        "clocks-symbolic",
        "hour",
        "hour-symbolic",
        "minute",
        "minute-symbolic",
        "second",
    ] {
        png.save(dir.join(format!("{name}.png"))).unwrap();
    }
}

struct Fixture {
    event_loop: EventLoop<'static, Runtime>,
    rt: Runtime,
    settings: Rc<MemorySettings>,
    weather: Rc<MockWeather>,
    hooks: Rc<RecordingHooks>,
    themes: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let themes = tempfile::tempdir().unwrap();
        write_theme(themes.path(), "default", "{}");

        let settings = Rc::new(MemorySettings::default());
        settings.set_boolean("calendar", true);
        settings.set_boolean("clocks", true);
        settings.set_boolean("weather", true);
        settings.set_boolean("show-background", true);
        settings.set_boolean("show-temperature", true);

        let weather = Rc::new(MockWeather::default());
        weather.set_forecast(21.6);
        let hooks = Rc::new(RecordingHooks::default());

        let event_loop: EventLoop<'static, Runtime> = EventLoop::try_new().unwrap();
        let rt = Runtime::new(
            event_loop.handle(),
            settings.clone(),
            weather.clone(),
            hooks.clone(),
            themes.path().into(),
        )
        .unwrap();

        Self {
            event_loop,
            rt,
            settings,
            weather,
            hooks,
            themes,
        }
    }

    fn dispatch(&mut self) {
        self.event_loop
            .dispatch(Some(Duration::from_millis(50)), &mut self.rt)
            .unwrap();
    }
}

#[test]
fn first_paint_is_scheduled_not_synchronous() {
    let mut fx = Fixture::new();
    fx.rt.enable();

    let widget = TestWidget::new((64, 64));
    let id = fx.rt.icon_for_app(CLOCKS_APP, IconSize::Logical(64), widget.clone());
    assert!(id.is_some());
    assert_eq!(widget.presents.get(), 0);

    fx.dispatch();
    assert!(widget.presents.get() >= 1);
    assert_eq!(widget.raster_size.get(), Some((64, 64)));
}

#[test]
fn factory_declines_when_it_should() {
    let mut fx = Fixture::new();

    // not enabled yet
    let widget = TestWidget::new((64, 64));
    assert!(fx.rt.icon_for_app(CLOCKS_APP, IconSize::Logical(64), widget).is_none());

    fx.rt.enable();

    // not one of the three apps
    let widget = TestWidget::new((64, 64));
    assert!(fx.rt.icon_for_app("org.gnome.Maps.desktop", IconSize::Logical(64), widget).is_none());

    // family flag off
    fx.settings.set_boolean("calendar", false);
    fx.settings.fire("calendar");
    fx.dispatch();
    let widget = TestWidget::new((64, 64));
    assert!(fx.rt.icon_for_app(CALENDAR_APP, IconSize::Logical(64), widget).is_none());
    let widget = TestWidget::new((64, 64));
    assert!(fx.rt.icon_for_app(CLOCKS_APP, IconSize::Logical(64), widget).is_some());
}

#[test]
fn factory_declines_without_a_loadable_theme() {
    let mut fx = Fixture::new();
    std::fs::remove_dir_all(fx.themes.path().join("default")).unwrap();
    fx.rt.enable();

    let widget = TestWidget::new((64, 64));
    assert!(fx.rt.icon_for_app(CLOCKS_APP, IconSize::Logical(64), widget).is_none());
}

#[test]
fn detach_disposes_exactly_once() {
    let mut fx = Fixture::new();
    fx.rt.enable();

    let widget = TestWidget::new((64, 64));
    let id = fx.rt.icon_for_app(CALENDAR_APP, IconSize::Logical(64), widget.clone()).unwrap();
    fx.dispatch();
    assert_eq!(fx.rt.sessions.len(), 1);

    // detach signal, then the disable-sweep path hits the same session
    fx.rt.widget_detached(id);
    fx.rt.widget_detached(id);
    assert!(fx.rt.sessions.is_empty());
    assert_eq!(widget.releases.get(), 1);

    // nothing repaints a disposed session
    let before = widget.presents.get();
    fx.dispatch();
    assert_eq!(widget.presents.get(), before);
}

#[test]
fn weather_sessions_subscribe_and_repaint_on_change() {
    let mut fx = Fixture::new();
    fx.rt.enable();

    let widget = TestWidget::new((64, 64));
    let id = fx.rt.icon_for_app(WEATHER_APP, IconSize::Logical(64), widget.clone()).unwrap();
    assert_eq!(fx.weather.connected(), 1);

    fx.dispatch();
    assert_eq!(widget.presents.get(), 1);
    match &*widget.weather_art.borrow() {
        Some(WeatherIcon::Composite { glyph, label, .. }) => {
            assert_eq!(glyph, "weather-clear");
            assert_eq!(label.as_ref().unwrap().text, "22°");
        }
        other => panic!("unexpected weather content: {other:?}"),
    }

    fx.weather.set_forecast(-3.2);
    fx.weather.fire_changed();
    fx.dispatch();
    assert_eq!(widget.presents.get(), 2);
    match &*widget.weather_art.borrow() {
        Some(WeatherIcon::Composite { label, .. }) => {
            assert_eq!(label.as_ref().unwrap().text, "-3°");
        }
        other => panic!("unexpected weather content: {other:?}"),
    }

    // a change event already in flight when the session dies is a no-op
    fx.weather.fire_changed();
    fx.rt.widget_detached(id);
    assert_eq!(fx.weather.disconnects.get(), 1);
    fx.dispatch();
    assert_eq!(widget.presents.get(), 2);
}

#[test]
fn dash_placeholder_survives_detach_but_not_disable() {
    let mut fx = Fixture::new();
    fx.rt.enable();

    let widget = TestWidget::placeholder();
    let id = fx.rt.icon_for_app(CLOCKS_APP, IconSize::Logical(32), widget.clone()).unwrap();
    fx.dispatch();

    fx.rt.widget_detached(id);
    assert_eq!(fx.rt.sessions.len(), 1);
    assert_eq!(widget.releases.get(), 0);

    fx.rt.disable();
    assert!(fx.rt.sessions.is_empty());
    assert_eq!(widget.releases.get(), 1);
}

#[test]
fn disable_sweeps_sessions_and_subscriptions() {
    let mut fx = Fixture::new();
    fx.rt.enable();
    let enabled_redisplays = fx.hooks.redisplays.get();

    let calendar = TestWidget::new((64, 64));
    let weather = TestWidget::new((64, 64));
    fx.rt.icon_for_app(CALENDAR_APP, IconSize::Logical(64), calendar.clone()).unwrap();
    fx.rt.icon_for_app(WEATHER_APP, IconSize::Natural, weather.clone()).unwrap();
    fx.dispatch();

    fx.rt.disable();
    assert!(fx.rt.sessions.is_empty());
    assert_eq!(calendar.releases.get(), 1);
    assert_eq!(weather.releases.get(), 1);
    assert_eq!(fx.weather.disconnects.get(), 1);
    assert_eq!(fx.settings.disconnects.get(), 1);
    assert_eq!(fx.hooks.redisplays.get(), enabled_redisplays + 1);

    // disabling twice releases nothing twice
    fx.rt.disable();
    assert_eq!(calendar.releases.get(), 1);
    assert_eq!(fx.settings.disconnects.get(), 1);

    let widget = TestWidget::new((64, 64));
    assert!(fx.rt.icon_for_app(CLOCKS_APP, IconSize::Logical(64), widget).is_none());
}

#[test]
fn family_toggles_force_a_redisplay() {
    let mut fx = Fixture::new();
    fx.rt.enable();
    let baseline = fx.hooks.redisplays.get();

    fx.settings.set_boolean("clocks", false);
    fx.settings.fire("clocks");
    fx.dispatch();
    assert_eq!(fx.hooks.redisplays.get(), baseline + 1);
    assert!(!fx.rt.flags.clocks);

    // display sub-options change silently
    fx.settings.set_boolean("show-seconds", true);
    fx.settings.fire("show-seconds");
    fx.dispatch();
    assert_eq!(fx.hooks.redisplays.get(), baseline + 1);
    assert!(fx.rt.flags.show_seconds);
}

#[test]
fn theme_setting_swaps_the_loaded_theme() {
    let mut fx = Fixture::new();
    write_theme(fx.themes.path(), "night", r#"{"dateSize": 99}"#);
    fx.rt.enable();
    assert_eq!(fx.rt.theme.active().unwrap().name, "default");

    fx.settings.set_string("theme", "night");
    fx.settings.fire("theme");
    fx.dispatch();
    let theme = fx.rt.theme.active().unwrap();
    assert_eq!(theme.name, "night");
    assert_eq!(theme.date.size, 99.0);
}

#[test]
fn provider_icons_use_the_host_provider_size() {
    let mut fx = Fixture::new();
    fx.rt.enable();

    // widget not yet allocated: the paint falls back to the icon size
    let widget = TestWidget::new((0, 0));
    fx.rt.search_provider_icon(CLOCKS_APP, widget.clone()).unwrap();
    fx.dispatch();
    assert_eq!(widget.raster_size.get(), Some((32, 32)));
}
