use std::collections::BTreeMap;

use crate::backend::FontTechnology;
use crate::error::{Error, Result};

/// Fixed-point resolution used by the engine for sizes (26.6).
pub const SIZE_UNITS_PER_PIXEL: f64 = 64.0;

const POINTS_PER_INCH: f64 = 72.0;

fn snap_to_26_6(value: f64) -> f64 {
    (value * SIZE_UNITS_PER_PIXEL).round() / SIZE_UNITS_PER_PIXEL
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    Points,
    Pixels,
}

/// The authoritative glyph size. The other unit is derived from it with the DPI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FontSize {
    Points(f64),
    Pixels(f64),
}

impl FontSize {
    pub fn unit(self) -> Unit {
        match self {
            FontSize::Points(_) => Unit::Points,
            FontSize::Pixels(_) => Unit::Pixels,
        }
    }

    pub fn value(self) -> f64 {
        match self {
            FontSize::Points(v) | FontSize::Pixels(v) => v,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AntiAliasing {
    None,
    Normal,
    Light,
    Lcd,
    LcdBgr,
    LcdVertical,
    LcdVerticalBgr,
}

impl AntiAliasing {
    pub fn name(self) -> &'static str {
        match self {
            AntiAliasing::None => "none",
            AntiAliasing::Normal => "normal",
            AntiAliasing::Light => "light",
            AntiAliasing::Lcd => "lcd",
            AntiAliasing::LcdBgr => "lcd-bgr",
            AntiAliasing::LcdVertical => "lcd-vertical",
            AntiAliasing::LcdVerticalBgr => "lcd-vertical-bgr",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "none" => AntiAliasing::None,
            "normal" => AntiAliasing::Normal,
            "light" => AntiAliasing::Light,
            "lcd" => AntiAliasing::Lcd,
            "lcd-bgr" => AntiAliasing::LcdBgr,
            "lcd-vertical" => AntiAliasing::LcdVertical,
            "lcd-vertical-bgr" => AntiAliasing::LcdVerticalBgr,
            _ => return None,
        })
    }

    pub fn is_lcd(self) -> bool {
        !matches!(
            self,
            AntiAliasing::None | AntiAliasing::Normal | AntiAliasing::Light
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LcdFilter {
    Default,
    Light,
    None,
    Legacy,
}

impl LcdFilter {
    pub fn name(self) -> &'static str {
        match self {
            LcdFilter::Default => "default",
            LcdFilter::Light => "light",
            LcdFilter::None => "none",
            LcdFilter::Legacy => "legacy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "default" => LcdFilter::Default,
            "light" => LcdFilter::Light,
            "none" => LcdFilter::None,
            "legacy" => LcdFilter::Legacy,
            _ => return None,
        })
    }
}

/// TrueType bytecode interpreter version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrueTypeInterpreter {
    V35,
    V38,
    V40,
}

impl TrueTypeInterpreter {
    pub fn version(self) -> i64 {
        match self {
            TrueTypeInterpreter::V35 => 35,
            TrueTypeInterpreter::V38 => 38,
            TrueTypeInterpreter::V40 => 40,
        }
    }

    pub fn from_version(version: i64) -> Option<Self> {
        Some(match version {
            35 => TrueTypeInterpreter::V35,
            38 => TrueTypeInterpreter::V38,
            40 => TrueTypeInterpreter::V40,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CffEngine {
    FreeType,
    Adobe,
}

impl CffEngine {
    pub fn name(self) -> &'static str {
        match self {
            CffEngine::FreeType => "freetype",
            CffEngine::Adobe => "adobe",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "freetype" => CffEngine::FreeType,
            "adobe" => CffEngine::Adobe,
            _ => return None,
        })
    }
}

/// Hinting engine that applies to a face of a given technology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HintingEngine {
    Unhinted,
    Auto,
    TrueType(TrueTypeInterpreter),
    Cff(CffEngine),
    /// Whatever native hinter the backend has for other formats.
    Native,
}

/// Rasterization target derived from the anti-aliasing mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Mono,
    Normal,
    Light,
    Lcd { bgr: bool },
    LcdV { bgr: bool },
}

impl From<AntiAliasing> for RenderTarget {
    fn from(value: AntiAliasing) -> Self {
        match value {
            AntiAliasing::None => RenderTarget::Mono,
            AntiAliasing::Normal => RenderTarget::Normal,
            AntiAliasing::Light => RenderTarget::Light,
            AntiAliasing::Lcd => RenderTarget::Lcd { bgr: false },
            AntiAliasing::LcdBgr => RenderTarget::Lcd { bgr: true },
            AntiAliasing::LcdVertical => RenderTarget::LcdV { bgr: false },
            AntiAliasing::LcdVerticalBgr => RenderTarget::LcdV { bgr: true },
        }
    }
}

/// Per-glyph load flags. Part of the image and bitmap cache keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LoadFlags {
    pub hinting: bool,
    pub force_autohint: bool,
    pub target: RenderTarget,
}

/// Library-wide engine settings.
///
/// These are not part of any cache key; the engine flushes its caches when they change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EngineProperties {
    pub truetype_interpreter: TrueTypeInterpreter,
    pub cff_engine: CffEngine,
    pub horizontal_hinting: bool,
    pub vertical_hinting: bool,
    pub blue_zone_hinting: bool,
    pub show_segments: bool,
    pub warping: bool,
    pub lcd_filter: LcdFilter,
}

/// Value type of the flat key/value snapshot used for persistence.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Everything that controls how a glyph is hinted, rasterized and displayed.
///
/// Setters that change the render key bump [`RenderConfig::key_generation`]; the
/// engine compares generations to drop its memoized face/size context. Gamma,
/// zoom and the display toggles only affect presentation.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    size: FontSize,
    dpi: u32,

    hinting: bool,
    auto_hinting: bool,
    horizontal_hinting: bool,
    vertical_hinting: bool,
    blue_zone_hinting: bool,
    show_segments: bool,
    warping: bool,

    truetype_interpreter: TrueTypeInterpreter,
    cff_engine: CffEngine,

    anti_aliasing: AntiAliasing,
    lcd_filter: LcdFilter,

    gamma: f64,
    zoom: u32,

    show_bitmap: bool,
    show_points: bool,
    show_point_indices: bool,
    show_outlines: bool,

    key_generation: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            size: FontSize::Points(20.0),
            dpi: 96,
            hinting: true,
            auto_hinting: false,
            horizontal_hinting: false,
            vertical_hinting: true,
            blue_zone_hinting: true,
            show_segments: false,
            warping: false,
            truetype_interpreter: TrueTypeInterpreter::V40,
            cff_engine: CffEngine::Adobe,
            anti_aliasing: AntiAliasing::Normal,
            lcd_filter: LcdFilter::Light,
            gamma: 1.8,
            zoom: 20,
            show_bitmap: true,
            show_points: true,
            show_point_indices: false,
            show_outlines: true,
            key_generation: 0,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter bumped by every setter that changes the render key.
    pub fn key_generation(&self) -> u64 {
        self.key_generation
    }

    fn touch_key(&mut self) {
        self.key_generation = self.key_generation.wrapping_add(1);
    }
}

/// size
impl RenderConfig {
    pub fn size(&self) -> FontSize {
        self.size
    }

    pub fn unit(&self) -> Unit {
        self.size.unit()
    }

    /// Sets the authoritative size. Values are snapped to 1/64.
    ///
    /// Non-finite or non-positive sizes are ignored.
    pub fn set_size(&mut self, size: FontSize) {
        let value = size.value();
        if !value.is_finite() || value <= 0.0 {
            log::warn!("Ignoring invalid glyph size {:?}", size);
            return;
        }

        let snapped = match size {
            FontSize::Points(v) => FontSize::Points(snap_to_26_6(v)),
            FontSize::Pixels(v) => FontSize::Pixels(snap_to_26_6(v)),
        };

        if snapped != self.size {
            self.size = snapped;
            self.touch_key();
        }
    }

    /// Switches the authoritative unit, converting the current size through the DPI.
    ///
    /// The converted value is kept unsnapped so that switching back restores
    /// the previous size. Snapping to 1/64 happens when the cache key is built.
    pub fn set_unit(&mut self, unit: Unit) {
        if unit == self.unit() {
            return;
        }

        self.size = match unit {
            Unit::Points => FontSize::Points(self.point_size()),
            Unit::Pixels => FontSize::Pixels(self.pixel_size()),
        };
        self.touch_key();
    }

    pub fn point_size(&self) -> f64 {
        match self.size {
            FontSize::Points(pt) => pt,
            FontSize::Pixels(px) => px * POINTS_PER_INCH / self.dpi as f64,
        }
    }

    pub fn pixel_size(&self) -> f64 {
        match self.size {
            FontSize::Points(pt) => pt * self.dpi as f64 / POINTS_PER_INCH,
            FontSize::Pixels(px) => px,
        }
    }

    /// Pixel size snapped to 1/64, as handed to the engine.
    pub fn engine_pixel_size(&self) -> f64 {
        snap_to_26_6(self.pixel_size())
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn set_dpi(&mut self, dpi: u32) {
        let dpi = dpi.max(1);
        if dpi != self.dpi {
            self.dpi = dpi;
            self.touch_key();
        }
    }
}

/// hinting
impl RenderConfig {
    pub fn hinting(&self) -> bool {
        self.hinting
    }

    pub fn set_hinting(&mut self, on: bool) {
        if on != self.hinting {
            self.hinting = on;
            self.touch_key();
        }
    }

    pub fn auto_hinting(&self) -> bool {
        self.auto_hinting
    }

    pub fn set_auto_hinting(&mut self, on: bool) {
        if on != self.auto_hinting {
            self.auto_hinting = on;
            self.touch_key();
        }
    }

    pub fn horizontal_hinting(&self) -> bool {
        self.horizontal_hinting
    }

    pub fn set_horizontal_hinting(&mut self, on: bool) {
        if on != self.horizontal_hinting {
            self.horizontal_hinting = on;
            self.touch_key();
        }
    }

    pub fn vertical_hinting(&self) -> bool {
        self.vertical_hinting
    }

    pub fn set_vertical_hinting(&mut self, on: bool) {
        if on != self.vertical_hinting {
            self.vertical_hinting = on;
            self.touch_key();
        }
    }

    pub fn blue_zone_hinting(&self) -> bool {
        self.blue_zone_hinting
    }

    pub fn set_blue_zone_hinting(&mut self, on: bool) {
        if on != self.blue_zone_hinting {
            self.blue_zone_hinting = on;
            self.touch_key();
        }
    }

    pub fn show_segments(&self) -> bool {
        self.show_segments
    }

    pub fn set_show_segments(&mut self, on: bool) {
        if on != self.show_segments {
            self.show_segments = on;
            self.touch_key();
        }
    }

    pub fn warping(&self) -> bool {
        self.warping
    }

    pub fn set_warping(&mut self, on: bool) {
        if on != self.warping {
            self.warping = on;
            self.touch_key();
        }
    }

    pub fn truetype_interpreter(&self) -> TrueTypeInterpreter {
        self.truetype_interpreter
    }

    pub fn set_truetype_interpreter(&mut self, interpreter: TrueTypeInterpreter) {
        if interpreter != self.truetype_interpreter {
            self.truetype_interpreter = interpreter;
            self.touch_key();
        }
    }

    pub fn cff_engine(&self) -> CffEngine {
        self.cff_engine
    }

    pub fn set_cff_engine(&mut self, engine: CffEngine) {
        if engine != self.cff_engine {
            self.cff_engine = engine;
            self.touch_key();
        }
    }

    /// The hinting engine that applies to a face of the given technology.
    pub fn hinting_engine(&self, technology: FontTechnology) -> HintingEngine {
        if !self.hinting {
            return HintingEngine::Unhinted;
        }
        if self.auto_hinting {
            return HintingEngine::Auto;
        }

        match technology {
            FontTechnology::TrueType => HintingEngine::TrueType(self.truetype_interpreter),
            FontTechnology::Cff => HintingEngine::Cff(self.cff_engine),
            FontTechnology::Other => HintingEngine::Native,
        }
    }
}

/// rasterization
impl RenderConfig {
    pub fn anti_aliasing(&self) -> AntiAliasing {
        self.anti_aliasing
    }

    pub fn set_anti_aliasing(&mut self, mode: AntiAliasing) {
        if mode != self.anti_aliasing {
            self.anti_aliasing = mode;
            self.touch_key();
        }
    }

    pub fn lcd_filter(&self) -> LcdFilter {
        self.lcd_filter
    }

    pub fn set_lcd_filter(&mut self, filter: LcdFilter) {
        if filter != self.lcd_filter {
            self.lcd_filter = filter;
            self.touch_key();
        }
    }

    pub fn load_flags(&self) -> LoadFlags {
        LoadFlags {
            hinting: self.hinting,
            force_autohint: self.hinting && self.auto_hinting,
            target: RenderTarget::from(self.anti_aliasing),
        }
    }

    pub fn engine_properties(&self) -> EngineProperties {
        EngineProperties {
            truetype_interpreter: self.truetype_interpreter,
            cff_engine: self.cff_engine,
            horizontal_hinting: self.horizontal_hinting,
            vertical_hinting: self.vertical_hinting,
            blue_zone_hinting: self.blue_zone_hinting,
            show_segments: self.show_segments,
            warping: self.warping,
            lcd_filter: self.lcd_filter,
        }
    }
}

/// presentation
impl RenderConfig {
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Gamma only changes the display color table, never the render key.
    pub fn set_gamma(&mut self, gamma: f64) {
        if gamma.is_finite() && gamma > 0.0 {
            self.gamma = gamma;
        } else {
            log::warn!("Ignoring invalid gamma {}", gamma);
        }
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: u32) {
        self.zoom = zoom.max(1);
    }

    pub fn show_bitmap(&self) -> bool {
        self.show_bitmap
    }

    pub fn set_show_bitmap(&mut self, on: bool) {
        self.show_bitmap = on;
    }

    pub fn show_points(&self) -> bool {
        self.show_points
    }

    pub fn set_show_points(&mut self, on: bool) {
        self.show_points = on;
    }

    pub fn show_point_indices(&self) -> bool {
        self.show_point_indices
    }

    pub fn set_show_point_indices(&mut self, on: bool) {
        self.show_point_indices = on;
    }

    pub fn show_outlines(&self) -> bool {
        self.show_outlines
    }

    pub fn set_show_outlines(&mut self, on: bool) {
        self.show_outlines = on;
    }
}

/// Flat key/value snapshot.
impl RenderConfig {
    pub fn export(&self) -> BTreeMap<String, ConfigValue> {
        let mut map = BTreeMap::new();
        let mut put = |key: &str, value: ConfigValue| {
            map.insert(key.to_string(), value);
        };

        let unit = match self.unit() {
            Unit::Points => "pt",
            Unit::Pixels => "px",
        };
        put("size_unit", ConfigValue::Text(unit.to_string()));
        put("size", ConfigValue::Float(self.size.value()));
        put("dpi", ConfigValue::Int(self.dpi as i64));
        put("hinting", ConfigValue::Bool(self.hinting));
        put("auto_hinting", ConfigValue::Bool(self.auto_hinting));
        put("horizontal_hinting", ConfigValue::Bool(self.horizontal_hinting));
        put("vertical_hinting", ConfigValue::Bool(self.vertical_hinting));
        put("blue_zone_hinting", ConfigValue::Bool(self.blue_zone_hinting));
        put("show_segments", ConfigValue::Bool(self.show_segments));
        put("warping", ConfigValue::Bool(self.warping));
        put(
            "truetype_interpreter",
            ConfigValue::Int(self.truetype_interpreter.version()),
        );
        put(
            "cff_engine",
            ConfigValue::Text(self.cff_engine.name().to_string()),
        );
        put(
            "anti_aliasing",
            ConfigValue::Text(self.anti_aliasing.name().to_string()),
        );
        put(
            "lcd_filter",
            ConfigValue::Text(self.lcd_filter.name().to_string()),
        );
        put("gamma", ConfigValue::Float(self.gamma));
        put("zoom", ConfigValue::Int(self.zoom as i64));
        put("show_bitmap", ConfigValue::Bool(self.show_bitmap));
        put("show_points", ConfigValue::Bool(self.show_points));
        put("show_point_indices", ConfigValue::Bool(self.show_point_indices));
        put("show_outlines", ConfigValue::Bool(self.show_outlines));

        map
    }

    /// Applies any subset of the keys produced by [`Self::export`].
    ///
    /// Unknown keys are skipped. On a type or range mismatch nothing is applied.
    pub fn import(&mut self, map: &BTreeMap<String, ConfigValue>) -> Result<()> {
        let mut next = self.clone();

        // size and unit travel together; the unit decides how `size` is read
        let unit = match map.get("size_unit") {
            None => None,
            Some(ConfigValue::Text(text)) if text == "pt" => Some(Unit::Points),
            Some(ConfigValue::Text(text)) if text == "px" => Some(Unit::Pixels),
            Some(_) => return Err(invalid("size_unit")),
        };
        if let Some(unit) = unit {
            next.set_unit(unit);
        }
        if let Some(value) = map.get("size") {
            let size = float(value, "size")?;
            if !size.is_finite() || size <= 0.0 {
                return Err(invalid("size"));
            }
            match next.unit() {
                Unit::Points => next.set_size(FontSize::Points(size)),
                Unit::Pixels => next.set_size(FontSize::Pixels(size)),
            }
        }

        for (key, value) in map {
            match key.as_str() {
                "size_unit" | "size" => {}
                "dpi" => next.set_dpi(positive_u32(value, key)?),
                "hinting" => next.set_hinting(boolean(value, key)?),
                "auto_hinting" => next.set_auto_hinting(boolean(value, key)?),
                "horizontal_hinting" => next.set_horizontal_hinting(boolean(value, key)?),
                "vertical_hinting" => next.set_vertical_hinting(boolean(value, key)?),
                "blue_zone_hinting" => next.set_blue_zone_hinting(boolean(value, key)?),
                "show_segments" => next.set_show_segments(boolean(value, key)?),
                "warping" => next.set_warping(boolean(value, key)?),
                "truetype_interpreter" => {
                    let version = match value {
                        ConfigValue::Int(v) => *v,
                        _ => return Err(invalid(key)),
                    };
                    let interpreter =
                        TrueTypeInterpreter::from_version(version).ok_or_else(|| invalid(key))?;
                    next.set_truetype_interpreter(interpreter);
                }
                "cff_engine" => {
                    let engine = CffEngine::from_name(text(value, key)?).ok_or_else(|| invalid(key))?;
                    next.set_cff_engine(engine);
                }
                "anti_aliasing" => {
                    let mode =
                        AntiAliasing::from_name(text(value, key)?).ok_or_else(|| invalid(key))?;
                    next.set_anti_aliasing(mode);
                }
                "lcd_filter" => {
                    let filter =
                        LcdFilter::from_name(text(value, key)?).ok_or_else(|| invalid(key))?;
                    next.set_lcd_filter(filter);
                }
                "gamma" => {
                    let gamma = float(value, key)?;
                    if !gamma.is_finite() || gamma <= 0.0 {
                        return Err(invalid(key));
                    }
                    next.set_gamma(gamma);
                }
                "zoom" => next.set_zoom(positive_u32(value, key)?),
                "show_bitmap" => next.set_show_bitmap(boolean(value, key)?),
                "show_points" => next.set_show_points(boolean(value, key)?),
                "show_point_indices" => next.set_show_point_indices(boolean(value, key)?),
                "show_outlines" => next.set_show_outlines(boolean(value, key)?),
                other => log::warn!("Ignoring unknown config key `{}`", other),
            }
        }

        *self = next;
        Ok(())
    }
}

fn invalid(key: &str) -> Error {
    Error::InvalidConfigValue {
        key: key.to_string(),
    }
}

fn boolean(value: &ConfigValue, key: &str) -> Result<bool> {
    match value {
        ConfigValue::Bool(v) => Ok(*v),
        _ => Err(invalid(key)),
    }
}

fn float(value: &ConfigValue, key: &str) -> Result<f64> {
    match value {
        ConfigValue::Float(v) => Ok(*v),
        ConfigValue::Int(v) => Ok(*v as f64),
        _ => Err(invalid(key)),
    }
}

fn positive_u32(value: &ConfigValue, key: &str) -> Result<u32> {
    match value {
        ConfigValue::Int(v) if *v > 0 && *v <= u32::MAX as i64 => Ok(*v as u32),
        _ => Err(invalid(key)),
    }
}

fn text<'a>(value: &'a ConfigValue, key: &str) -> Result<&'a str> {
    match value {
        ConfigValue::Text(v) => Ok(v.as_str()),
        _ => Err(invalid(key)),
    }
}
