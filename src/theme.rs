use crate::config::UiConfig;
use crate::instance::VmStatus;
use egui::Color32;

// Ocean palette
pub const BG_MAIN: Color32 = Color32::from_rgb(0, 7, 45); // #00072D
pub const BG_PANEL: Color32 = Color32::from_rgb(10, 27, 61); // #0A1B3D
pub const BG_SECONDARY: Color32 = Color32::from_rgb(26, 47, 82); // #1A2F52
pub const BG_ELEVATED: Color32 = Color32::from_rgb(36, 55, 95); // #24375F
pub const BG_HOVER: Color32 = Color32::from_rgb(26, 67, 191); // #1A43BF
pub const BG_CONSOLE: Color32 = Color32::from_rgb(0, 5, 16); // #000510

pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(137, 207, 240); // #89CFF0
pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(48, 213, 200); // #30D5C8
pub const TEXT_MUTED: Color32 = Color32::from_rgb(98, 114, 164); // #6272A4

pub const STATUS_RUNNING: Color32 = Color32::from_rgb(80, 250, 123); // #50FA7B
pub const STATUS_STOPPED: Color32 = Color32::from_rgb(255, 85, 85); // #FF5555
pub const STATUS_WARNING: Color32 = Color32::from_rgb(241, 250, 140); // #F1FA8C
pub const STATUS_UNKNOWN: Color32 = Color32::from_rgb(98, 114, 164); // #6272A4

pub const ACTION_PRIMARY: Color32 = Color32::from_rgb(48, 213, 200);
pub const ACTION_START: Color32 = Color32::from_rgb(32, 120, 72);
pub const ACTION_DANGER: Color32 = Color32::from_rgb(150, 40, 48);
pub const ACTION_CAUTION: Color32 = Color32::from_rgb(150, 96, 24);

pub const BORDER_DEFAULT: Color32 = Color32::from_rgb(36, 55, 95);
pub const BORDER_FOCUS: Color32 = Color32::from_rgb(48, 213, 200);
pub const SELECTION_BG: Color32 = Color32::from_rgb(26, 67, 191);

/// Colors the panel draws with, on top of egui's base visuals.
struct Palette {
    window: Color32,
    panel: Color32,
    console: Color32,
    raised: Color32,
    elevated: Color32,
    hover: Color32,
    text: Color32,
    accent: Color32,
    border: Color32,
    selection: Color32,
}

const OCEAN: Palette = Palette {
    window: BG_MAIN,
    panel: BG_PANEL,
    console: BG_CONSOLE,
    raised: BG_SECONDARY,
    elevated: BG_ELEVATED,
    hover: BG_HOVER,
    text: TEXT_PRIMARY,
    accent: ACTION_PRIMARY,
    border: BORDER_DEFAULT,
    selection: SELECTION_BG,
};

/// Apply the configured theme. Anything other than `light` gets the ocean
/// palette.
pub fn configure_theme(ctx: &egui::Context, ui_config: &UiConfig) {
    if ui_config.theme.eq_ignore_ascii_case("light") {
        ctx.set_visuals(egui::Visuals::light());
    } else {
        ctx.set_visuals(palette_visuals(&OCEAN));
    }

    let mut style = (*ctx.style()).clone();
    let body = ui_config.font_size;
    for (text_style, font) in style.text_styles.iter_mut() {
        font.size = match text_style {
            egui::TextStyle::Heading => body + 6.0,
            egui::TextStyle::Small => (body - 3.0).max(8.0),
            _ => body,
        };
    }
    style.spacing.item_spacing = egui::vec2(6.0, 6.0);
    style.spacing.button_padding = egui::vec2(10.0, 6.0);
    ctx.set_style(style);
}

fn palette_visuals(palette: &Palette) -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();
    visuals.window_fill = palette.window;
    visuals.panel_fill = palette.panel;
    visuals.extreme_bg_color = palette.console;
    visuals.faint_bg_color = palette.raised;
    visuals.override_text_color = Some(palette.text);
    visuals.hyperlink_color = palette.accent;
    visuals.selection.bg_fill = palette.selection;
    visuals.selection.stroke = egui::Stroke::new(1.0, palette.accent);

    let widgets = &mut visuals.widgets;
    for (state, fill, stroke_width) in [
        (&mut widgets.noninteractive, palette.raised, 1.0),
        (&mut widgets.inactive, palette.elevated, 1.0),
        (&mut widgets.hovered, palette.hover, 1.5),
        (&mut widgets.active, palette.selection, 2.0),
    ] {
        state.bg_fill = fill;
        state.weak_bg_fill = fill;
        state.bg_stroke = egui::Stroke::new(stroke_width, palette.border);
    }
    widgets.hovered.bg_stroke.color = palette.accent;
    widgets.active.bg_stroke.color = BORDER_FOCUS;

    visuals
}

pub fn status_color(status: &VmStatus) -> Color32 {
    match status {
        VmStatus::Running => STATUS_RUNNING,
        VmStatus::Stopped => STATUS_STOPPED,
        VmStatus::Unknown => STATUS_UNKNOWN,
        VmStatus::Other(_) => STATUS_WARNING,
    }
}

pub fn status_icon(status: &VmStatus) -> &'static str {
    match status {
        VmStatus::Running => "●",
        VmStatus::Stopped => "○",
        VmStatus::Unknown => "?",
        VmStatus::Other(_) => "◐",
    }
}
