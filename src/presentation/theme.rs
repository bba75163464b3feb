use eframe::egui;

pub struct Palette {
    pub bg: egui::Color32,
    pub fg: egui::Color32,
    pub stroke: egui::Color32,
    pub hover: egui::Color32,
    pub highlight: egui::Color32,
}

impl Palette {
    pub fn new(is_dark: bool) -> Self {
        if is_dark {
            Self {
                bg: egui::Color32::from_rgb(28, 30, 34),
                fg: egui::Color32::from_gray(230),
                stroke: egui::Color32::from_gray(90),
                hover: egui::Color32::from_rgb(45, 70, 110),
                highlight: egui::Color32::from_rgb(30, 110, 200),
            }
        } else {
            // Matches the stock React Native sample background.
            Self {
                bg: egui::Color32::from_rgb(0xF5, 0xFC, 0xFF),
                fg: egui::Color32::from_gray(30),
                stroke: egui::Color32::from_gray(170),
                hover: egui::Color32::from_rgb(215, 235, 250),
                highlight: egui::Color32::from_rgb(150, 200, 240),
            }
        }
    }
}

pub fn configure_style(ctx: &egui::Context, is_dark: bool) {
    let mut style = (*ctx.style()).clone();
    let palette = Palette::new(is_dark);

    style.visuals = if is_dark {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    };

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 20.0,
                egui::TextStyle::Body => 15.0,
                egui::TextStyle::Button => 15.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(10.0, 8.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);

    style.visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.0, palette.stroke);
    style.visuals.widgets.noninteractive.bg_fill = palette.bg;
    style.visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, palette.fg);
    style.visuals.widgets.hovered.weak_bg_fill = palette.hover;
    style.visuals.selection.bg_fill = palette.highlight;
    style.visuals.selection.stroke = egui::Stroke::new(1.0, palette.fg);

    style.visuals.panel_fill = palette.bg;
    style.visuals.window_fill = palette.bg;

    ctx.set_style(style);
}
