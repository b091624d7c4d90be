//! egui rendition of the debug panel.

use crate::panel::{BoundField, Control, ControlValue, DebugPanel, Monitor};

const GRAPH_HEIGHT: f32 = 36.0;

/// Draws `panel` as a floating window and returns the edits made this pass.
///
/// Edits are not applied here; the caller feeds them to
/// [`crate::SceneContext::apply_edit`] before the next frame.
pub fn show_panel(
    ctx: &egui::Context,
    title: &str,
    panel: &DebugPanel,
) -> Vec<(String, ControlValue)> {
    let mut edits = Vec::new();
    egui::Window::new(title)
        .default_pos([12.0, 12.0])
        .resizable(false)
        .show(ctx, |ui| {
            for control in panel.controls() {
                if let Some(value) = control_widget(ui, control) {
                    edits.push((control.label().to_string(), value));
                }
                ui.separator();
            }
            for monitor in panel.monitors() {
                monitor_widget(ui, monitor);
            }
        });
    edits
}

fn axis_names(field: BoundField) -> &'static [&'static str] {
    match field {
        BoundField::Position => &["x", "y", "z"],
        BoundField::PositionXz => &["x", "z"],
        BoundField::Color => &["r", "g", "b"],
        BoundField::Intensity | BoundField::Angle | BoundField::Penumbra => &[""],
    }
}

fn control_widget(ui: &mut egui::Ui, control: &Control) -> Option<ControlValue> {
    let spec = control.spec();
    let mut components = control.value().components();
    let mut changed = false;

    ui.label(control.label());
    for ((component, range), name) in components
        .iter_mut()
        .zip(&spec.ranges)
        .zip(axis_names(spec.field))
    {
        let mut slider = egui::Slider::new(component, range.min..=range.max).text(*name);
        if let Some(step) = range.step {
            slider = slider.step_by(step as f64);
        }
        changed |= ui.add(slider).changed();
    }

    if changed {
        ControlValue::from_components(&components)
    } else {
        None
    }
}

fn monitor_widget(ui: &mut egui::Ui, monitor: &Monitor) {
    let latest = monitor
        .latest()
        .map_or_else(|| "-".to_string(), |value| format!("{value:.0}"));
    ui.label(format!("{}: {latest}", monitor.label()));

    let width = ui.available_width().max(120.0);
    let (rect, _) = ui.allocate_exact_size(egui::vec2(width, GRAPH_HEIGHT), egui::Sense::hover());
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 2.0, ui.visuals().extreme_bg_color);

    let samples: Vec<f32> = monitor.samples().collect();
    if samples.len() < 2 {
        return;
    }
    let peak = samples.iter().copied().fold(1.0_f32, f32::max);
    let step = rect.width() / (samples.len() - 1) as f32;
    let points = samples
        .iter()
        .enumerate()
        .map(|(i, value)| {
            egui::pos2(
                rect.left() + i as f32 * step,
                rect.bottom() - value / peak * rect.height(),
            )
        })
        .collect();
    painter.add(egui::Shape::line(
        points,
        egui::Stroke::new(1.5, ui.visuals().text_color()),
    ));
}
