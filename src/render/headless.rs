use anyhow::{bail, Result};

use crate::app::{Frame, RenderTarget};
use crate::camera::Viewport;

/// Render target that only validates and counts frames.
///
/// Used by `--summary-only` runs and when no window can be created.
#[derive(Debug, Default)]
pub struct HeadlessTarget {
    viewport: Option<Viewport>,
    frames: u64,
    last_draw_count: usize,
    last_triangle_count: usize,
}

impl HeadlessTarget {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: Some(viewport),
            ..Self::default()
        }
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Number of frames drawn so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_draw_count(&self) -> usize {
        self.last_draw_count
    }

    pub fn last_triangle_count(&self) -> usize {
        self.last_triangle_count
    }
}

impl RenderTarget for HeadlessTarget {
    fn resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn draw(&mut self, frame: &Frame<'_>) -> Result<()> {
        let mut triangles = 0;
        for item in &frame.draws {
            let Some(mesh) = frame.meshes.get(&item.mesh) else {
                bail!("draw references unknown mesh {}", item.mesh);
            };
            triangles += mesh.triangle_count();
        }
        self.frames += 1;
        self.last_draw_count = frame.draws.len();
        self.last_triangle_count = triangles;
        Ok(())
    }
}
