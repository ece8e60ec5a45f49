//! Final composite of the accumulation target, with optional noise reduction.
//!
//! With noise reduction the accumulated image runs through a min filter into the
//! filter target, a max filter back into the accumulation target, and a sharpen pass
//! onto the frame. Without it the accumulation target is copied straight onto the
//! frame.

use brickvol_core::{ImageShader, RenderMode, UpdateOrder};

use crate::backend::{units, CommandSink, RenderTarget, ShaderProvider, Surface, Viewport};
use crate::blend;
use crate::error::RenderResult;
use crate::scale::{calc_filter_size, FilterKind};
use crate::uniforms::vec4;

/// Inputs of the composite pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    /// The caller's viewport.
    pub viewport: Viewport,
    /// Size of the accumulation target.
    pub target_width: u32,
    pub target_height: u32,
    /// Resolution of the volume on its two screen-facing axes.
    pub tex_width: f64,
    pub tex_height: f64,
    pub zoom: f64,
    pub scale_factor: f64,
    /// Weight of the min filter (0.5 for one volume, 0.4 for several).
    pub min_weight: f64,
    pub noise_reduction: bool,
    /// Reallocate the filter target.
    pub resize: bool,
}

impl CompositeParams {
    fn filter_size(&self, kind: FilterKind) -> f64 {
        calc_filter_size(
            kind,
            f64::from(self.viewport.width),
            f64::from(self.viewport.height),
            self.tex_width,
            self.tex_height,
            self.zoom,
            self.scale_factor,
        )
    }
}

/// Resolves the accumulation target onto the frame.
pub fn composite<B>(backend: &mut B, params: &CompositeParams) -> RenderResult<()>
where
    B: ShaderProvider + CommandSink + ?Sized,
{
    let w = f64::from(params.viewport.width.max(1));
    let h = f64::from(params.viewport.height.max(1));
    let w2 = f64::from(params.target_width.max(1));
    let h2 = f64::from(params.target_height.max(1));

    backend.set_blend(0, None);
    if params.noise_reduction {
        backend.ensure_surface(
            Surface::Filter,
            params.target_width,
            params.target_height,
            params.resize,
        )?;
        backend.bind_target(RenderTarget::Filter);
        backend.set_viewport(Viewport::sized(params.target_width, params.target_height));
        backend.clear(1);

        let size = params.filter_size(FilterKind::Min);
        let shader = backend.image_shader(ImageShader::FilterMin)?;
        backend.bind_shader(shader);
        backend.bind_surface(units::IMAGE, Some(Surface::Blend));
        backend.set_param(0, vec4(size / w2, size / h2, params.min_weight, 0.0));
        backend.draw_quad();

        backend.bind_target(RenderTarget::Blend { with_id: false });
        let size = params.filter_size(FilterKind::Max);
        let shader = backend.image_shader(ImageShader::FilterMax)?;
        backend.bind_shader(shader);
        backend.bind_surface(units::IMAGE, Some(Surface::Filter));
        backend.set_param(0, vec4(size / w, size / h, 1.0, 0.0));
        backend.draw_quad();
    }

    backend.bind_target(RenderTarget::Frame);
    backend.set_viewport(params.viewport);
    if params.noise_reduction {
        let size = params.filter_size(FilterKind::Sharpen);
        let shader = backend.image_shader(ImageShader::Sharpen)?;
        backend.bind_shader(shader);
        backend.set_param(0, vec4(size / w, size / h, 0.0, 0.0));
    } else {
        backend.release_shader();
    }
    backend.bind_surface(units::IMAGE, Some(Surface::Blend));
    backend.set_blend(
        0,
        Some(blend::accumulate(RenderMode::Over, UpdateOrder::BackToFront)),
    );
    backend.draw_quad();

    backend.release_shader();
    backend.bind_surface(units::IMAGE, None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{Command, RecordingBackend};

    fn params(noise_reduction: bool) -> CompositeParams {
        CompositeParams {
            viewport: Viewport::sized(800, 600),
            target_width: 400,
            target_height: 300,
            tex_width: 256.0,
            tex_height: 256.0,
            zoom: 1.0,
            scale_factor: 0.5,
            min_weight: 0.5,
            noise_reduction,
            resize: false,
        }
    }

    #[test]
    fn test_plain_copy_onto_frame() {
        let mut rb = RecordingBackend::default();
        composite(&mut rb, &params(false)).unwrap();
        assert_eq!(rb.count(|c| matches!(c, Command::DrawQuad)), 1);
        assert_eq!(
            rb.count(|c| matches!(c, Command::EnsureSurface { .. })),
            0
        );
        assert!(rb
            .commands
            .contains(&Command::BindTarget(RenderTarget::Frame)));
        assert!(rb.commands.contains(&Command::SetViewport(Viewport::sized(800, 600))));
    }

    #[test]
    fn test_noise_reduction_runs_three_passes() {
        let mut rb = RecordingBackend::default();
        composite(&mut rb, &params(true)).unwrap();
        assert_eq!(rb.count(|c| matches!(c, Command::DrawQuad)), 3);
        assert!(rb.commands.contains(&Command::EnsureSurface {
            surface: Surface::Filter,
            width: 400,
            height: 300,
            resize: false,
        }));
        let weights = rb.param_writes(0);
        assert_eq!(weights.len(), 3);
        assert!((weights[0].z - 0.5).abs() < 1e-6);
        assert!((weights[1].z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_filter_shader_is_an_error() {
        let mut rb = RecordingBackend::default();
            rb.shaders_unavailable = true;
        assert!(composite(&mut rb, &params(true)).is_err());
        assert!(composite(&mut rb, &params(false)).is_ok());
    }
}
