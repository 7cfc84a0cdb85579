use crate::camera::ViewMatrices;
use crate::config::RendererConfig;
use crate::render_system::backend::{KernelBindings, KernelParams, TraceBackend};
use crate::render_system::error::RenderError;

struct RenderTargets<B: TraceBackend> {
    raw: B::Target,
    averaged: B::Target,
}

/// Owns the raw/averaged render-target pair and the progressive sample
/// index, and drives the dispatch-blend-present sequence each frame.
///
/// Until the first frame no targets exist; they are (re)allocated whenever
/// the viewport differs from the allocated size, which also discards the
/// accumulated history. Blending uses weight `1/(sampleIndex + 1)`, the
/// incremental form of a uniform running mean, so a reset needs no explicit
/// clear: the first sample after it fully overwrites the averaged target.
pub struct FrameAccumulator<B: TraceBackend> {
    targets: Option<RenderTargets<B>>,
    extent: [u32; 2],
    sample_index: u32,
    samples_per_frame: u32,
    bounce_limit: u32,
}

impl<B: TraceBackend> FrameAccumulator<B> {
    pub fn new(config: &RendererConfig) -> FrameAccumulator<B> {
        FrameAccumulator {
            targets: None,
            extent: [0, 0],
            sample_index: 0,
            samples_per_frame: config.samples_per_frame,
            bounce_limit: config.bounce_limit,
        }
    }

    /// Samples accumulated since the last reset.
    pub fn sample_index(&self) -> u32 {
        self.sample_index
    }

    pub fn reset_samples(&mut self) {
        self.sample_index = 0;
    }

    pub fn release_targets(&mut self, backend: &mut B) {
        if let Some(targets) = self.targets.take() {
            backend.release_target(targets.raw);
            backend.release_target(targets.averaged);
        }
    }

    pub fn render(
        &mut self,
        backend: &mut B,
        bindings: &KernelBindings<'_, B>,
        view: &ViewMatrices,
        viewport: [u32; 2],
    ) -> Result<(), RenderError> {
        if self.targets.is_none() || self.extent != viewport {
            self.release_targets(backend);
            let raw = backend.create_target(viewport)?;
            let averaged = match backend.create_target(viewport) {
                Ok(target) => target,
                Err(err) => {
                    backend.release_target(raw);
                    return Err(err);
                }
            };
            self.targets = Some(RenderTargets { raw, averaged });
            self.extent = viewport;
            // a resize invalidates the accumulated history
            self.sample_index = 0;
        }

        let Some(targets) = self.targets.as_ref() else {
            return Ok(());
        };

        let [group_x, group_y] = backend.workgroup_size();
        let groups = [
            viewport[0].div_ceil(group_x),
            viewport[1].div_ceil(group_y),
            1,
        ];

        for _ in 0..self.samples_per_frame {
            let params = KernelParams {
                camera_to_world: view.camera_to_world,
                inverse_projection: view.inverse_projection,
                extent: viewport,
                jitter: [rand::random::<f32>(), rand::random::<f32>()],
                bounce_limit: self.bounce_limit,
                seed: rand::random::<u32>(),
            };
            backend.dispatch(bindings, &params, &targets.raw, groups)?;

            // sample k contributes 1/(k+1) of the running mean of k+1 samples
            let weight = 1.0 / (self.sample_index + 1) as f32;
            backend.blend(&targets.raw, &targets.averaged, weight)?;
            self.sample_index += 1;
        }

        backend.present(&targets.averaged)
    }
}
