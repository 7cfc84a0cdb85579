use serde::Deserialize;

/// Renderer settings loaded from `settings.json`, with the same 1..=32
/// ranges the in-engine sliders allowed.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Kernel dispatches (and accumulated samples) per displayed frame.
    pub samples_per_frame: u32,
    /// Reflection bounce limit passed to the kernel.
    pub bounce_limit: u32,
}

impl RendererConfig {
    pub fn load(path: &str) -> RendererConfig {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<RendererConfig>(&text) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("invalid renderer config {path}: {err}; using defaults");
                    RendererConfig::default()
                }
            },
            Err(_) => RendererConfig::default(),
        };
        config.clamped()
    }

    pub fn clamped(self) -> RendererConfig {
        RendererConfig {
            samples_per_frame: self.samples_per_frame.clamp(1, 32),
            bounce_limit: self.bounce_limit.clamp(1, 32),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> RendererConfig {
        RendererConfig {
            samples_per_frame: 1,
            bounce_limit: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = RendererConfig {
            samples_per_frame: 0,
            bounce_limit: 128,
        }
        .clamped();
        assert_eq!(config.samples_per_frame, 1);
        assert_eq!(config.bounce_limit, 32);
    }
}
