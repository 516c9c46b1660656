//! Shader Template Manager
//!
//! Renders effect shaders from minijinja templates embedded in the binary and
//! caches the compiled `ShaderModule`s by material identity.
//!
//! Templates use `{$ ... $}` blocks and `$$`-prefixed line statements so they
//! stay readable next to WGSL's own braces:
//!
//! ```text
//! $$ if BLUR_MODE == "NONE"
//! ...copy...
//! $$ else
//! const KERNEL_RADIUS: i32 = {{ KERNEL_RADIUS }};
//! $$ endif
//! ```

use std::borrow::Cow;
use std::collections::hash_map::Entry;

use minijinja::{Environment, Error, ErrorKind, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::errors::Result;
use crate::resources::{BlurMode, EffectMaterial, MaterialSource, STATIC_BLUR_SHADER};

#[derive(RustEmbed)]
#[folder = "src/renderer/shaders"]
struct ShaderAssets;

fn build_env() -> Result<Environment<'static>> {
    let mut env = Environment::new();

    let syntax = SyntaxConfig::builder()
        .block_delimiters("{$", "$}")
        .variable_delimiters("{{", "}}")
        .line_statement_prefix("$$")
        .build()?;

    env.set_syntax(syntax);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    env.set_loader(shader_loader);

    Ok(env)
}

fn shader_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wgsl"))
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.wgsl"))
    };

    #[cfg(all(debug_assertions, not(target_arch = "wasm32")))]
    {
        let path = std::path::Path::new("src/renderer/shaders").join(filename.as_ref());
        if path.exists() {
            return std::fs::read_to_string(&path).map(Some).map_err(|e| {
                Error::new(
                    ErrorKind::TemplateNotFound,
                    format!("Failed to read file: {e}"),
                )
            });
        }
    }

    if let Some(file) = ShaderAssets::get(&filename)
        && let Ok(source) = std::str::from_utf8(file.data.as_ref())
    {
        return Ok(Some(source.to_string()));
    }

    Ok(None)
}

#[derive(Serialize)]
struct EffectShaderContext {
    #[serde(rename = "BLUR_MODE")]
    blur_mode: &'static str,
    #[serde(rename = "KERNEL_RADIUS")]
    kernel_radius: u32,
}

/// Cache key: `None` is the plain copy shader used by material-less blits.
type ShaderKey = Option<u64>;

/// Effect shader cache.
///
/// Owned by [`WgpuRenderDevice`](super::WgpuRenderDevice).
pub struct ShaderManager {
    env: Environment<'static>,
    module_cache: FxHashMap<ShaderKey, wgpu::ShaderModule>,
}

impl ShaderManager {
    pub fn new() -> Result<Self> {
        Ok(Self {
            env: build_env()?,
            module_cache: FxHashMap::default(),
        })
    }

    /// Renders a shader template for one blur variant.
    pub fn render_template(&self, template_name: &str, mode: BlurMode) -> Result<String> {
        render_template(&self.env, template_name, mode)
    }

    /// Final WGSL for a blit with `material` (a copy when `None`).
    pub fn source_for(&self, material: Option<&EffectMaterial>) -> Result<String> {
        source_for(&self.env, material)
    }

    /// Returns the compiled module for `material`, compiling it on first use.
    pub fn get_or_compile(
        &mut self,
        device: &wgpu::Device,
        material: Option<&EffectMaterial>,
    ) -> Result<&wgpu::ShaderModule> {
        match self.module_cache.entry(material.map(EffectMaterial::id)) {
            Entry::Occupied(entry) => Ok(&*entry.into_mut()),
            Entry::Vacant(entry) => {
                let source = source_for(&self.env, material)?;
                let label = material.map_or("Static Blur Copy", EffectMaterial::label);
                log::debug!("Compiling effect shader '{label}'");

                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&format!("Shader Module {label}")),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });
                Ok(&*entry.insert(module))
            }
        }
    }

    /// Drops the cached module of a material. Returns whether one was cached.
    pub fn evict(&mut self, material_id: u64) -> bool {
        self.module_cache.remove(&Some(material_id)).is_some()
    }

    /// Returns the number of cached shader modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.module_cache.len()
    }
}

fn render_template(env: &Environment<'static>, name: &str, mode: BlurMode) -> Result<String> {
    let ctx = EffectShaderContext {
        blur_mode: mode.define_value(),
        kernel_radius: mode.kernel_radius(),
    };
    let source = env.get_template(name)?.render(&ctx)?;
    Ok(format!("// === Auto-generated Effect Shader ===\n{source}"))
}

fn source_for(env: &Environment<'static>, material: Option<&EffectMaterial>) -> Result<String> {
    match material.map(EffectMaterial::source) {
        None => render_template(env, STATIC_BLUR_SHADER, BlurMode::None),
        Some(MaterialSource::Template { name, mode }) => render_template(env, name, *mode),
        Some(MaterialSource::Wgsl(source)) => Ok(source.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_variant_has_no_kernel() {
        let manager = ShaderManager::new().unwrap();
        let source = manager.source_for(None).unwrap();
        assert!(source.contains("fn fs_main"));
        assert!(!source.contains("KERNEL_RADIUS"));
    }

    #[test]
    fn blur_variants_set_kernel_radius() {
        let manager = ShaderManager::new().unwrap();
        for mode in [BlurMode::Fast, BlurMode::Medium, BlurMode::Detail] {
            let source = manager.render_template(STATIC_BLUR_SHADER, mode).unwrap();
            let expected = format!("const KERNEL_RADIUS: i32 = {};", mode.kernel_radius());
            assert!(source.contains(&expected), "{mode:?}");
            assert!(!source.contains("$$"));
        }
    }

    #[test]
    fn raw_wgsl_material_is_passed_through() {
        let manager = ShaderManager::new().unwrap();
        let material = EffectMaterial::from_wgsl("Tint", "// tint");
        assert_eq!(manager.source_for(Some(&material)).unwrap(), "// tint");
    }

    #[test]
    fn unknown_template_is_an_error() {
        let manager = ShaderManager::new().unwrap();
        assert!(
            manager
                .render_template("does_not_exist", BlurMode::Fast)
                .is_err()
        );
    }
}
