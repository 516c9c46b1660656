//! Command Sequences
//!
//! A [`CommandSequence`] is an ordered, replayable list of GPU operations that
//! a camera executes during its render pass. [`CommandSequenceBuilder`] emits
//! the capture pipeline:
//!
//! ```text
//! CurrentActive ──copy──► _ScreenCopy ──effect──► A ◄──effect──► B ──► output
//!                                                  (ping-pong, N-1 passes)
//! ```
//!
//! Without an effect material the copy buffer is blitted straight into the
//! output. With one, the first pass writes A, odd iterations write A→B, even
//! iterations write B→A, and the final resolve reads A for odd iteration
//! counts and B for even ones. A pass never reads and writes the same buffer.
//!
//! Blur strength is **not** part of the sequence: it is a shader global
//! pushed before each execution, so changing it never requires a rebuild.

use std::fmt;

use smallvec::SmallVec;

use crate::resources::identity::next_identity;
use crate::resources::{EffectMaterial, PropertyId, RenderTextureId, TextureFilter, WorkingBufferIds};
use crate::settings::MIN_ITERATIONS;

/// Source or destination of a blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitTarget {
    /// Whatever the camera has composited when the sequence runs.
    CurrentActive,
    /// A temporary buffer allocated earlier in the same sequence.
    Temporary(PropertyId),
    /// A persistent render texture.
    Texture(RenderTextureId),
}

/// Size of a temporary buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporarySize {
    /// Same size as the currently active render target.
    FullScreen,
    Fixed { width: u32, height: u32 },
}

/// One GPU operation.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    GetTemporary {
        id: PropertyId,
        size: TemporarySize,
        filter: TextureFilter,
    },
    Blit {
        source: BlitTarget,
        dest: BlitTarget,
        material: Option<EffectMaterial>,
    },
    ReleaseTemporary { id: PropertyId },
}

/// Ordered list of GPU operations with a unique identity.
pub struct CommandSequence {
    id: u64,
    name: &'static str,
    commands: Vec<GpuCommand>,
    effective_iterations: u32,
}

impl CommandSequence {
    /// Unique identity; a rebuilt sequence always gets a new one.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Number of effect passes actually recorded (`1` for straight copies).
    #[inline]
    #[must_use]
    pub fn effective_iterations(&self) -> u32 {
        self.effective_iterations
    }

    /// Iterates over the blits only, as `(source, dest, has_material)`.
    pub fn blits(&self) -> impl Iterator<Item = (BlitTarget, BlitTarget, bool)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            GpuCommand::Blit {
                source,
                dest,
                material,
            } => Some((*source, *dest, material.is_some())),
            _ => None,
        })
    }
}

impl fmt::Debug for CommandSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSequence")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("commands", &self.commands.len())
            .field("effective_iterations", &self.effective_iterations)
            .finish()
    }
}

/// Returns the effect buffer holding the result after `iterations` passes.
///
/// Odd counts end in A, even counts in B.
#[inline]
#[must_use]
pub fn final_effect_buffer(ids: &WorkingBufferIds, iterations: u32) -> PropertyId {
    if iterations % 2 == 1 {
        ids.effect_a
    } else {
        ids.effect_b
    }
}

/// Builds the capture command sequence.
#[derive(Debug, Clone)]
pub struct CommandSequenceBuilder {
    target: RenderTextureId,
    working_size: (u32, u32),
    filter: TextureFilter,
    material: Option<EffectMaterial>,
    iterations: u32,
    name: &'static str,
}

impl CommandSequenceBuilder {
    #[must_use]
    pub fn new(target: RenderTextureId) -> Self {
        Self {
            target,
            working_size: (1, 1),
            filter: TextureFilter::Bilinear,
            material: None,
            iterations: MIN_ITERATIONS,
            name: "Static Blur",
        }
    }

    /// Size of the effect buffers; zero dimensions are clamped to 1.
    #[must_use]
    pub fn working_size(mut self, width: u32, height: u32) -> Self {
        self.working_size = (width.max(1), height.max(1));
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: TextureFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn material(mut self, material: Option<EffectMaterial>) -> Self {
        self.material = material;
        self
    }

    /// Number of effect passes; `0` is treated as `1`.
    #[must_use]
    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(MIN_ITERATIONS);
        self
    }

    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    #[must_use]
    pub fn build(self) -> CommandSequence {
        let ids = WorkingBufferIds::get();
        let output = BlitTarget::Texture(self.target);
        let copy = BlitTarget::Temporary(ids.copy);
        let mut commands = Vec::with_capacity(8 + self.iterations as usize);

        commands.push(GpuCommand::GetTemporary {
            id: ids.copy,
            size: TemporarySize::FullScreen,
            filter: self.filter,
        });
        commands.push(GpuCommand::Blit {
            source: BlitTarget::CurrentActive,
            dest: copy,
            material: None,
        });

        let Some(material) = self.material else {
            commands.push(GpuCommand::Blit {
                source: copy,
                dest: output,
                material: None,
            });
            commands.push(GpuCommand::ReleaseTemporary { id: ids.copy });
            return Self::finish(self.name, commands, 1);
        };

        let (width, height) = self.working_size;
        let working = TemporarySize::Fixed { width, height };
        let a = BlitTarget::Temporary(ids.effect_a);
        let b = BlitTarget::Temporary(ids.effect_b);

        commands.push(GpuCommand::GetTemporary {
            id: ids.effect_a,
            size: working,
            filter: self.filter,
        });
        commands.push(GpuCommand::Blit {
            source: copy,
            dest: a,
            material: Some(material.clone()),
        });
        commands.push(GpuCommand::ReleaseTemporary { id: ids.copy });

        let mut released: SmallVec<[PropertyId; 2]> = SmallVec::new();
        released.push(ids.effect_a);

        if self.iterations > 1 {
            commands.push(GpuCommand::GetTemporary {
                id: ids.effect_b,
                size: working,
                filter: self.filter,
            });
            released.push(ids.effect_b);

            for i in 1..self.iterations {
                let (source, dest) = if i % 2 == 1 { (a, b) } else { (b, a) };
                commands.push(GpuCommand::Blit {
                    source,
                    dest,
                    material: Some(material.clone()),
                });
            }
        }

        commands.push(GpuCommand::Blit {
            source: BlitTarget::Temporary(final_effect_buffer(&ids, self.iterations)),
            dest: output,
            material: None,
        });
        commands.extend(
            released
                .into_iter()
                .map(|id| GpuCommand::ReleaseTemporary { id }),
        );

        Self::finish(self.name, commands, self.iterations)
    }

    fn finish(
        name: &'static str,
        commands: Vec<GpuCommand>,
        effective_iterations: u32,
    ) -> CommandSequence {
        CommandSequence {
            id: next_identity(),
            name,
            commands,
            effective_iterations,
        }
    }
}
