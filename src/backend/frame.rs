//! Command recording for one frame.
//!
//! wgpu wants whole render passes with their load operations known up front,
//! while callers issue GL-style binds, clears and draws. Commands are buffered
//! here and grouped into passes: a new pass starts whenever the attachments
//! differ from the open pass, or a clear arrives after draws.

use crate::context::{BufferId, CubeFace, IndexFormat, ProgramId, TextureId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Attached {
    pub texture: TextureId,
    pub face: Option<CubeFace>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColorTarget {
    /// The surface, or the headless stand-in for it.
    Default,
    Texture(Attached),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PassTarget {
    pub color: Option<ColorTarget>,
    pub depth: Option<Attached>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VertexSource {
    Buffer { buffer: BufferId, offset: u64 },
    /// Attribute the caller did not supply; reads zeros.
    Zero,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrawKind {
    Indexed {
        buffer: BufferId,
        offset: u64,
        format: IndexFormat,
        count: u32,
    },
    Arrays {
        first: u32,
        count: u32,
    },
}

#[derive(Clone, Debug)]
pub struct Draw {
    pub pipeline: usize,
    pub program: ProgramId,
    /// Dynamic offset of this draw's uniform snapshot.
    pub uniform_offset: Option<u32>,
    pub texture_group: usize,
    pub vertex_buffers: Vec<VertexSource>,
    pub viewport: (u32, u32),
    pub kind: DrawKind,
}

#[derive(Clone, Debug)]
pub struct RecordedPass {
    pub target: PassTarget,
    /// `None` loads the existing contents.
    pub clear_color: Option<[f32; 4]>,
    pub clear_depth: Option<f32>,
    pub draws: Vec<Draw>,
}

impl RecordedPass {
    fn new(target: PassTarget) -> Self {
        Self {
            target,
            clear_color: None,
            clear_depth: None,
            draws: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Frame {
    pub passes: Vec<RecordedPass>,
    /// Uniform snapshots, each starting at an aligned offset.
    pub uniforms: Vec<u8>,
}

impl Frame {
    /// The pass drawing into `target`, opening one if needed.
    pub fn pass_for(&mut self, target: PassTarget) -> &mut RecordedPass {
        let reuse = matches!(self.passes.last(), Some(pass) if pass.target == target);
        if !reuse {
            self.passes.push(RecordedPass::new(target));
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    /// Like [`Frame::pass_for`], but a pass that already drew is closed so the
    /// clear can become the next pass's load operation.
    pub fn pass_for_clear(&mut self, target: PassTarget) -> &mut RecordedPass {
        let fresh = matches!(self.passes.last(), Some(pass) if pass.target == target && pass.draws.is_empty());
        if !fresh {
            self.passes.push(RecordedPass::new(target));
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    pub fn clear_color(&mut self, target: PassTarget, color: [f32; 4]) {
        self.pass_for_clear(target).clear_color = Some(color);
    }

    pub fn clear_depth(&mut self, target: PassTarget) {
        self.pass_for_clear(target).clear_depth = Some(1.0);
    }

    /// Appends a uniform snapshot and returns its offset.
    pub fn push_uniforms(&mut self, bytes: &[u8], alignment: u64) -> u32 {
        let alignment = alignment.max(1) as usize;
        let offset = self.uniforms.len().div_ceil(alignment) * alignment;
        self.uniforms.resize(offset, 0);
        self.uniforms.extend_from_slice(bytes);
        offset as u32
    }

    /// Total size rounded up so the last snapshot's binding fits.
    pub fn uniform_size(&self, alignment: u64) -> u64 {
        let alignment = alignment.max(4);
        (self.uniforms.len() as u64).div_ceil(alignment) * alignment
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}
