//! Named shader programs.
//!
//! [`ShaderCache`] builds each program once: it asks a
//! [`ShaderSourceProvider`] for the WGSL of both stages, compiles and links
//! them (see [`reflect`]) and hands the result to the [`RenderContext`].
//! Build failures are fatal for [`ShaderCache::get_shader`]: a broken shader
//! is a deployment error, so the error is logged and the process exits.

pub mod reflect;
mod source;

use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

pub use reflect::{
    AttributeFormat, ProgramLayout, TextureKind, TextureSlot, UniformField, VertexAttribute,
};
pub use source::{DirectoryShaders, EmbeddedShaders, ShaderSource, ShaderSourceProvider};

use crate::context::{ProgramId, RenderContext, UniformLocation, UniformValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("could not read the sources of shader `{name}`")]
    Source {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} stage of shader `{name}` failed to compile:\n{log}")]
    Compile {
        name: String,
        stage: Stage,
        log: String,
    },
    #[error("shader `{name}` failed to link: {log}")]
    Link { name: String, log: String },
}

/// A linked program with memoized location lookups.
#[derive(Debug)]
pub struct Shader {
    name: String,
    program: ProgramId,
    layout: ProgramLayout,
    uniforms: RefCell<HashMap<String, Option<UniformLocation>>>,
    attributes: RefCell<HashMap<String, Option<u32>>>,
}

impl Shader {
    fn new(name: &str, program: ProgramId, layout: ProgramLayout) -> Self {
        Self {
            name: name.to_string(),
            program,
            layout,
            uniforms: RefCell::new(HashMap::new()),
            attributes: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    /// `None` means the program has no such uniform; callers skip the write.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        *self
            .uniforms
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| self.layout.uniform(name))
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        *self
            .attributes
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| self.layout.attribute(name))
    }

    /// Writes `name` if the program declares it. Returns whether it did.
    pub fn set_uniform(
        &self,
        ctx: &mut dyn RenderContext,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> bool {
        match self.uniform_location(name) {
            Some(location) => {
                ctx.set_uniform(location, value.into());
                true
            }
            None => false,
        }
    }
}

pub struct ShaderCache {
    sources: Box<dyn ShaderSourceProvider>,
    programs: HashMap<String, Rc<Shader>>,
}

impl ShaderCache {
    pub fn new(sources: impl ShaderSourceProvider + 'static) -> Self {
        Self {
            sources: Box::new(sources),
            programs: HashMap::new(),
        }
    }

    /// Returns the cached program `name`, building it on first use.
    ///
    /// Exits the process when the program cannot be built.
    pub fn get_shader(&mut self, ctx: &mut dyn RenderContext, name: &str) -> Rc<Shader> {
        match self.try_get_shader(ctx, name) {
            Ok(shader) => shader,
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        }
    }

    pub fn try_get_shader(
        &mut self,
        ctx: &mut dyn RenderContext,
        name: &str,
    ) -> Result<Rc<Shader>, ShaderError> {
        if let Some(shader) = self.programs.get(name) {
            return Ok(shader.clone());
        }
        let source = self.sources.load(name).map_err(|source| ShaderError::Source {
            name: name.to_string(),
            source,
        })?;
        let layout = reflect::build_program(name, &source)?;
        let program = ctx.create_program(name, &source, &layout)?;
        log::debug!(
            "Built shader `{name}` ({} uniforms, {} textures, {} attributes)",
            layout.uniforms.len(),
            layout.textures.len(),
            layout.attributes.len()
        );
        let shader = Rc::new(Shader::new(name, program, layout));
        self.programs.insert(name.to_string(), shader.clone());
        Ok(shader)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl Default for ShaderCache {
    fn default() -> Self {
        Self::new(EmbeddedShaders)
    }
}
