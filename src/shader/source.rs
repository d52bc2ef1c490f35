use std::{
    io,
    path::{Path, PathBuf},
};

/// Vertex and fragment WGSL of one named program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// Given a program name, returns its two source texts or fails.
pub trait ShaderSourceProvider {
    fn load(&self, name: &str) -> io::Result<ShaderSource>;
}

impl<F> ShaderSourceProvider for F
where
    F: Fn(&str) -> io::Result<ShaderSource>,
{
    fn load(&self, name: &str) -> io::Result<ShaderSource> {
        self(name)
    }
}

/// The programs shipped with the crate, compiled into the binary.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbeddedShaders;

impl ShaderSourceProvider for EmbeddedShaders {
    fn load(&self, name: &str) -> io::Result<ShaderSource> {
        let (vertex, fragment) = match name {
            "main" => (
                include_str!("../../shaders/main.vert.wgsl"),
                include_str!("../../shaders/main.frag.wgsl"),
            ),
            "shadow" => (
                include_str!("../../shaders/shadow.vert.wgsl"),
                include_str!("../../shaders/shadow.frag.wgsl"),
            ),
            "postproc" => (
                include_str!("../../shaders/postproc.vert.wgsl"),
                include_str!("../../shaders/postproc.frag.wgsl"),
            ),
            "skybox" => (
                include_str!("../../shaders/skybox.vert.wgsl"),
                include_str!("../../shaders/skybox.frag.wgsl"),
            ),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no embedded shader named `{name}`"),
                ));
            }
        };
        Ok(ShaderSource::new(vertex, fragment))
    }
}

/// Reads `<root>/<name>.vert.wgsl` and `<root>/<name>.frag.wgsl`.
#[derive(Clone, Debug)]
pub struct DirectoryShaders {
    root: PathBuf,
}

impl DirectoryShaders {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShaderSourceProvider for DirectoryShaders {
    fn load(&self, name: &str) -> io::Result<ShaderSource> {
        let vertex = std::fs::read_to_string(self.root.join(format!("{name}.vert.wgsl")))?;
        let fragment = std::fs::read_to_string(self.root.join(format!("{name}.frag.wgsl")))?;
        Ok(ShaderSource { vertex, fragment })
    }
}
