//! Geometry strategies.
//!
//! [`GeometrySource`] picks at runtime between the built-in quad and an OBJ
//! model, so both paths go through the same upload and draw code.

use std::path::PathBuf;

use tracing::debug;

use crate::error::ResourceResult;
use crate::mesh::MeshData;
use crate::obj::load_obj;

/// Where the renderer's mesh comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeometrySource {
    /// The built-in textured quad.
    StaticQuad,
    /// A Wavefront OBJ file.
    Model(PathBuf),
}

impl GeometrySource {
    /// Produces the mesh for this source.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or is not drawable.
    pub fn load(&self) -> ResourceResult<MeshData> {
        match self {
            GeometrySource::StaticQuad => {
                debug!("Using built-in quad geometry");
                let mesh = MeshData::quad();
                mesh.validate("quad")?;
                Ok(mesh)
            }
            GeometrySource::Model(path) => load_obj(path),
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            GeometrySource::StaticQuad => "static quad".to_string(),
            GeometrySource::Model(path) => format!("model {}", path.display()),
        }
    }
}
