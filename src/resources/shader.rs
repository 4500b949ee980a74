//! Shader program handles.
//!
//! Shader sources are owned by the resource layer; the render core only sees
//! compiled programs through [`ShaderId`]. The id doubles as the sort key the
//! command buffer uses to minimise program switches, so backends must hand
//! out ids in a stable, comparable order.

use std::borrow::Cow;

/// Opaque handle to a compiled GPU program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderId(pub u32);

/// Describes a program to be compiled by the backend.
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub name: Cow<'static, str>,
    pub vertex_path: Cow<'static, str>,
    pub fragment_path: Cow<'static, str>,
    /// Preprocessor defines prepended to both stages.
    pub defines: Vec<Cow<'static, str>>,
}

impl ShaderDesc {
    #[must_use]
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        vertex_path: impl Into<Cow<'static, str>>,
        fragment_path: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_path: vertex_path.into(),
            fragment_path: fragment_path.into(),
            defines: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_define(mut self, define: impl Into<Cow<'static, str>>) -> Self {
        self.defines.push(define.into());
        self
    }
}
