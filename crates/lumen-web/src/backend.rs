// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! WebGL2 render backend.
//!
//! One [`WebGlTarget`] owns one canvas and its WebGL2 context. The canvas is
//! laid over its container as a full-size, non-interactive layer; the page's
//! own content stays clickable underneath.

use glam::Mat4;
use js_sys::Float32Array;
use lumen_app_core::RendererOptions;
use lumen_scene_port::{
    ContainerId, Dimensions, RenderBackend, RenderTarget, SceneError, SceneGraph,
};
use serde::Serialize;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, HtmlCanvasElement, WebGl2RenderingContext as Gl, WebGlBuffer,
    WebGlProgram, WebGlShader, WebGlUniformLocation, WebglLoseContext,
};

use crate::js_error;

const VERTEX_SHADER: &str = r"#version 300 es
layout(location = 0) in vec3 a_position;
uniform mat4 u_mvp;
void main() {
    gl_Position = u_mvp * vec4(a_position, 1.0);
}
";

const FRAGMENT_SHADER: &str = r"#version 300 es
precision mediump float;
uniform vec4 u_color;
out vec4 frag_color;
void main() {
    frag_color = u_color;
}
";

/// Floats per vertex in every geometry buffer.
pub const POSITION_COMPONENTS: usize = 3;

/// Inline style for an output canvas stacked at `z_index`.
pub fn overlay_style(z_index: i32) -> String {
    format!(
        "position:absolute;inset:0;width:100%;height:100%;display:block;\
         pointer-events:none;z-index:{z_index}"
    )
}

/// Context attributes handed to `getContext("webgl2", ...)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextAttributes {
    antialias: bool,
    alpha: bool,
    premultiplied_alpha: bool,
    power_preference: &'static str,
}

impl ContextAttributes {
    fn from_options(options: &RendererOptions) -> Self {
        Self {
            antialias: options.antialias,
            alpha: options.alpha,
            premultiplied_alpha: options.alpha,
            power_preference: options.power_preference.as_str(),
        }
    }
}

fn gl_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Vertex buffer holding `vec3` positions.
#[derive(Debug)]
pub struct WebGlGeometry {
    buffer: WebGlBuffer,
    vertex_count: i32,
    mode: u32,
}

impl WebGlGeometry {
    /// Vertices drawn per call.
    pub fn vertex_count(&self) -> i32 {
        self.vertex_count
    }
}

/// Flat-colour shader program.
#[derive(Debug)]
pub struct WebGlMaterial {
    program: WebGlProgram,
    mvp: Option<WebGlUniformLocation>,
    color_uniform: Option<WebGlUniformLocation>,
    /// RGBA colour uploaded on every draw.
    pub color: [f32; 4],
}

/// Creates canvases inside containers found by element id.
#[derive(Debug)]
pub struct WebGlBackend {
    document: Document,
    created: u64,
}

impl WebGlBackend {
    /// Backend bound to the current window's document.
    pub fn new() -> Result<Self, SceneError> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| SceneError::Configuration("no document available".into()))?;
        Ok(Self::from_document(document))
    }

    /// Backend bound to an explicit document.
    pub fn from_document(document: Document) -> Self {
        Self {
            document,
            created: 0,
        }
    }

    /// Targets created over this backend's lifetime.
    pub fn targets_created(&self) -> u64 {
        self.created
    }
}

impl RenderBackend for WebGlBackend {
    type Target = WebGlTarget;

    fn create_target(
        &mut self,
        container: &ContainerId,
        options: &RendererOptions,
    ) -> Result<WebGlTarget, SceneError> {
        let element = self
            .document
            .get_element_by_id(container.as_str())
            .ok_or_else(|| SceneError::Configuration(format!("container #{container} not found")))?;
        let canvas: HtmlCanvasElement = self
            .document
            .create_element("canvas")
            .map_err(|err| js_error("create canvas", &err))?
            .dyn_into()
            .map_err(|_| SceneError::Backend("canvas element has an unexpected type".into()))?;
        canvas
            .set_attribute("aria-hidden", "true")
            .map_err(|err| js_error("canvas attribute", &err))?;

        let attributes = serde_wasm_bindgen::to_value(&ContextAttributes::from_options(options))
            .map_err(|err| SceneError::Backend(err.to_string()))?;
        let gl: Gl = canvas
            .get_context_with_context_options("webgl2", &attributes)
            .map_err(|err| js_error("webgl2 context", &err))?
            .ok_or_else(|| SceneError::Allocation("webgl2 is not available".into()))?
            .dyn_into()
            .map_err(|_| SceneError::Allocation("context is not webgl2".into()))?;

        self.created += 1;
        debug!(container = %container, serial = self.created, "webgl2 target created");
        Ok(WebGlTarget {
            container: element,
            canvas,
            gl,
            clear_color: options.clear_color,
            size: Dimensions::new(0, 0),
            attached: false,
            context_lost: false,
            disposed: false,
        })
    }
}

/// One canvas, its WebGL2 context and the container it overlays.
#[derive(Debug)]
pub struct WebGlTarget {
    container: Element,
    canvas: HtmlCanvasElement,
    gl: Gl,
    clear_color: [f32; 4],
    size: Dimensions,
    attached: bool,
    context_lost: bool,
    disposed: bool,
}

impl WebGlTarget {
    /// Output canvas.
    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    /// Upload `positions` (packed `x, y, z` triples) drawn with `mode`
    /// (e.g. `LINE_LOOP`, `TRIANGLES`).
    pub fn create_geometry(&self, positions: &[f32], mode: u32) -> Result<WebGlGeometry, SceneError> {
        if !positions.len().is_multiple_of(POSITION_COMPONENTS) {
            return Err(SceneError::Backend(format!(
                "{} floats do not form whole vertices",
                positions.len()
            )));
        }
        let vertex_count = i32::try_from(positions.len() / POSITION_COMPONENTS)
            .map_err(|_| SceneError::Backend("geometry too large".into()))?;
        let buffer = self
            .gl
            .create_buffer()
            .ok_or_else(|| SceneError::Backend("create_buffer failed".into()))?;
        self.gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&buffer));
        let data = Float32Array::from(positions);
        self.gl
            .buffer_data_with_array_buffer_view(Gl::ARRAY_BUFFER, &data, Gl::STATIC_DRAW);
        self.gl.bind_buffer(Gl::ARRAY_BUFFER, None);
        Ok(WebGlGeometry {
            buffer,
            vertex_count,
            mode,
        })
    }

    /// Compile the flat-colour program with `color`.
    pub fn create_material(&self, color: [f32; 4]) -> Result<WebGlMaterial, SceneError> {
        let vertex = compile_shader(&self.gl, Gl::VERTEX_SHADER, VERTEX_SHADER)?;
        let fragment = match compile_shader(&self.gl, Gl::FRAGMENT_SHADER, FRAGMENT_SHADER) {
            Ok(shader) => shader,
            Err(err) => {
                self.gl.delete_shader(Some(&vertex));
                return Err(err);
            }
        };
        let program = link_program(&self.gl, &vertex, &fragment)?;
        Ok(WebGlMaterial {
            mvp: self.gl.get_uniform_location(&program, "u_mvp"),
            color_uniform: self.gl.get_uniform_location(&program, "u_color"),
            program,
            color,
        })
    }

    fn check_context(&mut self) -> Result<(), SceneError> {
        if !self.context_lost && self.gl.is_context_lost() {
            self.context_lost = true;
        }
        if self.context_lost {
            Err(SceneError::ContextLost)
        } else {
            Ok(())
        }
    }
}

fn compile_shader(gl: &Gl, kind: u32, source: &str) -> Result<WebGlShader, SceneError> {
    let shader = gl
        .create_shader(kind)
        .ok_or_else(|| SceneError::Backend("create_shader failed".into()))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    if gl
        .get_shader_parameter(&shader, Gl::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(shader)
    } else {
        let log = gl.get_shader_info_log(&shader).unwrap_or_default();
        gl.delete_shader(Some(&shader));
        Err(SceneError::Backend(format!("shader compile failed: {log}")))
    }
}

// Shaders are flagged for deletion either way; the program keeps them alive.
fn link_program(
    gl: &Gl,
    vertex: &WebGlShader,
    fragment: &WebGlShader,
) -> Result<WebGlProgram, SceneError> {
    let program = gl.create_program();
    let result = match program {
        None => Err(SceneError::Backend("create_program failed".into())),
        Some(program) => {
            gl.attach_shader(&program, vertex);
            gl.attach_shader(&program, fragment);
            gl.link_program(&program);
            if gl
                .get_program_parameter(&program, Gl::LINK_STATUS)
                .as_bool()
                .unwrap_or(false)
            {
                Ok(program)
            } else {
                let log = gl.get_program_info_log(&program).unwrap_or_default();
                gl.delete_program(Some(&program));
                Err(SceneError::Backend(format!("program link failed: {log}")))
            }
        }
    };
    gl.delete_shader(Some(vertex));
    gl.delete_shader(Some(fragment));
    result
}

impl RenderTarget for WebGlTarget {
    type Geometry = WebGlGeometry;
    type Material = WebGlMaterial;

    fn set_size(&mut self, dimensions: Dimensions) {
        let (width, height) = dimensions.physical_size();
        self.canvas.set_width(width.max(1));
        self.canvas.set_height(height.max(1));
        self.size = dimensions;
    }

    fn size(&self) -> Dimensions {
        self.size
    }

    fn attach_surface(&mut self, z_index: i32) -> Result<(), SceneError> {
        if self.attached {
            return Ok(());
        }
        self.canvas
            .set_attribute("style", &overlay_style(z_index))
            .map_err(|err| js_error("canvas style", &err))?;
        self.container
            .append_child(&self.canvas)
            .map_err(|err| js_error("append canvas", &err))?;
        self.attached = true;
        Ok(())
    }

    fn detach_surface(&mut self) -> Result<(), SceneError> {
        if self.attached {
            self.canvas.remove();
            self.attached = false;
        }
        Ok(())
    }

    fn is_surface_attached(&self) -> bool {
        self.attached
    }

    fn render(&mut self, scene: &SceneGraph<Self>, view_projection: Mat4) -> Result<(), SceneError> {
        self.check_context()?;
        let gl = &self.gl;
        let (width, height) = self.size.physical_size();
        let [r, g, b, a] = self.clear_color;
        gl.viewport(0, 0, gl_int(width), gl_int(height));
        gl.enable(Gl::DEPTH_TEST);
        gl.clear_color(r, g, b, a);
        gl.clear(Gl::COLOR_BUFFER_BIT | Gl::DEPTH_BUFFER_BIT);

        for item in scene.draw_items() {
            let material = item.material;
            let geometry = item.geometry;
            let mvp = view_projection * item.world_transform;
            gl.use_program(Some(&material.program));
            gl.uniform_matrix4fv_with_f32_array(material.mvp.as_ref(), false, &mvp.to_cols_array());
            gl.uniform4fv_with_f32_array(material.color_uniform.as_ref(), &material.color);
            gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&geometry.buffer));
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_with_i32(0, 3, Gl::FLOAT, false, 0, 0);
            gl.draw_arrays(geometry.mode, 0, geometry.vertex_count);
        }
        gl.bind_buffer(Gl::ARRAY_BUFFER, None);
        gl.use_program(None);
        Ok(())
    }

    fn dispose_geometry(&mut self, geometry: WebGlGeometry) -> Result<(), SceneError> {
        if !self.context_lost {
            self.gl.delete_buffer(Some(&geometry.buffer));
        }
        Ok(())
    }

    fn dispose_material(&mut self, material: WebGlMaterial) -> Result<(), SceneError> {
        if !self.context_lost {
            self.gl.delete_program(Some(&material.program));
        }
        Ok(())
    }

    fn mark_context_lost(&mut self) {
        self.context_lost = true;
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost || self.gl.is_context_lost()
    }

    fn dispose(&mut self) -> Result<(), SceneError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        // Detach first: the forced loss below must not reach the container's
        // context listeners.
        self.detach_surface()?;
        if !self.is_context_lost() {
            match self.gl.get_extension("WEBGL_lose_context") {
                Ok(Some(extension)) => extension.unchecked_into::<WebglLoseContext>().lose_context(),
                Ok(None) => debug!("WEBGL_lose_context unavailable; context left to the GC"),
                Err(err) => warn!(error = ?err, "WEBGL_lose_context lookup failed"),
            }
        }
        self.canvas.set_width(0);
        self.canvas.set_height(0);
        Ok(())
    }
}
