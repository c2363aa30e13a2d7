//! Per-frame uniform preparation.
//!
//! The renderer owns the GPU side of a frame (clear, bind, draw); this module
//! computes everything that goes into the uniforms so it can be checked
//! without a device.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::shader::globals;
use crate::uniform::{UniformTarget, UniformValue};

/// Drawable area in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Records a resize. Zero-sized requests (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_degrees.to_radians(), aspect, self.near, self.far)
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// How the model transform evolves over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelMotion {
    #[default]
    Static,
    /// Rotates about X then Y by the elapsed seconds, in radians.
    Spin,
}

impl ModelMotion {
    pub fn transform(self, elapsed_seconds: f32) -> Mat4 {
        match self {
            ModelMotion::Static => Mat4::IDENTITY,
            ModelMotion::Spin => {
                Mat4::from_rotation_y(elapsed_seconds) * Mat4::from_rotation_x(elapsed_seconds)
            }
        }
    }
}

/// Fixed light and material constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub ambient_strength: f32,
    pub specular_strength: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            position: Vec3::new(2.0, 2.0, 2.0),
            color: Vec3::ONE,
            intensity: 1.0,
            ambient_strength: 0.1,
            specular_strength: 0.5,
        }
    }
}

/// Matrices computed for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatrices {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameDriver {
    pub projection: Projection,
    pub lighting: Lighting,
    pub motion: ModelMotion,
}

impl FrameDriver {
    pub fn new(projection: Projection, lighting: Lighting, motion: ModelMotion) -> Self {
        Self {
            projection,
            lighting,
            motion,
        }
    }

    pub fn matrices(&self, camera: &Camera, viewport: &Viewport, elapsed_seconds: f32) -> FrameMatrices {
        FrameMatrices {
            model: self.motion.transform(elapsed_seconds),
            view: camera.view_matrix(),
            projection: self.projection.matrix(viewport.aspect()),
        }
    }

    /// Writes lighting, camera position and the three matrices.
    pub fn prepare(
        &self,
        camera: &Camera,
        viewport: &Viewport,
        elapsed_seconds: f32,
        target: &mut impl UniformTarget,
    ) -> FrameMatrices {
        let lighting = &self.lighting;
        target.set_uniform(globals::LIGHT_POSITION, UniformValue::Vec3(lighting.position));
        target.set_uniform(globals::LIGHT_COLOR, UniformValue::Vec3(lighting.color));
        target.set_uniform(globals::LIGHT_INTENSITY, UniformValue::Float(lighting.intensity));
        target.set_uniform(
            globals::AMBIENT_STRENGTH,
            UniformValue::Float(lighting.ambient_strength),
        );
        target.set_uniform(
            globals::SPECULAR_STRENGTH,
            UniformValue::Float(lighting.specular_strength),
        );
        target.set_uniform(globals::VIEW_POSITION, UniformValue::Vec3(camera.position()));

        let matrices = self.matrices(camera, viewport, elapsed_seconds);
        target.set_uniform(globals::MODEL, UniformValue::Mat4(matrices.model));
        target.set_uniform(globals::VIEW, UniformValue::Mat4(matrices.view));
        target.set_uniform(globals::PROJECTION, UniformValue::Mat4(matrices.projection));
        matrices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniform::UniformBlock;

    #[derive(Default)]
    struct Recorder(Vec<(String, UniformValue)>);

    impl UniformTarget for Recorder {
        fn set_uniform(&mut self, name: &str, value: UniformValue) {
            self.0.push((name.to_string(), value));
        }
    }

    #[test]
    fn resize_updates_projection_aspect() {
        let driver = FrameDriver::default();
        let camera = Camera::default();
        let mut viewport = Viewport::new(800, 600);
        assert!(viewport.resize(1920, 1080));
        assert_eq!(viewport, Viewport { width: 1920, height: 1080 });

        let matrices = driver.matrices(&camera, &viewport, 0.0);
        let expected = Mat4::perspective_rh(45f32.to_radians(), 1920.0 / 1080.0, 0.1, 100.0);
        assert_eq!(matrices.projection, expected);
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let mut viewport = Viewport::new(640, 480);
        assert!(!viewport.resize(0, 480));
        assert!(!viewport.resize(640, 480));
        assert_eq!(viewport.aspect(), 640.0 / 480.0);
    }

    #[test]
    fn static_motion_is_identity() {
        assert_eq!(ModelMotion::Static.transform(12.5), Mat4::IDENTITY);
        let spin = ModelMotion::Spin.transform(0.5);
        let expected = Mat4::from_rotation_y(0.5) * Mat4::from_rotation_x(0.5);
        assert_eq!(spin, expected);
    }

    #[test]
    fn prepare_sets_lighting_before_matrices() {
        let driver = FrameDriver::default();
        let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0));
        let mut recorder = Recorder::default();
        driver.prepare(&camera, &Viewport::new(800, 600), 1.0, &mut recorder);

        let names: Vec<_> = recorder.0.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(&names[names.len() - 3..], &[globals::MODEL, globals::VIEW, globals::PROJECTION]);
        assert!(recorder
            .0
            .contains(&(globals::VIEW_POSITION.to_string(), UniformValue::Vec3(Vec3::new(0.0, 0.0, 3.0)))));
    }

    #[test]
    fn prepare_fills_every_global() {
        let driver = FrameDriver::new(Projection::default(), Lighting::default(), ModelMotion::Spin);
        let camera = Camera::default();
        let mut block = UniformBlock::new(globals::layout());
        let matrices = driver.prepare(&camera, &Viewport::new(1920, 1080), 2.0, &mut block);

        assert_eq!(block.get(globals::VIEW), Some(UniformValue::Mat4(camera.view_matrix())));
        assert_eq!(block.get(globals::MODEL), Some(UniformValue::Mat4(matrices.model)));
        assert_eq!(
            block.get(globals::LIGHT_POSITION),
            Some(UniformValue::Vec3(Vec3::new(2.0, 2.0, 2.0)))
        );
        assert_eq!(block.get(globals::AMBIENT_STRENGTH), Some(UniformValue::Float(0.1)));
    }
}
