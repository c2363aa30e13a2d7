use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Pitch limit in degrees; keeps `front` away from the world up axis.
pub const PITCH_LIMIT: f32 = 89.0;

/// Starting state for a [`Camera`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub position: Vec3,
    /// Degrees; -90 looks down -Z.
    pub yaw: f32,
    pub pitch: f32,
    /// World units per second.
    pub movement_speed: f32,
    /// Degrees per unit of mouse offset.
    pub mouse_sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            yaw: -90.0,
            pitch: 0.0,
            movement_speed: 2.5,
            mouse_sensitivity: 0.1,
        }
    }
}

/// First-person fly camera driven by yaw/pitch deltas.
///
/// `front`, `right` and `up` are recomputed together whenever the orientation
/// changes, so they always form an orthonormal basis.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    movement_speed: f32,
    mouse_sensitivity: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Camera {
    pub const WORLD_UP: Vec3 = Vec3::Y;

    pub fn new(position: Vec3) -> Self {
        Self::from_settings(CameraSettings {
            position,
            ..CameraSettings::default()
        })
    }

    pub fn from_settings(settings: CameraSettings) -> Self {
        let mut camera = Self {
            position: settings.position,
            yaw: settings.yaw,
            pitch: settings.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            movement_speed: settings.movement_speed,
            mouse_sensitivity: settings.mouse_sensitivity,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
        };
        camera.update_vectors();
        camera
    }

    /// Moves along the camera axes.
    ///
    /// Each component of `direction` only contributes its sign: z walks along
    /// `front`, x strafes along `right`, y flies along `up`. Contributions add
    /// up without renormalization.
    pub fn move_by(&mut self, direction: Vec3, dt: f32) {
        let velocity = self.movement_speed * dt;
        let axes = [
            (direction.z, self.front),
            (direction.x, self.right),
            (direction.y, self.up),
        ];
        for (component, axis) in axes {
            if component > 0.0 {
                self.position += axis * velocity;
            } else if component < 0.0 {
                self.position -= axis * velocity;
            }
        }
    }

    /// Applies a mouse offset, in the same units the cursor reports.
    pub fn look(&mut self, x_offset: f32, y_offset: f32) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch = (self.pitch + y_offset * self.mouse_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn movement_speed(&self) -> f32 {
        self.movement_speed
    }

    pub fn mouse_sensitivity(&self) -> f32 {
        self.mouse_sensitivity
    }

    fn update_vectors(&mut self) {
        self.front = front_from_angles(self.yaw, self.pitch);
        self.right = self.front.cross(Self::WORLD_UP).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_settings(CameraSettings::default())
    }
}

/// Unit view direction for yaw/pitch given in degrees.
pub fn front_from_angles(yaw: f32, pitch: f32) -> Vec3 {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
}
