//! Tagged uniform values and a CPU-side uniform block laid out by WGSL rules.

use glam::{Mat4, Vec2, Vec3, Vec4};
use log::trace;

/// One value for a named uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn write(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Float(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Int(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec3(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec4(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Mat4(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        UniformValue::Mat4(value)
    }
}

/// WGSL type of a uniform member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    /// `AlignOf` in the WGSL uniform address space.
    pub fn align(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 | UniformKind::Vec4 | UniformKind::Mat4 => 16,
        }
    }

    pub fn size(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub kind: UniformKind,
    pub offset: usize,
}

/// Member offsets of a WGSL uniform struct, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: usize,
}

impl UniformLayout {
    pub fn new(members: &[(&str, UniformKind)]) -> Self {
        let mut fields = Vec::with_capacity(members.len());
        let mut offset = 0;
        let mut struct_align = 16;
        for &(name, kind) in members {
            offset = align_to(offset, kind.align());
            struct_align = struct_align.max(kind.align());
            fields.push(UniformField {
                name: name.to_string(),
                kind,
                offset,
            });
            offset += kind.size();
        }
        Self {
            fields,
            size: align_to(offset, struct_align).max(16),
        }
    }

    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    /// Struct size, rounded up to its alignment.
    pub fn size(&self) -> usize {
        self.size
    }
}

fn align_to(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}

/// Anything that accepts `set_uniform(name, value)`.
///
/// Unknown names and mismatched types are ignored.
pub trait UniformTarget {
    fn set_uniform(&mut self, name: &str, value: UniformValue);
}

/// Host copy of a uniform buffer.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformLayout,
    data: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let data = vec![0; layout.size()];
        Self {
            layout,
            data,
            dirty: true,
        }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Writes `value` if `name` exists with a matching type; returns whether
    /// anything was written.
    pub fn set(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(field) = self.layout.field(name) else {
            trace!("ignoring unknown uniform {name:?}");
            return false;
        };
        if field.kind != value.kind() {
            trace!(
                "ignoring uniform {name:?}: expected {:?}, got {:?}",
                field.kind,
                value.kind()
            );
            return false;
        }
        let range = field.offset..field.offset + field.kind.size();
        value.write(&mut self.data[range]);
        self.dirty = true;
        true
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        let field = self.layout.field(name)?;
        let bytes = &self.data[field.offset..field.offset + field.kind.size()];
        Some(match field.kind {
            UniformKind::Float => UniformValue::Float(bytemuck::pod_read_unaligned(bytes)),
            UniformKind::Int => UniformValue::Int(bytemuck::pod_read_unaligned(bytes)),
            UniformKind::Vec2 => UniformValue::Vec2(bytemuck::pod_read_unaligned(bytes)),
            UniformKind::Vec3 => UniformValue::Vec3(bytemuck::pod_read_unaligned(bytes)),
            UniformKind::Vec4 => UniformValue::Vec4(bytemuck::pod_read_unaligned(bytes)),
            UniformKind::Mat4 => UniformValue::Mat4(bytemuck::pod_read_unaligned(bytes)),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the bytes if they changed since the last call.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if std::mem::take(&mut self.dirty) {
            Some(&self.data)
        } else {
            None
        }
    }
}

impl UniformTarget for UniformBlock {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.set(name, value);
    }
}
