pub type TransformMatrix3x3 = [[f32; 3]; 3];
pub type TransformMatrix4x4 = [f32; 16];

pub const ZERO_MATRIX3X3: TransformMatrix3x3 = [[0.0; 3]; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn square(origin_x: u32, origin_y: u32, size: u32) -> Self {
        Self {
            origin_x,
            origin_y,
            width: size,
            height: size,
        }
    }
}

/// Offset and uniform scale of a sub-rectangle in normalized surface space.
///
/// Equivalent to a 2D affine transform with `scale` on the diagonal and
/// `(x, y)` as translation, for shader paths that skip the matrix multiply.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TexCoordOffset {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl TexCoordOffset {
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.scale]
    }

    pub fn to_matrix3x3(self) -> TransformMatrix3x3 {
        [
            [self.scale, 0.0, self.x],
            [0.0, self.scale, self.y],
            [0.0, 0.0, 1.0],
        ]
    }
}

/// Expands a row-major 2D affine matrix into a column-major 4x4 matrix
/// suitable for uniform upload.
pub fn matrix3x3_to_matrix4x4(matrix: TransformMatrix3x3) -> TransformMatrix4x4 {
    [
        matrix[0][0],
        matrix[1][0],
        0.0,
        0.0,
        matrix[0][1],
        matrix[1][1],
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
        matrix[0][2],
        matrix[1][2],
        0.0,
        1.0,
    ]
}
