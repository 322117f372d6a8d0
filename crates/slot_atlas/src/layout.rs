use render_protocol::{
    TexCoordOffset, TransformMatrix3x3, TransformMatrix4x4, Viewport, matrix3x3_to_matrix4x4,
};

/// Placement of one live slot inside its atlas, in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub dimension: u32,
}

impl SlotInfo {
    pub const fn viewport(self) -> Viewport {
        Viewport::square(self.x, self.y, self.size)
    }

    pub fn tex_coord_offset(self) -> TexCoordOffset {
        let dimension = self.dimension as f32;
        TexCoordOffset {
            x: self.x as f32 / dimension,
            y: self.y as f32 / dimension,
            scale: self.size as f32 / dimension,
        }
    }

    /// Maps a local `[0, 1]^2` coordinate into the slot's region of the atlas.
    pub fn tex_coord_transform(self) -> TransformMatrix3x3 {
        self.tex_coord_offset().to_matrix3x3()
    }

    pub fn tex_coord_matrix4x4(self) -> TransformMatrix4x4 {
        matrix3x3_to_matrix4x4(self.tex_coord_transform())
    }

    pub const fn contains(self, other: SlotInfo) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.size <= self.x + self.size
            && other.y + other.size <= self.y + self.size
    }

    pub const fn overlaps(self, other: SlotInfo) -> bool {
        self.x < other.x + other.size
            && other.x < self.x + self.size
            && self.y < other.y + other.size
            && other.y < self.y + self.size
    }
}
