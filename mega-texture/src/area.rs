/// A rectangle in slab pixel coordinates, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SubRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle at the origin covering `size`.
    pub const fn from_size(size: [u32; 2]) -> Self {
        Self::new(0, 0, size[0], size[1])
    }

    pub fn position(&self) -> [u32; 2] {
        [self.x, self.y]
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge. Computed in `u64` so it cannot wrap.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn fits_in(&self, bounds: [u32; 2]) -> bool {
        self.right() <= bounds[0] as u64 && self.bottom() <= bounds[1] as u64
    }

    pub fn intersects(&self, other: &SubRect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (self.x as u64) < other.right()
            && (other.x as u64) < self.right()
            && (self.y as u64) < other.bottom()
            && (other.y as u64) < self.bottom()
    }

    /// Normalized `[min, max]` UV corners of this rectangle inside a surface of `bounds`.
    pub fn uv_bounds(&self, bounds: [u32; 2]) -> [[f32; 2]; 2] {
        let w = bounds[0].max(1) as f32;
        let h = bounds[1].max(1) as f32;
        [
            [self.x as f32 / w, self.y as f32 / h],
            [self.right() as f32 / w, self.bottom() as f32 / h],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_is_inclusive_of_the_far_edge() {
        let rect = SubRect::new(32, 48, 32, 16);
        assert!(rect.fits_in([64, 64]));
        assert!(!rect.fits_in([63, 64]));
        assert!(!rect.fits_in([64, 63]));
    }

    #[test]
    fn edges_do_not_wrap_near_u32_max() {
        let rect = SubRect::new(u32::MAX, 0, 2, 1);
        assert_eq!(rect.right(), u32::MAX as u64 + 2);
        assert!(!rect.fits_in([u32::MAX, u32::MAX]));
    }

    #[test]
    fn touching_rectangles_do_not_intersect() {
        let a = SubRect::new(0, 0, 32, 16);
        let b = SubRect::new(32, 0, 16, 16);
        let c = SubRect::new(0, 16, 48, 16);
        assert!(!a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&SubRect::new(31, 15, 4, 4)));
    }

    #[test]
    fn empty_rectangles_never_intersect() {
        let empty = SubRect::new(4, 4, 0, 10);
        assert!(!empty.intersects(&SubRect::new(0, 0, 64, 64)));
    }

    #[test]
    fn uv_bounds_are_normalized_to_the_surface() {
        let rect = SubRect::new(16, 32, 16, 32);
        let [min, max] = rect.uv_bounds([64, 128]);
        assert_eq!(min, [0.25, 0.25]);
        assert_eq!(max, [0.5, 0.5]);
    }
}
