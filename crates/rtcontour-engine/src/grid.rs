//! Rectangular 2D/3D value grids with row-major storage.
//!
//! Linear index of `(x, y, z)` is `x + y * dim_x + z * dim_x * dim_y`.
//! A 2D grid is a grid with `dim_z == 1`.

use std::ops::{Index, IndexMut};

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::ContourError;

/// Grid extents along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dims {
    /// Columns.
    pub x: usize,
    /// Rows.
    pub y: usize,
    /// Slices.
    pub z: usize,
}

impl Dims {
    /// Extents of a single-slice grid.
    #[must_use]
    pub const fn new_2d(x: usize, y: usize) -> Self {
        Self { x, y, z: 1 }
    }

    /// Extents of a volume.
    #[must_use]
    pub const fn new_3d(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Total number of cells.
    #[must_use]
    pub const fn len(self) -> usize {
        self.x * self.y * self.z
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Number of cells in one slice.
    #[must_use]
    pub const fn slice_len(self) -> usize {
        self.x * self.y
    }

    /// Linear index of an in-bounds coordinate.
    #[must_use]
    pub const fn index(self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.x + z * self.x * self.y
    }

    /// Coordinate of a linear index.
    #[must_use]
    pub const fn coordinates(self, index: usize) -> (usize, usize, usize) {
        let slice = self.slice_len();
        let z = index / slice;
        let rem = index % slice;
        (rem % self.x, rem / self.x, z)
    }

    /// Whether a signed 2D coordinate lies inside a slice.
    #[must_use]
    pub const fn contains(self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as u64) < self.x as u64 && (y as u64) < self.y as u64
    }

    /// Whether a signed 3D coordinate lies inside the grid.
    #[must_use]
    pub const fn contains_3d(self, x: i64, y: i64, z: i64) -> bool {
        self.contains(x, y) && z >= 0 && (z as u64) < self.z as u64
    }

    /// Linear index of a signed 2D coordinate in slice 0, `None` outside.
    #[must_use]
    pub const fn to_index(self, x: i64, y: i64) -> Option<usize> {
        self.to_index_3d(x, y, 0)
    }

    /// Linear index of a signed 3D coordinate, `None` outside.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn to_index_3d(self, x: i64, y: i64, z: i64) -> Option<usize> {
        if self.contains_3d(x, y, z) {
            Some(self.index(x as usize, y as usize, z as usize))
        } else {
            None
        }
    }

    /// Signed coordinate of a linear index within its slice.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn position(self, index: usize) -> (i64, i64) {
        let rem = index % self.slice_len();
        ((rem % self.x) as i64, (rem / self.x) as i64)
    }

    /// Same extents with a single slice.
    #[must_use]
    pub const fn slice_dims(self) -> Self {
        Self::new_2d(self.x, self.y)
    }
}

/// A fixed-size grid of values that owns its storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    dims: Dims,
    data: Vec<T>,
}

impl<T: Copy + Default> Grid<T> {
    /// A grid filled with `T::default()`.
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self::filled(dims, T::default())
    }

    /// A single-slice grid filled with `T::default()`.
    #[must_use]
    pub fn new_2d(x: usize, y: usize) -> Self {
        Self::new(Dims::new_2d(x, y))
    }

    /// A zeroed grid with the same extents, possibly of another type.
    #[must_use]
    pub fn create_same_size<U: Copy + Default>(&self) -> Grid<U> {
        Grid::new(self.dims)
    }

    /// Copy out slice `z` as a 2D grid, or `None` past the last slice.
    #[must_use]
    pub fn slice(&self, z: usize) -> Option<Self> {
        if z >= self.dims.z {
            return None;
        }
        let len = self.dims.slice_len();
        let start = z * len;
        Some(Self {
            dims: self.dims.slice_dims(),
            data: self.data[start..start + len].to_vec(),
        })
    }
}

impl<T: Copy> Grid<T> {
    /// A grid with every cell set to `value`.
    #[must_use]
    pub fn filled(dims: Dims, value: T) -> Self {
        Self {
            dims,
            data: vec![value; dims.len()],
        }
    }

    /// Value at a signed 2D coordinate in slice 0, `None` outside.
    #[must_use]
    pub fn get(&self, x: i64, y: i64) -> Option<T> {
        self.get_3d(x, y, 0)
    }

    /// Value at a signed 3D coordinate, `None` outside.
    #[must_use]
    pub fn get_3d(&self, x: i64, y: i64, z: i64) -> Option<T> {
        self.dims.to_index_3d(x, y, z).map(|i| self.data[i])
    }

    /// Write a value at a signed 2D coordinate in slice 0.
    ///
    /// Returns `false` and leaves the grid untouched when the coordinate
    /// is outside.
    pub fn set(&mut self, x: i64, y: i64, value: T) -> bool {
        self.set_3d(x, y, 0, value)
    }

    /// Write a value at a signed 3D coordinate. Returns `false` outside.
    pub fn set_3d(&mut self, x: i64, y: i64, z: i64, value: T) -> bool {
        let Some(i) = self.dims.to_index_3d(x, y, z) else {
            return false;
        };
        self.data[i] = value;
        true
    }

    /// Overwrite slice `z` with a 2D grid of matching extents.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::DimensionMismatch`] if `z` is past the last
    /// slice or `slice` has different extents.
    pub fn set_slice(&mut self, z: usize, slice: &Self) -> Result<(), ContourError> {
        let len = self.dims.slice_len();
        if z >= self.dims.z || slice.dims.x != self.dims.x || slice.dims.y != self.dims.y {
            return Err(ContourError::DimensionMismatch {
                expected: len,
                actual: slice.data.len(),
            });
        }
        let start = z * len;
        self.data[start..start + len].copy_from_slice(&slice.data[..len]);
        Ok(())
    }
}

impl<T> Grid<T> {
    /// Wrap existing data.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::DimensionMismatch`] when `data.len()` does
    /// not equal `dims.len()`.
    pub fn from_vec(dims: Dims, data: Vec<T>) -> Result<Self, ContourError> {
        if data.len() != dims.len() {
            return Err(ContourError::DimensionMismatch {
                expected: dims.len(),
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Grid extents.
    #[must_use]
    pub const fn dims(&self) -> Dims {
        self.dims
    }

    /// Number of columns.
    #[must_use]
    pub const fn dim_x(&self) -> usize {
        self.dims.x
    }

    /// Number of rows.
    #[must_use]
    pub const fn dim_y(&self) -> usize {
        self.dims.y
    }

    /// Number of slices.
    #[must_use]
    pub const fn dim_z(&self) -> usize {
        self.dims.z
    }

    /// Number of cells.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All cells in index order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// All cells in index order, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the grid and return its storage.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T> Index<usize> for Grid<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for Grid<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

impl Grid<u8> {
    /// Fail unless every value is 0 or 1.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::NonBinaryMask`] naming the first offending
    /// cell.
    pub fn ensure_binary(&self) -> Result<(), ContourError> {
        match self.data.iter().position(|&v| v > 1) {
            Some(index) => Err(ContourError::NonBinaryMask {
                index,
                value: self.data[index],
            }),
            None => Ok(()),
        }
    }

    /// Number of cells holding `value`.
    #[must_use]
    pub fn count(&self, value: u8) -> usize {
        self.data.iter().filter(|&&v| v == value).count()
    }

    /// Binary mask from a grayscale image: nonzero pixels become 1.
    #[must_use]
    pub fn from_gray_image(image: &GrayImage) -> Self {
        let dims = Dims::new_2d(image.width() as usize, image.height() as usize);
        let data = image.pixels().map(|p| u8::from(p.0[0] != 0)).collect();
        Self { dims, data }
    }

    /// Render slice 0 as a grayscale image: nonzero cells become 255.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::InvalidConfig`] if the grid is too large
    /// for an image.
    pub fn to_gray_image(&self) -> Result<GrayImage, ContourError> {
        let too_large = || ContourError::InvalidConfig(format!("grid {:?} too large for an image", self.dims));
        let width = u32::try_from(self.dims.x).map_err(|_| too_large())?;
        let height = u32::try_from(self.dims.y).map_err(|_| too_large())?;
        let row = self.dims.x;
        Ok(GrayImage::from_fn(width, height, |x, y| {
            let v = self.data[x as usize + y as usize * row];
            image::Luma([if v == 0 { 0 } else { 255 }])
        }))
    }
}
