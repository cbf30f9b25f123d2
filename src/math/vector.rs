use core::ops::{Add, Index, IndexMut, Neg, Sub};

use super::{inv_sqrt, multiply, FixedPoint};

/// Index into a [`Vector3`]. Roll, pitch and yaw share slots with x, y and z.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    Roll = 0,
    Pitch = 1,
    Yaw = 2,
}

impl Axis {
    pub const X: Axis = Axis::Roll;
    pub const Y: Axis = Axis::Pitch;
    pub const Z: Axis = Axis::Yaw;

    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];
}

/// Three fixed-point values: gyro rates, g vectors, Euler angles, PID terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vector3 {
    pub x: FixedPoint,
    pub y: FixedPoint,
    pub z: FixedPoint,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(FixedPoint::ZERO, FixedPoint::ZERO, FixedPoint::ZERO);

    pub const fn new(x: FixedPoint, y: FixedPoint, z: FixedPoint) -> Self {
        Self { x, y, z }
    }

    pub fn roll(&self) -> FixedPoint {
        self.x
    }

    pub fn pitch(&self) -> FixedPoint {
        self.y
    }

    pub fn yaw(&self) -> FixedPoint {
        self.z
    }

    pub fn dot(&self, other: &Vector3) -> FixedPoint {
        multiply(self.x, other.x) + multiply(self.y, other.y) + multiply(self.z, other.z)
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3::new(
            multiply(self.y, other.z) - multiply(self.z, other.y),
            multiply(self.z, other.x) - multiply(self.x, other.z),
            multiply(self.x, other.y) - multiply(self.y, other.x),
        )
    }

    pub fn scale(&self, factor: FixedPoint) -> Vector3 {
        Vector3::new(
            multiply(self.x, factor),
            multiply(self.y, factor),
            multiply(self.z, factor),
        )
    }

    pub fn length_squared(&self) -> FixedPoint {
        self.dot(self)
    }

    /// Scales to unit length. A zero vector stays zero.
    pub fn normalized(&self) -> Vector3 {
        self.scale(inv_sqrt(self.length_squared()))
    }

    pub fn map(&self, mut f: impl FnMut(FixedPoint) -> FixedPoint) -> Vector3 {
        Vector3::new(f(self.x), f(self.y), f(self.z))
    }
}

impl Index<Axis> for Vector3 {
    type Output = FixedPoint;

    fn index(&self, axis: Axis) -> &FixedPoint {
        match axis {
            Axis::Roll => &self.x,
            Axis::Pitch => &self.y,
            Axis::Yaw => &self.z,
        }
    }
}

impl IndexMut<Axis> for Vector3 {
    fn index_mut(&mut self, axis: Axis) -> &mut FixedPoint {
        match axis {
            Axis::Roll => &mut self.x,
            Axis::Pitch => &mut self.y,
            Axis::Yaw => &mut self.z,
        }
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;

    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Vector3 {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "[{}, {}, {}]",
            self.x.to_num::<f32>(),
            self.y.to_num::<f32>(),
            self.z.to_num::<f32>()
        )
    }
}
