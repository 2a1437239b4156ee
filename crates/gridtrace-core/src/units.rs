//! Unit newtypes for distribution network quantities.
//!
//! Sincal stores voltages in kV, lengths in km and powers in MW/Mvar, while the
//! reconstructed model reports lengths in metres and powers in kW/kvar. Keeping
//! each quantity in its own wrapper makes the scaling explicit at the single
//! place where it happens (the loader) instead of scattered `* 1000.0` calls.
//!
//! ```
//! use gridtrace_core::units::{Kilometres, Kilovolts, Metres};
//!
//! let l = Kilometres(0.05).to_metres();
//! assert_eq!(l, Metres(50.0));
//! assert_eq!(Kilovolts(0.4).to_volts(), 400.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Sub};

/// Implements arithmetic and accessors shared by every unit type
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $type {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

// =============================================================================
// Voltage
// =============================================================================

/// Voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

impl Kilovolts {
    /// Voltage in volts
    #[inline]
    pub fn to_volts(self) -> f64 {
        self.0 * 1_000.0
    }

    /// Voltage in volts rounded to the nearest integer, as used in source-bus names
    #[inline]
    pub fn rounded_volts(self) -> i64 {
        self.to_volts().round() as i64
    }
}

// =============================================================================
// Length
// =============================================================================

/// Length in kilometres, the unit of the `Line.l` column
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilometres(pub f64);

impl_unit_ops!(Kilometres, "km");

/// Length in metres
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Metres(pub f64);

impl_unit_ops!(Metres, "m");

impl Kilometres {
    #[inline]
    pub fn to_metres(self) -> Metres {
        Metres(self.0 * 1_000.0)
    }
}

// =============================================================================
// Power
// =============================================================================

/// Active power in kilowatts (kW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilowatts(pub f64);

impl_unit_ops!(Kilowatts, "kW");

/// Reactive power in kilovolt-amperes reactive (kvar)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilovars(pub f64);

impl_unit_ops!(Kilovars, "kvar");

/// Apparent power in kilovolt-amperes (kVA), used for transformer ratings
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct KilovoltAmperes(pub f64);

impl_unit_ops!(KilovoltAmperes, "kVA");

impl Kilowatts {
    /// Convert a megawatt figure from the source schema
    #[inline]
    pub fn from_megawatts(mw: f64) -> Self {
        Self(mw * 1_000.0)
    }
}

impl Kilovars {
    /// Convert a megavar figure from the source schema
    #[inline]
    pub fn from_megavars(mvar: f64) -> Self {
        Self(mvar * 1_000.0)
    }
}

impl KilovoltAmperes {
    /// Convert an MVA figure from the source schema
    #[inline]
    pub fn from_megavoltamperes(mva: f64) -> Self {
        Self(mva * 1_000.0)
    }
}
