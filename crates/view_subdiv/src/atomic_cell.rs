//! Lock-free single-value cells.
//!
//! An [`AtomicCell`] stores any supported scalar (integers and floats) as its
//! bit pattern inside an `AtomicU64`. Arithmetic, min/max and bitwise
//! operations are built on one compare-and-swap retry loop
//! ([`AtomicCell::fetch_update`]): read the current value, compute a
//! candidate, swap it in only if the cell still holds what was read,
//! otherwise retry with the fresh value.
//!
//! Operations are linearizable per cell and give no ordering guarantee
//! relative to other cells. Integer arithmetic wraps on overflow, like the
//! std atomics; no operation can fail.
//!
//! # Example
//!
//! ```
//! use view_subdiv::AtomicCell;
//!
//! let closest = AtomicCell::new(f32::INFINITY);
//! closest.fetch_min(4.0);
//! closest.fetch_min(9.0); // dominated, no swap attempted
//! assert_eq!(closest.get(), 4.0);
//! ```

use std::marker::PhantomData;
use std::ops::{BitAnd, BitOr, BitXor};
use std::sync::atomic::{AtomicU64, Ordering};

/// Scalar that can live inside an [`AtomicCell`].
pub trait AtomicScalar: Copy + PartialOrd + Send + Sync + 'static {
  /// Raw bit pattern, zero-extended to 64 bits.
  fn into_raw(self) -> u64;
  /// Inverse of [`AtomicScalar::into_raw`].
  fn from_raw(raw: u64) -> Self;

  /// Addition used by [`AtomicCell::fetch_add`]. Wrapping for integers.
  fn add_value(self, rhs: Self) -> Self;
  /// Subtraction used by [`AtomicCell::fetch_sub`]. Wrapping for integers.
  fn sub_value(self, rhs: Self) -> Self;
  /// Multiplication used by [`AtomicCell::fetch_mul`]. Wrapping for integers.
  fn mul_value(self, rhs: Self) -> Self;
}

macro_rules! impl_integer_scalar {
  ($($ty:ty => $unsigned:ty),* $(,)?) => {
    $(
      impl AtomicScalar for $ty {
        #[inline(always)]
        fn into_raw(self) -> u64 {
          self as $unsigned as u64
        }

        #[inline(always)]
        fn from_raw(raw: u64) -> Self {
          raw as $unsigned as $ty
        }

        #[inline(always)]
        fn add_value(self, rhs: Self) -> Self {
          self.wrapping_add(rhs)
        }

        #[inline(always)]
        fn sub_value(self, rhs: Self) -> Self {
          self.wrapping_sub(rhs)
        }

        #[inline(always)]
        fn mul_value(self, rhs: Self) -> Self {
          self.wrapping_mul(rhs)
        }
      }
    )*
  };
}

impl_integer_scalar!(i32 => u32, u32 => u32, i64 => u64, u64 => u64);

impl AtomicScalar for f32 {
  #[inline(always)]
  fn into_raw(self) -> u64 {
    f32::to_bits(self) as u64
  }

  #[inline(always)]
  fn from_raw(raw: u64) -> Self {
    f32::from_bits(raw as u32)
  }

  #[inline(always)]
  fn add_value(self, rhs: Self) -> Self {
    self + rhs
  }

  #[inline(always)]
  fn sub_value(self, rhs: Self) -> Self {
    self - rhs
  }

  #[inline(always)]
  fn mul_value(self, rhs: Self) -> Self {
    self * rhs
  }
}

impl AtomicScalar for f64 {
  #[inline(always)]
  fn into_raw(self) -> u64 {
    f64::to_bits(self)
  }

  #[inline(always)]
  fn from_raw(raw: u64) -> Self {
    f64::from_bits(raw)
  }

  #[inline(always)]
  fn add_value(self, rhs: Self) -> Self {
    self + rhs
  }

  #[inline(always)]
  fn sub_value(self, rhs: Self) -> Self {
    self - rhs
  }

  #[inline(always)]
  fn mul_value(self, rhs: Self) -> Self {
    self * rhs
  }
}

/// Atomic single-value cell.
///
/// Shared by reference between workers of one pipeline run. The run that
/// creates a cell owns it and drops it after its last stage has joined.
pub struct AtomicCell<T: AtomicScalar> {
  bits: AtomicU64,
  _marker: PhantomData<T>,
}

impl<T: AtomicScalar> AtomicCell<T> {
  /// Create a cell holding `initial`.
  pub fn new(initial: T) -> Self {
    Self {
      bits: AtomicU64::new(initial.into_raw()),
      _marker: PhantomData,
    }
  }

  #[inline]
  pub fn get(&self) -> T {
    T::from_raw(self.bits.load(Ordering::Acquire))
  }

  #[inline]
  pub fn set(&self, value: T) {
    self.bits.store(value.into_raw(), Ordering::Release);
  }

  /// Store `value`, returning the previous value.
  #[inline]
  pub fn swap(&self, value: T) -> T {
    T::from_raw(self.bits.swap(value.into_raw(), Ordering::AcqRel))
  }

  /// Store `new` only if the cell holds exactly the bits of `current`.
  ///
  /// Returns `Ok(previous)` on success and `Err(actual)` otherwise.
  pub fn compare_exchange(&self, current: T, new: T) -> Result<T, T> {
    self
      .bits
      .compare_exchange(
        current.into_raw(),
        new.into_raw(),
        Ordering::AcqRel,
        Ordering::Acquire,
      )
      .map(T::from_raw)
      .map_err(T::from_raw)
  }

  /// Generic compare-and-swap retry loop.
  ///
  /// `f` maps the value currently stored to a candidate, or to `None` to leave
  /// the cell untouched. Returns the value the cell holds when the loop
  /// settles: the candidate that was swapped in, or the current value `f`
  /// declined to replace. Comparison is on bit patterns, so NaN payloads never
  /// spin.
  pub fn fetch_update<F>(&self, mut f: F) -> T
  where
    F: FnMut(T) -> Option<T>,
  {
    let mut current = self.bits.load(Ordering::Acquire);
    loop {
      let Some(candidate) = f(T::from_raw(current)) else {
        return T::from_raw(current);
      };
      match self.bits.compare_exchange_weak(
        current,
        candidate.into_raw(),
        Ordering::AcqRel,
        Ordering::Acquire,
      ) {
        Ok(_) => return candidate,
        Err(actual) => current = actual,
      }
    }
  }

  /// Raise the stored value to `candidate` if it is larger.
  ///
  /// Returns without attempting a swap when the current value already
  /// dominates. Returns the value now stored.
  pub fn fetch_max(&self, candidate: T) -> T {
    self.fetch_update(|current| {
      if current >= candidate {
        None
      } else {
        Some(candidate)
      }
    })
  }

  /// Lower the stored value to `candidate` if it is smaller.
  ///
  /// Returns without attempting a swap when the current value already
  /// dominates. Returns the value now stored.
  pub fn fetch_min(&self, candidate: T) -> T {
    self.fetch_update(|current| {
      if current <= candidate {
        None
      } else {
        Some(candidate)
      }
    })
  }

  /// Consume the cell, returning the final value.
  pub fn into_inner(self) -> T {
    T::from_raw(self.bits.into_inner())
  }
}

impl<T: AtomicScalar> AtomicCell<T> {
  /// Add `delta`, returning the new value.
  #[inline]
  pub fn fetch_add(&self, delta: T) -> T {
    self.fetch_update(|current| Some(current.add_value(delta)))
  }

  /// Subtract `delta`, returning the new value.
  #[inline]
  pub fn fetch_sub(&self, delta: T) -> T {
    self.fetch_update(|current| Some(current.sub_value(delta)))
  }

  /// Multiply by `factor`, returning the new value.
  #[inline]
  pub fn fetch_mul(&self, factor: T) -> T {
    self.fetch_update(|current| Some(current.mul_value(factor)))
  }
}

impl<T: AtomicScalar + BitAnd<Output = T> + BitOr<Output = T> + BitXor<Output = T>> AtomicCell<T> {
  /// Bitwise AND, returning the new value.
  #[inline]
  pub fn fetch_and(&self, mask: T) -> T {
    self.fetch_update(|current| Some(current & mask))
  }

  /// Bitwise OR, returning the new value.
  #[inline]
  pub fn fetch_or(&self, mask: T) -> T {
    self.fetch_update(|current| Some(current | mask))
  }

  /// Bitwise XOR, returning the new value.
  #[inline]
  pub fn fetch_xor(&self, mask: T) -> T {
    self.fetch_update(|current| Some(current ^ mask))
  }
}

impl<T: AtomicScalar + Default> Default for AtomicCell<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}

impl<T: AtomicScalar + std::fmt::Debug> std::fmt::Debug for AtomicCell<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("AtomicCell").field(&self.get()).finish()
  }
}

#[cfg(test)]
#[path = "atomic_cell_test.rs"]
mod atomic_cell_test;
