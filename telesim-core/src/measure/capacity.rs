use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign},
};

/// The number of resource units a [`Group`] bucket can hold.
///
/// [`Group`]: crate::group::Group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Capacity(u64);

/// A number of resource units: the demand of a load or the occupancy of
/// a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Size(u64);

/// A plain event/load counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Count(u64);

impl Capacity {
    pub const ZERO: Self = Self(0);

    #[inline(always)]
    pub const fn new(capacity: u64) -> Self {
        Self(capacity)
    }

    #[inline(always)]
    pub fn into_u64(self) -> u64 {
        self.0
    }

    /// `true` if `extra` more units fit on top of the `occupied` ones.
    ///
    /// ```
    /// # use telesim_core::measure::{Capacity, Size};
    /// let v = Capacity::new(4);
    /// assert!(v.fits(Size::new(3), Size::new(1)));
    /// assert!(!v.fits(Size::new(3), Size::new(2)));
    /// ```
    #[inline]
    pub fn fits(self, occupied: Size, extra: Size) -> bool {
        occupied
            .0
            .checked_add(extra.0)
            .is_some_and(|total| total <= self.0)
    }

    /// the capacity left once `occupied` units are taken
    #[inline]
    pub fn free(self, occupied: Size) -> Capacity {
        Capacity(self.0.saturating_sub(occupied.0))
    }

    /// `true` if the occupancy `size` does not exceed this capacity
    #[inline]
    pub fn holds(self, size: Size) -> bool {
        size.0 <= self.0
    }

    /// Split a total capacity in `buckets` buckets of (almost) equal
    /// size. The remainder goes to the first buckets.
    ///
    /// ```
    /// # use telesim_core::measure::Capacity;
    /// let buckets = Capacity::new(10).distribute_equal(3);
    /// assert_eq!(buckets, vec![Capacity::new(4), Capacity::new(3), Capacity::new(3)]);
    /// ```
    pub fn distribute_equal(self, buckets: u64) -> Vec<Capacity> {
        if buckets == 0 {
            return Vec::new();
        }
        let share = self.0 / buckets;
        let remainder = self.0 % buckets;
        (0..buckets)
            .map(|i| Capacity(share + u64::from(i < remainder)))
            .collect()
    }
}

impl Size {
    pub const ZERO: Self = Self(0);

    #[inline(always)]
    pub const fn new(size: u64) -> Self {
        Self(size)
    }

    #[inline(always)]
    pub fn into_u64(self) -> u64 {
        self.0
    }

    #[must_use = "function does not modify the current value"]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl Count {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    #[inline(always)]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[inline(always)]
    pub fn into_u64(self) -> u64 {
        self.0
    }

    #[must_use = "function does not modify the current value"]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl Add for Capacity {
    type Output = Capacity;
    fn add(self, rhs: Self) -> Self::Output {
        Capacity(self.0 + rhs.0)
    }
}
impl Sum for Capacity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Capacity::ZERO, Add::add)
    }
}

impl Add for Size {
    type Output = Size;
    fn add(self, rhs: Self) -> Self::Output {
        Size(self.0 + rhs.0)
    }
}
impl AddAssign for Size {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}
impl Sum for Size {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Size::ZERO, Add::add)
    }
}

impl Add for Count {
    type Output = Count;
    fn add(self, rhs: Self) -> Self::Output {
        Count(self.0 + rhs.0)
    }
}
impl AddAssign for Count {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}u", self.0)
    }
}
impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
