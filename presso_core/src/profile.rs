//! Operator-authored pressure-vs-time curves.

use crate::config::{PRESSURE_MAX_BAR, PRESSURE_MIN_BAR};
use crate::error::ProfileError;

/// One target pressure at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    /// Seconds from the start of the shot.
    pub time: f64,
    /// Target pressure in bar.
    pub pressure: f64,
}

impl ProfilePoint {
    pub const fn new(time: f64, pressure: f64) -> Self {
        Self { time, pressure }
    }

    fn check(&self, index: usize) -> Result<(), ProfileError> {
        if !self.time.is_finite() || !self.pressure.is_finite() {
            return Err(ProfileError::NonFinite { index });
        }
        if self.time < 0.0 {
            return Err(ProfileError::NegativeTime {
                index,
                time: self.time,
            });
        }
        if !(PRESSURE_MIN_BAR..=PRESSURE_MAX_BAR).contains(&self.pressure) {
            return Err(ProfileError::PressureOutOfRange {
                index,
                pressure: self.pressure,
                min: PRESSURE_MIN_BAR,
                max: PRESSURE_MAX_BAR,
            });
        }
        Ok(())
    }
}

/// Ordered list of points, strictly increasing by time.
///
/// The checked constructors keep that invariant. `from_points_unchecked`
/// exists for callers that own validation themselves; the compiler copes
/// with unordered input by skipping segments whose duration is not positive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    points: Vec<ProfilePoint>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from points already in time order. Rejects out-of-order or
    /// duplicate times instead of sorting them.
    pub fn from_points(points: Vec<ProfilePoint>) -> Result<Self, ProfileError> {
        for (index, p) in points.iter().enumerate() {
            p.check(index)?;
            if index > 0 {
                let prev = points[index - 1].time;
                if p.time == prev {
                    return Err(ProfileError::DuplicateTime {
                        index,
                        time: p.time,
                    });
                }
                if p.time < prev {
                    return Err(ProfileError::NotSorted {
                        index,
                        time: p.time,
                    });
                }
            }
        }
        Ok(Self { points })
    }

    /// Build from arbitrary points, sorting by time first. Duplicate times
    /// are still rejected.
    pub fn from_unsorted(mut points: Vec<ProfilePoint>) -> Result<Self, ProfileError> {
        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self::from_points(points)
    }

    pub fn from_points_unchecked(points: Vec<ProfilePoint>) -> Self {
        Self { points }
    }

    /// Stock profile: 9 bar preinfusion, decline to 6, bump to 7, finish at 9.
    pub fn classic() -> Self {
        const TIMES: [f64; 8] = [0.0, 5.0, 10.0, 20.0, 24.0, 26.0, 30.0, 32.0];
        const PRESSURES: [f64; 8] = [9.0, 9.0, 6.0, 6.0, 7.0, 7.0, 9.0, 9.0];
        Self {
            points: TIMES
                .iter()
                .zip(PRESSURES.iter())
                .map(|(&t, &p)| ProfilePoint::new(t, p))
                .collect(),
        }
    }

    /// Insert a point at its time-ordered position.
    pub fn insert(&mut self, point: ProfilePoint) -> Result<(), ProfileError> {
        let pos = self.points.partition_point(|p| p.time < point.time);
        point.check(pos)?;
        if self.points.get(pos).is_some_and(|p| p.time == point.time) {
            return Err(ProfileError::DuplicateTime {
                index: pos,
                time: point.time,
            });
        }
        self.points.insert(pos, point);
        Ok(())
    }

    /// Remove and return the point at `index`, if any.
    pub fn remove(&mut self, index: usize) -> Option<ProfilePoint> {
        (index < self.points.len()).then(|| self.points.remove(index))
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[ProfilePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Pressure of the first point, which the machine must be preset to.
    pub fn start_pressure(&self) -> Option<f64> {
        self.points.first().map(|p| p.pressure)
    }

    /// Time of the last point, i.e. the shot length in seconds.
    pub fn duration(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.time)
    }
}
