use crate::math::LonLat;

/// Axis-aligned lon/lat bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Returns `None` when no finite point is supplied.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LonLat>,
    {
        let mut out: Option<Aabb2> = None;
        for p in points {
            if !p[0].is_finite() || !p[1].is_finite() {
                continue;
            }
            match out.as_mut() {
                Some(b) => b.extend(p),
                None => out = Some(Aabb2::new(p, p)),
            }
        }
        out
    }

    pub fn extend(&mut self, p: LonLat) {
        self.min[0] = self.min[0].min(p[0]);
        self.min[1] = self.min[1].min(p[1]);
        self.max[0] = self.max[0].max(p[0]);
        self.max[1] = self.max[1].max(p[1]);
    }

    pub fn union(&self, other: &Aabb2) -> Aabb2 {
        let mut out = *self;
        out.extend(other.min);
        out.extend(other.max);
        out
    }

    pub fn center(&self) -> LonLat {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ]
    }

    pub fn contains(&self, p: LonLat) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb2;

    #[test]
    fn from_points_covers_all_inputs() {
        let b = Aabb2::from_points([[25.0, 44.0], [26.5, 43.0], [24.0, 45.5]]).unwrap();
        assert_eq!(b.min, [24.0, 43.0]);
        assert_eq!(b.max, [26.5, 45.5]);
        assert!(b.contains([25.0, 44.0]));
        assert_eq!(b.center(), [25.25, 44.25]);
    }

    #[test]
    fn from_points_skips_non_finite_and_empty() {
        assert!(Aabb2::from_points(Vec::new()).is_none());
        assert!(Aabb2::from_points([[f64::NAN, 1.0]]).is_none());
        let b = Aabb2::from_points([[f64::NAN, 1.0], [2.0, 3.0]]).unwrap();
        assert_eq!(b.min, [2.0, 3.0]);
    }
}
