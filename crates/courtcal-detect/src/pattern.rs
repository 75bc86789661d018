use courtcal_core::{CalibError, CalibResult, Pt3, Real};
use serde::{Deserialize, Serialize};

/// Inner-corner dimensions of a chessboard.
///
/// `per_row` corners along each row (board x), `rows` rows (board y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternSize {
    pub per_row: u32,
    pub rows: u32,
}

impl Default for PatternSize {
    fn default() -> Self {
        Self::new(7, 5)
    }
}

impl PatternSize {
    pub const fn new(per_row: u32, rows: u32) -> Self {
        Self { per_row, rows }
    }

    pub fn count(&self) -> usize {
        self.per_row as usize * self.rows as usize
    }

    pub fn validate(&self) -> CalibResult<()> {
        if self.per_row < 2 || self.rows < 2 {
            return Err(CalibError::InvalidInput(format!(
                "chessboard needs at least 2x2 inner corners, got {}x{}",
                self.per_row, self.rows
            )));
        }
        Ok(())
    }

    /// Board coordinates of the inner corners: z = 0, unit spacing, row-major
    /// with x varying fastest.
    pub fn object_points(&self) -> Vec<Pt3> {
        let mut pts = Vec::with_capacity(self.count());
        for r in 0..self.rows {
            for c in 0..self.per_row {
                pts.push(Pt3::new(c as Real, r as Real, 0.0));
            }
        }
        pts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_points_are_row_major() {
        let pts = PatternSize::new(9, 6).object_points();
        assert_eq!(pts.len(), 54);
        assert_eq!(pts[1], Pt3::new(1.0, 0.0, 0.0));
        assert_eq!(pts[9], Pt3::new(0.0, 1.0, 0.0));
        assert_eq!(pts[53], Pt3::new(8.0, 5.0, 0.0));
    }

    #[test]
    fn degenerate_pattern_is_rejected() {
        assert!(PatternSize::new(1, 5).validate().is_err());
        assert!(PatternSize::default().validate().is_ok());
    }
}
