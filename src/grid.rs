use crate::Float;

// grid[0] <-> lower
// grid[i] <-> lower + i * step_size forall i
// grid[steps] <-> upper
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    lower: Float,
    upper: Float,
    steps: usize,
    step_size: Float,
}

impl Grid {
    pub fn from_steps(lower: Float, upper: Float, steps: usize) -> Self {
        assert!(steps > 0, "a grid needs at least one step");
        assert!(upper > lower, "grid bounds must satisfy lower < upper");
        let step_size = (upper - lower) / steps as Float;
        Grid {
            lower,
            upper,
            steps,
            step_size,
        }
    }

    pub fn lower(&self) -> Float {
        self.lower
    }

    pub fn upper(&self) -> Float {
        self.upper
    }

    pub fn length(&self) -> Float {
        self.upper - self.lower
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn step_size(&self) -> Float {
        self.step_size
    }

    /// Position of the `i`-th grid node, `0 <= i <= steps`.
    pub fn node(&self, i: usize) -> Float {
        self.lower + self.step_size * i as Float
    }

    /// Midpoint of the `i`-th interval, `0 <= i < steps`.
    pub fn centre(&self, i: usize) -> Float {
        self.lower + self.step_size * (i as Float + 0.5)
    }
}
