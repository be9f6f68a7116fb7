/// Range of one input dimension. `0` everywhere marks a dynamic axis that has not been pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MinOptMax {
    min: usize,
    opt: usize,
    max: usize,
}

impl From<usize> for MinOptMax {
    fn from(x: usize) -> Self {
        Self { min: x, opt: x, max: x }
    }
}

impl From<(usize, usize, usize)> for MinOptMax {
    fn from((min, opt, max): (usize, usize, usize)) -> Self {
        let min = min.min(opt);
        let max = max.max(opt);
        Self { min, opt, max }
    }
}

impl MinOptMax {
    pub fn min(&self) -> usize {
        self.min
    }

    pub fn opt(&self) -> usize {
        self.opt
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn is_dyn(&self) -> bool {
        self.min == 0 && self.opt == 0 && self.max == 0
    }

    pub fn is_fixed(&self) -> bool {
        !self.is_dyn() && self.min == self.max
    }
}
