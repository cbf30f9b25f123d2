/// Remembers one boolean between iterations and reports its transitions.
///
/// Every mode keeps its own detector, so the order in which modes are
/// evaluated never changes which of them sees an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EdgeDetector {
    previous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
    High,
    Low,
}

impl Edge {
    pub fn is_active(self) -> bool {
        matches!(self, Edge::Rising | Edge::High)
    }
}

impl EdgeDetector {
    pub const fn new() -> Self {
        Self { previous: false }
    }

    pub fn update(&mut self, current: bool) -> Edge {
        let edge = match (self.previous, current) {
            (false, true) => Edge::Rising,
            (true, false) => Edge::Falling,
            (true, true) => Edge::High,
            (false, false) => Edge::Low,
        };
        self.previous = current;
        edge
    }

    /// Forces the remembered state without reporting an edge.
    pub fn set(&mut self, state: bool) {
        self.previous = state;
    }

    pub fn is_high(&self) -> bool {
        self.previous
    }
}
