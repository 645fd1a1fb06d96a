/// Fixed-capacity sliding window over the most recent samples.
///
/// Once full, each push overwrites the oldest sample.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: Vec<f64>,
    pos: usize,
    filled: usize,
}

impl RingBuffer {
    /// Creates a window holding up to `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity.max(1)],
            pos: 0,
            filled: 0,
        }
    }

    pub fn push(&mut self, v: f64) {
        self.buf[self.pos] = v;
        self.pos = (self.pos + 1) % self.buf.len();
        if self.filled < self.buf.len() {
            self.filled += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let cap = self.buf.len();
        let start = (self.pos + cap - self.filled) % cap;
        (0..self.filled).map(move |i| self.buf[(start + i) % cap])
    }

    /// Mean of the samples, 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.filled as f64
    }

    /// Population variance of the samples, 0 when empty.
    pub fn variance(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        let mean = self.mean();
        self.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.filled as f64
    }
}
