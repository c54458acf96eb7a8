//! Adam optimizer state.

const BETA_1: f64 = 0.9;
const BETA_2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// First/second moment estimates for one flat parameter buffer.
#[derive(Debug, Clone)]
struct Moments {
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Moments {
    fn zeros(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }
}

/// Adam over a list of parameter buffers, one moment pair per buffer.
#[derive(Debug, Clone)]
pub(crate) struct Adam {
    learning_rate: f64,
    step: i32,
    moments: Vec<Moments>,
}

impl Adam {
    pub(crate) fn new(learning_rate: f64, buffer_lens: impl IntoIterator<Item = usize>) -> Self {
        Self {
            learning_rate,
            step: 0,
            moments: buffer_lens.into_iter().map(Moments::zeros).collect(),
        }
    }

    /// Advance the step counter. Call once per mini-batch, before `update`.
    pub(crate) fn begin_step(&mut self) {
        self.step += 1;
    }

    /// Apply one bias-corrected update to `params[buffer]` from `grads`.
    pub(crate) fn update(&mut self, buffer: usize, params: &mut [f64], grads: &[f64]) {
        let lr_t = self.learning_rate * (1.0 - BETA_2.powi(self.step)).sqrt()
            / (1.0 - BETA_1.powi(self.step));
        let state = &mut self.moments[buffer];
        for (((p, g), m), v) in params
            .iter_mut()
            .zip(grads)
            .zip(state.m.iter_mut())
            .zip(state.v.iter_mut())
        {
            *m = BETA_1 * *m + (1.0 - BETA_1) * g;
            *v = BETA_2 * *v + (1.0 - BETA_2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + EPSILON);
        }
    }
}
