//! FM broadcast de-emphasis: a single-pole shelf filter undoing the
//! transmitter's high-frequency pre-emphasis boost.
//!
//! Ported from `hvylya::filters::fm::FmDeemphasizer`, which builds its
//! first-order IIR coefficients via a bilinear transform of the analog
//! `1 / (1 + s*tau)` shelf, `tau` being the regional de-emphasis time
//! constant (75 us in the Americas/Korea, 50 us almost everywhere else).

pub struct Deemphasizer {
    feedback: f32,
    feedforward: f32,
    last_in: f32,
    last_out: f32,
}

impl Deemphasizer {
    pub fn new(sample_rate: u32, time_constant_seconds: f32) -> Self {
        let corner = 1.0 / (2.0 * std::f32::consts::PI * time_constant_seconds);
        let w = (std::f32::consts::PI * corner / sample_rate as f32).tan();
        let feedback = (w - 1.0) / (w + 1.0);
        let feedforward = w / (1.0 + w);
        Deemphasizer {
            feedback,
            feedforward,
            last_in: 0.0,
            last_out: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.last_in = 0.0;
        self.last_out = 0.0;
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let mut output = Vec::with_capacity(input.len());
        for &sample in input {
            let out = self.feedforward * (self.last_in + sample) - self.feedback * self.last_out;
            self.last_in = sample;
            self.last_out = out;
            output.push(out);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_input_passes_through_at_unity_gain() {
        let mut deemph = Deemphasizer::new(200_000, 50e-6);
        let input = vec![1.0; 2000];
        let out = deemph.process(&input);
        let last = *out.last().unwrap();
        assert!((last - 1.0).abs() < 0.01, "expected DC gain ~1.0, got {last}");
    }

    #[test]
    fn attenuates_high_frequency_content() {
        let sample_rate = 200_000u32;
        let mut deemph = Deemphasizer::new(sample_rate, 50e-6);
        let n = 4000;
        let freq = 15_000.0_f32;
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        let out = deemph.process(&input);
        let in_power: f32 = input[1000..].iter().map(|x| x * x).sum();
        let out_power: f32 = out[1000..].iter().map(|x| x * x).sum();
        assert!(out_power < in_power, "high frequencies should be attenuated");
    }
}
