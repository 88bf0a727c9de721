//! Barycentric Lagrange interpolation.
//!
//! Ported from `hvylya::core::LagrangeInterpolator`: precomputes barycentric
//! weights for a fixed set of nodes, then evaluates the interpolating
//! polynomial at arbitrary points in O(n) per call instead of the naive
//! O(n^2). In the original codebase this backs the Parks-McClellan filter
//! design optimizer's root search over the error curve; this receiver's FIR
//! design (`dsp::design_lowpass`/`design_bandpass`) uses plain windowed-sinc
//! coefficients instead, so `evaluate` is exercised directly by its own
//! tests rather than wired into a caller here. Only `evaluate` is ported --
//! the original's derivative/ratio evaluators exist solely to drive that
//! optimizer's Newton search, which this crate doesn't implement.

pub struct LagrangeInterpolator {
    scale: f32,
    nodes: Vec<(f32, f32)>,
    weights: Vec<f32>,
}

impl LagrangeInterpolator {
    pub fn new(args: &[f32], values: &[f32], scale: f32) -> Self {
        assert_eq!(args.len(), values.len());
        let mut interp = LagrangeInterpolator {
            scale,
            nodes: Vec::new(),
            weights: Vec::new(),
        };
        interp.update_arguments(args);
        interp.update_values(values);
        interp
    }

    pub fn update_arguments(&mut self, args: &[f32]) {
        assert!(!args.is_empty());
        let n = args.len();
        self.weights = vec![0.0; n];
        self.nodes = args.iter().map(|&a| (a, 0.0)).collect();

        for i in 0..n {
            let mut w = 1.0;
            for j in 0..n {
                if i != j {
                    w *= self.scale * (args[i] - args[j]);
                }
            }
            self.weights[i] = 1.0 / w;
        }
    }

    pub fn update_values(&mut self, values: &[f32]) {
        assert_eq!(self.nodes.len(), values.len());
        for (node, &v) in self.nodes.iter_mut().zip(values.iter()) {
            node.1 = v;
        }
    }

    fn closest_node_index(&self, arg: f32) -> usize {
        let mut closest = 0;
        let mut closest_dist = (arg - self.nodes[0].0).abs();
        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            let dist = (arg - node.0).abs();
            if dist < closest_dist {
                closest = i;
                closest_dist = dist;
            }
        }
        closest
    }

    /// Evaluates the interpolating polynomial at `arg`, using the
    /// second barycentric form with the closest node factored out of the
    /// denominator to avoid the 0/0 that occurs exactly at a node.
    pub fn evaluate(&self, arg: f32) -> f32 {
        let skip = self.closest_node_index(arg);
        let w = self.weights[skip];
        let f = self.nodes[skip].1;
        let t = arg - self.nodes[skip].0;

        let mut num = 0.0;
        let mut den = 0.0;
        for (i, node) in self.nodes.iter().enumerate() {
            if i != skip {
                let d = arg - node.0;
                num += self.weights[i] * node.1 / d;
                den += self.weights[i] / d;
            }
        }

        let denom = t * den + w;
        (t * num + f * w) / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_linear_function_exactly() {
        let args = [0.0, 1.0, 2.0, 3.0];
        let values: Vec<f32> = args.iter().map(|&x| 2.0 * x + 1.0).collect();
        let interp = LagrangeInterpolator::new(&args, &values, 1.0);
        for x in [0.5, 1.5, 2.5] {
            assert!((interp.evaluate(x) - (2.0 * x + 1.0)).abs() < 1e-3);
        }
    }

    #[test]
    fn reproduces_node_values() {
        let args = [0.0, 1.0, 2.0];
        let values = [1.0, 4.0, 9.0];
        let interp = LagrangeInterpolator::new(&args, &values, 1.0);
        for (&a, &v) in args.iter().zip(values.iter()) {
            assert!((interp.evaluate(a) - v).abs() < 1e-2);
        }
    }
}
