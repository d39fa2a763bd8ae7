//! ResNet-50 on candle, laid out to load torchvision checkpoints directly.
//!
//! The network is built by hand rather than taken from a model zoo because
//! attributions need gradients with respect to the input, and candle's fused
//! max-pool can only be differentiated when kernel and stride are equal.

use crate::models::{Classify, Differentiable};
use crate::utils::error::DashError;
use crate::Result;
use candle_core::{DType, Device, Module, Tensor, Var, D};
use candle_nn::{batch_norm, conv2d_no_bias, linear, BatchNorm, Conv2d, Conv2dConfig, Linear, VarBuilder};
use ndarray::{Array2, Array4, ArrayView4};
use std::path::Path;

const BN_EPS: f64 = 1e-5;
const EXPANSION: usize = 4;

/// (planes, blocks, stride) for each stage
const STAGES: [(usize, usize, usize); 4] = [(64, 3, 1), (128, 4, 2), (256, 6, 2), (512, 3, 2)];

struct ConvBn {
    conv: Conv2d,
    bn: BatchNorm,
}

impl ConvBn {
    #[allow(clippy::too_many_arguments)]
    fn new(
        c_in: usize,
        c_out: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        conv_vb: VarBuilder,
        bn_vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let cfg = Conv2dConfig {
            padding,
            stride,
            ..Default::default()
        };
        Ok(Self {
            conv: conv2d_no_bias(c_in, c_out, kernel, cfg, conv_vb)?,
            bn: batch_norm(c_out, BN_EPS, bn_vb)?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        // running statistics only, never batch statistics
        xs.apply(&self.conv)?.apply_t(&self.bn, false)
    }
}

struct Bottleneck {
    conv1: ConvBn,
    conv2: ConvBn,
    conv3: ConvBn,
    downsample: Option<ConvBn>,
}

impl Bottleneck {
    fn new(c_in: usize, planes: usize, stride: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let c_out = planes * EXPANSION;
        let downsample = if stride != 1 || c_in != c_out {
            Some(ConvBn::new(
                c_in,
                c_out,
                1,
                stride,
                0,
                vb.pp("downsample.0"),
                vb.pp("downsample.1"),
            )?)
        } else {
            None
        };

        Ok(Self {
            conv1: ConvBn::new(c_in, planes, 1, 1, 0, vb.pp("conv1"), vb.pp("bn1"))?,
            conv2: ConvBn::new(planes, planes, 3, stride, 1, vb.pp("conv2"), vb.pp("bn2"))?,
            conv3: ConvBn::new(planes, c_out, 1, 1, 0, vb.pp("conv3"), vb.pp("bn3"))?,
            downsample,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let ys = self.conv1.forward(xs)?.relu()?;
        let ys = self.conv2.forward(&ys)?.relu()?;
        let ys = self.conv3.forward(&ys)?;
        let shortcut = match &self.downsample {
            Some(downsample) => downsample.forward(xs)?,
            None => xs.clone(),
        };
        (ys + shortcut)?.relu()
    }
}

pub struct ResNet50 {
    stem: ConvBn,
    blocks: Vec<Bottleneck>,
    fc: Linear,
    num_classes: usize,
    device: Device,
}

impl ResNet50 {
    /// Load weights from a torchvision `.pth` checkpoint or a `.safetensors` file.
    pub fn load(path: &Path, num_classes: usize) -> Result<Self> {
        if !path.exists() {
            return Err(DashError::ModelLoad(format!(
                "weights not found: {}",
                path.display()
            )));
        }

        let device = Device::Cpu;
        let vb = match path.extension().and_then(|e| e.to_str()) {
            Some("safetensors") => unsafe {
                VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)
            },
            _ => VarBuilder::from_pth(path, DType::F32, &device),
        }
        .map_err(|e| DashError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        Self::new(vb, num_classes)
            .map_err(|e| DashError::ModelLoad(format!("{}: {}", path.display(), e)))
    }

    pub fn new(vb: VarBuilder, num_classes: usize) -> candle_core::Result<Self> {
        let device = vb.device().clone();
        let stem = ConvBn::new(3, 64, 7, 2, 3, vb.pp("conv1"), vb.pp("bn1"))?;

        let mut blocks = Vec::with_capacity(16);
        let mut c_in = 64;
        for (stage, &(planes, count, stride)) in STAGES.iter().enumerate() {
            let layer_vb = vb.pp(format!("layer{}", stage + 1));
            for index in 0..count {
                let block_stride = if index == 0 { stride } else { 1 };
                blocks.push(Bottleneck::new(c_in, planes, block_stride, layer_vb.pp(index))?);
                c_in = planes * EXPANSION;
            }
        }

        let fc = linear(c_in, num_classes, vb.pp("fc"))?;

        Ok(Self {
            stem,
            blocks,
            fc,
            num_classes,
            device,
        })
    }

    fn logits(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut xs = self.stem.forward(xs)?.relu()?;
        xs = max_pool2d_differentiable(&xs, 3, 2, 1)?;
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }
        let pooled = xs.mean(D::Minus1)?.mean(D::Minus1)?;
        self.fc.forward(&pooled)
    }

    fn to_tensor(&self, batch: ArrayView4<'_, f32>) -> candle_core::Result<Tensor> {
        let shape = batch.dim();
        let data: Vec<f32> = batch.iter().copied().collect();
        Tensor::from_vec(data, shape, &self.device)
    }
}

fn inference_err(e: candle_core::Error) -> DashError {
    DashError::Inference(e.to_string())
}

fn attribution_err(e: candle_core::Error) -> DashError {
    DashError::Attribution(e.to_string())
}

impl Classify for ResNet50 {
    fn name(&self) -> &str {
        "resnet50"
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&self, batch: ArrayView4<'_, f32>) -> Result<Array2<f32>> {
        let (n, c, _, _) = batch.dim();
        if c != 3 {
            return Err(DashError::Inference(format!(
                "expected 3 input channels, got {}",
                c
            )));
        }

        let xs = self.to_tensor(batch).map_err(inference_err)?;
        let logits = self.logits(&xs).map_err(inference_err)?;
        let values = logits
            .flatten_all()
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(inference_err)?;

        Array2::from_shape_vec((n, self.num_classes), values)
            .map_err(|e| DashError::Inference(format!("unexpected logits shape: {}", e)))
    }
}

impl Differentiable for ResNet50 {
    fn target_gradients(&self, batch: ArrayView4<'_, f32>, target: usize) -> Result<Array4<f32>> {
        if target >= self.num_classes {
            return Err(DashError::Attribution(format!(
                "target {} out of range for {} classes",
                target, self.num_classes
            )));
        }

        let shape = batch.dim();
        let input = self
            .to_tensor(batch)
            .and_then(|t| Var::from_tensor(&t))
            .map_err(attribution_err)?;

        let logits = self.logits(input.as_tensor()).map_err(attribution_err)?;
        // batch entries are independent, so the gradient of the summed target
        // scores holds each entry's own gradient
        let score = logits
            .narrow(1, target, 1)
            .and_then(|t| t.sum_all())
            .map_err(attribution_err)?;
        let grads = score.backward().map_err(attribution_err)?;

        let grad = grads.get(input.as_tensor()).ok_or_else(|| {
            DashError::Attribution("no gradient reached the input".to_string())
        })?;
        let values = grad
            .flatten_all()
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(attribution_err)?;

        Array4::from_shape_vec(shape, values)
            .map_err(|e| DashError::Attribution(format!("unexpected gradient shape: {}", e)))
    }
}

/// Max pooling assembled from strided slices and element-wise maxima.
///
/// Zero padding matches `-inf` padding only for non-negative inputs, which
/// holds after ReLU.
pub(crate) fn max_pool2d_differentiable(
    xs: &Tensor,
    kernel: usize,
    stride: usize,
    padding: usize,
) -> candle_core::Result<Tensor> {
    let (_, _, h, w) = xs.dims4()?;
    let out_h = (h + 2 * padding - kernel) / stride + 1;
    let out_w = (w + 2 * padding - kernel) / stride + 1;

    // trailing `stride` extra rows/cols keep every strided narrow in bounds
    let padded = xs
        .pad_with_zeros(D::Minus2, padding, padding + stride)?
        .pad_with_zeros(D::Minus1, padding, padding + stride)?;

    let mut pooled: Option<Tensor> = None;
    for dy in 0..kernel {
        let rows = take_strided(&padded, 2, dy, out_h, stride)?;
        for dx in 0..kernel {
            let window = take_strided(&rows, 3, dx, out_w, stride)?;
            pooled = Some(match pooled {
                None => window,
                Some(acc) => acc.maximum(&window)?,
            });
        }
    }

    pooled.ok_or_else(|| candle_core::Error::Msg("max pool kernel must be non-empty".to_string()))
}

/// Elements `offset, offset + stride, ...` (`len` of them) along `dim`.
fn take_strided(
    xs: &Tensor,
    dim: usize,
    offset: usize,
    len: usize,
    stride: usize,
) -> candle_core::Result<Tensor> {
    let span = xs.narrow(dim, offset, len * stride)?.contiguous()?;
    let mut dims = span.dims().to_vec();
    dims[dim] = len;
    dims.insert(dim + 1, stride);
    span.reshape(dims)?.narrow(dim + 1, 0, 1)?.squeeze(dim + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    fn image_batch(n: usize, size: usize) -> Array4<f32> {
        Array4::from_shape_fn((n, 3, size, size), |(b, c, y, x)| {
            ((b + 1) as f32 * 0.1 + c as f32 * 0.2 + (x * y) as f32 * 0.001).sin()
        })
    }

    #[test]
    fn differentiable_max_pool_matches_candle() {
        let device = Device::Cpu;
        let data: Vec<f32> = (0..2 * 3 * 9 * 11).map(|i| ((i * 37) % 101) as f32).collect();
        let xs = Tensor::from_vec(data, (2, 3, 9, 11), &device).unwrap();

        let ours = max_pool2d_differentiable(&xs, 3, 2, 1).unwrap();
        let padded = xs
            .pad_with_zeros(D::Minus2, 1, 1)
            .unwrap()
            .pad_with_zeros(D::Minus1, 1, 1)
            .unwrap();
        let reference = padded.max_pool2d_with_stride(3, 2).unwrap();

        assert_eq!(ours.dims(), reference.dims());
        assert_eq!(ours.dims(), &[2, 3, 5, 6]);
        let diff = (ours - reference)
            .unwrap()
            .abs()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn max_pool_gradient_routes_to_argmax() {
        let device = Device::Cpu;
        // strictly increasing values: every window's max is its bottom-right element
        let data: Vec<f32> = (0..16).map(|i| i as f32 + 1.0).collect();
        let xs = Var::from_tensor(&Tensor::from_vec(data, (1, 1, 4, 4), &device).unwrap()).unwrap();

        let pooled = max_pool2d_differentiable(xs.as_tensor(), 3, 2, 1).unwrap();
        assert_eq!(pooled.dims(), &[1, 1, 2, 2]);
        let grads = pooled.sum_all().unwrap().backward().unwrap();
        let grad = grads
            .get(xs.as_tensor())
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        // windows end at rows/cols 1 and 3
        let mut expected = vec![0.0f32; 16];
        for (y, x) in [(1, 1), (1, 3), (3, 1), (3, 3)] {
            expected[y * 4 + x] = 1.0;
        }
        assert_eq!(grad, expected);
    }

    #[test]
    fn zero_weights_build_and_backpropagate() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = ResNet50::new(vb, 1000).unwrap();
        let batch = image_batch(2, 64);

        let logits = model.forward(batch.view()).unwrap();
        assert_eq!(logits.dim(), (2, 1000));
        assert!(logits.iter().all(|&v| v == 0.0));

        let grads = model.target_gradients(batch.view(), 5).unwrap();
        assert_eq!(grads.dim(), batch.dim());
    }

    #[test]
    fn random_weights_give_input_dependent_scores_and_gradients() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = ResNet50::new(vb, 10).unwrap();
        let batch = image_batch(2, 64);

        let logits = model.forward(batch.view()).unwrap();
        assert_eq!(logits.dim(), (2, 10));
        assert!(logits.iter().all(|v| v.is_finite()));
        assert_ne!(logits.row(0), logits.row(1));

        let grads = model.target_gradients(batch.view(), 3).unwrap();
        assert!(grads.iter().any(|&g| g != 0.0));
    }

    #[test]
    fn target_out_of_range_is_rejected() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = ResNet50::new(vb, 10).unwrap();
        let batch = image_batch(1, 32);
        assert!(matches!(
            model.target_gradients(batch.view(), 10),
            Err(DashError::Attribution(_))
        ));
    }

    #[test]
    fn missing_weights_file_is_a_load_error() {
        let err = ResNet50::load(Path::new("/nonexistent/resnet50.pth"), 1000)
            .err()
            .unwrap();
        assert!(matches!(err, DashError::ModelLoad(_)));
    }
}
