use crate::models::WeightSet;
use crate::utils::error::DashError;
use crate::Result;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array3, ArrayView3};
use std::str::FromStr;

/// Spatial size expected by the classifier.
pub const INPUT_SIZE: u32 = 224;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Largest intermediate image the recipe resize may allocate. Beyond this the
/// crop window is cut from the source first and resized on its own.
const MAX_RESIZED_PIXELS: u64 = 4096 * 4096;

/// How an uploaded image is turned into model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreprocessMode {
    /// The weight set's own recipe: resize shorter side, centre crop, mean/std normalization.
    #[default]
    Recipe,
    /// Resize straight to 224x224 and scale to [0, 1] without normalization.
    Direct,
}

impl FromStr for PreprocessMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "recipe" => Ok(Self::Recipe),
            "direct" => Ok(Self::Direct),
            other => Err(format!(
                "unknown preprocess mode '{}', expected 'recipe' or 'direct'",
                other
            )),
        }
    }
}

/// Model input for a single image, channel-first `(3, H, W)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array3<f32>,
}

impl InputTensor {
    pub fn from_array(data: Array3<f32>) -> Result<Self> {
        let (channels, height, width) = data.dim();
        if channels != 3 || height == 0 || width == 0 {
            return Err(DashError::Preprocess(format!(
                "expected a (3, H, W) tensor, got ({}, {}, {})",
                channels, height, width
            )));
        }
        Ok(Self { data })
    }

    /// `(channels, height, width)`
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    mode: PreprocessMode,
    resize_size: u32,
    crop_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocessor {
    pub fn new(mode: PreprocessMode, weights: WeightSet) -> Self {
        Self {
            mode,
            resize_size: weights.resize_size(),
            crop_size: INPUT_SIZE,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    pub fn mode(&self) -> PreprocessMode {
        self.mode
    }

    pub fn preprocess(&self, image: &DynamicImage) -> Result<InputTensor> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DashError::Preprocess(format!(
                "cannot preprocess an empty {}x{} image",
                width, height
            )));
        }

        let rgb = image.to_rgb8();
        let tensor = match self.mode {
            PreprocessMode::Recipe => {
                let cropped = self.resize_and_crop(&rgb)?;
                self.to_tensor(&cropped, true)
            }
            PreprocessMode::Direct => {
                let resized =
                    imageops::resize(&rgb, self.crop_size, self.crop_size, FilterType::Triangle);
                self.to_tensor(&resized, false)
            }
        };

        InputTensor::from_array(tensor)
    }

    /// Resize the shorter side to `resize_size`, then take the centred
    /// `crop_size` square.
    ///
    /// Extreme aspect ratios would blow the intermediate image up to gigabytes
    /// (a 1x20000 strip becomes 232x4640000), so past `MAX_RESIZED_PIXELS` the
    /// same window is located in source coordinates and only that region is
    /// resized.
    fn resize_and_crop(&self, image: &RgbImage) -> Result<RgbImage> {
        let (new_w, new_h) = Self::shorter_side_dims(image.dimensions(), self.resize_size);
        if new_w as u64 * new_h as u64 <= MAX_RESIZED_PIXELS {
            let resized = Self::resize_shorter_side(image, self.resize_size);
            return Self::center_crop(&resized, self.crop_size);
        }

        let (left, top, width, height) =
            Self::source_crop_window(image.dimensions(), (new_w, new_h), self.crop_size);
        tracing::debug!(
            "Cropping {}x{} source window at ({}, {}) before resize, full resize would be {}x{}",
            width,
            height,
            left,
            top,
            new_w,
            new_h
        );
        let region = imageops::crop_imm(image, left, top, width, height).to_image();
        Ok(imageops::resize(
            &region,
            self.crop_size,
            self.crop_size,
            FilterType::Triangle,
        ))
    }

    /// Size after scaling the shorter side to `size`; the longer side is truncated.
    fn shorter_side_dims((width, height): (u32, u32), size: u32) -> (u32, u32) {
        let scale = |long: u32, short: u32| -> u32 {
            (size as u64 * long as u64 / short as u64).min(u32::MAX as u64) as u32
        };
        if width <= height {
            (size, scale(height, width).max(1))
        } else {
            (scale(width, height).max(1), size)
        }
    }

    fn resize_shorter_side(image: &RgbImage, size: u32) -> RgbImage {
        let (width, height) = image.dimensions();
        let (new_w, new_h) = Self::shorter_side_dims((width, height), size);

        if (new_w, new_h) == (width, height) {
            return image.clone();
        }
        imageops::resize(image, new_w, new_h, FilterType::Triangle)
    }

    /// The centred `crop` window of a `resized` image, mapped back onto the
    /// source as `(left, top, width, height)`. Always at least one pixel.
    fn source_crop_window(
        (width, height): (u32, u32),
        (new_w, new_h): (u32, u32),
        crop: u32,
    ) -> (u32, u32, u32, u32) {
        let axis = |src: u32, resized: u32| -> (u32, u32) {
            let scale = src as f64 / resized as f64;
            let offset = (resized.saturating_sub(crop) as f64 / 2.0).round_ties_even();
            let start = ((offset * scale).floor() as u32).min(src - 1);
            let len = ((crop as f64 * scale).round() as u32).clamp(1, src - start);
            (start, len)
        };
        let (left, crop_w) = axis(width, new_w);
        let (top, crop_h) = axis(height, new_h);
        (left, top, crop_w, crop_h)
    }

    fn center_crop(image: &RgbImage, size: u32) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        if width < size || height < size {
            return Err(DashError::Preprocess(format!(
                "image {}x{} is smaller than crop {}",
                width, height, size
            )));
        }

        let top = ((height - size) as f64 / 2.0).round_ties_even() as u32;
        let left = ((width - size) as f64 / 2.0).round_ties_even() as u32;
        Ok(imageops::crop_imm(image, left, top, size, size).to_image())
    }

    fn to_tensor(&self, image: &RgbImage, normalize: bool) -> Array3<f32> {
        let (width, height) = image.dimensions();
        let mut tensor = Array3::<f32>::zeros((3, height as usize, width as usize));

        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                let mut value = pixel[c] as f32 / 255.0;
                if normalize {
                    value = (value - self.mean[c]) / self.std[c];
                }
                tensor[[c, y as usize, x as usize]] = value;
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn output_shape_is_fixed_for_any_input_size() {
        for mode in [PreprocessMode::Recipe, PreprocessMode::Direct] {
            let preprocessor = Preprocessor::new(mode, WeightSet::Imagenet1kV2);
            for (w, h) in [(512, 384), (1, 1), (224, 224), (37, 900), (300, 7)] {
                let tensor = preprocessor.preprocess(&gradient_image(w, h)).unwrap();
                assert_eq!(tensor.dim(), (3, 224, 224), "mode {:?} size {}x{}", mode, w, h);
            }
        }
    }

    #[test]
    fn direct_mode_scales_to_unit_range() {
        let white = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(50, 80, Rgb([255, 255, 255])));
        let preprocessor = Preprocessor::new(PreprocessMode::Direct, WeightSet::Imagenet1kV2);
        let tensor = preprocessor.preprocess(&white).unwrap();
        assert!(tensor.view().iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn recipe_mode_applies_imagenet_normalization() {
        let black = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(300, 300, Rgb([0, 0, 0])));
        let preprocessor = Preprocessor::new(PreprocessMode::Recipe, WeightSet::Imagenet1kV1);
        let tensor = preprocessor.preprocess(&black).unwrap();
        let view = tensor.view();
        for c in 0..3 {
            let expected = -IMAGENET_MEAN[c] / IMAGENET_STD[c];
            assert!((view[[c, 100, 100]] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let image = gradient_image(640, 480);
        let preprocessor = Preprocessor::new(PreprocessMode::Recipe, WeightSet::Imagenet1kV2);
        let a = preprocessor.preprocess(&image).unwrap();
        let b = preprocessor.preprocess(&image).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shorter_side_resize_truncates_long_side() {
        let image = RgbImage::new(512, 384);
        let resized = Preprocessor::resize_shorter_side(&image, 232);
        // 232 * 512 / 384 = 309.33
        assert_eq!(resized.dimensions(), (309, 232));
    }

    #[test]
    fn extreme_strip_is_cropped_before_resizing() {
        let preprocessor = Preprocessor::new(PreprocessMode::Recipe, WeightSet::Imagenet1kV2);
        for (w, h) in [(1, 20000), (20000, 1), (3, 60000)] {
            let tensor = preprocessor.preprocess(&gradient_image(w, h)).unwrap();
            assert_eq!(tensor.dim(), (3, 224, 224), "size {}x{}", w, h);
        }
    }

    #[test]
    fn source_window_is_centred_on_the_long_side() {
        // 1x20000 at 232 would be 232x4640000; the 224 window maps to the
        // single source pixel in the middle.
        let dims = Preprocessor::shorter_side_dims((1, 20000), 232);
        assert_eq!(dims, (232, 4_640_000));
        assert_eq!(
            Preprocessor::source_crop_window((1, 20000), dims, 224),
            (0, 9999, 1, 1)
        );

        // Ordinary photos map to a window inside the source.
        let dims = Preprocessor::shorter_side_dims((4000, 3000), 256);
        let (left, top, w, h) = Preprocessor::source_crop_window((4000, 3000), dims, 224);
        // 4000x3000 -> 341x256, offsets (58, 16), scales 4000/341 and 3000/256
        assert_eq!((left, top, w, h), (680, 187, 2628, 2625));
        assert!(left + w <= 4000 && top + h <= 3000);
    }

    #[test]
    fn center_crop_takes_the_middle() {
        let image: RgbImage = ImageBuffer::from_fn(6, 4, |x, y| Rgb([x as u8, y as u8, 0]));
        let cropped = Preprocessor::center_crop(&image, 2).unwrap();
        assert_eq!(cropped.get_pixel(0, 0).0, [2, 1, 0]);
    }

    #[test]
    fn mode_parses_from_cli_strings() {
        assert_eq!("direct".parse::<PreprocessMode>().unwrap(), PreprocessMode::Direct);
        assert_eq!("Recipe".parse::<PreprocessMode>().unwrap(), PreprocessMode::Recipe);
        assert!("crop".parse::<PreprocessMode>().is_err());
    }

    #[test]
    fn tensor_rejects_wrong_channel_count() {
        assert!(InputTensor::from_array(Array3::zeros((4, 2, 2))).is_err());
    }
}
