use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::{Array3, Array4};
use ort::{
    ep::{self, ExecutionProvider},
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::Value,
};

use crate::flow::DisplacementField;

/// Default network input size (width, height).
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (512, 384);

/// What a warping model produces for one input image.
#[derive(Debug, Clone)]
pub struct FlowPrediction {
    /// Corrected image at the model's output resolution.
    pub warped: RgbImage,
    /// Backward displacement field at the model's internal resolution.
    pub field: DisplacementField,
}

/// Anything able to turn a photograph into a warped image plus its flow.
///
/// The metric code never needs to know which device or runtime produced
/// the field; it receives this capability explicitly.
pub trait FlowModel {
    fn predict(&mut self, image: &DynamicImage) -> Result<FlowPrediction>;
}

impl<F> FlowModel for F
where
    F: FnMut(&DynamicImage) -> Result<FlowPrediction>,
{
    fn predict(&mut self, image: &DynamicImage) -> Result<FlowPrediction> {
        self(image)
    }
}

pub fn session_builder() -> Result<SessionBuilder> {
    #[allow(unused_mut)]
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    {
        let ep = ep::OpenVINO::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("openvino feature is enabled, onnx runtime not compiled with openvino")
        }
    }

    #[cfg(feature = "cuda")]
    {
        let ep = ep::CUDA::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("cuda feature is enabled, onnx runtime not compiled with cuda")
        }
    }

    Ok(builder)
}

/// Flow network exported to ONNX.
///
/// Input: `[1, 3, H, W]` RGB in `[0, 1]`.
/// Outputs: warped image `[1, 3, h, w]` in `[0, 1]`, then the flow as
/// `[1, h, w, 2]` or `[1, 2, h, w]`.
pub struct OnnxFlowModel {
    session: Session,
    input_width: u32,
    input_height: u32,
}

impl OnnxFlowModel {
    pub fn from_file(path: &Path, input_width: u32, input_height: u32) -> Result<Self> {
        let session = session_builder()?
            .commit_from_file(path)
            .with_context(|| format!("load flow model {}", path.display()))?;
        log::info!(
            "loaded flow model {} (input {}x{})",
            path.display(),
            input_width,
            input_height
        );
        Ok(Self {
            session,
            input_width,
            input_height,
        })
    }
}

impl FlowModel for OnnxFlowModel {
    fn predict(&mut self, image: &DynamicImage) -> Result<FlowPrediction> {
        let input_array = input_tensor(image, self.input_width, self.input_height);
        let input_tensor = Value::from_array(input_array)?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;

        let mut output_data: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
        for (_name, output) in outputs.iter() {
            let (shape, data) = output.try_extract_tensor::<f32>()?;
            output_data.push((shape.iter().copied().collect(), data.to_vec()));
        }

        let [(img_shape, img_data), (flow_shape, flow_data), ..] = output_data.as_slice() else {
            anyhow::bail!(
                "flow model must return an image and a flow, got {} output(s)",
                output_data.len()
            );
        };

        let warped = decode_image(img_shape, img_data).context("decoding warped image")?;
        let field = decode_field(flow_shape, flow_data).context("decoding flow")?;
        log::debug!(
            "model output: image {}x{}, flow {}x{}",
            warped.width(),
            warped.height(),
            field.width(),
            field.height()
        );

        Ok(FlowPrediction { warped, field })
    }
}

/// Resize to the network size and lay out as `[1, 3, H, W]` in `[0, 1]`.
fn input_tensor(image: &DynamicImage, width: u32, height: u32) -> Array4<f32> {
    let rgb = image
        .resize_exact(width, height, image::imageops::FilterType::Triangle)
        .to_rgb8();
    Array4::from_shape_fn((1, 3, height as usize, width as usize), |(_, c, y, x)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

fn batch_dims(shape: &[i64]) -> Result<[usize; 3]> {
    match shape {
        [1, a, b, c] if *a > 0 && *b > 0 && *c > 0 => Ok([*a as usize, *b as usize, *c as usize]),
        _ => anyhow::bail!("expected a single-batch 4D tensor, got shape {:?}", shape),
    }
}

fn decode_image(shape: &[i64], data: &[f32]) -> Result<RgbImage> {
    let [channels, height, width] = batch_dims(shape)?;
    if channels != 3 {
        anyhow::bail!("expected 3 image channels, got {}", channels);
    }
    let chw = Array3::from_shape_vec((channels, height, width), data.to_vec())?;
    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let px = |c: usize| (chw[[c, y as usize, x as usize]] * 255.0).clamp(0.0, 255.0) as u8;
        Rgb([px(0), px(1), px(2)])
    }))
}

fn decode_field(shape: &[i64], data: &[f32]) -> Result<DisplacementField> {
    let dims = batch_dims(shape)?;
    let field = match dims {
        [h, w, 2] => DisplacementField::from_hwc(Array3::from_shape_vec((h, w, 2), data.to_vec())?)?,
        [2, h, w] => DisplacementField::from_chw(Array3::from_shape_vec((2, h, w), data.to_vec())?)?,
        _ => anyhow::bail!("flow tensor has no 2-channel axis: {:?}", shape),
    };
    Ok(field)
}
