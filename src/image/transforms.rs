use crate::config::{PixelRange, TensorLayout};
use crate::detection::{BoundingBox, NormalizedLandmark};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::Array4;

/// Region of the source image fed to a landmark model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// Map a point in model input pixels back to normalized source image coordinates.
    pub fn to_image_normalized(
        &self,
        model_x: f32,
        model_y: f32,
        input_size: u32,
        img_w: u32,
        img_h: u32,
    ) -> NormalizedLandmark {
        let scale_x = self.width as f32 / input_size as f32;
        let scale_y = self.height as f32 / input_size as f32;
        NormalizedLandmark {
            x: (self.x as f32 + model_x * scale_x) / img_w as f32,
            y: (self.y as f32 + model_y * scale_y) / img_h as f32,
        }
    }
}

pub struct ImageTransforms;

impl ImageTransforms {
    /// Square region of side `max(w, h) * scale` centred on the box, clipped to the image.
    pub fn square_roi(bbox: &BoundingBox, scale: f32, img_w: u32, img_h: u32) -> CropRegion {
        let side = (bbox.width.max(bbox.height) as f32 * scale).round().max(1.0);
        let cx = bbox.x as f32 + bbox.width as f32 / 2.0;
        let cy = bbox.y as f32 + bbox.height as f32 / 2.0;

        let x0 = (cx - side / 2.0).round().max(0.0) as u32;
        let y0 = (cy - side / 2.0).round().max(0.0) as u32;
        let x0 = x0.min(img_w.saturating_sub(1));
        let y0 = y0.min(img_h.saturating_sub(1));
        let x1 = ((cx + side / 2.0).round() as u32).clamp(x0 + 1, img_w.max(x0 + 1));
        let y1 = ((cy + side / 2.0).round() as u32).clamp(y0 + 1, img_h.max(y0 + 1));

        CropRegion {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// Crop a region and resize it to a `size` x `size` square.
    pub fn crop_resize(image: &RgbImage, region: &CropRegion, size: u32) -> RgbImage {
        let crop = imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image();
        imageops::resize(&crop, size, size, FilterType::Triangle)
    }

    /// Convert an RGB image into a batch-of-one float tensor.
    pub fn to_tensor(image: &RgbImage, layout: TensorLayout, range: PixelRange) -> Array4<f32> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let mut tensor = match layout {
            TensorLayout::Nhwc => Array4::<f32>::zeros((1, height, width, 3)),
            TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, height, width)),
        };

        for (x, y, pixel) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                let value = match range {
                    PixelRange::ZeroOne => value,
                    PixelRange::SignedUnit => value * 2.0 - 1.0,
                };
                match layout {
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
                }
            }
        }

        tensor
    }
}
