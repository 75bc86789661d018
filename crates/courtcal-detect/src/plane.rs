use courtcal_core::Real;
use image::GrayImage;

/// Row-major floating point copy of a grayscale frame.
#[derive(Clone, Debug)]
pub(crate) struct Plane {
    pub width: usize,
    pub height: usize,
    data: Vec<Real>,
}

impl Plane {
    pub fn from_gray(img: &GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().iter().map(|&v| v as Real).collect(),
        }
    }

    /// Pixel value with coordinates clamped to the frame.
    #[inline]
    pub fn at(&self, x: i64, y: i64) -> Real {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn sample(&self, x: Real, y: Real) -> Real {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (xi, yi) = (x0 as i64, y0 as i64);

        let p00 = self.at(xi, yi);
        let p10 = self.at(xi + 1, yi);
        let p01 = self.at(xi, yi + 1);
        let p11 = self.at(xi + 1, yi + 1);

        let a = p00 + fx * (p10 - p00);
        let b = p01 + fx * (p11 - p01);
        a + fy * (b - a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = GrayImage::from_raw(2, 1, vec![0, 100]).unwrap();
        let plane = Plane::from_gray(&img);
        assert!((plane.sample(0.25, 0.0) - 25.0).abs() < 1e-9);
        assert_eq!(plane.at(-3, 5), 0.0);
    }
}
