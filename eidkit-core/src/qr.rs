//! QR code collaborators used by the non-mobile flow.
//!
//! Encoding and rendering are capabilities supplied by the host. The crate ships an SVG renderer
//! and, behind the `qrcode` feature, an encoder built on the `qrcode` crate.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::EidError;

/// QR error correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCorrectionLevel {
    /// Recovers about 7% of the symbol.
    #[serde(rename = "L")]
    Low,
    /// Recovers about 15% of the symbol.
    #[default]
    #[serde(rename = "M")]
    Medium,
    /// Recovers about 25% of the symbol.
    #[serde(rename = "Q")]
    Quartile,
    /// Recovers about 30% of the symbol.
    #[serde(rename = "H")]
    High,
}

/// A square matrix of QR modules, stored row-major; `true` is a dark module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMatrix {
    width: usize,
    modules: Vec<bool>,
}

impl ModuleMatrix {
    /// Creates a matrix from row-major modules.
    ///
    /// # Errors
    /// Returns an error if `modules` does not hold exactly `width * width` entries.
    pub fn new(width: usize, modules: Vec<bool>) -> Result<Self, EidError> {
        if width == 0 || width.checked_mul(width) != Some(modules.len()) {
            return Err(EidError::Unknown(format!(
                "module matrix of width {width} cannot hold {} modules",
                modules.len()
            )));
        }
        Ok(Self { width, modules })
    }

    /// Number of modules per side.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Whether the module at column `x`, row `y` is dark. Out of range modules are light.
    #[must_use]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }
}

/// Encodes text into a QR module matrix.
pub trait QrEncoder: Send + Sync {
    /// Encodes `text` at the given error correction level.
    ///
    /// # Errors
    /// Returns an error if the text does not fit in a QR symbol.
    fn encode(
        &self,
        text: &str,
        level: ErrorCorrectionLevel,
    ) -> Result<ModuleMatrix, EidError>;
}

/// Renders a module matrix to vector image markup.
pub trait QrRenderer: Send + Sync {
    /// Renders `matrix` with a quiet zone of `border` modules.
    fn render(
        &self,
        matrix: &ModuleMatrix,
        border: usize,
        light_color: &str,
        dark_color: &str,
    ) -> String;
}

/// Renders QR codes as a standalone SVG document, one unit per module.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgRenderer;

impl QrRenderer for SvgRenderer {
    fn render(
        &self,
        matrix: &ModuleMatrix,
        border: usize,
        light_color: &str,
        dark_color: &str,
    ) -> String {
        let size = matrix.width() + 2 * border;
        let mut path = String::new();
        for y in 0..matrix.width() {
            for x in 0..matrix.width() {
                if matrix.is_dark(x, y) {
                    let _ = write!(path, "M{} {}h1v1h-1z", x + border, y + border);
                }
            }
        }

        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {size} {size}" "#,
                r#"shape-rendering="crispEdges">"#,
                r#"<path fill="{light}" d="M0 0h{size}v{size}H0z"/>"#,
                r#"<path fill="{dark}" d="{path}"/></svg>"#,
            ),
            size = size,
            light = light_color,
            dark = dark_color,
            path = path,
        )
    }
}

/// QR encoder backed by the `qrcode` crate.
#[cfg(feature = "qrcode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeEncoder;

#[cfg(feature = "qrcode")]
impl QrEncoder for QrCodeEncoder {
    fn encode(
        &self,
        text: &str,
        level: ErrorCorrectionLevel,
    ) -> Result<ModuleMatrix, EidError> {
        use qrcode::{Color, EcLevel, QrCode};

        let level = match level {
            ErrorCorrectionLevel::Low => EcLevel::L,
            ErrorCorrectionLevel::Medium => EcLevel::M,
            ErrorCorrectionLevel::Quartile => EcLevel::Q,
            ErrorCorrectionLevel::High => EcLevel::H,
        };
        let code = QrCode::with_error_correction_level(text, level)
            .map_err(|e| EidError::Unknown(format!("QR generation failed: {e}")))?;
        let modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();
        ModuleMatrix::new(code.width(), modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: usize) -> ModuleMatrix {
        let modules = (0..width * width).map(|i| (i / width + i % width) % 2 == 0).collect();
        ModuleMatrix::new(width, modules).unwrap()
    }

    #[test]
    fn test_matrix_must_be_square() {
        assert!(ModuleMatrix::new(3, vec![true; 8]).is_err());
        assert!(ModuleMatrix::new(0, vec![]).is_err());
        assert!(ModuleMatrix::new(usize::MAX, vec![true]).is_err());
        assert!(ModuleMatrix::new(2, vec![true, false, false, true]).is_ok());
    }

    #[test]
    fn test_out_of_range_modules_are_light() {
        let matrix = checker(3);
        assert!(matrix.is_dark(0, 0));
        assert!(!matrix.is_dark(1, 0));
        assert!(!matrix.is_dark(3, 0));
        assert!(!matrix.is_dark(0, 7));
    }

    #[test]
    fn test_svg_renderer_applies_border_and_colors() {
        let svg = SvgRenderer.render(&checker(2), 4, "#fff", "#000");

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"viewBox="0 0 10 10""#));
        assert!(svg.contains(r##"fill="#fff""##));
        assert!(svg.contains(r##"fill="#000""##));
        assert!(svg.contains("M4 4h1v1h-1z"));
        assert!(svg.contains("M5 5h1v1h-1z"));
        assert!(!svg.contains("M5 4h1v1h-1z"));
    }

    #[cfg(feature = "qrcode")]
    #[test]
    fn test_qrcode_encoder_produces_square_matrix() {
        let matrix = QrCodeEncoder
            .encode("web-eid://auth?action=\"web-eid:authenticate\"", ErrorCorrectionLevel::Medium)
            .unwrap();
        // Smallest symbol is version 1, 21 modules per side; finder pattern corner is dark.
        assert!(matrix.width() >= 21);
        assert!(matrix.is_dark(0, 0));
    }
}
