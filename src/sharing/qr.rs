//! Share URL construction and QR rendering for the issue response.

use qrcode::render::svg;
use qrcode::QrCode;

/// Clinician-facing URL carrying the raw token as its last path segment.
pub fn share_url(public_base_url: &str, raw_token: &str) -> String {
    format!("{}/share/{raw_token}", public_base_url.trim_end_matches('/'))
}

/// Render `url` as an SVG QR code.
pub fn generate_qr_svg(url: &str) -> Result<String, String> {
    let code = QrCode::new(url.as_bytes()).map_err(|e| format!("QR generation failed: {e}"))?;

    let svg_string = code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .max_dimensions(300, 300)
        .dark_color(svg::Color("#1c1917"))
        .light_color(svg::Color("#ffffff"))
        .quiet_zone(true)
        .build();

    Ok(svg_string)
}
