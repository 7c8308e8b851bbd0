//! QR rendering and the pairing wait loop.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zapgate_core::event::QrEvent;
use zapgate_core::traits::SessionRepository;
use zapgate_core::{GatewayError, Result};

/// Generate a compact QR code for terminal display using Unicode half-block
/// characters.
///
/// Packs two rows of modules into one line of text using `▀`, `▄`, `█`, and
/// space, producing a code roughly half the height of a naive renderer.
pub fn render_terminal(qr_data: &str) -> Result<String> {
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| GatewayError::Protocol(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let colors: Vec<Color> = code.into_colors();
    let is_dark = |row: usize, col: usize| -> bool {
        if row < width && col < width {
            colors[row * width + col] == Color::Dark
        } else {
            false
        }
    };

    let mut out = String::new();
    // Process two rows at a time.
    let mut row = 0;
    while row < width {
        for col in 0..width {
            let top = is_dark(row, col);
            let bottom = if row + 1 < width {
                is_dark(row + 1, col)
            } else {
                false
            };
            out.push(match (top, bottom) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
        row += 2;
    }

    Ok(out)
}

/// Generate a QR code as PNG image bytes.
pub fn render_png(qr_data: &str) -> Result<Vec<u8>> {
    use image::{ImageBuffer, Luma};
    use qrcode::{EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| GatewayError::Protocol(format!("QR generation failed: {e}")))?;

    let module_size: u32 = 10;
    let quiet_zone: u32 = 2;
    let modules = code.width() as u32;
    let img_size = (modules + quiet_zone * 2) * module_size;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let mx = (x / module_size).saturating_sub(quiet_zone);
        let my = (y / module_size).saturating_sub(quiet_zone);

        if x / module_size < quiet_zone
            || y / module_size < quiet_zone
            || mx >= modules
            || my >= modules
        {
            Luma([255u8]) // White border
        } else {
            use qrcode::Color;
            match code[(mx as usize, my as usize)] {
                Color::Dark => Luma([0u8]),
                Color::Light => Luma([255u8]),
            }
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| GatewayError::Protocol(format!("PNG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Generate a QR code as a `data:image/png;base64,` URI, the form persisted
/// on the session row for API consumers.
pub fn render_png_data_uri(qr_data: &str) -> Result<String> {
    let png = render_png(qr_data)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}

/// Drive the pairing wait: persist each rotated QR code, and resolve to the
/// paired device JID, an expired window, or an error.
///
/// The scan window restarts with every fresh code; the provider ends the
/// rotation itself with a `Timeout` event when it gives up.
pub async fn wait_for_pairing(
    session_id: &str,
    sessions: &dyn SessionRepository,
    mut qr_rx: mpsc::Receiver<QrEvent>,
    window: Duration,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut deadline = Instant::now() + window;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(GatewayError::Protocol("pairing cancelled".to_string()));
            }
            _ = tokio::time::sleep_until(deadline) => {
                return Err(GatewayError::QrExpired);
            }
            event = qr_rx.recv() => match event {
                Some(QrEvent::Code { code }) => {
                    let png = match render_png_data_uri(&code) {
                        Ok(uri) => uri,
                        Err(e) => {
                            warn!("Session {session_id}: QR render failed: {e}");
                            String::new()
                        }
                    };
                    sessions.set_qr(session_id, &code, &png).await?;
                    info!("Session {session_id}: QR code ready for scan");
                    deadline = Instant::now() + window;
                }
                Some(QrEvent::Success { device_jid }) => {
                    info!("Session {session_id}: paired as {device_jid}");
                    return Ok(device_jid);
                }
                Some(QrEvent::Timeout) => return Err(GatewayError::QrExpired),
                Some(QrEvent::Error { message }) => {
                    return Err(GatewayError::Protocol(format!("pairing failed: {message}")));
                }
                None => {
                    return Err(GatewayError::Protocol("pairing channel closed".to_string()));
                }
            }
        }
    }
}
