//! G.711 companded audio decoding
//!
//! Telephony ingress delivers 8 kHz companded PCM (μ-law in North
//! America, A-law elsewhere). The VAD scores frames on linear samples,
//! so decoding has to be cheap enough to run inside the per-frame
//! budget — both decoders below are pure integer arithmetic.

use domain::{AudioFrame, FrameEncoding};

use crate::error::SpeechError;

const MULAW_BIAS: i32 = 0x84;

/// Decode one μ-law byte to a linear 16-bit sample
#[allow(clippy::cast_possible_truncation)]
pub fn mulaw_to_linear(byte: u8) -> i16 {
    let byte = !byte;
    let sign = byte & 0x80 != 0;
    let exponent = i32::from((byte >> 4) & 0x07);
    let mantissa = i32::from(byte & 0x0F);
    let magnitude = (((mantissa << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;
    let sample = if sign { -magnitude } else { magnitude };
    sample.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Decode one A-law byte to a linear 16-bit sample
#[allow(clippy::cast_possible_truncation)]
pub fn alaw_to_linear(byte: u8) -> i16 {
    let byte = byte ^ 0x55;
    let exponent = i32::from((byte >> 4) & 0x07);
    let mantissa = i32::from(byte & 0x0F);
    let magnitude = if exponent == 0 {
        (mantissa << 4) + 8
    } else {
        ((mantissa << 4) + 0x108) << (exponent - 1)
    };
    let sample = if byte & 0x80 == 0 { -magnitude } else { magnitude };
    sample.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Decode a frame's payload to linear 16-bit samples
///
/// # Errors
///
/// Returns `SpeechError::InvalidAudio` for a PCM16 payload with an odd
/// byte count (a corrupt frame).
pub fn decode_frame(frame: &AudioFrame) -> Result<Vec<i16>, SpeechError> {
    let payload = frame.payload();
    match frame.encoding() {
        FrameEncoding::Mulaw8k => Ok(payload.iter().copied().map(mulaw_to_linear).collect()),
        FrameEncoding::Alaw8k => Ok(payload.iter().copied().map(alaw_to_linear).collect()),
        FrameEncoding::Pcm16Le8k => {
            if payload.len() % 2 != 0 {
                return Err(SpeechError::InvalidAudio(
                    "odd byte count in PCM16 payload".to_string(),
                ));
            }
            Ok(payload
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect())
        },
    }
}

/// Normalized RMS energy of linear samples (0.0 to 1.0)
pub fn rms_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = f64::from(s) / f64::from(i16::MAX);
            normalized * normalized
        })
        .sum();
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let rms = (sum_sq / samples.len() as f64).sqrt() as f32;
    rms
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn mulaw_silence_decodes_to_zero() {
        assert_eq!(mulaw_to_linear(0xFF), 0);
    }

    #[test]
    fn mulaw_max_magnitude() {
        // 0x80 is the largest positive μ-law code word
        assert_eq!(mulaw_to_linear(0x80), 32124);
        assert_eq!(mulaw_to_linear(0x00), -32124);
    }

    #[test]
    fn alaw_smallest_magnitudes() {
        assert_eq!(alaw_to_linear(0x55), -8);
        assert_eq!(alaw_to_linear(0xD5), 8);
    }

    #[test]
    fn alaw_max_magnitude() {
        assert_eq!(alaw_to_linear(0xAA), 32256);
        assert_eq!(alaw_to_linear(0x2A), -32256);
    }

    #[test]
    fn mulaw_decode_is_odd_symmetric() {
        // Flipping the sign bit negates the sample
        for code in 0u8..128 {
            let positive = mulaw_to_linear(code | 0x80);
            let negative = mulaw_to_linear(code);
            assert_eq!(positive, -negative, "code {code:#x}");
        }
    }

    #[test]
    fn decodes_pcm16_frame() {
        let frame = AudioFrame::new(
            vec![0x00, 0x10, 0x00, 0xF0],
            0,
            Utc::now(),
            FrameEncoding::Pcm16Le8k,
        )
        .unwrap();
        let samples = decode_frame(&frame).unwrap();
        assert_eq!(samples, vec![0x1000, -0x1000]);
    }

    #[test]
    fn rms_energy_of_silence_is_zero() {
        assert!(rms_energy(&[0; 160]) < f32::EPSILON);
        assert!(rms_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn rms_energy_of_full_scale_is_one() {
        let loud = vec![i16::MAX; 160];
        let energy = rms_energy(&loud);
        assert!((energy - 1.0).abs() < 0.001);
    }

    #[test]
    fn rms_energy_scales_with_amplitude() {
        let quiet = vec![1000i16; 160];
        let loud = vec![20000i16; 160];
        assert!(rms_energy(&loud) > rms_energy(&quiet));
    }
}
